//! folio - export editor HTML to PDF or Word and preview its pagination

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use folio::paginate::{DecorationKind, DocumentSnapshot};
use folio::{
    DocumentSettings, Error, ExportFormat, PaginationConfig, Paginator, normalize_filename,
};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Paginate and export editor HTML", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio pdf notes.html -o notes          Write notes.pdf
    folio docx notes.html --header Draft   Write notes.docx with a running header
    folio paginate notes.html --json       Print page decorations as JSON")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Export to PDF
    Pdf(ExportArgs),
    /// Export to Word (.docx)
    Docx(ExportArgs),
    /// Show where page breaks fall
    Paginate {
        #[command(flatten)]
        common: CommonArgs,
        /// Print the decoration set as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Input HTML file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Document settings (JSON)
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Running header text, overrides the settings file
    #[arg(long)]
    header: Option<String>,

    /// Installed font family for PDF output
    #[arg(long, value_name = "FAMILY")]
    font: Option<String>,
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output file name; the extension is fixed up automatically
    #[arg(short, long, value_name = "NAME")]
    output: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match &cli.command {
        Command::Pdf(args) => export(args, ExportFormat::Pdf),
        Command::Docx(args) => export(args, ExportFormat::Docx),
        Command::Paginate { common, json } => paginate(common, *json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load(common: &CommonArgs) -> Result<(String, DocumentSettings), Error> {
    let html = std::fs::read_to_string(&common.input)?;
    let mut settings = match &common.settings {
        Some(path) => DocumentSettings::load(path)?,
        None => DocumentSettings::default(),
    };
    if common.header.is_some() {
        settings.header_text = common.header.clone();
    }
    if common.font.is_some() {
        settings.font_family = common.font.clone();
    }
    Ok((html, settings))
}

fn export(args: &ExportArgs, format: ExportFormat) -> Result<(), Error> {
    let (html, settings) = load(&args.common)?;
    let input = &args.common.input;

    let bytes = match format {
        ExportFormat::Pdf => folio::html_to_pdf(&html, &settings)?,
        ExportFormat::Docx => folio::html_to_docx(&html, &settings, input.parent())?,
    };

    let requested = args.output.clone().unwrap_or_else(|| {
        input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let requested = Path::new(&requested);
    let dir = requested
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = requested
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let path = folio::save(dir, &normalize_filename(&name, format), &bytes)?;
    println!("{}", path.display());
    Ok(())
}

fn paginate(common: &CommonArgs, json: bool) -> Result<(), Error> {
    let (html, settings) = load(common)?;
    let snapshot = DocumentSnapshot::from_html(&html);
    let mut paginator = Paginator::new(PaginationConfig::from_settings(&settings));
    paginator.refresh(&snapshot);
    let set = paginator.decorations();

    if json {
        let out = serde_json::to_string_pretty(set).map_err(Error::Settings)?;
        println!("{out}");
        return Ok(());
    }

    println!("Pages: {}", set.page_count);
    for decoration in &set.decorations {
        match &decoration.kind {
            DecorationKind::Header(w) => println!("{:>6}  header  page {}", decoration.pos, w.page),
            DecorationKind::Footer(w) => println!("{:>6}  footer  page {}", decoration.pos, w.page),
            DecorationKind::Gap { height } => println!("{:>6}  gap     {height}px", decoration.pos),
        }
    }
    Ok(())
}
