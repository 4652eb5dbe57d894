use crate::html::{Element, Node};
use crate::model::Run;

/// Formatting inherited from ancestors. Flags only ever turn on while descending,
/// so an outer `<strong>` makes every run beneath it bold.
#[derive(Clone, Copy, Debug, Default)]
struct InheritedStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    highlight: bool,
    size: Option<f32>,
}

impl InheritedStyle {
    fn enter(mut self, el: &Element) -> Self {
        match el.tag.as_str() {
            "strong" | "b" => self.bold = true,
            "em" | "i" => self.italic = true,
            "u" | "ins" => self.underline = true,
            "mark" => self.highlight = true,
            _ => {}
        }
        if el.style_property("font-weight").is_some_and(is_bold_weight) {
            self.bold = true;
        }
        if el
            .style_property("font-style")
            .is_some_and(|v| v.eq_ignore_ascii_case("italic"))
        {
            self.italic = true;
        }
        if el
            .style_property("text-decoration")
            .is_some_and(|v| v.to_ascii_lowercase().contains("underline"))
        {
            self.underline = true;
        }
        if let Some(size) = el.style_property("font-size").and_then(parse_font_size) {
            self.size = Some(size);
        }
        self
    }

    fn run(&self, text: &str) -> Run {
        Run {
            text: text.to_string(),
            bold: self.bold,
            italic: self.italic,
            underline: self.underline,
            highlight: self.highlight,
            size: self.size,
        }
    }
}

fn is_bold_weight(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("bold")
        || value.eq_ignore_ascii_case("bolder")
        || value.parse::<u32>().is_ok_and(|w| w >= 600)
}

/// Parse a CSS font size into points. Only absolute `pt` and `px` lengths are
/// understood; relative sizes fall back to the default.
pub fn parse_font_size(value: &str) -> Option<f32> {
    let value = value.trim().to_ascii_lowercase();
    let (number, scale) = if let Some(n) = value.strip_suffix("pt") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix("px") {
        (n, 0.75)
    } else {
        return None;
    };
    let size = number.trim().parse::<f32>().ok()? * scale;
    (size.is_finite() && size > 0.0).then_some(size)
}

/// Flatten the inline content of `el` into runs, one per text-bearing leaf.
/// Source whitespace (newlines, tabs, repeated spaces) collapses to one space
/// as a browser would show it; non-breaking spaces are kept. Empty text nodes
/// never produce a run, and each `<br>` becomes a [`Run::line_break`].
pub fn collect_runs(el: &Element) -> Vec<Run> {
    let mut runs = Vec::new();
    walk(el, InheritedStyle::default().enter(el), &mut runs);
    runs
}

fn walk(el: &Element, style: InheritedStyle, runs: &mut Vec<Run>) {
    for child in &el.children {
        match child {
            Node::Text(text) => {
                let text = collapse_whitespace(text);
                if !text.is_empty() {
                    runs.push(style.run(&text));
                }
            }
            Node::Element(child) => {
                match child.tag.as_str() {
                    "script" | "style" | "template" => continue,
                    "br" => {
                        runs.push(Run::line_break());
                        continue;
                    }
                    _ => {}
                }
                walk(child, style.enter(child), runs);
            }
        }
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_fragment;

    fn runs_of(html: &str) -> Vec<Run> {
        let fragment = parse_fragment(html);
        collect_runs(fragment.elements().next().expect("one element"))
    }

    #[test]
    fn bold_is_or_ed_outward() {
        let runs = runs_of("<p><strong>a<em>b</em></strong>c</p>");
        let flags: Vec<(&str, bool, bool)> = runs
            .iter()
            .map(|r| (r.text.as_str(), r.bold, r.italic))
            .collect();
        assert_eq!(flags, [("a", true, false), ("b", true, true), ("c", false, false)]);
    }

    #[test]
    fn font_size_in_points_and_pixels() {
        let runs = runs_of(r#"<p><span style="font-size: 14pt">a</span><span style="font-size:16px">b</span>c</p>"#);
        assert_eq!(runs[0].size, Some(14.0));
        assert_eq!(runs[0].half_points(), 28);
        assert_eq!(runs[1].size, Some(12.0));
        assert_eq!(runs[2].half_points(), 24);
    }

    #[test]
    fn css_weight_and_decoration() {
        let runs = runs_of(
            r#"<p><span style="font-weight: 700">a</span><span style="text-decoration: underline">b</span><mark>c</mark></p>"#,
        );
        assert!(runs[0].bold);
        assert!(runs[1].underline);
        assert!(runs[2].highlight);
    }

    #[test]
    fn source_whitespace_collapses() {
        let runs = runs_of("<p>one\n    two\t\tthree\u{a0}\u{a0}four</p>");
        assert_eq!(runs[0].text, "one two three\u{a0}\u{a0}four");
        assert_eq!(collapse_whitespace(" \r\n "), " ");
    }

    #[test]
    fn br_becomes_a_line_break_run() {
        let runs = runs_of("<p>one<br>two<br/><b>three</b></p>");
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["one", "\n", "two", "\n", "three"]);
        assert!(runs[1].is_line_break());
        assert!(!runs[1].bold);
    }

    #[test]
    fn relative_sizes_are_ignored() {
        assert_eq!(parse_font_size("1.2em"), None);
        assert_eq!(parse_font_size("-3pt"), None);
        assert_eq!(parse_font_size(" 10.5PT "), Some(10.5));
    }
}
