use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::Engine;
use image::{ImageFormat, ImageReader};
use percent_encoding::percent_decode_str;

use crate::error::Error;

/// Source of image bytes for `<img src=...>`.
///
/// Fetches happen one at a time in document order. A failed fetch never aborts
/// the export; the renderer substitutes a placeholder.
pub trait ImageFetcher {
    fn fetch(&self, src: &str) -> Result<Vec<u8>, Error>;
}

impl<F> ImageFetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>, Error>,
{
    fn fetch(&self, src: &str) -> Result<Vec<u8>, Error> {
        self(src)
    }
}

/// Resolves data URIs, `http(s)` URLs and filesystem paths.
#[derive(Clone, Debug)]
pub struct DefaultFetcher {
    /// Directory that relative paths are resolved against.
    pub base_dir: Option<PathBuf>,
    pub allow_remote: bool,
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self {
            base_dir: None,
            allow_remote: true,
        }
    }
}

impl DefaultFetcher {
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    fn resolve_path(&self, src: &str) -> PathBuf {
        let raw = src.strip_prefix("file://").unwrap_or(src);
        let decoded = percent_decode_str(raw).decode_utf8_lossy();
        let path = Path::new(decoded.as_ref());
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ImageFetcher for DefaultFetcher {
    fn fetch(&self, src: &str) -> Result<Vec<u8>, Error> {
        if src.starts_with("data:") {
            return decode_data_uri(src);
        }

        if src.starts_with("http://") || src.starts_with("https://") {
            if !self.allow_remote {
                return Err(Error::image_fetch(src, "remote images are disabled"));
            }
            let mut response = ureq::get(src)
                .call()
                .map_err(|e| Error::image_fetch(src, e))?;
            return response
                .body_mut()
                .read_to_vec()
                .map_err(|e| Error::image_fetch(src, e));
        }

        let path = self.resolve_path(src);
        std::fs::read(&path).map_err(|e| Error::image_fetch(src, format!("{}: {e}", path.display())))
    }
}

/// Decode the payload of a `data:` URI, base64 or percent-encoded.
pub fn decode_data_uri(src: &str) -> Result<Vec<u8>, Error> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| Error::image_fetch(src, "not a data URI"))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| Error::image_fetch(src, "data URI has no payload"))?;

    if header
        .split(';')
        .skip(1)
        .any(|p| p.trim().eq_ignore_ascii_case("base64"))
    {
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let decoded = percent_decode_str(&compact).decode_utf8_lossy();
        base64::engine::general_purpose::STANDARD
            .decode(decoded.as_bytes())
            .map_err(|e| Error::image_fetch(src, e))
    } else {
        Ok(percent_decode_str(data).collect())
    }
}

/// Image bytes ready to be stored in the package.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub content_type: &'static str,
}

/// Check that the bytes decode as an image and convert anything Word cannot
/// show natively to PNG.
pub fn prepare_image(src: &str, bytes: Vec<u8>) -> Result<EmbeddedImage, Error> {
    let reader = ImageReader::new(Cursor::new(bytes.as_slice()))
        .with_guessed_format()
        .map_err(|e| Error::image_fetch(src, e))?;
    let Some(format) = reader.format() else {
        return Err(Error::image_fetch(src, "unrecognized image format"));
    };

    let (extension, content_type) = match format {
        ImageFormat::Png => ("png", "image/png"),
        ImageFormat::Jpeg => ("jpeg", "image/jpeg"),
        ImageFormat::Gif => ("gif", "image/gif"),
        other => {
            let decoded = reader.decode().map_err(|e| Error::image_fetch(src, e))?;
            let mut png = Vec::new();
            decoded
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| Error::image_fetch(src, e))?;
            log::debug!("re-encoded {other:?} image as PNG ({} bytes)", png.len());
            return Ok(EmbeddedImage {
                bytes: png,
                extension: "png",
                content_type: "image/png",
            });
        }
    };

    let (w, h) = reader
        .into_dimensions()
        .map_err(|e| Error::image_fetch(src, e))?;
    if w == 0 || h == 0 {
        return Err(Error::image_fetch(src, "image has no pixels"));
    }
    Ok(EmbeddedImage {
        bytes,
        extension,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_and_percent_payloads() {
        assert_eq!(decode_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert_eq!(decode_data_uri("data:text/plain,a%20b").unwrap(), b"a b");
        assert!(decode_data_uri("data:image/png;base64").is_err());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = prepare_image("x.png", b"not an image".to_vec()).unwrap_err();
        assert!(matches!(err, Error::ImageFetch { .. }));
    }

    #[test]
    fn closures_are_fetchers() {
        let fetcher = |src: &str| -> Result<Vec<u8>, Error> { Ok(src.as_bytes().to_vec()) };
        assert_eq!(fetcher.fetch("abc").unwrap(), b"abc");
    }
}
