use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::ImageFormat;

/// Image returned by the model, checked to be decodable. `bytes` are the
/// model's bytes untouched; the decoded pixels are dropped once the
/// dimensions are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn file_extension(&self) -> &'static str {
        lumen_contracts::history::extension_for_mime(&self.mime_type)
    }
}

/// Decodes `bytes`, trusting the sniffed format over the declared mime type.
pub fn decode_image(bytes: Vec<u8>, declared_mime: Option<&str>) -> Result<DecodedImage> {
    let format = image::guess_format(&bytes).context("unrecognized image data")?;
    let decoded = image::load_from_memory_with_format(&bytes, format)
        .context("image data could not be decoded")?;
    let mime_type = match declared_mime.map(str::trim).filter(|value| !value.is_empty()) {
        Some(declared) if declared.eq_ignore_ascii_case(format.to_mime_type()) => {
            declared.to_ascii_lowercase()
        }
        _ => format.to_mime_type().to_string(),
    };
    Ok(DecodedImage {
        bytes,
        mime_type,
        width: decoded.width(),
        height: decoded.height(),
    })
}

/// A user-supplied PNG or JPEG to send alongside an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    bytes: Vec<u8>,
    mime_type: &'static str,
    width: u32,
    height: u32,
    source: Option<PathBuf>,
}

impl InputImage {
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let mut image = Self::from_bytes(bytes)
            .with_context(|| format!("unsupported image {}", path.display()))?;
        image.source = Some(path.to_path_buf());
        Ok(image)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&bytes).context("unrecognized image data")?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            bail!(
                "only PNG and JPEG uploads are supported (got {})",
                format.to_mime_type()
            );
        }
        let decoded = image::load_from_memory_with_format(&bytes, format)
            .context("image data could not be decoded")?;
        Ok(Self {
            bytes,
            mime_type: format.to_mime_type(),
            width: decoded.width(),
            height: decoded.height(),
            source: None,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}


#[cfg(test)]
mod tests {
    use std::fs;

    use image::ImageFormat;

    use super::test_images::{encoded, png};
    use super::*;

    #[test]
    fn decode_keeps_bytes_and_reads_dimensions() -> Result<()> {
        let bytes = png(12, 7);
        let decoded = decode_image(bytes.clone(), Some("image/png"))?;
        assert_eq!(decoded.bytes, bytes);
        assert_eq!((decoded.width, decoded.height), (12, 7));
        assert_eq!(decoded.mime_type, "image/png");
        assert_eq!(decoded.file_extension(), "png");
        Ok(())
    }

    #[test]
    fn decode_prefers_sniffed_format_over_wrong_mime() -> Result<()> {
        let decoded = decode_image(encoded(4, 4, ImageFormat::Jpeg), Some("image/png"))?;
        assert_eq!(decoded.mime_type, "image/jpeg");
        assert_eq!(decoded.file_extension(), "jpg");
        Ok(())
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_image(b"definitely not an image".to_vec(), None).is_err());
    }

    #[test]
    fn input_image_from_path_accepts_png_and_jpeg() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let png_path = temp.path().join("base.png");
        let jpg_path = temp.path().join("pose.jpeg");
        fs::write(&png_path, png(3, 5))?;
        fs::write(&jpg_path, encoded(8, 8, ImageFormat::Jpeg))?;

        let base = InputImage::from_path(&png_path)?;
        assert_eq!(base.mime_type(), "image/png");
        assert_eq!(base.dimensions(), (3, 5));
        assert_eq!(base.source(), Some(png_path.as_path()));

        let pose = InputImage::from_path(&jpg_path)?;
        assert_eq!(pose.mime_type(), "image/jpeg");
        Ok(())
    }

    #[test]
    fn input_image_rejects_other_formats_and_missing_files() -> Result<()> {
        let bmp = encoded(2, 2, ImageFormat::Bmp);
        let err = InputImage::from_bytes(bmp).unwrap_err();
        assert!(err.to_string().contains("only PNG and JPEG"));

        let temp = tempfile::tempdir()?;
        assert!(InputImage::from_path(&temp.path().join("missing.png")).is_err());
        Ok(())
    }
}
