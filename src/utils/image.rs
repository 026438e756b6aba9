//! Reading a user-selected image into the base64 payload vision models take.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;

use crate::core::config::data::path_display;
use crate::core::constants::MAX_FILE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Webp => "image/webp",
        }
    }

    /// Sniff the format from the file's leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageKind::Png)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Failed to read file {}: {}", path_display(.path), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported file type. Please upload a JPG, PNG, or WebP image.")]
    Unsupported,
    #[error("File is too large (max 10 MB).")]
    TooLarge { size: u64 },
}

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub kind: ImageKind,
    pub base64: String,
}

/// Check size and format before anything is sent to the model.
pub fn validate_image(bytes: &[u8]) -> Result<ImageKind, ImageError> {
    let size = bytes.len() as u64;
    if size > MAX_FILE_SIZE {
        return Err(ImageError::TooLarge { size });
    }
    ImageKind::detect(bytes).ok_or(ImageError::Unsupported)
}

pub fn encode_image(bytes: &[u8]) -> Result<EncodedImage, ImageError> {
    let kind = validate_image(bytes)?;
    Ok(EncodedImage {
        kind,
        base64: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}

pub fn load_image(path: &Path) -> Result<EncodedImage, ImageError> {
    let read_error = |source| ImageError::Read {
        path: path.to_path_buf(),
        source,
    };

    let size = fs::metadata(path).map_err(read_error)?.len();
    if size > MAX_FILE_SIZE {
        return Err(ImageError::TooLarge { size });
    }
    let bytes = fs::read(path).map_err(read_error)?;
    encode_image(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn detects_supported_formats() {
        assert_eq!(ImageKind::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::detect(PNG_HEADER), Some(ImageKind::Png));
        assert_eq!(
            ImageKind::detect(b"RIFF\x24\0\0\0WEBPVP8 "),
            Some(ImageKind::Webp)
        );
        assert_eq!(ImageKind::detect(b"GIF89a"), None);
        assert_eq!(ImageKind::detect(b"RIFF"), None);
    }

    #[test]
    fn encode_image_produces_plain_base64() {
        let encoded = encode_image(PNG_HEADER).expect("png");
        assert_eq!(encoded.kind.mime_type(), "image/png");
        assert!(!encoded.base64.starts_with("data:"));
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&encoded.base64)
            .expect("decode");
        assert_eq!(decoded, PNG_HEADER);
    }

    #[test]
    fn rejects_unsupported_and_oversized() {
        assert!(matches!(
            encode_image(b"%PDF-1.7"),
            Err(ImageError::Unsupported)
        ));

        let mut big = vec![0xFF, 0xD8, 0xFF];
        big.resize(MAX_FILE_SIZE as usize + 1, 0);
        let err = validate_image(&big).expect_err("too large");
        assert_eq!(err.to_string(), "File is too large (max 10 MB).");
    }

    #[test]
    fn load_image_reads_from_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("scan.png");
        std::fs::write(&path, PNG_HEADER).expect("write");

        let encoded = load_image(&path).expect("load");
        assert_eq!(encoded.kind, ImageKind::Png);

        let missing = load_image(&temp_dir.path().join("missing.png"));
        assert!(matches!(missing, Err(ImageError::Read { .. })));
    }
}
