use serde::{Deserialize, Serialize};

/// Input formats the pipeline recognizes.
///
/// Detection is from magic bytes, never file extensions — extensions can
/// be wrong, the leading bytes are not. BMP and TIFF are accepted by the
/// broader file picker but are not guaranteed through the remote path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    Pdf,
    Jpeg,
    Png,
    Webp,
    Bmp,
    Tiff,
    Unsupported,
}

impl InputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Unsupported => "application/octet-stream",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, Self::Pdf)
    }

    /// Raster image suitable for on-device OCR.
    pub fn is_raster(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png | Self::Webp | Self::Bmp | Self::Tiff)
    }

    /// Formats the remote vision service accepts without re-encoding.
    pub fn remote_safe(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png | Self::Webp)
    }
}

/// Detect the input format from leading magic bytes.
pub fn detect_format(bytes: &[u8]) -> InputFormat {
    match bytes {
        // PDF: %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => InputFormat::Pdf,
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => InputFormat::Jpeg,
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => InputFormat::Png,
        // WEBP: RIFF....WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => InputFormat::Webp,
        // BMP: BM
        [0x42, 0x4D, ..] => InputFormat::Bmp,
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => InputFormat::Tiff,
        _ => InputFormat::Unsupported,
    }
}
