use crate::error::{Result, SignError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterFormat {
    Png,
    Jpeg,
    Webp,
}

/// What the compositor and renderer need to know about a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Raster(RasterFormat),
    Paged,
}

impl DocumentKind {
    /// Sniffs the content, ignoring whatever the file name claims.
    pub fn detect(bytes: &[u8]) -> Result<Self> {
        let kind = infer::get(bytes)
            .ok_or_else(|| SignError::UnsupportedDocument("unknown".into()))?;
        match kind.mime_type() {
            "application/pdf" => Ok(DocumentKind::Paged),
            "image/png" => Ok(DocumentKind::Raster(RasterFormat::Png)),
            "image/jpeg" => Ok(DocumentKind::Raster(RasterFormat::Jpeg)),
            "image/webp" => Ok(DocumentKind::Raster(RasterFormat::Webp)),
            other => Err(SignError::UnsupportedDocument(other.to_string())),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentKind::Paged => "application/pdf",
            DocumentKind::Raster(RasterFormat::Png) => "image/png",
            DocumentKind::Raster(RasterFormat::Jpeg) => "image/jpeg",
            DocumentKind::Raster(RasterFormat::Webp) => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Paged => "pdf",
            DocumentKind::Raster(RasterFormat::Png) => "png",
            DocumentKind::Raster(RasterFormat::Jpeg) => "jpg",
            DocumentKind::Raster(RasterFormat::Webp) => "webp",
        }
    }
}

/// `report.pdf` -> `report_signed.pdf`, with the extension of the output kind.
pub fn signed_file_name(original: &str, kind: DocumentKind) -> String {
    let stem = std::path::Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    let stem = stem.strip_suffix("_signed").unwrap_or(stem);
    format!("{stem}_signed.{}", kind.extension())
}
