use thiserror::Error;

/// Failure codes surfaced to the host shell.
///
/// The display strings are stable snake_case codes; the host matches on the
/// prefix before the first `:` and shows the rest as detail.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid_transition:{action}@{phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },
    #[error("no_document_open")]
    NoDocument,
    #[error("unsupported_document:{0}")]
    UnsupportedDocument(String),
    #[error("document_parse_failed:{0}")]
    DocumentParse(String),
    #[error("page_out_of_range:{0}")]
    PageOutOfRange(u32),
    #[error("placement_not_found:{0}")]
    PlacementNotFound(String),
    #[error("no_placements")]
    NoPlacements,
    #[error("signature_not_found:{0}")]
    SignatureNotFound(String),
    #[error("no_signature_selected")]
    NoSignatureSelected,
    #[error("signature_fetch_failed:{id}:{reason}")]
    SignatureFetch { id: String, reason: String },
    #[error("signature_image_invalid:{0}")]
    SignatureImage(String),
    #[error("document_not_found:{0}")]
    DocumentNotFound(String),
    #[error("folder_not_found:{0}")]
    FolderNotFound(String),
    #[error("url_expired")]
    UrlExpired,
    #[error("url_unknown:{0}")]
    UrlUnknown(String),
    #[error("render_timeout")]
    RenderTimeout,
    #[error("render_failed:{0}")]
    Render(String),
    #[error("encode_failed:{0}")]
    Encode(String),
    #[error("invalid_viewport:{0}")]
    InvalidViewport(&'static str),
    #[error("invalid_input:{0}")]
    InvalidInput(String),
    #[error("config_invalid:{0}")]
    Config(String),
    #[error("storage_io:{0}")]
    Io(#[from] std::io::Error),
    #[error("metadata_json:{0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SignError>;
