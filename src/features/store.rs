use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub id: String,
    pub name: String,
    pub title: Option<String>,
    /// Stable storage key; `image_url` is a short-lived view of it.
    pub image_key: String,
    pub image_url: String,
    pub is_default: bool,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureUpload {
    pub name: String,
    pub title: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub id: String,
    pub name: String,
    pub file_key: String,
    pub file_url: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub folder_id: Option<String>,
}

/// Replacement metadata written alongside new document bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub file_name: String,
    pub file_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessUrl {
    pub url: String,
    pub expires_at_ms: u64,
}

/// Remote side of the workspace: metadata records plus binary objects reached
/// through time-limited URLs.
///
/// `replace_document_content` keeps the document id and makes the previous
/// bytes unreachable once it returns.
pub trait DocumentStore: Send + Sync {
    fn list_signatures(&self) -> Result<Vec<Signature>>;
    fn upload_signature(&self, bytes: &[u8], meta: SignatureUpload) -> Result<Signature>;
    fn update_signature(&self, id: &str, name: &str, title: Option<&str>) -> Result<Signature>;
    fn delete_signature(&self, id: &str) -> Result<()>;
    /// Clears the current default, then marks `id`.
    fn set_default_signature(&self, id: &str) -> Result<()>;

    fn upload_document(
        &self,
        bytes: &[u8],
        file_name: &str,
        folder_id: Option<&str>,
    ) -> Result<ReportDocument>;
    fn get_document(&self, id: &str) -> Result<ReportDocument>;
    fn list_documents(&self, folder_id: Option<&str>) -> Result<Vec<ReportDocument>>;
    fn replace_document_content(
        &self,
        id: &str,
        bytes: &[u8],
        meta: DocumentContent,
    ) -> Result<ReportDocument>;
    fn delete_document(&self, id: &str) -> Result<()>;

    fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Folder>;
    fn list_folders(&self) -> Result<Vec<Folder>>;
    /// Removes the folder, every descendant folder, and their documents.
    fn delete_folder(&self, id: &str) -> Result<()>;

    fn resolve_url(&self, key: &str) -> Result<AccessUrl>;
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
