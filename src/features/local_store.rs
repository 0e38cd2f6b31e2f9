use crate::error::{Result, SignError};
use crate::features::store::{
    AccessUrl, DocumentContent, DocumentStore, Folder, ReportDocument, Signature, SignatureUpload,
};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const URL_SCHEME: &str = "local://";

const SIGNATURES: &str = "signatures";
const DOCUMENTS: &str = "documents";
const FOLDERS: &str = "folders";

struct IssuedUrl {
    key: String,
    expires_at_ms: u64,
}

/// Directory-backed store.
///
/// ```text
/// <root>/objects/<key>           binary content
/// <root>/meta/<kind>/<id>.json   records
/// ```
/// Access URLs are opaque tokens held in memory and expire after `ttl`.
pub struct LocalStore {
    root: PathBuf,
    ttl: Duration,
    urls: Mutex<HashMap<String, IssuedUrl>>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| now_ms().to_string())
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".into())
}

fn sniffed_mime(bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|k| k.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".into())
}

impl LocalStore {
    pub fn open(root: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("objects"))?;
        for kind in [SIGNATURES, DOCUMENTS, FOLDERS] {
            fs::create_dir_all(root.join("meta").join(kind))?;
        }
        debug!("local store at {}", root.display());
        Ok(Self {
            root,
            ttl,
            urls: Mutex::new(HashMap::new()),
        })
    }

    fn urls(&self) -> MutexGuard<'_, HashMap<String, IssuedUrl>> {
        self.urls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        let safe = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(SignError::InvalidInput(format!("storage_key:{key}")));
        }
        Ok(self.root.join("objects").join(rel))
    }

    fn meta_path(&self, kind: &str, id: &str) -> Result<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SignError::InvalidInput(format!("record_id:{id}")));
        }
        Ok(self.root.join("meta").join(kind).join(format!("{id}.json")))
    }

    fn write_atomically(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| SignError::InvalidInput(path.display().to_string()))?;
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(path).map_err(|e| SignError::Io(e.error))?;
        Ok(())
    }

    fn write_record<T: Serialize>(&self, kind: &str, id: &str, record: &T) -> Result<()> {
        let path = self.meta_path(kind, id)?;
        let content = serde_json::to_vec_pretty(record)?;
        self.write_atomically(&path, &content)
    }

    fn read_record<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<Option<T>> {
        let path = self.meta_path(kind, id)?;
        match fs::read(&path) {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_records<T: DeserializeOwned>(&self, kind: &str) -> Result<Vec<T>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(self.root.join("meta").join(kind))? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                let raw = fs::read(&path)?;
                // Ignore malformed files
                if let Ok(record) = serde_json::from_slice::<T>(&raw) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    fn remove_record(&self, kind: &str, id: &str) -> Result<()> {
        match fs::remove_file(self.meta_path(kind, id)?) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn write_object(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;
        self.write_atomically(&path, bytes)
    }

    fn remove_object(&self, key: &str) -> Result<()> {
        self.revoke(key);
        match fs::remove_file(self.object_path(key)?) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Invalidates every outstanding URL for `key`.
    fn revoke(&self, key: &str) {
        self.urls().retain(|_, issued| issued.key != key);
    }

    fn signature_record(&self, id: &str) -> Result<Signature> {
        self.read_record(SIGNATURES, id)?
            .ok_or_else(|| SignError::SignatureNotFound(id.to_string()))
    }

    fn document_record(&self, id: &str) -> Result<ReportDocument> {
        self.read_record(DOCUMENTS, id)?
            .ok_or_else(|| SignError::DocumentNotFound(id.to_string()))
    }

    fn folder_exists(&self, id: &str) -> Result<bool> {
        Ok(self.read_record::<Folder>(FOLDERS, id)?.is_some())
    }

    fn with_signature_url(&self, mut signature: Signature) -> Result<Signature> {
        signature.image_url = self.resolve_url(&signature.image_key)?.url;
        Ok(signature)
    }

    fn with_document_url(&self, mut document: ReportDocument) -> Result<ReportDocument> {
        document.file_url = self.resolve_url(&document.file_key)?.url;
        Ok(document)
    }

    fn remove_document_record(&self, document: &ReportDocument) -> Result<()> {
        self.remove_record(DOCUMENTS, &document.id)?;
        self.remove_object(&document.file_key)
    }
}

impl DocumentStore for LocalStore {
    fn list_signatures(&self) -> Result<Vec<Signature>> {
        let mut signatures: Vec<Signature> = self.list_records(SIGNATURES)?;
        // Newest first
        signatures.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        signatures
            .into_iter()
            .map(|s| self.with_signature_url(s))
            .collect()
    }

    fn upload_signature(&self, bytes: &[u8], meta: SignatureUpload) -> Result<Signature> {
        let name = meta.name.trim();
        if name.is_empty() {
            return Err(SignError::InvalidInput("signature_name".into()));
        }
        image::load_from_memory(bytes).map_err(|e| SignError::SignatureImage(e.to_string()))?;
        let ext = infer::get(bytes).map(|k| k.extension()).unwrap_or("png");

        let id = uuid::Uuid::new_v4().to_string();
        let key = format!("{SIGNATURES}/{id}.{ext}");
        self.write_object(&key, bytes)?;
        let signature = Signature {
            id: id.clone(),
            name: name.to_string(),
            title: meta.title.filter(|t| !t.trim().is_empty()),
            image_key: key,
            image_url: String::new(),
            is_default: false,
            created_by: meta.created_by,
            created_at: timestamp(),
        };
        self.write_record(SIGNATURES, &id, &signature)?;
        info!("signature {id} uploaded ({} bytes)", bytes.len());
        self.with_signature_url(signature)
    }

    fn update_signature(&self, id: &str, name: &str, title: Option<&str>) -> Result<Signature> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SignError::InvalidInput("signature_name".into()));
        }
        let mut signature = self.signature_record(id)?;
        signature.name = name.to_string();
        signature.title = title.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string);
        self.write_record(SIGNATURES, id, &signature)?;
        self.with_signature_url(signature)
    }

    fn delete_signature(&self, id: &str) -> Result<()> {
        let signature = self.signature_record(id)?;
        self.remove_record(SIGNATURES, id)?;
        self.remove_object(&signature.image_key)?;
        info!("signature {id} deleted");
        Ok(())
    }

    fn set_default_signature(&self, id: &str) -> Result<()> {
        let mut target = self.signature_record(id)?;
        for mut other in self.list_records::<Signature>(SIGNATURES)? {
            if other.is_default && other.id != id {
                other.is_default = false;
                self.write_record(SIGNATURES, &other.id, &other)?;
            }
        }
        target.is_default = true;
        self.write_record(SIGNATURES, id, &target)
    }

    fn upload_document(
        &self,
        bytes: &[u8],
        file_name: &str,
        folder_id: Option<&str>,
    ) -> Result<ReportDocument> {
        if let Some(folder) = folder_id {
            if !self.folder_exists(folder)? {
                return Err(SignError::FolderNotFound(folder.to_string()));
            }
        }
        let id = uuid::Uuid::new_v4().to_string();
        let key = format!("{DOCUMENTS}/{id}.{}", extension_of(file_name));
        self.write_object(&key, bytes)?;
        let name = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_string();
        let document = ReportDocument {
            id: id.clone(),
            name,
            file_key: key,
            file_url: String::new(),
            file_name: file_name.to_string(),
            file_size: bytes.len() as u64,
            file_type: sniffed_mime(bytes),
            folder_id: folder_id.map(str::to_string),
        };
        self.write_record(DOCUMENTS, &id, &document)?;
        info!("document {id} uploaded as {file_name}");
        self.with_document_url(document)
    }

    fn get_document(&self, id: &str) -> Result<ReportDocument> {
        let document = self.document_record(id)?;
        self.with_document_url(document)
    }

    fn list_documents(&self, folder_id: Option<&str>) -> Result<Vec<ReportDocument>> {
        let mut documents: Vec<ReportDocument> = self
            .list_records::<ReportDocument>(DOCUMENTS)?
            .into_iter()
            .filter(|d| d.folder_id.as_deref() == folder_id)
            .collect();
        documents.sort_by(|a, b| a.name.cmp(&b.name));
        documents
            .into_iter()
            .map(|d| self.with_document_url(d))
            .collect()
    }

    fn replace_document_content(
        &self,
        id: &str,
        bytes: &[u8],
        meta: DocumentContent,
    ) -> Result<ReportDocument> {
        let mut document = self.document_record(id)?;
        let new_key = format!(
            "{DOCUMENTS}/{}.{}",
            uuid::Uuid::new_v4(),
            extension_of(&meta.file_name)
        );
        self.write_object(&new_key, bytes)?;

        let old_key = std::mem::replace(&mut document.file_key, new_key);
        document.file_name = meta.file_name;
        document.file_type = meta.file_type;
        document.file_size = bytes.len() as u64;
        self.write_record(DOCUMENTS, id, &document)?;
        self.remove_object(&old_key)?;
        info!("document {id} content replaced ({} bytes)", bytes.len());
        self.with_document_url(document)
    }

    fn delete_document(&self, id: &str) -> Result<()> {
        let document = self.document_record(id)?;
        self.remove_document_record(&document)
    }

    fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SignError::InvalidInput("folder_name".into()));
        }
        if let Some(parent) = parent_id {
            if !self.folder_exists(parent)? {
                return Err(SignError::FolderNotFound(parent.to_string()));
            }
        }
        let folder = Folder {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
        };
        self.write_record(FOLDERS, &folder.id, &folder)?;
        Ok(folder)
    }

    fn list_folders(&self) -> Result<Vec<Folder>> {
        let mut folders: Vec<Folder> = self.list_records(FOLDERS)?;
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    fn delete_folder(&self, id: &str) -> Result<()> {
        if !self.folder_exists(id)? {
            return Err(SignError::FolderNotFound(id.to_string()));
        }
        let folders: Vec<Folder> = self.list_records(FOLDERS)?;
        let mut doomed: HashSet<String> = HashSet::from([id.to_string()]);
        loop {
            let before = doomed.len();
            for folder in &folders {
                if folder
                    .parent_id
                    .as_ref()
                    .map_or(false, |parent| doomed.contains(parent))
                {
                    doomed.insert(folder.id.clone());
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        for document in self.list_records::<ReportDocument>(DOCUMENTS)? {
            if document
                .folder_id
                .as_ref()
                .map_or(false, |folder| doomed.contains(folder))
            {
                self.remove_document_record(&document)?;
            }
        }
        for folder in &doomed {
            self.remove_record(FOLDERS, folder)?;
        }
        info!("folder {id} deleted with {} folder(s)", doomed.len());
        Ok(())
    }

    fn resolve_url(&self, key: &str) -> Result<AccessUrl> {
        if !self.object_path(key)?.is_file() {
            return Err(SignError::UrlUnknown(key.to_string()));
        }
        let token = uuid::Uuid::new_v4().simple().to_string();
        let now = now_ms();
        let expires_at_ms = now + self.ttl.as_millis() as u64;
        let mut urls = self.urls();
        // Expired tokens only ever answer url_expired; forget them here.
        urls.retain(|_, issued| issued.expires_at_ms > now);
        urls.insert(
            token.clone(),
            IssuedUrl {
                key: key.to_string(),
                expires_at_ms,
            },
        );
        Ok(AccessUrl {
            url: format!("{URL_SCHEME}{token}"),
            expires_at_ms,
        })
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let token = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| SignError::UrlUnknown(url.to_string()))?;
        let key = {
            let mut urls = self.urls();
            let issued = urls
                .get(token)
                .ok_or_else(|| SignError::UrlUnknown(url.to_string()))?;
            if now_ms() >= issued.expires_at_ms {
                urls.remove(token);
                return Err(SignError::UrlExpired);
            }
            issued.key.clone()
        };
        fs::read(self.object_path(&key)?).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SignError::UrlUnknown(url.to_string()),
            _ => e.into(),
        })
    }
}
