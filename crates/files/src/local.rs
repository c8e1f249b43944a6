//! Local file manager: files on disk, indexed in memory by id.
//!
//! Files are written under `save_dir` on creation and registered so that
//! ids found in prompts and tool payloads can be resolved back to handles.
//! The registry itself is not persisted; it lives as long as the manager.

use async_trait::async_trait;
use chrono::Utc;
use fnagent_config::FilesConfig;
use fnagent_core::error::FileError;
use fnagent_core::file::{File, FileLocation, FileManager, protocol};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_FILE_PURPOSE: &str = "assistants";

/// A file manager backed by the local filesystem.
pub struct LocalFileManager {
    save_dir: PathBuf,
    files: RwLock<HashMap<String, File>>,
    url_base: Option<String>,
}

impl LocalFileManager {
    /// Create a manager writing new files under `save_dir`.
    ///
    /// The directory is created on first write.
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            files: RwLock::new(HashMap::new()),
            url_base: None,
        }
    }

    /// Create the manager described by the `[files]` config section.
    pub fn from_config(config: &FilesConfig) -> Self {
        Self::new(config.resolved_save_dir())
    }

    /// Serve local files at `{url_base}/{file_id}` when a URL is requested.
    pub fn with_url_base(mut self, url_base: impl Into<String>) -> Self {
        self.url_base = Some(url_base.into().trim_end_matches('/').to_string());
        self
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Write `contents` to a new file under the save directory and register it.
    pub async fn create_file_from_bytes(
        &self,
        contents: impl AsRef<[u8]>,
        filename: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<File, FileError> {
        tokio::fs::create_dir_all(&self.save_dir)
            .await
            .map_err(|e| FileError::Io(format!("{}: {e}", self.save_dir.display())))?;

        let path = self.unique_path(filename);
        let contents = contents.as_ref();
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| FileError::Io(format!("{}: {e}", path.display())))?;

        let file = File {
            id: protocol::create_local_file_id(),
            filename: filename.to_string(),
            byte_size: contents.len() as u64,
            created_at: Utc::now(),
            purpose: DEFAULT_FILE_PURPOSE.into(),
            metadata,
            location: FileLocation::Local { path },
        };
        self.register_file(file.clone(), false).await?;
        Ok(file)
    }

    /// Register an existing file on disk without copying it.
    pub async fn create_file_from_path(
        &self,
        path: impl AsRef<Path>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<File, FileError> {
        let path = path.as_ref();
        let stat = tokio::fs::metadata(path)
            .await
            .map_err(|e| FileError::Io(format!("{}: {e}", path.display())))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file = File {
            id: protocol::create_local_file_id(),
            filename,
            byte_size: stat.len(),
            created_at: Utc::now(),
            purpose: DEFAULT_FILE_PURPOSE.into(),
            metadata,
            location: FileLocation::Local { path: path.to_path_buf() },
        };
        self.register_file(file.clone(), false).await?;
        Ok(file)
    }

    /// Add a file to the registry.
    pub async fn register_file(&self, file: File, allow_overwrite: bool) -> Result<(), FileError> {
        let mut files = self.files.write().await;
        if !allow_overwrite && files.contains_key(&file.id) {
            return Err(FileError::AlreadyRegistered(file.id));
        }
        debug!(file_id = %file.id, filename = %file.filename, "Registered file");
        files.insert(file.id.clone(), file);
        Ok(())
    }

    /// Remove a file from the registry. The file on disk is left alone.
    pub async fn unregister_file(&self, file_id: &str) -> Result<File, FileError> {
        self.files
            .write()
            .await
            .remove(file_id)
            .ok_or_else(|| FileError::NotFound(file_id.to_string()))
    }

    pub async fn list_files(&self) -> Vec<File> {
        let mut files: Vec<File> = self.files.read().await.values().cloned().collect();
        files.sort_by_key(|f| f.created_at);
        files
    }

    /// Read a local file's contents.
    pub async fn read_contents(&self, file: &File) -> Result<Vec<u8>, FileError> {
        match &file.location {
            FileLocation::Local { path } => tokio::fs::read(path)
                .await
                .map_err(|e| FileError::Io(format!("{}: {e}", path.display()))),
            FileLocation::Remote { .. } => Err(FileError::Io(format!(
                "contents of remote file {} are not available locally",
                file.id
            ))),
        }
    }

    fn unique_path(&self, filename: &str) -> PathBuf {
        let name = Path::new(filename);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".into());
        let unique = match name.extension() {
            Some(ext) => format!("{stem}-{}.{}", Uuid::new_v4(), ext.to_string_lossy()),
            None => format!("{stem}-{}", Uuid::new_v4()),
        };
        self.save_dir.join(unique)
    }
}

#[async_trait]
impl FileManager for LocalFileManager {
    async fn look_up_file_by_id(&self, file_id: &str) -> Result<File, FileError> {
        self.files
            .read()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| FileError::NotFound(file_id.to_string()))
    }

    async fn file_url(&self, file: &File) -> Result<String, FileError> {
        match &file.location {
            FileLocation::Remote { url: Some(url) } => Ok(url.clone()),
            FileLocation::Remote { url: None } => Err(FileError::Io(format!(
                "remote file {} has no URL",
                file.id
            ))),
            FileLocation::Local { path } => Ok(match &self.url_base {
                Some(base) => format!("{base}/{}", file.id),
                None => format!("file://{}", path.display()),
            }),
        }
    }
}
