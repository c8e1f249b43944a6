//! File domain types, the file-id protocol, and the FileManager trait.
//!
//! Files are never passed to the model as bytes. They are referred to by
//! identifiers embedded in text (`<file>file-local-…</file>`) and in tool
//! arguments/results, and the agent threads those identifiers through the
//! loop so each step knows which files it consumed and produced.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use crate::error::FileError;

/// Where a file's contents live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileLocation {
    /// Stored on the local filesystem.
    Local { path: PathBuf },
    /// Stored by a remote file service.
    Remote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

/// A file handle known to a [`FileManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub filename: String,
    pub byte_size: u64,
    pub created_at: DateTime<Utc>,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(flatten)]
    pub location: FileLocation,
}

impl File {
    /// The textual representation embedded into prompts.
    pub fn repr(&self) -> String {
        format!("<file>{}</file>", self.id)
    }

    /// The textual representation with a retrievable URL attached.
    pub fn repr_with_url(&self, url: &str) -> String {
        format!("{}<url>{}</url>", self.repr(), url)
    }

    pub fn is_local(&self) -> bool {
        matches!(self.location, FileLocation::Local { .. })
    }
}

/// The file-id protocol.
///
/// Local ids are `file-local-` followed by a lowercase UUID v4; remote ids
/// are `file-` followed by 15 digits.
pub mod protocol {
    use regex_lite::Regex;
    use std::ops::Range;
    use std::sync::LazyLock;

    pub const LOCAL_FILE_ID_PREFIX: &str = "file-local-";

    static FILE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"\bfile-(?:local-[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|[0-9]{15})\b",
        )
        .expect("file id pattern is valid")
    });

    /// Generate a fresh local file id.
    pub fn create_local_file_id() -> String {
        format!("{LOCAL_FILE_ID_PREFIX}{}", uuid::Uuid::new_v4())
    }

    /// Whether `s` is exactly one file id.
    pub fn is_file_id(s: &str) -> bool {
        FILE_ID_RE
            .find(s)
            .is_some_and(|m| m.start() == 0 && m.end() == s.len())
    }

    pub fn is_local_file_id(s: &str) -> bool {
        is_file_id(s) && s.starts_with(LOCAL_FILE_ID_PREFIX)
    }

    /// Byte ranges of every file id occurrence in `text`, left to right.
    /// Repeated ids yield one range per occurrence.
    pub fn find_file_ids(text: &str) -> Vec<Range<usize>> {
        FILE_ID_RE.find_iter(text).map(|m| m.range()).collect()
    }

    /// Every file id occurrence in `text`, left to right.
    pub fn extract_file_ids(text: &str) -> Vec<&str> {
        FILE_ID_RE.find_iter(text).map(|m| m.as_str()).collect()
    }
}

/// Collect string values in `value` that are exactly a file id, depth first,
/// without duplicates.
pub fn collect_file_ids(value: &serde_json::Value) -> Vec<String> {
    fn walk(value: &serde_json::Value, ids: &mut Vec<String>) {
        match value {
            serde_json::Value::String(s) => {
                if protocol::is_file_id(s) && !ids.iter().any(|id| id == s) {
                    ids.push(s.clone());
                }
            }
            serde_json::Value::Array(items) => items.iter().for_each(|v| walk(v, ids)),
            serde_json::Value::Object(map) => map.values().for_each(|v| walk(v, ids)),
            _ => {}
        }
    }

    let mut ids = Vec::new();
    walk(value, &mut ids);
    ids
}

/// The FileManager trait: renders, resolves and sniffs files.
///
/// Implementors provide lookup and URL resolution; the representation and
/// sniffing operations are built on top of those two.
#[async_trait]
pub trait FileManager: Send + Sync {
    /// Resolve a file id to its handle.
    async fn look_up_file_by_id(&self, file_id: &str) -> Result<File, FileError>;

    /// A URL from which the file can be fetched out-of-band.
    async fn file_url(&self, file: &File) -> Result<String, FileError>;

    /// Render a file for inclusion in a prompt.
    async fn create_file_repr(&self, file: &File, include_url: bool) -> Result<String, FileError> {
        if include_url {
            let url = self.file_url(file).await?;
            Ok(file.repr_with_url(&url))
        } else {
            Ok(file.repr())
        }
    }

    async fn create_file_reprs(
        &self,
        files: &[File],
        include_urls: bool,
    ) -> Result<Vec<String>, FileError> {
        let mut reprs = Vec::with_capacity(files.len());
        for file in files {
            reprs.push(self.create_file_repr(file, include_urls).await?);
        }
        Ok(reprs)
    }

    /// Resolve every file id mentioned in free text.
    async fn sniff_and_extract_files_from_text(&self, text: &str) -> Result<Vec<File>, FileError> {
        let mut files: Vec<File> = Vec::new();
        for file_id in protocol::extract_file_ids(text) {
            if files.iter().any(|f| f.id == file_id) {
                continue;
            }
            files.push(self.look_up_file_by_id(file_id).await?);
        }
        Ok(files)
    }

    /// Resolve every file id held as a string value inside a JSON value.
    async fn sniff_and_extract_files_from_obj(
        &self,
        value: &serde_json::Value,
    ) -> Result<Vec<File>, FileError> {
        let mut files = Vec::new();
        for file_id in collect_file_ids(value) {
            files.push(self.look_up_file_by_id(&file_id).await?);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_file(id: &str) -> File {
        File {
            id: id.into(),
            filename: "chart.png".into(),
            byte_size: 42,
            created_at: Utc::now(),
            purpose: "assistants".into(),
            metadata: serde_json::Map::new(),
            location: FileLocation::Local { path: PathBuf::from("/tmp/chart.png") },
        }
    }

    #[test]
    fn local_ids_are_recognized() {
        let id = protocol::create_local_file_id();
        assert!(protocol::is_file_id(&id));
        assert!(protocol::is_local_file_id(&id));
        assert!(!protocol::is_file_id(&format!("{id} trailing")));
    }

    #[test]
    fn remote_ids_are_recognized() {
        assert!(protocol::is_file_id("file-123456789012345"));
        assert!(!protocol::is_local_file_id("file-123456789012345"));
        assert!(!protocol::is_file_id("file-12345"));
        assert!(!protocol::is_file_id("file-1234567890123456"));
    }

    #[test]
    fn find_file_ids_reports_every_occurrence() {
        let id = protocol::create_local_file_id();
        let text = format!("see <file>{id}</file> and again {id}, plus file-123456789012345");
        let ranges = protocol::find_file_ids(&text);
        assert_eq!(ranges.len(), 3);
        assert_eq!(&text[ranges[0].clone()], id);
        assert_eq!(&text[ranges[1].clone()], id);
        assert_eq!(&text[ranges[2].clone()], "file-123456789012345");
        assert!(ranges[0].start < ranges[1].start);
    }

    #[test]
    fn file_repr_formats() {
        let file = local_file("file-local-00000000-0000-4000-8000-000000000000");
        assert_eq!(file.repr(), "<file>file-local-00000000-0000-4000-8000-000000000000</file>");
        assert!(file.repr_with_url("http://x/y").ends_with("</file><url>http://x/y</url>"));
    }

    #[test]
    fn collect_file_ids_recurses_and_dedups() {
        let a = protocol::create_local_file_id();
        let value = serde_json::json!({
            "image": a,
            "nested": { "list": [a, "file-123456789012345", "not a file"] },
            "count": 3
        });
        let ids = collect_file_ids(&value);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a));
        assert!(ids.contains(&"file-123456789012345".to_string()));
    }

    #[test]
    fn file_serializes_location_inline() {
        let json = serde_json::to_value(local_file("file-123456789012345")).unwrap();
        assert_eq!(json["type"], "local");
        assert_eq!(json["filename"], "chart.png");
        assert_eq!(json["id"], "file-123456789012345");
    }
}
