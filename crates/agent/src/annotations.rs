//! Annotation assembly: splitting a final answer into text and file parts.

use fnagent_core::file::{File, protocol};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::schema::AgentStep;

/// One part of an annotated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text { text: String },
    File(File),
}

impl ContentPart {
    fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    pub content_parts: Vec<ContentPart>,
}

impl Annotations {
    /// Split `text` at every file id occurrence, left to right.
    ///
    /// Literal and id segments strictly alternate, starting and ending with a
    /// literal segment that may be empty. Each occurrence is resolved on its
    /// own, so a repeated id yields one file part per position. An id is
    /// resolved to the first matching file in step order; an id no step
    /// carries stays a text part.
    pub fn assemble(text: &str, steps: &[AgentStep]) -> Self {
        let mut content_parts = Vec::new();
        let mut cursor = 0;

        for range in protocol::find_file_ids(text) {
            content_parts.push(ContentPart::text(&text[cursor..range.start]));
            let file_id = &text[range.clone()];
            match find_step_file(steps, file_id) {
                Some(file) => content_parts.push(ContentPart::File(file.clone())),
                None => {
                    warn!(file_id, "File id in response text matches no step file");
                    content_parts.push(ContentPart::text(file_id));
                }
            }
            cursor = range.end;
        }
        content_parts.push(ContentPart::text(&text[cursor..]));

        Self { content_parts }
    }

    /// Files referenced by the answer, in order of appearance.
    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.content_parts.iter().filter_map(|part| match part {
            ContentPart::File(file) => Some(file),
            ContentPart::Text { .. } => None,
        })
    }
}

fn find_step_file<'a>(steps: &'a [AgentStep], file_id: &str) -> Option<&'a File> {
    steps.iter().flat_map(|step| step.files()).find(|file| file.id == file_id)
}
