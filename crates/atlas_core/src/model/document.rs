//! Document model.
//!
//! # Invariants
//! - Memory documents always live at `<directory>/<memory file name>`.
//! - `exists == false` marks a virtual document with no backing record.

use crate::model::path::{join_path, normalize_path};
use serde::{Deserialize, Serialize};

/// Default fixed filename of the per-directory memory document.
pub const DEFAULT_MEMORY_FILE_NAME: &str = "MEMORY.md";

/// Document class. Both kinds share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// One document per directory, keyed by the containing directory.
    Memory,
    /// Free-form markdown file in the docs tree.
    Doc,
}

impl DocumentKind {
    /// Stable lowercase label used in storage and log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Doc => "doc",
        }
    }
}

/// Identity of one document: kind plus path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub kind: DocumentKind,
    pub path: String,
}

/// One memory or docs document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub kind: DocumentKind,
    /// Unique key within `kind`.
    pub path: String,
    /// Raw markdown source.
    pub content: String,
    /// Markup form; empty when never rendered.
    #[serde(default)]
    pub rendered_content: String,
    /// `false` for virtual documents.
    pub exists: bool,
    /// Directory the document is attached to. Memory documents only.
    #[serde(default)]
    pub parent_path: Option<String>,
}

impl Document {
    /// Builds a virtual memory document for `directory`.
    ///
    /// The result has empty content, `exists == false`, a normalized
    /// `parent_path` and `path` joined with `file_name`.
    pub fn virtual_memory(directory: &str, file_name: &str) -> Self {
        let parent = normalize_path(directory);
        Self {
            kind: DocumentKind::Memory,
            path: join_path(&parent, file_name),
            content: String::new(),
            rendered_content: String::new(),
            exists: false,
            parent_path: Some(parent),
        }
    }

    /// Builds a persisted docs document as returned by a fetch.
    pub fn persisted_doc(
        path: impl Into<String>,
        content: impl Into<String>,
        rendered_content: impl Into<String>,
    ) -> Self {
        Self {
            kind: DocumentKind::Doc,
            path: path.into(),
            content: content.into(),
            rendered_content: rendered_content.into(),
            exists: true,
            parent_path: None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        !self.exists
    }

    pub fn reference(&self) -> DocumentRef {
        DocumentRef {
            kind: self.kind,
            path: self.path.clone(),
        }
    }
}
