//! Maps a selected tree node to the document that should be opened.
//!
//! # Invariants
//! - Memory resolution always yields a document; when nothing matches, a
//!   virtual document (`exists == false`) keyed by the node path is returned.
//! - Match order is fixed: `parent_path` first, then the constructed path.
//! - Docs resolution never synthesizes; only file leaves are selectable.

use crate::model::document::{Document, DocumentKind};
use crate::model::path::{join_path, normalize_path};
use crate::model::tree::DocsNode;
use log::warn;

/// How a memory document was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// `parent_path` equals the node path.
    ParentPath,
    /// `path` equals `<node>/<memory file name>`.
    ConstructedPath,
    /// No record; a virtual document was synthesized.
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub document: Document,
    pub matched_by: MatchKind,
}

/// Resolves the memory document for directory `node_path`.
pub fn resolve_memory_document(
    documents: &[Document],
    node_path: &str,
    memory_file_name: &str,
) -> Resolution {
    let node = normalize_path(node_path);
    let expected_path = join_path(&node, memory_file_name);
    let memory = || documents.iter().filter(|doc| doc.kind == DocumentKind::Memory);

    let by_parent = memory().find(|doc| {
        doc.parent_path
            .as_deref()
            .is_some_and(|parent| normalize_path(parent) == node)
    });
    let by_path = memory().find(|doc| normalize_path(&doc.path) == expected_path);

    if let (Some(parent_hit), Some(path_hit)) = (by_parent, by_path) {
        if parent_hit.path != path_hit.path {
            // Stale parent bookkeeping; parent match wins but flag it.
            warn!(
                "event=resolve_memory module=service status=ambiguous node={} parent_match={} path_match={}",
                node, parent_hit.path, path_hit.path
            );
        }
    }

    match (by_parent, by_path) {
        (Some(doc), _) => Resolution {
            document: doc.clone(),
            matched_by: MatchKind::ParentPath,
        },
        (None, Some(doc)) => Resolution {
            document: doc.clone(),
            matched_by: MatchKind::ConstructedPath,
        },
        (None, None) => Resolution {
            document: Document::virtual_memory(&node, memory_file_name),
            matched_by: MatchKind::Virtual,
        },
    }
}

/// Why a docs selection cannot be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocSelectionError {
    /// The path names a directory; directories only expand/collapse.
    NotAFile(String),
}

/// Validates a docs selection by direct path equality against the tree.
///
/// Paths absent from the tree are passed through; the fetch decides.
pub fn resolve_doc_selection(
    tree: Option<&DocsNode>,
    path: &str,
) -> Result<String, DocSelectionError> {
    let path = normalize_path(path);
    match tree.and_then(|root| root.find(&path)) {
        Some(node) if !node.is_file => Err(DocSelectionError::NotAFile(path)),
        _ => Ok(path),
    }
}
