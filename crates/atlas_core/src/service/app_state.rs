//! Application state store.
//!
//! # Responsibility
//! - Hold the tree, docs tree, memory document list, recommendations,
//!   current selection and view mode.
//!
//! # Invariants
//! - Mutation points are crate-private and only called by the workspace
//!   controller in response to completed operations.
//! - A save discarded for a closed session still records its persisted
//!   content here; only the session is left untouched.

use crate::model::document::{Document, DocumentKind};
use crate::model::tree::{DirectoryNode, DocsNode};

/// Which tree the sidebar shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Memory,
    Docs,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Docs => "docs",
        }
    }
}

/// Currently selected tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Directory node of the project tree.
    Directory(String),
    /// File leaf of the docs tree.
    Doc(String),
}

/// Everything a full load fetches from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    pub tree: DirectoryNode,
    pub docs_tree: Option<DocsNode>,
    pub documents: Vec<Document>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    tree: DirectoryNode,
    docs_tree: Option<DocsNode>,
    documents: Vec<Document>,
    recommendations: Vec<String>,
    selected: Option<Selection>,
    view_mode: ViewMode,
    loading: bool,
    last_error: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            tree: DirectoryNode::empty_root(),
            docs_tree: None,
            documents: Vec::new(),
            recommendations: Vec::new(),
            selected: None,
            view_mode: ViewMode::default(),
            loading: false,
            last_error: None,
        }
    }
}

impl AppState {
    pub fn tree(&self) -> &DirectoryNode {
        &self.tree
    }

    pub fn docs_tree(&self) -> Option<&DocsNode> {
        self.docs_tree.as_ref()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn selected(&self) -> Option<&Selection> {
        self.selected.as_ref()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn begin_load(&mut self) {
        self.loading = true;
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: WorkspaceSnapshot) {
        self.tree = snapshot.tree;
        self.docs_tree = snapshot.docs_tree;
        self.documents = snapshot.documents;
        self.recommendations = snapshot.recommendations;
        self.loading = false;
        self.last_error = None;
    }

    /// Failed loads keep the previous data on screen.
    pub(crate) fn apply_load_error(&mut self, message: String) {
        self.loading = false;
        self.last_error = Some(message);
    }

    pub(crate) fn select(&mut self, selection: Option<Selection>) {
        self.selected = selection;
    }

    pub(crate) fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    /// Records a saved memory document until the next refresh lands.
    pub(crate) fn apply_saved(&mut self, document: &Document) {
        if document.kind != DocumentKind::Memory {
            return;
        }
        match self.documents.iter_mut().find(|doc| doc.path == document.path) {
            Some(existing) => *existing = document.clone(),
            None => self.documents.push(document.clone()),
        }
    }

    pub(crate) fn remove_document(&mut self, path: &str) {
        self.documents.retain(|doc| doc.path != path);
    }
}

#[cfg(test)]
mod tests {
    use super::{AppState, Selection, ViewMode, WorkspaceSnapshot};
    use crate::model::document::Document;
    use crate::model::tree::DirectoryNode;

    #[test]
    fn snapshot_replaces_lists_and_clears_errors() {
        let mut state = AppState::default();
        state.begin_load();
        state.apply_load_error("transport error: down".to_string());
        assert!(!state.is_loading());
        assert_eq!(state.last_error(), Some("transport error: down"));

        state.begin_load();
        state.apply_snapshot(WorkspaceSnapshot {
            tree: DirectoryNode::empty_root(),
            docs_tree: None,
            documents: vec![Document::virtual_memory("src", "MEMORY.md")],
            recommendations: vec!["src".to_string()],
        });
        assert_eq!(state.documents().len(), 1);
        assert_eq!(state.recommendations(), ["src".to_string()]);
        assert_eq!(state.last_error(), None);
    }

    #[test]
    fn saved_memory_document_is_upserted_by_path() {
        let mut state = AppState::default();
        let mut doc = Document::virtual_memory("src", "MEMORY.md");
        state.apply_saved(&doc);
        doc.content = "x".to_string();
        doc.exists = true;
        state.apply_saved(&doc);

        assert_eq!(state.documents().len(), 1);
        assert_eq!(state.documents()[0].content, "x");

        state.remove_document("src/MEMORY.md");
        assert!(state.documents().is_empty());
    }

    #[test]
    fn selection_and_view_mode_are_tracked() {
        let mut state = AppState::default();
        state.select(Some(Selection::Directory("src".to_string())));
        state.set_view_mode(ViewMode::Docs);
        assert_eq!(state.selected(), Some(&Selection::Directory("src".to_string())));
        assert_eq!(state.view_mode(), ViewMode::Docs);
    }
}
