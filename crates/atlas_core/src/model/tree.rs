//! Read-only trees produced by repositories and consumed by the display layer.

use serde::{Deserialize, Serialize};

/// Project directory node with aggregate stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Normalized path (`.` for the root).
    pub path: String,
    pub name: String,
    /// Whether a persisted memory document is attached to this directory.
    pub has_document: bool,
    /// Whether this directory is suggested as worth a memory document.
    pub should_recommend: bool,
    pub file_count: u64,
    pub total_lines: u64,
    pub children: Vec<DirectoryNode>,
}

impl DirectoryNode {
    /// Empty root node used when nothing was scanned yet.
    pub fn empty_root() -> Self {
        Self {
            path: ".".to_string(),
            name: ".".to_string(),
            has_document: false,
            should_recommend: false,
            file_count: 0,
            total_lines: 0,
            children: Vec::new(),
        }
    }

    /// Depth-first lookup by normalized path.
    pub fn find(&self, path: &str) -> Option<&DirectoryNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    /// Collects paths of this node and descendants flagged for recommendation.
    pub fn recommended_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_recommended(self, &mut paths);
        paths
    }
}

fn collect_recommended(node: &DirectoryNode, out: &mut Vec<String>) {
    if node.should_recommend {
        out.push(node.path.clone());
    }
    for child in &node.children {
        collect_recommended(child, out);
    }
}

/// Docs tree node. Leaves with `is_file == true` are markdown files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocsNode {
    /// Path relative to the docs root (`.` for the root).
    pub path: String,
    /// Display name; files drop their `.md` extension.
    pub name: String,
    pub is_file: bool,
    pub children: Vec<DocsNode>,
}

impl DocsNode {
    pub fn find(&self, path: &str) -> Option<&DocsNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    /// Paths of every file leaf, depth-first.
    pub fn file_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_files(self, &mut paths);
        paths
    }
}

fn collect_files(node: &DocsNode, out: &mut Vec<String>) {
    if node.is_file {
        out.push(node.path.clone());
    }
    for child in &node.children {
        collect_files(child, out);
    }
}
