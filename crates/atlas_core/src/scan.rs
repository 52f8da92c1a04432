//! Project directory analyzer feeding the local document store.
//!
//! # Responsibility
//! - Walk a project, aggregating file/line counts per directory.
//! - Collect existing memory files and `docs/**/*.md` files.
//! - Import a scan into [`SqliteDocumentRepository`].
//!
//! # Invariants
//! - Ignored directories (VCS, build output, dependencies, dot-dirs) are
//!   never descended into.
//! - A directory's stats only count files at most `max_depth` levels below it.

use crate::markup::MarkupConverter;
use crate::model::document::{DocumentKind, DEFAULT_MEMORY_FILE_NAME};
use crate::model::path::ROOT_PATH;
use crate::repo::document_repo::RepoError;
use crate::repo::sqlite_repo::{DirectoryRecord, SqliteDocumentRepository};
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Component, Path};
use std::time::Instant;
use walkdir::{DirEntry, WalkDir};

const DEFAULT_MAX_DEPTH: usize = 3;
const DEFAULT_DOCS_DIR: &str = "docs";
const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    ".next",
    ".cache",
    "coverage",
    "__pycache__",
];

/// Scanner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub memory_file_name: String,
    pub docs_dir_name: String,
    /// Depth window for per-directory stats.
    pub max_depth: usize,
    pub ignored_dirs: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            memory_file_name: DEFAULT_MEMORY_FILE_NAME.to_string(),
            docs_dir_name: DEFAULT_DOCS_DIR.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            ignored_dirs: DEFAULT_IGNORED_DIRS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

/// One discovered markdown file with its repository-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: String,
    pub content: String,
}

/// Result of walking a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub directories: Vec<DirectoryRecord>,
    pub memory_files: Vec<ScannedFile>,
    /// Paths are relative to the docs directory.
    pub doc_files: Vec<ScannedFile>,
}

/// Errors from scanning or importing.
#[derive(Debug)]
pub enum ScanError {
    Walk(walkdir::Error),
    Io(std::io::Error),
    Repo(RepoError),
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Walk(err) => write!(f, "directory walk failed: {err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Walk(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for ScanError {
    fn from(value: walkdir::Error) -> Self {
        Self::Walk(value)
    }
}

impl From<std::io::Error> for ScanError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<RepoError> for ScanError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Counts written by [`import_scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub directories: usize,
    pub memory_files: usize,
    pub doc_files: usize,
}

/// Walks `root` and aggregates directory stats and markdown files.
pub fn scan_project(root: &Path, options: &ScanOptions) -> Result<ScanReport, ScanError> {
    let started_at = Instant::now();
    let mut stats: BTreeMap<Vec<String>, (u64, u64)> = BTreeMap::new();
    let mut report = ScanReport::default();
    let docs_prefix = vec![options.docs_dir_name.clone()];

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry, options));

    for entry in walker {
        let entry = entry?;
        let segments = relative_segments(root, entry.path());

        if entry.file_type().is_dir() {
            stats.entry(segments).or_insert((0, 0));
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let content = fs::read_to_string(entry.path()).ok();
        let lines = content.as_deref().map_or(0, |text| text.lines().count()) as u64;
        let dir_segments = &segments[..segments.len().saturating_sub(1)];

        for distance in 1..=options.max_depth.min(segments.len()) {
            let ancestor = &dir_segments[..segments.len() - distance];
            let slot = stats.entry(ancestor.to_vec()).or_insert((0, 0));
            slot.0 += 1;
            slot.1 += lines;
        }

        let file_name = segments.last().map(String::as_str).unwrap_or_default();
        let Some(content) = content else {
            continue;
        };
        if file_name == options.memory_file_name {
            report.memory_files.push(ScannedFile {
                path: segments.join("/"),
                content,
            });
        } else if segments.starts_with(&docs_prefix) && is_markdown(file_name) {
            report.doc_files.push(ScannedFile {
                path: segments[1..].join("/"),
                content,
            });
        }
    }

    let root_name = root
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| ROOT_PATH.to_string());
    report.directories = stats
        .into_iter()
        .map(|(segments, (file_count, total_lines))| DirectoryRecord {
            path: if segments.is_empty() {
                ROOT_PATH.to_string()
            } else {
                segments.join("/")
            },
            name: segments.last().cloned().unwrap_or_else(|| root_name.clone()),
            depth: segments.len() as u32,
            file_count,
            total_lines,
        })
        .collect();

    info!(
        "event=project_scan module=scan status=ok directories={} memory_files={} doc_files={} duration_ms={}",
        report.directories.len(),
        report.memory_files.len(),
        report.doc_files.len(),
        started_at.elapsed().as_millis()
    );
    Ok(report)
}

/// Writes a scan into the store: directories are replaced, files upserted.
pub fn import_scan<C: MarkupConverter>(
    repo: &SqliteDocumentRepository<'_, C>,
    report: &ScanReport,
) -> Result<ImportSummary, ScanError> {
    repo.replace_directories(&report.directories)?;
    for file in &report.memory_files {
        repo.put_document(DocumentKind::Memory, &file.path, &file.content)?;
    }
    for file in &report.doc_files {
        if let Err(err) = repo.put_document(DocumentKind::Doc, &file.path, &file.content) {
            warn!(
                "event=project_import module=scan status=skip kind=doc path={} error={}",
                file.path, err
            );
        }
    }
    Ok(ImportSummary {
        directories: report.directories.len(),
        memory_files: report.memory_files.len(),
        doc_files: report.doc_files.len(),
    })
}

fn is_ignored(entry: &DirEntry, options: &ScanOptions) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || options.ignored_dirs.iter().any(|ignored| *ignored == name)
}

fn relative_segments(root: &Path, path: &Path) -> Vec<String> {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect()
}

fn is_markdown(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

#[cfg(test)]
mod tests {
    use super::{scan_project, ScanOptions};
    use std::fs;

    #[test]
    fn scan_counts_files_within_depth_window_and_skips_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/a/b/c")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/lib.rs"), "a\nb\n").unwrap();
        fs::write(root.join("src/a/b/c/deep.rs"), "x\n").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x\n").unwrap();

        let report = scan_project(root, &ScanOptions::default()).unwrap();

        let find = |path: &str| {
            report
                .directories
                .iter()
                .find(|record| record.path == path)
                .unwrap_or_else(|| panic!("missing directory {path}"))
        };
        assert_eq!(find("src").file_count, 1);
        assert_eq!(find("src").total_lines, 2);
        // deep.rs is three levels below src/a and four below src
        assert_eq!(find("src/a").file_count, 1);
        assert_eq!(find("src/a/b/c").file_count, 1);
        assert_eq!(find(".").file_count, 1);
        assert!(report
            .directories
            .iter()
            .all(|record| !record.path.starts_with("node_modules")));
    }

    #[test]
    fn scan_collects_memory_and_docs_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("docs/guide")).unwrap();
        fs::write(root.join("src/MEMORY.md"), "# src").unwrap();
        fs::write(root.join("docs/guide/intro.md"), "# intro").unwrap();
        fs::write(root.join("docs/notes.txt"), "skip").unwrap();

        let report = scan_project(root, &ScanOptions::default()).unwrap();

        assert_eq!(report.memory_files.len(), 1);
        assert_eq!(report.memory_files[0].path, "src/MEMORY.md");
        assert_eq!(report.doc_files.len(), 1);
        assert_eq!(report.doc_files[0].path, "guide/intro.md");
    }
}
