//! SQLite-backed local document store.
//!
//! # Responsibility
//! - Persist memory/docs documents keyed by `(kind, path)`.
//! - Serve the scanned directory tree with document/recommendation flags.
//! - Act as the markdown authority: markup saves are converted here.
//!
//! # Invariants
//! - Create never overwrites an existing row (`Conflict`).
//! - Memory update/delete of a missing row is `NotFound`; docs update upserts.
//! - Directory rows always form a chain up to `.` for stored memory documents.

use crate::db::migrations::latest_version;
use crate::markup::{BasicMarkupConverter, MarkupConverter};
use crate::model::document::{Document, DocumentKind, DEFAULT_MEMORY_FILE_NAME};
use crate::model::path::{
    display_parent, file_name, is_safe_relative_path, normalize_path, parent_path, ROOT_PATH,
};
use crate::model::tree::{DirectoryNode, DocsNode};
use crate::repo::document_repo::{
    CreateResponse, DocumentRepository, RepoError, RepoResult, SaveBody, UpdateResponse,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Directories with more files than this are recommended for a memory document.
pub const RECOMMEND_FILE_THRESHOLD: u64 = 10;
/// Directories with more lines than this are recommended for a memory document.
pub const RECOMMEND_LINE_THRESHOLD: u64 = 500;

const DOCS_ROOT_NAME: &str = "docs";

/// Scanned directory row written by the project scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Normalized path; `.` for the project root.
    pub path: String,
    pub name: String,
    pub depth: u32,
    pub file_count: u64,
    pub total_lines: u64,
}

#[derive(Debug, Clone)]
struct DirectoryRow {
    path: String,
    parent_path: Option<String>,
    name: String,
    file_count: u64,
    total_lines: u64,
}

/// SQLite-backed implementation of [`DocumentRepository`].
pub struct SqliteDocumentRepository<'conn, C = BasicMarkupConverter> {
    conn: &'conn Connection,
    converter: C,
    memory_file_name: String,
}

impl<'conn> SqliteDocumentRepository<'conn, BasicMarkupConverter> {
    /// Creates a store over a migrated connection with the basic converter.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Self::with_converter(conn, BasicMarkupConverter)
    }
}

impl<'conn, C: MarkupConverter> SqliteDocumentRepository<'conn, C> {
    /// Creates a store with a custom markup converter.
    pub fn with_converter(conn: &'conn Connection, converter: C) -> RepoResult<Self> {
        ensure_store_ready(conn)?;
        Ok(Self {
            conn,
            converter,
            memory_file_name: DEFAULT_MEMORY_FILE_NAME.to_string(),
        })
    }

    /// Overrides the fixed per-directory memory filename.
    pub fn with_memory_file_name(mut self, name: impl Into<String>) -> Self {
        self.memory_file_name = name.into();
        self
    }

    pub fn memory_file_name(&self) -> &str {
        &self.memory_file_name
    }

    /// Replaces every directory row with a fresh scan.
    pub fn replace_directories(&self, records: &[DirectoryRecord]) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM directories;", [])?;
        for record in records {
            let path = normalize_path(&record.path);
            let parent = (path != ROOT_PATH).then(|| parent_path(&path));
            tx.execute(
                "INSERT INTO directories (path, parent_path, name, depth, file_count, total_lines)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    path,
                    parent,
                    record.name,
                    record.depth,
                    to_db_count(record.file_count),
                    to_db_count(record.total_lines),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Stores a document discovered by a scan, overwriting any previous row.
    pub fn put_document(&self, kind: DocumentKind, path: &str, content: &str) -> RepoResult<()> {
        let path = validated_path(path)?;
        self.conn.execute(
            "INSERT INTO documents (kind, path, content) VALUES (?1, ?2, ?3)
             ON CONFLICT (kind, path) DO UPDATE SET
                content = excluded.content,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![kind.as_str(), path, content],
        )?;
        if kind == DocumentKind::Memory {
            self.ensure_directory_chain(&parent_path(&path))?;
        }
        Ok(())
    }

    fn ensure_directory_chain(&self, directory: &str) -> RepoResult<()> {
        let mut current = normalize_path(directory);
        loop {
            let is_root = current == ROOT_PATH;
            let parent = (!is_root).then(|| parent_path(&current));
            let depth = if is_root {
                0
            } else {
                current.split('/').count() as u32
            };
            self.conn.execute(
                "INSERT OR IGNORE INTO directories (path, parent_path, name, depth)
                 VALUES (?1, ?2, ?3, ?4);",
                params![current, parent, file_name(&current), depth],
            )?;
            match parent {
                Some(next) => current = next,
                None => return Ok(()),
            }
        }
    }

    fn document_exists(&self, kind: DocumentKind, path: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE kind = ?1 AND path = ?2);",
            params![kind.as_str(), path],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn resolve_markdown(&self, body: &SaveBody) -> String {
        if body.is_markup {
            self.converter.to_markdown(&body.content)
        } else {
            body.content.clone()
        }
    }

    fn to_document(&self, kind: DocumentKind, path: String, content: String) -> Document {
        let rendered_content = self.converter.to_markup(&content);
        let parent_path = match kind {
            DocumentKind::Memory => Some(display_parent(&parent_path(&path))),
            DocumentKind::Doc => None,
        };
        Document {
            kind,
            path,
            content,
            rendered_content,
            exists: true,
            parent_path,
        }
    }

    fn memory_directories(&self) -> RepoResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM documents WHERE kind = 'memory';")?;
        let mut rows = stmt.query([])?;
        let mut directories = HashSet::new();
        while let Some(row) = rows.next()? {
            let path: String = row.get(0)?;
            if file_name(&path) == self.memory_file_name {
                directories.insert(parent_path(&path));
            }
        }
        Ok(directories)
    }

    fn load_directory_rows(&self) -> RepoResult<Vec<DirectoryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, parent_path, name, file_count, total_lines
             FROM directories
             ORDER BY path ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(DirectoryRow {
                path: row.get(0)?,
                parent_path: row.get(1)?,
                name: row.get(2)?,
                file_count: from_db_count(row.get(3)?, "directories.file_count")?,
                total_lines: from_db_count(row.get(4)?, "directories.total_lines")?,
            });
        }
        Ok(result)
    }
}

impl<C: MarkupConverter> DocumentRepository for SqliteDocumentRepository<'_, C> {
    fn fetch_tree(&self) -> RepoResult<DirectoryNode> {
        let rows = self.load_directory_rows()?;
        let with_memory = self.memory_directories()?;

        let mut by_parent: HashMap<String, Vec<DirectoryRow>> = HashMap::new();
        let mut root = None;
        for row in rows {
            match row.parent_path.clone() {
                Some(parent) => by_parent.entry(parent).or_default().push(row),
                None => root = Some(row),
            }
        }

        let root = root.unwrap_or_else(|| DirectoryRow {
            path: ROOT_PATH.to_string(),
            parent_path: None,
            name: ROOT_PATH.to_string(),
            file_count: 0,
            total_lines: 0,
        });
        Ok(build_directory_node(root, &mut by_parent, &with_memory))
    }

    fn fetch_docs_tree(&self) -> RepoResult<Option<DocsNode>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM documents WHERE kind = 'doc' ORDER BY path ASC;")?;
        let mut rows = stmt.query([])?;
        let mut paths = Vec::new();
        while let Some(row) = rows.next()? {
            paths.push(row.get::<_, String>(0)?);
        }
        if paths.is_empty() {
            return Ok(None);
        }
        Ok(Some(build_docs_tree(&paths)))
    }

    fn fetch_documents(&self) -> RepoResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, content FROM documents WHERE kind = 'memory' ORDER BY path ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(self.to_document(DocumentKind::Memory, row.get(0)?, row.get(1)?));
        }
        Ok(documents)
    }

    fn fetch_document(&self, kind: DocumentKind, path: &str) -> RepoResult<Document> {
        let path = validated_path(path)?;
        let content: Option<String> = self
            .conn
            .query_row(
                "SELECT content FROM documents WHERE kind = ?1 AND path = ?2;",
                params![kind.as_str(), path],
                |row| row.get(0),
            )
            .optional()?;
        match content {
            Some(content) => Ok(self.to_document(kind, path, content)),
            None => Err(RepoError::NotFound(path)),
        }
    }

    fn create_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<CreateResponse> {
        let path = validated_path(path)?;
        if self.document_exists(kind, &path)? {
            return Err(RepoError::Conflict(path));
        }

        let content = self.resolve_markdown(body);
        self.conn.execute(
            "INSERT INTO documents (kind, path, content) VALUES (?1, ?2, ?3);",
            params![kind.as_str(), path, content],
        )?;
        if kind == DocumentKind::Memory {
            self.ensure_directory_chain(&parent_path(&path))?;
        }

        Ok(CreateResponse {
            content,
            created: true,
        })
    }

    fn update_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<UpdateResponse> {
        let path = validated_path(path)?;
        let content = self.resolve_markdown(body);

        match kind {
            DocumentKind::Memory => {
                let changed = self.conn.execute(
                    "UPDATE documents
                     SET content = ?1,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE kind = 'memory' AND path = ?2;",
                    params![content, path],
                )?;
                if changed == 0 {
                    return Err(RepoError::NotFound(path));
                }
            }
            DocumentKind::Doc => {
                self.conn.execute(
                    "INSERT INTO documents (kind, path, content) VALUES ('doc', ?1, ?2)
                     ON CONFLICT (kind, path) DO UPDATE SET
                        content = excluded.content,
                        updated_at = (strftime('%s', 'now') * 1000);",
                    params![path, content],
                )?;
            }
        }

        Ok(UpdateResponse { content })
    }

    fn delete_document(&self, kind: DocumentKind, path: &str) -> RepoResult<()> {
        if kind == DocumentKind::Doc {
            return Err(RepoError::Unsupported("delete doc document"));
        }
        let path = validated_path(path)?;
        let changed = self.conn.execute(
            "DELETE FROM documents WHERE kind = 'memory' AND path = ?1;",
            [path.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(path));
        }
        Ok(())
    }

    fn fetch_recommendations(&self) -> RepoResult<Vec<String>> {
        Ok(self.fetch_tree()?.recommended_paths())
    }
}

fn build_directory_node(
    row: DirectoryRow,
    by_parent: &mut HashMap<String, Vec<DirectoryRow>>,
    with_memory: &HashSet<String>,
) -> DirectoryNode {
    let mut child_rows = by_parent.remove(&row.path).unwrap_or_default();
    child_rows.sort_by_key(|child| child.name.to_lowercase());
    let children = child_rows
        .into_iter()
        .map(|child| build_directory_node(child, by_parent, with_memory))
        .collect();

    let has_document = with_memory.contains(&row.path);
    DirectoryNode {
        should_recommend: !has_document
            && (row.file_count > RECOMMEND_FILE_THRESHOLD
                || row.total_lines > RECOMMEND_LINE_THRESHOLD),
        has_document,
        path: row.path,
        name: row.name,
        file_count: row.file_count,
        total_lines: row.total_lines,
        children,
    }
}

#[derive(Default)]
struct DocsDir {
    dirs: BTreeMap<String, DocsDir>,
    files: Vec<String>,
}

fn build_docs_tree(paths: &[String]) -> DocsNode {
    let mut root = DocsDir::default();
    for path in paths {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((file, dirs)) = segments.split_last() else {
            continue;
        };
        let mut current = &mut root;
        for dir in dirs {
            current = current.dirs.entry((*dir).to_string()).or_default();
        }
        current.files.push((*file).to_string());
    }
    docs_dir_node(root, ROOT_PATH, DOCS_ROOT_NAME)
}

fn docs_dir_node(dir: DocsDir, path: &str, name: &str) -> DocsNode {
    let mut dir_entries: Vec<(String, DocsDir)> = dir.dirs.into_iter().collect();
    dir_entries.sort_by_key(|(name, _)| name.to_lowercase());
    let mut files = dir.files;
    files.sort_by_key(|name| name.to_lowercase());

    let mut children = Vec::with_capacity(dir_entries.len() + files.len());
    for (child_name, child) in dir_entries {
        let nested_path = child_path(path, &child_name);
        children.push(docs_dir_node(child, &nested_path, &child_name));
    }
    for file in files {
        children.push(DocsNode {
            path: child_path(path, &file),
            name: file.strip_suffix(".md").unwrap_or(&file).to_string(),
            is_file: true,
            children: Vec::new(),
        });
    }

    DocsNode {
        path: path.to_string(),
        name: name.to_string(),
        is_file: false,
        children,
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent == ROOT_PATH {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn validated_path(path: &str) -> RepoResult<String> {
    if !is_safe_relative_path(path) {
        return Err(RepoError::Validation(format!(
            "path must be relative without `..`: `{path}`"
        )));
    }
    Ok(normalize_path(path))
}

fn to_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db_count(value: i64, column: &str) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative count `{value}` in {column}")))
}

fn ensure_store_ready(conn: &Connection) -> RepoResult<()> {
    let expected = latest_version();
    let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual != expected {
        return Err(RepoError::InvalidData(format!(
            "document store requires schema version {expected}, got {actual}"
        )));
    }

    for table in ["documents", "directories"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::InvalidData(format!(
                "document store requires table `{table}`"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::build_docs_tree;

    #[test]
    fn docs_tree_lists_directories_before_files() {
        let tree = build_docs_tree(&[
            "zeta.md".to_string(),
            "guide/intro.md".to_string(),
            "Alpha.md".to_string(),
            "guide/advanced/tuning.md".to_string(),
        ]);

        assert_eq!(tree.path, ".");
        assert!(!tree.is_file);
        let names: Vec<&str> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["guide", "Alpha", "zeta"]);

        let guide = &tree.children[0];
        assert_eq!(guide.path, "guide");
        assert_eq!(guide.children[0].path, "guide/advanced");
        assert_eq!(guide.children[1].path, "guide/intro.md");
        assert!(guide.children[1].is_file);
    }
}
