//! Document Repository Client contract.
//!
//! # Responsibility
//! - Describe the backing-store operations consumed by the edit session.
//! - Carry the error taxonomy shared by every implementation.
//!
//! # Invariants
//! - `create_document` fails with `Conflict` when the path already exists;
//!   callers treat that as "switch to update", not as fatal.
//! - `fetch_document` fails with `NotFound` when absent.
//! - `delete_document` is memory-only; docs report `Unsupported`.

use crate::db::DbError;
use crate::model::document::{Document, DocumentKind};
use crate::model::tree::{DirectoryNode, DocsNode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error taxonomy for repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Document absent on fetch/update/delete.
    NotFound(String),
    /// Create raced an existing record.
    Conflict(String),
    /// Network, non-2xx, or non-JSON response.
    Transport(String),
    /// Request rejected before reaching storage.
    Validation(String),
    /// Operation not offered for this document kind.
    Unsupported(&'static str),
    /// Local SQLite failure.
    Db(DbError),
    /// Persisted data cannot be mapped to the read model.
    InvalidData(String),
}

impl RepoError {
    /// Short stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Transport(_) => "transport",
            Self::Validation(_) => "validation",
            Self::Unsupported(_) => "unsupported",
            Self::Db(_) => "db",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "document not found: {path}"),
            Self::Conflict(path) => write!(f, "document already exists: {path}"),
            Self::Transport(message) => write!(f, "transport error: {message}"),
            Self::Validation(message) => write!(f, "invalid request: {message}"),
            Self::Unsupported(operation) => write!(f, "unsupported operation: {operation}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Body forwarded to create/update. `is_markup` selects the representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveBody {
    pub content: String,
    pub is_markup: bool,
}

impl SaveBody {
    pub fn source(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_markup: false,
        }
    }

    pub fn markup(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_markup: true,
        }
    }
}

/// Create response: canonical markdown plus whether a record was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResponse {
    pub content: String,
    pub created: bool,
}

/// Update response: canonical markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResponse {
    pub content: String,
}

/// Backing-store operations, per document kind.
pub trait DocumentRepository {
    /// Project directory tree.
    fn fetch_tree(&self) -> RepoResult<DirectoryNode>;
    /// Docs tree, `None` when there is no docs root.
    fn fetch_docs_tree(&self) -> RepoResult<Option<DocsNode>>;
    /// Every persisted memory document.
    fn fetch_documents(&self) -> RepoResult<Vec<Document>>;
    /// One document by path.
    fn fetch_document(&self, kind: DocumentKind, path: &str) -> RepoResult<Document>;
    /// Creates one document.
    fn create_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<CreateResponse>;
    /// Replaces one document's content.
    fn update_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<UpdateResponse>;
    /// Deletes one document.
    fn delete_document(&self, kind: DocumentKind, path: &str) -> RepoResult<()>;
    /// Directories suggested as worth a memory document.
    fn fetch_recommendations(&self) -> RepoResult<Vec<String>>;
}

impl<R: DocumentRepository + ?Sized> DocumentRepository for &R {
    fn fetch_tree(&self) -> RepoResult<DirectoryNode> {
        (**self).fetch_tree()
    }

    fn fetch_docs_tree(&self) -> RepoResult<Option<DocsNode>> {
        (**self).fetch_docs_tree()
    }

    fn fetch_documents(&self) -> RepoResult<Vec<Document>> {
        (**self).fetch_documents()
    }

    fn fetch_document(&self, kind: DocumentKind, path: &str) -> RepoResult<Document> {
        (**self).fetch_document(kind, path)
    }

    fn create_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<CreateResponse> {
        (**self).create_document(kind, path, body)
    }

    fn update_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<UpdateResponse> {
        (**self).update_document(kind, path, body)
    }

    fn delete_document(&self, kind: DocumentKind, path: &str) -> RepoResult<()> {
        (**self).delete_document(kind, path)
    }

    fn fetch_recommendations(&self) -> RepoResult<Vec<String>> {
        (**self).fetch_recommendations()
    }
}
