//! HTTP-shaped JSON client for the memory/docs API.
//!
//! # Responsibility
//! - Map repository operations onto the `/api` route table.
//! - Translate status codes into the repository error taxonomy.
//!
//! # Invariants
//! - 404 maps to `NotFound`, 409 to `Conflict`, every other non-2xx status
//!   and any non-JSON body to `Transport`.
//! - A 2xx save response without a `content` string degrades to empty content.
//! - The transport itself (sockets, TLS, timeouts) is injected.

use crate::model::document::{Document, DocumentKind};
use crate::model::path::normalize_path;
use crate::model::tree::{DirectoryNode, DocsNode};
use crate::repo::document_repo::{
    CreateResponse, DocumentRepository, RepoError, RepoResult, SaveBody, UpdateResponse,
};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_BASE_PATH: &str = "/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Raw response handed back by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one JSON request. `Err` means the request never produced a response.
pub trait JsonTransport {
    fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<JsonResponse, String>;
}

#[derive(Debug, Deserialize)]
struct StatsDto {
    #[serde(default)]
    file_count: u64,
    #[serde(default)]
    total_lines: u64,
}

#[derive(Debug, Deserialize)]
struct DirectoryDto {
    path: String,
    name: String,
    #[serde(default, alias = "has_memory")]
    has_document: bool,
    #[serde(default)]
    should_recommend: bool,
    #[serde(default)]
    file_count: u64,
    #[serde(default)]
    total_lines: u64,
    #[serde(default)]
    stats: Option<StatsDto>,
    #[serde(default)]
    children: Vec<DirectoryDto>,
}

impl From<DirectoryDto> for DirectoryNode {
    fn from(value: DirectoryDto) -> Self {
        let (file_count, total_lines) = match value.stats {
            Some(stats) => (stats.file_count, stats.total_lines),
            None => (value.file_count, value.total_lines),
        };
        Self {
            path: normalize_path(&value.path),
            name: value.name,
            has_document: value.has_document,
            should_recommend: value.should_recommend,
            file_count,
            total_lines,
            children: value.children.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DocsNodeDto {
    path: String,
    name: String,
    #[serde(default)]
    is_file: bool,
    #[serde(default)]
    children: Vec<DocsNodeDto>,
}

impl From<DocsNodeDto> for DocsNode {
    fn from(value: DocsNodeDto) -> Self {
        Self {
            path: value.path,
            name: value.name,
            is_file: value.is_file,
            children: value.children.into_iter().map(Into::into).collect(),
        }
    }
}

fn default_exists() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct MemoryFileDto {
    path: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    content_html: Option<String>,
    #[serde(default = "default_exists")]
    exists: bool,
    #[serde(default)]
    parent_path: Option<String>,
}

impl From<MemoryFileDto> for Document {
    fn from(value: MemoryFileDto) -> Self {
        Self {
            kind: DocumentKind::Memory,
            path: value.path,
            content: value.content,
            rendered_content: value.content_html.unwrap_or_default(),
            exists: value.exists,
            parent_path: value.parent_path,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DocFileDto {
    path: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    content_html: Option<String>,
}

/// Repository client speaking the memory/docs JSON API.
pub struct ApiDocumentRepository<T> {
    transport: T,
    base_path: String,
}

impl<T: JsonTransport> ApiDocumentRepository<T> {
    pub fn new(transport: T) -> Self {
        Self::with_base_path(transport, DEFAULT_BASE_PATH)
    }

    pub fn with_base_path(transport: T, base_path: impl Into<String>) -> Self {
        Self {
            transport,
            base_path: base_path.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn route(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.base_path)
    }

    fn document_route(&self, kind: DocumentKind, path: &str) -> String {
        match kind {
            DocumentKind::Memory => self.route(&format!("/memory-files/{path}")),
            DocumentKind::Doc => self.route(&format!("/docs/files/{path}")),
        }
    }

    fn request(
        &self,
        method: HttpMethod,
        route: &str,
        body: Option<&Value>,
        subject: &str,
    ) -> RepoResult<String> {
        let response = self
            .transport
            .send(method, route, body)
            .map_err(RepoError::Transport)?;
        match response.status {
            200..=299 => Ok(response.body),
            404 => Err(RepoError::NotFound(subject.to_string())),
            409 => Err(RepoError::Conflict(subject.to_string())),
            status => Err(RepoError::Transport(format!(
                "{} {route} failed with status {status}",
                method.as_str()
            ))),
        }
    }

    fn get_json<D: DeserializeOwned>(&self, route: &str, subject: &str) -> RepoResult<D> {
        let body = self.request(HttpMethod::Get, route, None, subject)?;
        parse_json(&body, route)
    }

    fn send_save(
        &self,
        method: HttpMethod,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<Value> {
        let route = self.document_route(kind, path);
        let payload = save_payload(body);
        let raw = self.request(method, &route, Some(&payload), path)?;
        parse_json(&raw, &route)
    }
}

impl<T: JsonTransport> DocumentRepository for ApiDocumentRepository<T> {
    fn fetch_tree(&self) -> RepoResult<DirectoryNode> {
        let dto: DirectoryDto = self.get_json(&self.route("/tree"), "tree")?;
        Ok(dto.into())
    }

    fn fetch_docs_tree(&self) -> RepoResult<Option<DocsNode>> {
        let dto: Option<DocsNodeDto> = self.get_json(&self.route("/docs/tree"), "docs tree")?;
        Ok(dto.map(Into::into))
    }

    fn fetch_documents(&self) -> RepoResult<Vec<Document>> {
        let dtos: Vec<MemoryFileDto> =
            self.get_json(&self.route("/memory-files"), "memory files")?;
        Ok(dtos.into_iter().map(Into::into).collect())
    }

    fn fetch_document(&self, kind: DocumentKind, path: &str) -> RepoResult<Document> {
        match kind {
            // The API has no single-file memory route; the list is authoritative.
            DocumentKind::Memory => self
                .fetch_documents()?
                .into_iter()
                .find(|doc| doc.path == path)
                .ok_or_else(|| RepoError::NotFound(path.to_string())),
            DocumentKind::Doc => {
                let dto: DocFileDto = self.get_json(&self.document_route(kind, path), path)?;
                Ok(Document::persisted_doc(
                    dto.path,
                    dto.content,
                    dto.content_html.unwrap_or_default(),
                ))
            }
        }
    }

    fn create_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<CreateResponse> {
        let value = self.send_save(HttpMethod::Post, kind, path, body)?;
        Ok(CreateResponse {
            content: content_or_empty(&value, path),
            created: value.get("created").and_then(Value::as_bool).unwrap_or(true),
        })
    }

    fn update_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<UpdateResponse> {
        let value = self.send_save(HttpMethod::Put, kind, path, body)?;
        Ok(UpdateResponse {
            content: content_or_empty(&value, path),
        })
    }

    fn delete_document(&self, kind: DocumentKind, path: &str) -> RepoResult<()> {
        if kind == DocumentKind::Doc {
            return Err(RepoError::Unsupported("delete doc document"));
        }
        let route = self.document_route(kind, path);
        self.request(HttpMethod::Delete, &route, None, path)?;
        Ok(())
    }

    fn fetch_recommendations(&self) -> RepoResult<Vec<String>> {
        let paths: Vec<String> =
            self.get_json(&self.route("/recommendations"), "recommendations")?;
        Ok(paths.iter().map(|path| normalize_path(path)).collect())
    }
}

fn save_payload(body: &SaveBody) -> Value {
    if body.is_markup {
        json!({ "content_html": body.content })
    } else {
        json!({ "content": body.content })
    }
}

fn parse_json<D: DeserializeOwned>(body: &str, route: &str) -> RepoResult<D> {
    serde_json::from_str(body)
        .map_err(|err| RepoError::Transport(format!("invalid JSON from {route}: {err}")))
}

fn content_or_empty(value: &Value, path: &str) -> String {
    match value.get("content").and_then(Value::as_str) {
        Some(content) => content.to_string(),
        None => {
            warn!(
                "event=save_response module=repo status=degraded path={} reason=missing_content",
                path
            );
            String::new()
        }
    }
}
