//! Core of the memory atlas: documents attached to project directories,
//! a docs tree, and the edit-session engine that saves them.
//! This crate is the single source of truth for session invariants.

pub mod db;
pub mod logging;
pub mod markup;
pub mod model;
pub mod repo;
pub mod scan;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{init_logging, logging_status, LogConfig, LogLevel, LoggingError};
pub use markup::{BasicMarkupConverter, MarkupConverter};
pub use model::document::{Document, DocumentKind, DocumentRef, DEFAULT_MEMORY_FILE_NAME};
pub use model::tree::{DirectoryNode, DocsNode};
pub use repo::api_repo::{ApiDocumentRepository, HttpMethod, JsonResponse, JsonTransport};
pub use repo::document_repo::{
    CreateResponse, DocumentRepository, RepoError, RepoResult, SaveBody, UpdateResponse,
};
pub use repo::sqlite_repo::SqliteDocumentRepository;
pub use scan::{import_scan, scan_project, ScanOptions, ScanReport};
pub use service::app_state::{AppState, Selection, ViewMode};
pub use service::content_reconciler::{EditMode, EngineLoad, HeadlessEngine, RichTextEngine};
pub use service::edit_session::{SaveStatus, SaveTrigger, SessionPhase};
pub use service::workspace_controller::{
    ControllerError, SaveDispatch, SaveOutcome, WorkspaceConfig, WorkspaceController,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
