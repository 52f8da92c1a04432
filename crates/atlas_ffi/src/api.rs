//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the workspace controller to Dart via FRB as sync calls.
//! - Translate core results into flat envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - One workspace controller per process, guarded by a mutex.
//! - The host owns the rich-text engine; it pulls engine loads from the
//!   editor envelope and reports markup back through `workspace_sync_rendered`.

use atlas_core::db::open_db;
use atlas_core::repo::sqlite_repo::SqliteDocumentRepository;
use atlas_core::{
    core_version as core_version_inner, import_scan, init_logging as init_logging_inner,
    ping as ping_inner, scan_project, CreateResponse, DirectoryNode, Document, DocumentKind,
    DocumentRepository, DocsNode, EditMode, EngineLoad, HeadlessEngine, RepoResult, SaveBody,
    SaveOutcome, SaveTrigger, ScanOptions, UpdateResponse, ViewMode, WorkspaceConfig,
    WorkspaceController,
};
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

const WORKSPACE_DB_FILE_NAME: &str = "atlas_workspace.sqlite3";
static WORKSPACE_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static WORKSPACE: Mutex<Option<FfiController>> = Mutex::new(None);

type FfiController = WorkspaceController<DbFileRepository, HeadlessEngine>;

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - `level`: `trace|debug|info|warn|error`; `log_dir`: absolute path.
/// - Idempotent for the same inputs; conflicting re-init returns an error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Generic action envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceActionResponse {
    pub ok: bool,
    pub message: String,
}

impl WorkspaceActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Trees and lists after a load, with trees as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSnapshotResponse {
    pub ok: bool,
    pub message: String,
    pub tree_json: String,
    /// Empty when there is no docs tree.
    pub docs_tree_json: String,
    pub memory_paths: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Open editor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorStateResponse {
    pub ok: bool,
    pub message: String,
    pub path: Option<String>,
    pub exists: bool,
    /// `rendered|source`.
    pub mode: String,
    /// Raw markdown of the open document.
    pub content: String,
    pub placeholder: String,
    /// `markup|source` when the engine must reload.
    pub engine_load_kind: Option<String>,
    pub engine_load_content: Option<String>,
    /// `idle|unsaved|saving|saved|error`.
    pub status: String,
}

/// Save result envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSaveResponse {
    pub ok: bool,
    pub content: Option<String>,
    pub message: String,
    pub stale: bool,
}

impl From<SaveOutcome> for WorkspaceSaveResponse {
    fn from(value: SaveOutcome) -> Self {
        Self {
            ok: value.success,
            content: value.content,
            message: value.error.unwrap_or_default(),
            stale: value.stale,
        }
    }
}

/// Scans `project_root` and imports the result into the workspace store.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_scan(project_root: String) -> WorkspaceActionResponse {
    let options = ScanOptions::default();
    let report = match scan_project(Path::new(project_root.trim()), &options) {
        Ok(report) => report,
        Err(err) => return WorkspaceActionResponse::failure(format!("workspace_scan failed: {err}")),
    };
    let imported = open_db(resolve_workspace_db_path())
        .map_err(|err| err.to_string())
        .and_then(|conn| {
            let store = SqliteDocumentRepository::try_new(&conn).map_err(|err| err.to_string())?;
            import_scan(&store, &report).map_err(|err| err.to_string())
        });
    match imported {
        Ok(summary) => WorkspaceActionResponse::success(format!(
            "Imported {} directories, {} memory files, {} docs.",
            summary.directories, summary.memory_files, summary.doc_files
        )),
        Err(err) => WorkspaceActionResponse::failure(format!("workspace_scan failed: {err}")),
    }
}

/// Loads trees and documents; reopens the current selection.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_load() -> WorkspaceSnapshotResponse {
    let result = with_workspace(|controller| {
        controller.reload().map_err(|err| err.to_string())?;
        let state = controller.state();
        Ok(WorkspaceSnapshotResponse {
            ok: true,
            message: String::new(),
            tree_json: tree_json(state.tree()),
            docs_tree_json: state.docs_tree().map(docs_tree_json).unwrap_or_default(),
            memory_paths: state.documents().iter().map(|doc| doc.path.clone()).collect(),
            recommendations: state.recommendations().to_vec(),
        })
    });
    result.unwrap_or_else(|message| WorkspaceSnapshotResponse {
        ok: false,
        message: format!("workspace_load failed: {message}"),
        tree_json: String::new(),
        docs_tree_json: String::new(),
        memory_paths: Vec::new(),
        recommendations: Vec::new(),
    })
}

/// Switches the sidebar between `memory` and `docs`.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_set_view_mode(mode: String) -> WorkspaceActionResponse {
    let mode = match mode.trim() {
        "memory" => ViewMode::Memory,
        "docs" => ViewMode::Docs,
        other => {
            return WorkspaceActionResponse::failure(format!("unsupported view mode `{other}`"))
        }
    };
    match with_workspace(|controller| {
        controller.set_view_mode(mode);
        Ok(())
    }) {
        Ok(()) => WorkspaceActionResponse::success("View mode updated."),
        Err(err) => WorkspaceActionResponse::failure(err),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn workspace_select_directory(path: String, now_ms: i64) -> EditorStateResponse {
    editor_call(now_ms, |controller| {
        controller
            .select_directory(&path)
            .map_err(|err| err.to_string())
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn workspace_select_doc(path: String, now_ms: i64) -> EditorStateResponse {
    editor_call(now_ms, |controller| {
        controller.select_doc(&path).map_err(|err| err.to_string())
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn workspace_create_doc(path: String, now_ms: i64) -> EditorStateResponse {
    editor_call(now_ms, |controller| {
        controller
            .create_doc(&path)
            .map(|_| ())
            .map_err(|err| err.to_string())
    })
}

/// Reports an edit from the rendered engine (`is_markup`) or the textarea.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_edit(content: String, is_markup: bool, now_ms: i64) -> WorkspaceActionResponse {
    let result = with_workspace(|controller| {
        let edited = if is_markup {
            controller.edit_rendered(&content, now_ms)
        } else {
            controller.edit_source(&content, now_ms)
        };
        edited.map_err(|err| err.to_string())
    });
    match result {
        Ok(()) => WorkspaceActionResponse::success(""),
        Err(err) => WorkspaceActionResponse::failure(format!("workspace_edit failed: {err}")),
    }
}

/// Reports markup the host engine produced after an engine load.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_sync_rendered(markup: String) -> WorkspaceActionResponse {
    match with_workspace(|controller| controller.sync_rendered(&markup).map_err(|err| err.to_string())) {
        Ok(()) => WorkspaceActionResponse::success(""),
        Err(err) => WorkspaceActionResponse::failure(err),
    }
}

/// Autosave poll; `None` when nothing was due.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_tick(now_ms: i64) -> Option<WorkspaceSaveResponse> {
    match with_workspace(|controller| Ok(controller.tick(now_ms))) {
        Ok(outcome) => outcome.map(WorkspaceSaveResponse::from),
        Err(message) => Some(save_failure(message)),
    }
}

/// Explicit save.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_save(now_ms: i64) -> WorkspaceSaveResponse {
    match with_workspace(|controller| Ok(controller.save(SaveTrigger::Manual, now_ms))) {
        Ok(outcome) => outcome.into(),
        Err(message) => save_failure(message),
    }
}

/// Toggles rendered/source editing; saves first when dirty.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_toggle_mode(now_ms: i64) -> EditorStateResponse {
    editor_call(now_ms, |controller| {
        let outcome = controller.toggle_mode(now_ms);
        match outcome.error {
            Some(message) if !outcome.success => Err(message),
            _ => Ok(()),
        }
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn workspace_delete_memory(path: String) -> WorkspaceActionResponse {
    match with_workspace(|controller| {
        controller
            .delete_memory(&path)
            .map_err(|err| err.to_string())
    }) {
        Ok(()) => WorkspaceActionResponse::success("Memory document deleted."),
        Err(err) => WorkspaceActionResponse::failure(format!("workspace_delete_memory failed: {err}")),
    }
}

/// Current editor state without changing it.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_editor_state(now_ms: i64) -> EditorStateResponse {
    editor_call(now_ms, |_| Ok(()))
}

#[flutter_rust_bridge::frb(sync)]
pub fn workspace_close() -> WorkspaceActionResponse {
    match with_workspace(|controller| {
        controller.close();
        Ok(())
    }) {
        Ok(()) => WorkspaceActionResponse::success("Closed."),
        Err(err) => WorkspaceActionResponse::failure(err),
    }
}

/// Repository over the workspace database file. Each call opens its own
/// connection so the controller can live in a process-wide static.
struct DbFileRepository {
    db_path: PathBuf,
}

impl DbFileRepository {
    fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn with_store<T>(
        &self,
        f: impl FnOnce(&SqliteDocumentRepository<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let conn = open_db(&self.db_path)?;
        let store = SqliteDocumentRepository::try_new(&conn)?;
        f(&store)
    }
}

impl DocumentRepository for DbFileRepository {
    fn fetch_tree(&self) -> RepoResult<DirectoryNode> {
        self.with_store(|store| store.fetch_tree())
    }

    fn fetch_docs_tree(&self) -> RepoResult<Option<DocsNode>> {
        self.with_store(|store| store.fetch_docs_tree())
    }

    fn fetch_documents(&self) -> RepoResult<Vec<Document>> {
        self.with_store(|store| store.fetch_documents())
    }

    fn fetch_document(&self, kind: DocumentKind, path: &str) -> RepoResult<Document> {
        self.with_store(|store| store.fetch_document(kind, path))
    }

    fn create_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<CreateResponse> {
        self.with_store(|store| store.create_document(kind, path, body))
    }

    fn update_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<UpdateResponse> {
        self.with_store(|store| store.update_document(kind, path, body))
    }

    fn delete_document(&self, kind: DocumentKind, path: &str) -> RepoResult<()> {
        self.with_store(|store| store.delete_document(kind, path))
    }

    fn fetch_recommendations(&self) -> RepoResult<Vec<String>> {
        self.with_store(|store| store.fetch_recommendations())
    }
}

fn resolve_workspace_db_path() -> PathBuf {
    WORKSPACE_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("ATLAS_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(WORKSPACE_DB_FILE_NAME)
        })
        .clone()
}

fn with_workspace<T>(
    f: impl FnOnce(&mut FfiController) -> Result<T, String>,
) -> Result<T, String> {
    let mut guard = WORKSPACE.lock().map_err(|_| {
        warn!("event=ffi_workspace module=ffi status=error reason=poisoned");
        "workspace lock poisoned".to_string()
    })?;
    let controller = guard.get_or_insert_with(|| {
        WorkspaceController::new(
            DbFileRepository::new(resolve_workspace_db_path()),
            HeadlessEngine::default(),
            WorkspaceConfig::default(),
        )
    });
    f(controller)
}

fn editor_call(
    now_ms: i64,
    f: impl FnOnce(&mut FfiController) -> Result<(), String>,
) -> EditorStateResponse {
    let result = with_workspace(|controller| {
        let outcome = f(controller);
        let mut state = editor_state(controller, now_ms);
        if let Err(message) = outcome {
            state.ok = false;
            state.message = message;
        }
        Ok(state)
    });
    result.unwrap_or_else(|message| EditorStateResponse {
        ok: false,
        message,
        path: None,
        exists: false,
        mode: EditMode::Rendered.as_str().to_string(),
        content: String::new(),
        placeholder: String::new(),
        engine_load_kind: None,
        engine_load_content: None,
        status: "idle".to_string(),
    })
}

fn editor_state(controller: &mut FfiController, now_ms: i64) -> EditorStateResponse {
    let (engine_load_kind, engine_load_content) = match controller.engine_mut().take_pending() {
        Some(EngineLoad::Markup(markup)) => (Some("markup".to_string()), Some(markup)),
        Some(EngineLoad::Source(source)) => (Some("source".to_string()), Some(source)),
        None => (None, None),
    };
    let status = controller.status(now_ms).as_str().to_string();
    match controller.session() {
        Some(session) => EditorStateResponse {
            ok: true,
            message: String::new(),
            path: Some(session.document().path.clone()),
            exists: session.exists(),
            mode: session.mode().as_str().to_string(),
            content: session.source().to_string(),
            placeholder: session.placeholder(),
            engine_load_kind,
            engine_load_content,
            status,
        },
        None => EditorStateResponse {
            ok: true,
            message: String::new(),
            path: None,
            exists: false,
            mode: controller.preferred_mode().as_str().to_string(),
            content: String::new(),
            placeholder: String::new(),
            engine_load_kind,
            engine_load_content,
            status,
        },
    }
}

fn save_failure(message: String) -> WorkspaceSaveResponse {
    WorkspaceSaveResponse {
        ok: false,
        content: None,
        message,
        stale: false,
    }
}

fn tree_json(tree: &DirectoryNode) -> String {
    serde_json::to_string(tree).unwrap_or_else(|err| {
        warn!("event=ffi_tree_json module=ffi status=error error={err}");
        String::new()
    })
}

fn docs_tree_json(tree: &DocsNode) -> String {
    serde_json::to_string(tree).unwrap_or_else(|err| {
        warn!("event=ffi_tree_json module=ffi status=error error={err}");
        String::new()
    })
}
