//! UI-facing workspace controller.
//!
//! # Responsibility
//! - Own the application state store, the single open edit session and the
//!   autosave scheduler.
//! - Turn user intents (select, edit, save, toggle, delete) into repository
//!   calls and apply their completed outcomes.
//!
//! # Invariants
//! - Opening a different document always cancels the pending autosave.
//! - Save results are applied to the session only when their ticket matches
//!   the open session. Stale results still update the store copy.
//! - The store is mutated only from completed operations.

use crate::model::document::{Document, DocumentKind, DocumentRef, DEFAULT_MEMORY_FILE_NAME};
use crate::model::path::{
    file_name, is_safe_relative_path, normalize_path, parent_path, ROOT_PATH,
};
use crate::repo::document_repo::{DocumentRepository, RepoError, RepoResult, SaveBody};
use crate::service::app_state::{AppState, Selection, ViewMode, WorkspaceSnapshot};
use crate::service::autosave::{AutosaveScheduler, DEFAULT_AUTOSAVE_DELAY_MS};
use crate::service::content_reconciler::{EditMode, EngineLoad, RichTextEngine};
use crate::service::edit_session::{
    EditSession, ModeRequest, PendingSave, SaveCompletion, SaveOperation, SaveRequest,
    SaveResponse, SaveStatus, SaveTicket, SaveTrigger,
};
use crate::service::path_resolver::{
    resolve_doc_selection, resolve_memory_document, DocSelectionError,
};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default display window for a save error.
pub const DEFAULT_ERROR_DISPLAY_MS: i64 = 3_000;

/// Controller tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// Fixed filename of per-directory memory documents.
    pub memory_file_name: String,
    pub autosave_delay_ms: i64,
    pub error_display_ms: i64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            memory_file_name: DEFAULT_MEMORY_FILE_NAME.to_string(),
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            error_display_ms: DEFAULT_ERROR_DISPLAY_MS,
        }
    }
}

#[derive(Debug)]
pub enum ControllerError {
    Repo(RepoError),
    /// Operation needs an open document.
    NoSession,
    /// Docs selection named a directory.
    NotAFile(String),
}

impl Display for ControllerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::NoSession => write!(f, "no document is open"),
            Self::NotAFile(path) => write!(f, "not a document file: {path}"),
        }
    }
}

impl Error for ControllerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ControllerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DocSelectionError> for ControllerError {
    fn from(value: DocSelectionError) -> Self {
        match value {
            DocSelectionError::NotAFile(path) => Self::NotAFile(path),
        }
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Result reported to the caller of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub success: bool,
    /// Authoritative markdown after the save, when known.
    pub content: Option<String>,
    pub error: Option<String>,
    /// The result arrived after the session changed and was dropped.
    pub stale: bool,
}

impl SaveOutcome {
    fn ok(content: Option<String>) -> Self {
        Self {
            success: true,
            content,
            error: None,
            stale: false,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(message.into()),
            stale: false,
        }
    }
}

/// First half of a split save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveDispatch {
    /// Call `run_save` then `complete_save` with this.
    Started(PendingSave),
    /// Resolved without touching the store.
    Finished(SaveOutcome),
}

pub struct WorkspaceController<R: DocumentRepository, E: RichTextEngine> {
    repo: R,
    engine: E,
    config: WorkspaceConfig,
    state: AppState,
    session: Option<EditSession>,
    autosave: AutosaveScheduler,
    preferred_mode: EditMode,
}

impl<R: DocumentRepository, E: RichTextEngine> WorkspaceController<R, E> {
    pub fn new(repo: R, engine: E, config: WorkspaceConfig) -> Self {
        let autosave = AutosaveScheduler::new(config.autosave_delay_ms);
        Self {
            repo,
            engine,
            config,
            state: AppState::default(),
            session: None,
            autosave,
            preferred_mode: EditMode::Rendered,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn autosave_deadline_ms(&self) -> Option<i64> {
        self.autosave.deadline_ms()
    }

    /// Mode new sessions open in.
    pub fn preferred_mode(&self) -> EditMode {
        self.preferred_mode
    }

    /// Fetches everything and reopens the current selection in a fresh
    /// session.
    pub fn reload(&mut self) -> ControllerResult<()> {
        self.state.begin_load();
        match self.fetch_snapshot() {
            Ok(snapshot) => self.state.apply_snapshot(snapshot),
            Err(err) => {
                warn!(
                    "event=workspace_load module=service status=error code={}",
                    err.code()
                );
                self.state.apply_load_error(err.to_string());
                return Err(err.into());
            }
        }
        info!(
            "event=workspace_load module=service status=ok documents={} recommendations={}",
            self.state.documents().len(),
            self.state.recommendations().len()
        );

        match self.state.selected().cloned() {
            Some(Selection::Directory(path)) => self.select_directory(&path),
            Some(Selection::Doc(path)) => self.select_doc(&path),
            None => Ok(()),
        }
    }

    /// Switches the sidebar tree. Changing trees closes the open document.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if self.state.view_mode() == mode {
            return;
        }
        self.close();
        self.state.set_view_mode(mode);
    }

    /// Opens the memory document of directory `path`, virtual when absent.
    pub fn select_directory(&mut self, path: &str) -> ControllerResult<()> {
        let resolution =
            resolve_memory_document(self.state.documents(), path, &self.config.memory_file_name);
        let node = normalize_path(path);
        self.open_session(resolution.document);
        self.state.select(Some(Selection::Directory(node)));
        Ok(())
    }

    /// Opens docs file `path`. Missing records are an error.
    pub fn select_doc(&mut self, path: &str) -> ControllerResult<()> {
        let path = resolve_doc_selection(self.state.docs_tree(), path)?;
        let document = self.repo.fetch_document(DocumentKind::Doc, &path)?;
        self.open_session(document);
        self.state.select(Some(Selection::Doc(path)));
        Ok(())
    }

    /// Creates a docs file with a title heading and opens it.
    ///
    /// An existing file at the same path is opened instead.
    pub fn create_doc(&mut self, path: &str) -> ControllerResult<String> {
        let mut path = normalize_path(path);
        if path == ROOT_PATH || !is_safe_relative_path(&path) {
            return Err(RepoError::Validation(format!("unsafe path: {path}")).into());
        }
        if !path.ends_with(".md") {
            path.push_str(".md");
        }
        let name = file_name(&path);
        let stem = name.trim_end_matches(".md");
        let body = SaveBody::source(format!("# {stem}\n"));

        match self.repo.create_document(DocumentKind::Doc, &path, &body) {
            Ok(_) => info!("event=doc_create module=service status=ok path={path}"),
            Err(RepoError::Conflict(_)) => {
                info!("event=doc_create module=service status=skip reason=exists path={path}")
            }
            Err(err) => {
                warn!(
                    "event=doc_create module=service status=error code={} path={path}",
                    err.code()
                );
                return Err(err.into());
            }
        }

        self.refresh();
        self.select_doc(&path)?;
        Ok(path)
    }

    pub fn edit_rendered(&mut self, markup: &str, now_ms: i64) -> ControllerResult<()> {
        let session = self.session.as_mut().ok_or(ControllerError::NoSession)?;
        if session.edit_rendered(markup) {
            self.autosave.arm(session.id(), now_ms);
        }
        Ok(())
    }

    pub fn edit_source(&mut self, text: &str, now_ms: i64) -> ControllerResult<()> {
        let session = self.session.as_mut().ok_or(ControllerError::NoSession)?;
        if session.edit_source(text) {
            self.autosave.arm(session.id(), now_ms);
        }
        Ok(())
    }

    /// Markup the host engine produced after a programmatic load.
    pub fn sync_rendered(&mut self, markup: &str) -> ControllerResult<()> {
        let session = self.session.as_mut().ok_or(ControllerError::NoSession)?;
        session.engine_synced(markup);
        Ok(())
    }

    /// Moves the open session to saving and returns what to send.
    pub fn request_save(&mut self, trigger: SaveTrigger) -> SaveDispatch {
        if trigger != SaveTrigger::Autosave {
            self.autosave.cancel();
        }
        let Some(session) = self.session.as_mut() else {
            return SaveDispatch::Finished(SaveOutcome::failed("no document is open"));
        };

        match session.begin_save(trigger) {
            SaveRequest::Dispatch(pending) => {
                info!(
                    "event=document_save module=service status=start kind={} path={} operation={} trigger={} len={}",
                    pending.ticket.document.kind.as_str(),
                    pending.ticket.document.path,
                    operation_label(pending.operation),
                    trigger.as_str(),
                    pending.body.content.len()
                );
                SaveDispatch::Started(pending)
            }
            SaveRequest::Suppressed => {
                info!(
                    "event=document_save module=service status=skip reason=empty_virtual path={}",
                    session.document().path
                );
                SaveDispatch::Finished(SaveOutcome::ok(Some(String::new())))
            }
            SaveRequest::NotDirty => {
                SaveDispatch::Finished(SaveOutcome::ok(Some(session.source().to_string())))
            }
            SaveRequest::InFlight => {
                SaveDispatch::Finished(SaveOutcome::failed("save already in progress"))
            }
        }
    }

    /// Sends one pending save to the store.
    pub fn run_save(&self, pending: &PendingSave) -> RepoResult<SaveResponse> {
        let document = &pending.ticket.document;
        match pending.operation {
            SaveOperation::Create => self
                .repo
                .create_document(document.kind, &document.path, &pending.body)
                .map(|response| SaveResponse {
                    content: response.content,
                    created: response.created,
                }),
            SaveOperation::Update => self
                .repo
                .update_document(document.kind, &document.path, &pending.body)
                .map(|response| SaveResponse {
                    content: response.content,
                    created: false,
                }),
        }
    }

    /// Applies a store answer, unless the session it belongs to is gone.
    pub fn complete_save(
        &mut self,
        ticket: &SaveTicket,
        result: RepoResult<SaveResponse>,
        now_ms: i64,
    ) -> SaveOutcome {
        let error_display_ms = self.config.error_display_ms;
        let completion = match self.session.as_mut() {
            Some(session) if session.id() == ticket.session_id => {
                session.complete_save(result, now_ms, error_display_ms)
            }
            _ => return self.discard_stale(ticket, result),
        };
        let path = &ticket.document.path;

        match completion {
            SaveCompletion::Saved {
                content,
                created,
                rearm,
                engine_load,
            } => {
                info!(
                    "event=document_save module=service status=ok path={path} created={created} len={}",
                    content.len()
                );
                self.after_success(engine_load, rearm, &content, now_ms);
                if created {
                    self.refresh();
                }
                SaveOutcome::ok(Some(content))
            }
            SaveCompletion::AlreadyExisted { rearm, engine_load } => {
                info!("event=document_save module=service status=ok reason=conflict path={path}");
                let content = self
                    .session
                    .as_ref()
                    .map(|session| session.source().to_string())
                    .unwrap_or_default();
                self.after_success(engine_load, rearm, &content, now_ms);
                self.refresh();
                SaveOutcome::ok(Some(content))
            }
            SaveCompletion::Failed { message } => {
                warn!("event=document_save module=service status=error path={path}");
                SaveOutcome::failed(message)
            }
        }
    }

    /// Runs a whole save synchronously.
    pub fn save(&mut self, trigger: SaveTrigger, now_ms: i64) -> SaveOutcome {
        match self.request_save(trigger) {
            SaveDispatch::Started(pending) => {
                let result = self.run_save(&pending);
                self.complete_save(&pending.ticket, result, now_ms)
            }
            SaveDispatch::Finished(outcome) => outcome,
        }
    }

    /// Checks the autosave deadline and starts the save when it fired.
    pub fn poll_autosave(&mut self, now_ms: i64) -> Option<SaveDispatch> {
        if let Some(session) = self.session.as_mut() {
            session.clear_expired_error(now_ms);
        }
        let fired = self.autosave.take_due(now_ms)?;
        let session = self.session.as_ref()?;
        if session.id() != fired {
            return None;
        }
        if !session.is_dirty() {
            info!(
                "event=autosave module=service status=skip phase={}",
                session.phase().as_str()
            );
            return None;
        }
        Some(self.request_save(SaveTrigger::Autosave))
    }

    /// Autosave tick; runs the save when the debounce window elapsed.
    pub fn tick(&mut self, now_ms: i64) -> Option<SaveOutcome> {
        match self.poll_autosave(now_ms)? {
            SaveDispatch::Started(pending) => {
                let result = self.run_save(&pending);
                Some(self.complete_save(&pending.ticket, result, now_ms))
            }
            SaveDispatch::Finished(outcome) => Some(outcome),
        }
    }

    /// Requests an edit mode. Dirty sessions save first.
    pub fn begin_mode_switch(&mut self, target: EditMode) -> SaveDispatch {
        let Some(session) = self.session.as_mut() else {
            self.preferred_mode = target;
            return SaveDispatch::Finished(SaveOutcome::ok(None));
        };

        match session.request_mode(target) {
            ModeRequest::Unchanged => SaveDispatch::Finished(SaveOutcome::ok(None)),
            ModeRequest::Switched(load) => {
                self.after_mode_change(load);
                SaveDispatch::Finished(SaveOutcome::ok(None))
            }
            ModeRequest::Deferred => SaveDispatch::Finished(SaveOutcome::ok(None)),
            ModeRequest::NeedsSave => match self.request_save(SaveTrigger::ModeSwitch) {
                SaveDispatch::Started(pending) => SaveDispatch::Started(pending),
                SaveDispatch::Finished(outcome) => {
                    if let Some(session) = self.session.as_mut() {
                        if outcome.success {
                            let load = session.force_pending_mode();
                            self.after_mode_change(load);
                        } else {
                            session.abort_mode_switch();
                        }
                    }
                    SaveDispatch::Finished(outcome)
                }
            },
        }
    }

    /// Flips between rendered and source editing, saving first when dirty.
    pub fn toggle_mode(&mut self, now_ms: i64) -> SaveOutcome {
        let current = self
            .session
            .as_ref()
            .map_or(self.preferred_mode, |session| session.mode());
        match self.begin_mode_switch(current.toggled()) {
            SaveDispatch::Started(pending) => {
                let result = self.run_save(&pending);
                self.complete_save(&pending.ticket, result, now_ms)
            }
            SaveDispatch::Finished(outcome) => outcome,
        }
    }

    /// Deletes a memory document. Closes it first when it is open.
    pub fn delete_memory(&mut self, path: &str) -> ControllerResult<()> {
        let path = normalize_path(path);
        self.repo.delete_document(DocumentKind::Memory, &path)?;
        info!("event=document_delete module=service status=ok path={path}");

        let is_open = self.session.as_ref().is_some_and(|session| {
            session.document().kind == DocumentKind::Memory && session.document().path == path
        });
        if is_open {
            self.close();
        }
        self.state.remove_document(&path);
        self.refresh();
        Ok(())
    }

    /// Drops the open session and selection. In-flight saves become stale.
    pub fn close(&mut self) {
        self.autosave.cancel();
        self.session = None;
        self.state.select(None);
    }

    pub fn status(&self, now_ms: i64) -> SaveStatus {
        self.session
            .as_ref()
            .map_or(SaveStatus::Idle, |session| session.status(now_ms))
    }

    pub fn placeholder(&self) -> Option<String> {
        self.session.as_ref().map(EditSession::placeholder)
    }

    fn fetch_snapshot(&self) -> RepoResult<WorkspaceSnapshot> {
        Ok(WorkspaceSnapshot {
            tree: self.repo.fetch_tree()?,
            docs_tree: self.repo.fetch_docs_tree()?,
            documents: self.repo.fetch_documents()?,
            recommendations: self.repo.fetch_recommendations()?,
        })
    }

    /// Reloads store data without touching the open session.
    fn refresh(&mut self) {
        self.state.begin_load();
        match self.fetch_snapshot() {
            Ok(snapshot) => self.state.apply_snapshot(snapshot),
            Err(err) => {
                warn!(
                    "event=workspace_refresh module=service status=error code={}",
                    err.code()
                );
                self.state.apply_load_error(err.to_string());
            }
        }
    }

    fn open_session(&mut self, document: Document) {
        self.autosave.cancel();
        info!(
            "event=session_open module=service status=ok kind={} path={} exists={} mode={}",
            document.kind.as_str(),
            document.path,
            document.exists,
            self.preferred_mode.as_str()
        );
        let (session, load) = EditSession::open(document, self.preferred_mode);
        self.engine.set_placeholder(&session.placeholder());
        self.session = Some(session);
        self.load_engine(load);
    }

    fn load_engine(&mut self, load: EngineLoad) {
        match &load {
            EngineLoad::Markup(markup) => self.engine.load_markup(markup),
            EngineLoad::Source(source) => self.engine.load_source(source),
        }
        if let (Some(session), Some(markup)) = (self.session.as_mut(), self.engine.markup()) {
            session.engine_synced(markup);
        }
    }

    fn after_mode_change(&mut self, load: Option<EngineLoad>) {
        if let Some(load) = load {
            self.load_engine(load);
        }
        if let Some(session) = self.session.as_ref() {
            self.preferred_mode = session.mode();
        }
    }

    fn after_success(
        &mut self,
        engine_load: Option<EngineLoad>,
        rearm: bool,
        persisted: &str,
        now_ms: i64,
    ) {
        self.after_mode_change(engine_load);
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if rearm {
            self.autosave.arm(session.id(), now_ms);
        }
        let mut saved = session.document().clone();
        saved.content = persisted.to_string();
        saved.rendered_content = String::new();
        self.state.apply_saved(&saved);
    }

    fn discard_stale(
        &mut self,
        ticket: &SaveTicket,
        result: RepoResult<SaveResponse>,
    ) -> SaveOutcome {
        info!(
            "event=document_save module=service status=discard path={}",
            ticket.document.path
        );
        let success = match &result {
            Ok(response) => {
                // The store copy must follow what was persisted even though
                // the session it came from is gone.
                self.record_persisted(&ticket.document, &response.content);
                if response.created {
                    self.refresh();
                }
                true
            }
            Err(RepoError::Conflict(_)) => true,
            Err(_) => false,
        };
        let error = match result {
            Err(err) if !success => Some(err.to_string()),
            _ => None,
        };
        SaveOutcome {
            success,
            content: None,
            error,
            stale: true,
        }
    }

    fn record_persisted(&mut self, document: &DocumentRef, content: &str) {
        if document.kind != DocumentKind::Memory {
            return;
        }
        let mut saved = self
            .state
            .documents()
            .iter()
            .find(|doc| doc.path == document.path)
            .cloned()
            .unwrap_or_else(|| {
                let name = file_name(&document.path);
                Document::virtual_memory(&parent_path(&document.path), &name)
            });
        saved.content = content.to_string();
        saved.rendered_content = String::new();
        saved.exists = true;
        self.state.apply_saved(&saved);
    }
}

fn operation_label(operation: SaveOperation) -> &'static str {
    match operation {
        SaveOperation::Create => "create",
        SaveOperation::Update => "update",
    }
}
