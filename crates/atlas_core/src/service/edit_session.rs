//! Edit session state machine for one open document.
//!
//! # Responsibility
//! - Track `idle → dirty → saving → idle|dirty+error` for the open document.
//! - Build save payloads and apply save results to the local representation.
//! - Sequence mode switches behind a forced save.
//!
//! # Invariants
//! - At most one save in flight; `begin_save` refuses while saving.
//! - Failed saves never discard edits; the session returns to dirty.
//! - A virtual document with blank content is never sent to the store.
//! - A successful save flips `exists` so later saves use update.

use crate::model::document::{Document, DocumentRef};
use crate::repo::document_repo::{RepoError, RepoResult, SaveBody};
use crate::service::content_reconciler::{ContentReconciler, EditMode, EngineLoad};
use uuid::Uuid;

/// Identity of one session instance. A reopened document gets a new id.
pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Dirty,
    Saving,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dirty => "dirty",
            Self::Saving => "saving",
        }
    }
}

/// What asked for the save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Manual,
    Autosave,
    ModeSwitch,
}

impl SaveTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Autosave => "autosave",
            Self::ModeSwitch => "mode_switch",
        }
    }
}

/// Store operation a save maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOperation {
    Create,
    Update,
}

/// Identity a save result must match to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    pub session_id: SessionId,
    pub document: DocumentRef,
}

/// One save ready to be sent to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub ticket: SaveTicket,
    pub operation: SaveOperation,
    pub body: SaveBody,
    pub trigger: SaveTrigger,
}

/// Answer to `begin_save`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveRequest {
    /// Session moved to saving; send this to the store.
    Dispatch(PendingSave),
    /// Blank virtual document; nothing to persist.
    Suppressed,
    /// No unsaved changes.
    NotDirty,
    /// Another save is still outstanding.
    InFlight,
}

/// Normalized store answer for create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResponse {
    pub content: String,
    pub created: bool,
}

/// Transient save failure shown until `visible_until_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveError {
    pub message: String,
    pub visible_until_ms: i64,
}

/// Effect of applying a save result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveCompletion {
    Saved {
        content: String,
        created: bool,
        /// Edits arrived while saving; the caller should re-arm autosave.
        rearm: bool,
        engine_load: Option<EngineLoad>,
    },
    /// Create hit an existing record. Treated as success without creation.
    AlreadyExisted {
        rearm: bool,
        engine_load: Option<EngineLoad>,
    },
    Failed {
        message: String,
    },
}

/// Answer to `request_mode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeRequest {
    Unchanged,
    /// Switched now; reload the engine when a load is given.
    Switched(Option<EngineLoad>),
    /// Dirty; a save must run first and the switch lands on its completion.
    NeedsSave,
    /// A save is in flight; the switch lands on its completion.
    Deferred,
}

/// Status shown next to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Unsaved,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Unsaved => "unsaved",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditSession {
    id: SessionId,
    document: Document,
    reconciler: ContentReconciler,
    phase: SessionPhase,
    edited_during_save: bool,
    last_saved_at_ms: Option<i64>,
    error: Option<SaveError>,
    pending_mode: Option<EditMode>,
}

impl EditSession {
    /// Opens `document` in `mode` and returns the initial engine load.
    pub fn open(document: Document, mode: EditMode) -> (Self, EngineLoad) {
        let (reconciler, load) = ContentReconciler::load(&document, mode);
        let session = Self {
            id: Uuid::new_v4(),
            document,
            reconciler,
            phase: SessionPhase::Idle,
            edited_during_save: false,
            last_saved_at_ms: None,
            error: None,
            pending_mode: None,
        };
        (session, load)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn reference(&self) -> DocumentRef {
        self.document.reference()
    }

    pub fn exists(&self) -> bool {
        self.document.exists
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_dirty(&self) -> bool {
        self.phase == SessionPhase::Dirty
    }

    pub fn is_saving(&self) -> bool {
        self.phase == SessionPhase::Saving
    }

    pub fn mode(&self) -> EditMode {
        self.reconciler.mode()
    }

    pub fn pending_mode(&self) -> Option<EditMode> {
        self.pending_mode
    }

    pub fn source(&self) -> &str {
        self.reconciler.source()
    }

    pub fn rendered(&self) -> &str {
        self.reconciler.rendered()
    }

    pub fn last_saved_at_ms(&self) -> Option<i64> {
        self.last_saved_at_ms
    }

    pub fn error(&self) -> Option<&SaveError> {
        self.error.as_ref()
    }

    /// Editor prompt; names the target path for virtual documents.
    pub fn placeholder(&self) -> String {
        if self.document.is_virtual() {
            format!("Start typing to create {}", self.document.path)
        } else {
            "Start typing...".to_string()
        }
    }

    /// Rendered-surface change. Ignored while the source surface is active.
    pub fn edit_rendered(&mut self, markup: impl Into<String>) -> bool {
        if self.mode() != EditMode::Rendered {
            return false;
        }
        self.reconciler.edit_rendered(markup);
        self.mark_edited();
        true
    }

    /// Source-surface change. Ignored while the rendered surface is active.
    pub fn edit_source(&mut self, text: impl Into<String>) -> bool {
        if self.mode() != EditMode::Source {
            return false;
        }
        self.reconciler.edit_source(text);
        self.mark_edited();
        true
    }

    /// Markup the engine produced after a programmatic load. Not an edit.
    pub fn engine_synced(&mut self, markup: impl Into<String>) {
        self.reconciler.engine_synced(markup);
    }

    /// Whether a save right now would be suppressed.
    pub fn is_blank_virtual(&self) -> bool {
        self.document.is_virtual() && self.reconciler.is_blank()
    }

    pub fn begin_save(&mut self, trigger: SaveTrigger) -> SaveRequest {
        if self.phase == SessionPhase::Saving {
            return SaveRequest::InFlight;
        }
        if self.is_blank_virtual() {
            self.phase = SessionPhase::Idle;
            return SaveRequest::Suppressed;
        }
        if self.phase != SessionPhase::Dirty {
            return SaveRequest::NotDirty;
        }

        self.phase = SessionPhase::Saving;
        self.edited_during_save = false;
        self.error = None;
        let operation = if self.document.exists {
            SaveOperation::Update
        } else {
            SaveOperation::Create
        };
        SaveRequest::Dispatch(PendingSave {
            ticket: SaveTicket {
                session_id: self.id,
                document: self.document.reference(),
            },
            operation,
            body: self.reconciler.save_body(),
            trigger,
        })
    }

    /// Applies the store answer for the in-flight save.
    pub fn complete_save(
        &mut self,
        result: RepoResult<SaveResponse>,
        now_ms: i64,
        error_display_ms: i64,
    ) -> SaveCompletion {
        let edited = std::mem::take(&mut self.edited_during_save);
        match result {
            Ok(response) => {
                self.document.exists = true;
                self.last_saved_at_ms = Some(now_ms);
                self.error = None;
                // Newer source edits win over the canonical form of older ones.
                if self.mode() == EditMode::Rendered || !edited {
                    self.reconciler.apply_saved(response.content.clone());
                    self.document.content = response.content.clone();
                }
                let engine_load = self.settle(edited);
                SaveCompletion::Saved {
                    content: response.content,
                    created: response.created,
                    rearm: edited,
                    engine_load,
                }
            }
            Err(RepoError::Conflict(_)) => {
                self.document.exists = true;
                self.error = None;
                let engine_load = self.settle(edited);
                SaveCompletion::AlreadyExisted {
                    rearm: edited,
                    engine_load,
                }
            }
            Err(err) => {
                let message = err.to_string();
                self.phase = SessionPhase::Dirty;
                self.pending_mode = None;
                self.error = Some(SaveError {
                    message: message.clone(),
                    visible_until_ms: now_ms.saturating_add(error_display_ms),
                });
                SaveCompletion::Failed { message }
            }
        }
    }

    pub fn request_mode(&mut self, target: EditMode) -> ModeRequest {
        if self.mode() == target {
            self.pending_mode = None;
            return ModeRequest::Unchanged;
        }
        match self.phase {
            SessionPhase::Saving => {
                self.pending_mode = Some(target);
                ModeRequest::Deferred
            }
            SessionPhase::Dirty if self.is_blank_virtual() => {
                self.phase = SessionPhase::Idle;
                ModeRequest::Switched(self.reconciler.switch_mode(target))
            }
            SessionPhase::Dirty => {
                self.pending_mode = Some(target);
                ModeRequest::NeedsSave
            }
            SessionPhase::Idle => ModeRequest::Switched(self.reconciler.switch_mode(target)),
        }
    }

    /// Drops a mode switch whose save could not be dispatched.
    pub fn abort_mode_switch(&mut self) {
        self.pending_mode = None;
    }

    /// Applies a pending mode switch without a save. Used when the save
    /// request found nothing to persist.
    pub fn force_pending_mode(&mut self) -> Option<EngineLoad> {
        let target = self.pending_mode.take()?;
        self.reconciler.switch_mode(target)
    }

    /// Clears the error once its display window has passed.
    pub fn clear_expired_error(&mut self, now_ms: i64) -> bool {
        match &self.error {
            Some(error) if now_ms >= error.visible_until_ms => {
                self.error = None;
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, now_ms: i64) -> SaveStatus {
        if self.phase == SessionPhase::Saving {
            return SaveStatus::Saving;
        }
        if self
            .error
            .as_ref()
            .is_some_and(|error| now_ms < error.visible_until_ms)
        {
            return SaveStatus::Error;
        }
        if self.phase == SessionPhase::Dirty {
            return SaveStatus::Unsaved;
        }
        if self.last_saved_at_ms.is_some() {
            SaveStatus::Saved
        } else {
            SaveStatus::Idle
        }
    }

    fn mark_edited(&mut self) {
        match self.phase {
            SessionPhase::Idle => self.phase = SessionPhase::Dirty,
            SessionPhase::Dirty => {}
            SessionPhase::Saving => self.edited_during_save = true,
        }
    }

    /// Leaves saving. A pending mode lands only when nothing is left unsaved.
    fn settle(&mut self, edited: bool) -> Option<EngineLoad> {
        if edited {
            self.phase = SessionPhase::Dirty;
            return None;
        }
        self.phase = SessionPhase::Idle;
        let target = self.pending_mode.take()?;
        self.reconciler.switch_mode(target)
    }
}
