//! Keeps the rendered-markup and raw-source representations of one body.
//!
//! # Responsibility
//! - Decide which representation seeds the rendering engine on load.
//! - Track edits per mode and produce the save payload for the active mode.
//! - Re-seed the engine from source when switching back to rendered mode.
//!
//! # Invariants
//! - Conversion is one-directional: source → rendered happens inside the
//!   engine on load/mode-switch-in; rendered → source only via the canonical
//!   markdown returned by a save.
//! - Rendered edits never touch the source representation.

use crate::model::document::Document;
use crate::repo::document_repo::SaveBody;
use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Active editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Rich-text surface driven by the rendering engine.
    Rendered,
    /// Raw markdown textarea.
    Source,
}

impl EditMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Rendered => Self::Source,
            Self::Source => Self::Rendered,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rendered => "rendered",
            Self::Source => "source",
        }
    }
}

/// Instruction for the rendering engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLoad {
    /// Replace the engine content with ready markup.
    Markup(String),
    /// Re-initialize the engine from markdown; the engine converts.
    Source(String),
}

/// Opaque rich-text capability: consumes/produces markup, supports
/// programmatic replacement, and reports user edits to its host.
pub trait RichTextEngine {
    fn load_markup(&mut self, markup: &str);
    fn load_source(&mut self, source: &str);
    /// Current markup, when the engine can answer synchronously.
    fn markup(&self) -> Option<String>;
    fn set_placeholder(&mut self, text: &str);
}

/// Engine stand-in for hosts that render on their own side.
///
/// Records the latest instruction so the host can pull and apply it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadlessEngine {
    pending: Option<EngineLoad>,
    markup: Option<String>,
    placeholder: String,
}

impl HeadlessEngine {
    pub fn take_pending(&mut self) -> Option<EngineLoad> {
        self.pending.take()
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }
}

impl RichTextEngine for HeadlessEngine {
    fn load_markup(&mut self, markup: &str) {
        self.markup = Some(markup.to_string());
        self.pending = Some(EngineLoad::Markup(markup.to_string()));
    }

    fn load_source(&mut self, source: &str) {
        self.markup = None;
        self.pending = Some(EngineLoad::Source(source.to_string()));
    }

    fn markup(&self) -> Option<String> {
        self.markup.clone()
    }

    fn set_placeholder(&mut self, text: &str) {
        self.placeholder = text.to_string();
    }
}

/// Dual representation of one document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReconciler {
    source: String,
    rendered: String,
    mode: EditMode,
}

impl ContentReconciler {
    /// Seeds both representations from a loaded document.
    ///
    /// Existing markup is what the engine receives; otherwise the engine is
    /// initialized from source.
    pub fn load(document: &Document, mode: EditMode) -> (Self, EngineLoad) {
        let load = if document.rendered_content.is_empty() {
            EngineLoad::Source(document.content.clone())
        } else {
            EngineLoad::Markup(document.rendered_content.clone())
        };
        let reconciler = Self {
            source: document.content.clone(),
            rendered: document.rendered_content.clone(),
            mode,
        };
        (reconciler, load)
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    pub fn edit_rendered(&mut self, markup: impl Into<String>) {
        self.rendered = markup.into();
    }

    pub fn edit_source(&mut self, text: impl Into<String>) {
        self.source = text.into();
    }

    /// Records markup the engine produced from a source load. Not an edit.
    pub fn engine_synced(&mut self, markup: impl Into<String>) {
        self.rendered = markup.into();
    }

    /// Payload for the active mode.
    pub fn save_body(&self) -> SaveBody {
        match self.mode {
            EditMode::Rendered => SaveBody::markup(self.rendered.clone()),
            EditMode::Source => SaveBody::source(self.source.clone()),
        }
    }

    /// Whether the active representation has no visible text.
    pub fn is_blank(&self) -> bool {
        match self.mode {
            EditMode::Rendered => markup_is_blank(&self.rendered),
            EditMode::Source => self.source.trim().is_empty(),
        }
    }

    /// Adopts canonical markdown returned by a save.
    pub fn apply_saved(&mut self, canonical: impl Into<String>) {
        self.source = canonical.into();
    }

    /// Switches mode. Entering rendered mode re-seeds the engine from source.
    pub fn switch_mode(&mut self, target: EditMode) -> Option<EngineLoad> {
        if self.mode == target {
            return None;
        }
        self.mode = target;
        match target {
            EditMode::Rendered => Some(EngineLoad::Source(self.source.clone())),
            EditMode::Source => None,
        }
    }
}

fn markup_is_blank(markup: &str) -> bool {
    TAG_RE
        .replace_all(markup, "")
        .replace("&nbsp;", " ")
        .trim()
        .is_empty()
}
