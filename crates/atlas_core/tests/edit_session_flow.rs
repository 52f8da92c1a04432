use atlas_core::model::path::{display_parent, parent_path};
use atlas_core::{
    ControllerError, CreateResponse, DirectoryNode, DocsNode, Document, DocumentKind,
    DocumentRepository, EditMode, EngineLoad, RepoError, RepoResult, RichTextEngine, SaveBody,
    SaveDispatch, SaveStatus, SaveTrigger, Selection, SessionPhase, UpdateResponse,
    WorkspaceConfig, WorkspaceController,
};
use std::cell::RefCell;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Call {
    op: &'static str,
    path: String,
    content: String,
}

/// In-memory store that records every write and can fail the next one.
#[derive(Default)]
struct FakeRepo {
    memory: RefCell<BTreeMap<String, String>>,
    docs: RefCell<BTreeMap<String, String>>,
    docs_tree: RefCell<Option<DocsNode>>,
    calls: RefCell<Vec<Call>>,
    fail_next: RefCell<Option<RepoError>>,
}

impl FakeRepo {
    fn with_memory(paths: &[(&str, &str)]) -> Self {
        let repo = Self::default();
        for (path, content) in paths {
            repo.memory
                .borrow_mut()
                .insert((*path).to_string(), (*content).to_string());
        }
        repo
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, op: &'static str, path: &str, content: &str) {
        self.calls.borrow_mut().push(Call {
            op,
            path: path.to_string(),
            content: content.to_string(),
        });
    }

    fn store(&self, kind: DocumentKind) -> &RefCell<BTreeMap<String, String>> {
        match kind {
            DocumentKind::Memory => &self.memory,
            DocumentKind::Doc => &self.docs,
        }
    }
}

/// Stands in for server-side conversion: drops tags.
fn canonical(body: &SaveBody) -> String {
    if !body.is_markup {
        return body.content.clone();
    }
    let mut out = String::new();
    let mut in_tag = false;
    for ch in body.content.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

impl DocumentRepository for FakeRepo {
    fn fetch_tree(&self) -> RepoResult<DirectoryNode> {
        Ok(DirectoryNode::empty_root())
    }

    fn fetch_docs_tree(&self) -> RepoResult<Option<DocsNode>> {
        Ok(self.docs_tree.borrow().clone())
    }

    fn fetch_documents(&self) -> RepoResult<Vec<Document>> {
        Ok(self
            .memory
            .borrow()
            .iter()
            .map(|(path, content)| Document {
                kind: DocumentKind::Memory,
                path: path.clone(),
                content: content.clone(),
                rendered_content: String::new(),
                exists: true,
                parent_path: Some(display_parent(&parent_path(path))),
            })
            .collect())
    }

    fn fetch_document(&self, kind: DocumentKind, path: &str) -> RepoResult<Document> {
        let content = self
            .store(kind)
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(path.to_string()))?;
        Ok(Document {
            kind,
            path: path.to_string(),
            content,
            rendered_content: String::new(),
            exists: true,
            parent_path: None,
        })
    }

    fn create_document(
        &self,
        kind: DocumentKind,
        path: &str,
        body: &SaveBody,
    ) -> RepoResult<CreateResponse> {
        self.record("create", path, &body.content);
        if let Some(err) = self.fail_next.borrow_mut().take() {
            return Err(err);
        }
        if self.store(kind).borrow().contains_key(path) {
            return Err(RepoError::Conflict(path.to_string()));
        }
        let content = canonical(body);
        self.store(kind)
            .borrow_mut()
            .insert(path.to_string(), content.clone());
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
        self.record("update", path, &body.content);
        if let Some(err) = self.fail_next.borrow_mut().take() {
            return Err(err);
        }
        let content = canonical(body);
        self.store(kind)
            .borrow_mut()
            .insert(path.to_string(), content.clone());
        Ok(UpdateResponse { content })
    }

    fn delete_document(&self, kind: DocumentKind, path: &str) -> RepoResult<()> {
        self.record("delete", path, "");
        self.store(kind)
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RepoError::NotFound(path.to_string()))
    }

    fn fetch_recommendations(&self) -> RepoResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
struct RecordingEngine {
    loads: Vec<EngineLoad>,
    placeholder: String,
}

impl RichTextEngine for RecordingEngine {
    fn load_markup(&mut self, markup: &str) {
        self.loads.push(EngineLoad::Markup(markup.to_string()));
    }

    fn load_source(&mut self, source: &str) {
        self.loads.push(EngineLoad::Source(source.to_string()));
    }

    fn markup(&self) -> Option<String> {
        None
    }

    fn set_placeholder(&mut self, text: &str) {
        self.placeholder = text.to_string();
    }
}

fn controller(repo: &FakeRepo) -> WorkspaceController<&FakeRepo, RecordingEngine> {
    WorkspaceController::new(repo, RecordingEngine::default(), WorkspaceConfig::default())
}

fn open_path(controller: &WorkspaceController<&FakeRepo, RecordingEngine>) -> String {
    controller.session().unwrap().document().path.clone()
}

#[test]
fn typing_into_virtual_directory_creates_after_debounce() {
    let repo = FakeRepo::default();
    let mut controller = controller(&repo);
    controller.reload().unwrap();

    controller.select_directory("./src/utils/").unwrap();
    let session = controller.session().unwrap();
    assert_eq!(session.document().path, "src/utils/MEMORY.md");
    assert_eq!(session.document().parent_path.as_deref(), Some("src/utils"));
    assert!(!session.exists());
    assert_eq!(
        controller.engine().placeholder,
        "Start typing to create src/utils/MEMORY.md"
    );

    controller.edit_rendered("<p>x</p>", 100).unwrap();
    assert_eq!(controller.tick(599), None);
    let outcome = controller.tick(600).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.content.as_deref(), Some("x"));
    let calls = repo.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].op, "create");
    assert_eq!(calls[0].path, "src/utils/MEMORY.md");
    assert!(calls[0].content.contains('x'));

    let session = controller.session().unwrap();
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert!(session.exists());
    assert!(controller
        .state()
        .documents()
        .iter()
        .any(|doc| doc.path == "src/utils/MEMORY.md"));
}

#[test]
fn created_document_is_updated_on_next_save() {
    let repo = FakeRepo::default();
    let mut controller = controller(&repo);
    controller.select_directory("src").unwrap();

    controller.edit_rendered("<p>x</p>", 0).unwrap();
    assert!(controller.save(SaveTrigger::Manual, 10).success);
    controller.edit_rendered("<p>xy</p>", 20).unwrap();
    let outcome = controller.save(SaveTrigger::Manual, 30);

    assert!(outcome.success);
    assert_eq!(outcome.content.as_deref(), Some("xy"));
    let ops: Vec<&str> = repo.calls().iter().map(|call| call.op).collect();
    assert_eq!(ops, vec!["create", "update"]);
    assert_eq!(controller.status(40), SaveStatus::Saved);
}

#[test]
fn empty_virtual_document_is_never_created() {
    let repo = FakeRepo::default();
    let mut controller = controller(&repo);
    controller.select_directory("lib").unwrap();

    controller.edit_rendered("<p></p>", 0).unwrap();
    let manual = controller.save(SaveTrigger::Manual, 10);
    assert!(manual.success);
    assert_eq!(manual.content.as_deref(), Some(""));

    controller.edit_rendered("<p><br></p>", 20).unwrap();
    let autosave = controller.tick(1_000).unwrap();
    assert!(autosave.success);
    assert_eq!(autosave.content.as_deref(), Some(""));

    assert!(repo.calls().is_empty());
    assert!(!controller.session().unwrap().exists());
}

#[test]
fn create_conflict_switches_to_update() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "# server copy")]);
    let mut controller = controller(&repo);
    controller.select_directory("src").unwrap();
    assert!(!controller.session().unwrap().exists());

    controller.edit_rendered("<p>hi</p>", 0).unwrap();
    let outcome = controller.save(SaveTrigger::Manual, 10);
    assert!(outcome.success);
    assert_eq!(outcome.error, None);
    let session = controller.session().unwrap();
    assert!(session.exists());
    assert_eq!(session.phase(), SessionPhase::Idle);

    controller.edit_rendered("<p>hi!</p>", 20).unwrap();
    controller.save(SaveTrigger::Manual, 30);
    let ops: Vec<&str> = repo.calls().iter().map(|call| call.op).collect();
    assert_eq!(ops, vec!["create", "update"]);
}

#[test]
fn late_save_result_does_not_touch_newer_session() {
    let repo = FakeRepo::default();
    let mut controller = controller(&repo);
    controller.select_directory("a").unwrap();
    controller.edit_rendered("<p>for a</p>", 0).unwrap();

    let SaveDispatch::Started(pending) = controller.request_save(SaveTrigger::Manual) else {
        panic!("save should dispatch");
    };
    controller.select_directory("b").unwrap();
    controller.edit_rendered("<p>for b</p>", 10).unwrap();

    let result = controller.run_save(&pending);
    let outcome = controller.complete_save(&pending.ticket, result, 20);
    assert!(outcome.stale);
    assert_eq!(outcome.content, None);

    let session = controller.session().unwrap();
    assert_eq!(session.document().path, "b/MEMORY.md");
    assert_eq!(session.phase(), SessionPhase::Dirty);
    assert_eq!(session.rendered(), "<p>for b</p>");
    assert_eq!(session.source(), "");
    assert!(!session.exists());
    assert!(controller
        .state()
        .documents()
        .iter()
        .any(|doc| doc.path == "a/MEMORY.md"));
}

#[test]
fn save_is_refused_while_one_is_in_flight() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "a")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();
    controller.select_directory("src").unwrap();
    controller.edit_rendered("<p>b</p>", 0).unwrap();

    let SaveDispatch::Started(_pending) = controller.request_save(SaveTrigger::Manual) else {
        panic!("first save should dispatch");
    };
    let SaveDispatch::Finished(second) = controller.request_save(SaveTrigger::Manual) else {
        panic!("second save must not dispatch");
    };
    assert!(!second.success);
    assert_eq!(controller.status(0), SaveStatus::Saving);
}

#[test]
fn dirty_toggle_saves_exactly_once_before_switching() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "src")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();
    controller.select_directory("src").unwrap();
    assert_eq!(controller.session().unwrap().mode(), EditMode::Rendered);

    controller
        .edit_rendered("<h1>src</h1><p>more</p>", 0)
        .unwrap();
    let outcome = controller.toggle_mode(10);

    assert!(outcome.success);
    let calls = repo.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].op, "update");
    assert_eq!(calls[0].content, "<h1>src</h1><p>more</p>");
    let session = controller.session().unwrap();
    assert_eq!(session.mode(), EditMode::Source);
    assert_eq!(session.source(), "srcmore");
    assert_eq!(controller.autosave_deadline_ms(), None);

    let back = controller.toggle_mode(20);
    assert!(back.success);
    assert_eq!(repo.calls().len(), 1);
    assert_eq!(controller.session().unwrap().mode(), EditMode::Rendered);
    assert_eq!(
        controller.engine().loads.last(),
        Some(&EngineLoad::Source("srcmore".to_string()))
    );
}

#[test]
fn failed_mode_switch_save_keeps_current_mode() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "src")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();
    controller.select_directory("src").unwrap();
    controller.edit_rendered("<p>changed</p>", 0).unwrap();
    *repo.fail_next.borrow_mut() = Some(RepoError::Transport("status 502".to_string()));

    let outcome = controller.toggle_mode(10);
    assert!(!outcome.success);
    let session = controller.session().unwrap();
    assert_eq!(session.mode(), EditMode::Rendered);
    assert_eq!(session.phase(), SessionPhase::Dirty);
    assert_eq!(session.pending_mode(), None);
}

#[test]
fn failed_save_keeps_edits_and_shows_error_for_a_window() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "a")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();
    controller.select_directory("src").unwrap();
    controller.edit_rendered("<p>y</p>", 0).unwrap();
    *repo.fail_next.borrow_mut() = Some(RepoError::Transport("connection reset".to_string()));

    let outcome = controller.tick(500).unwrap();
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("connection reset"));
    assert_eq!(controller.status(600), SaveStatus::Error);
    assert_eq!(controller.session().unwrap().rendered(), "<p>y</p>");
    assert_eq!(controller.status(3_500), SaveStatus::Unsaved);

    assert_eq!(controller.tick(5_000), None);
    assert!(controller.session().unwrap().error().is_none());

    controller.edit_rendered("<p>yz</p>", 6_000).unwrap();
    let retried = controller.tick(6_500).unwrap();
    assert!(retried.success);
    assert_eq!(repo.calls().len(), 2);
}

#[test]
fn edits_during_save_are_persisted_by_the_next_autosave() {
    let repo = FakeRepo::with_memory(&[("n/MEMORY.md", "zero")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();
    controller.select_directory("n").unwrap();
    controller.toggle_mode(0);
    assert_eq!(controller.session().unwrap().mode(), EditMode::Source);

    controller.edit_source("one", 0).unwrap();
    let SaveDispatch::Started(pending) = controller.request_save(SaveTrigger::Manual) else {
        panic!("save should dispatch");
    };
    controller.edit_source("two", 10).unwrap();
    let result = controller.run_save(&pending);
    let outcome = controller.complete_save(&pending.ticket, result, 20);

    assert!(outcome.success);
    let session = controller.session().unwrap();
    assert_eq!(session.source(), "two");
    assert_eq!(session.phase(), SessionPhase::Dirty);
    assert_eq!(controller.autosave_deadline_ms(), Some(520));

    controller.tick(520).unwrap();
    let contents: Vec<String> = repo.calls().into_iter().map(|call| call.content).collect();
    assert_eq!(contents, vec!["one".to_string(), "two".to_string()]);
}

#[test]
fn autosave_waits_for_a_quiet_period() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "a")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();
    controller.select_directory("src").unwrap();

    controller.edit_rendered("<p>a1</p>", 0).unwrap();
    controller.edit_rendered("<p>a12</p>", 300).unwrap();
    assert_eq!(controller.tick(500), None);
    assert!(controller.tick(800).unwrap().success);
    assert_eq!(repo.calls().len(), 1);
    assert_eq!(controller.tick(2_000), None);
}

#[test]
fn selecting_another_document_cancels_pending_autosave() {
    let repo = FakeRepo::with_memory(&[("a/MEMORY.md", "a")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();
    controller.select_directory("a").unwrap();
    controller.edit_rendered("<p>unsaved</p>", 0).unwrap();

    controller.select_directory("b").unwrap();
    assert_eq!(controller.autosave_deadline_ms(), None);
    assert_eq!(controller.tick(10_000), None);
    assert!(repo.calls().is_empty());
}

#[test]
fn selecting_same_directory_twice_resolves_same_path() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "a")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();

    controller.select_directory("src").unwrap();
    let first = open_path(&controller);
    let first_id = controller.session().unwrap().id();
    controller.select_directory("./src").unwrap();

    assert_eq!(open_path(&controller), first);
    assert!(controller.session().unwrap().exists());
    assert_ne!(controller.session().unwrap().id(), first_id);
}

#[test]
fn deleting_open_document_clears_selection_and_refreshes() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "a"), ("lib/MEMORY.md", "b")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();
    controller.select_directory("src").unwrap();

    controller.delete_memory("lib/MEMORY.md").unwrap();
    assert_eq!(open_path(&controller), "src/MEMORY.md");
    assert_eq!(controller.state().documents().len(), 1);

    controller.delete_memory("src/MEMORY.md").unwrap();
    assert!(controller.session().is_none());
    assert_eq!(controller.state().selected(), None);
    assert!(controller.state().documents().is_empty());

    let err = controller.delete_memory("src/MEMORY.md").unwrap_err();
    assert!(matches!(err, ControllerError::Repo(RepoError::NotFound(_))));
}

#[test]
fn docs_selection_fetches_files_only() {
    let repo = FakeRepo::default();
    repo.docs
        .borrow_mut()
        .insert("guide/intro.md".to_string(), "# Intro".to_string());
    *repo.docs_tree.borrow_mut() = Some(DocsNode {
        path: ".".to_string(),
        name: "docs".to_string(),
        is_file: false,
        children: vec![DocsNode {
            path: "guide".to_string(),
            name: "guide".to_string(),
            is_file: false,
            children: vec![DocsNode {
                path: "guide/intro.md".to_string(),
                name: "intro".to_string(),
                is_file: true,
                children: Vec::new(),
            }],
        }],
    });
    let mut controller = controller(&repo);
    controller.reload().unwrap();

    let err = controller.select_doc("guide").unwrap_err();
    assert!(matches!(err, ControllerError::NotAFile(path) if path == "guide"));
    let err = controller.select_doc("guide/missing.md").unwrap_err();
    assert!(matches!(err, ControllerError::Repo(RepoError::NotFound(_))));
    assert!(controller.session().is_none());

    controller.select_doc("guide/intro.md").unwrap();
    let session = controller.session().unwrap();
    assert_eq!(session.document().kind, DocumentKind::Doc);
    assert_eq!(session.source(), "# Intro");
    assert_eq!(
        controller.state().selected(),
        Some(&Selection::Doc("guide/intro.md".to_string()))
    );
    assert_eq!(
        controller.engine().loads.last(),
        Some(&EngineLoad::Source("# Intro".to_string()))
    );
}

#[test]
fn create_doc_adds_extension_and_opens_existing_on_conflict() {
    let repo = FakeRepo::default();
    let mut controller = controller(&repo);

    let path = controller.create_doc("notes/todo").unwrap();
    assert_eq!(path, "notes/todo.md");
    assert_eq!(open_path(&controller), "notes/todo.md");
    assert_eq!(controller.session().unwrap().source(), "# todo\n");

    controller.close();
    let again = controller.create_doc("notes/todo.md").unwrap();
    assert_eq!(again, "notes/todo.md");
    assert_eq!(open_path(&controller), "notes/todo.md");
    let ops: Vec<&str> = repo.calls().iter().map(|call| call.op).collect();
    assert_eq!(ops, vec!["create", "create"]);

    let err = controller.create_doc("../outside").unwrap_err();
    assert!(matches!(err, ControllerError::Repo(RepoError::Validation(_))));
}

#[test]
fn reload_replaces_the_open_session() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "old")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();
    controller.select_directory("src").unwrap();
    let before = controller.session().unwrap().id();

    repo.memory
        .borrow_mut()
        .insert("src/MEMORY.md".to_string(), "new".to_string());
    controller.reload().unwrap();

    let session = controller.session().unwrap();
    assert_ne!(session.id(), before);
    assert_eq!(session.source(), "new");
}

#[test]
fn operations_without_session_are_rejected() {
    let repo = FakeRepo::default();
    let mut controller = controller(&repo);

    assert!(matches!(
        controller.edit_rendered("<p>x</p>", 0),
        Err(ControllerError::NoSession)
    ));
    assert!(!controller.save(SaveTrigger::Manual, 0).success);
    assert_eq!(controller.status(0), SaveStatus::Idle);
    assert_eq!(controller.placeholder(), None);
}

#[test]
fn late_update_still_reaches_the_store_copy() {
    let repo = FakeRepo::with_memory(&[("a/MEMORY.md", "old")]);
    let mut controller = controller(&repo);
    controller.reload().unwrap();
    controller.select_directory("a").unwrap();
    controller.toggle_mode(0);
    controller.edit_source("new", 0).unwrap();

    let SaveDispatch::Started(pending) = controller.request_save(SaveTrigger::Manual) else {
        panic!("save should dispatch");
    };
    controller.select_directory("b").unwrap();
    let result = controller.run_save(&pending);
    let outcome = controller.complete_save(&pending.ticket, result, 10);
    assert!(outcome.stale);
    assert!(outcome.success);
    assert_eq!(open_path(&controller), "b/MEMORY.md");
    assert!(!controller.session().unwrap().is_dirty());

    controller.select_directory("a").unwrap();
    assert_eq!(controller.session().unwrap().source(), "new");

    controller.edit_source("new + more", 20).unwrap();
    assert!(controller.save(SaveTrigger::Manual, 30).success);
    assert_eq!(
        repo.memory.borrow().get("a/MEMORY.md").map(String::as_str),
        Some("new + more")
    );
}

fn source_session(repo: &FakeRepo) -> WorkspaceController<&FakeRepo, RecordingEngine> {
    let mut controller = controller(repo);
    controller.reload().unwrap();
    controller.select_directory("src").unwrap();
    controller.toggle_mode(0);
    assert_eq!(controller.session().unwrap().mode(), EditMode::Source);
    controller
}

#[test]
fn toggle_during_save_lands_when_the_save_succeeds() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "# a")]);
    let mut controller = source_session(&repo);
    controller.edit_source("# b", 0).unwrap();

    let SaveDispatch::Started(pending) = controller.request_save(SaveTrigger::Manual) else {
        panic!("save should dispatch");
    };
    let SaveDispatch::Finished(deferred) = controller.begin_mode_switch(EditMode::Rendered)
    else {
        panic!("switch must wait for the running save");
    };
    assert!(deferred.success);
    let session = controller.session().unwrap();
    assert_eq!(session.mode(), EditMode::Source);
    assert_eq!(session.pending_mode(), Some(EditMode::Rendered));
    let loads_before = controller.engine().loads.len();

    let result = controller.run_save(&pending);
    assert!(controller.complete_save(&pending.ticket, result, 10).success);

    let session = controller.session().unwrap();
    assert_eq!(session.mode(), EditMode::Rendered);
    assert_eq!(session.pending_mode(), None);
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(controller.preferred_mode(), EditMode::Rendered);
    assert_eq!(controller.engine().loads.len(), loads_before + 1);
    assert_eq!(
        controller.engine().loads.last(),
        Some(&EngineLoad::Source("# b".to_string()))
    );
    assert_eq!(repo.calls().len(), 1);
}

#[test]
fn toggle_during_save_is_dropped_when_the_save_fails() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "# a")]);
    let mut controller = source_session(&repo);
    controller.edit_source("# b", 0).unwrap();

    let SaveDispatch::Started(pending) = controller.request_save(SaveTrigger::Manual) else {
        panic!("save should dispatch");
    };
    controller.begin_mode_switch(EditMode::Rendered);
    let loads_before = controller.engine().loads.len();
    *repo.fail_next.borrow_mut() = Some(RepoError::Transport("status 503".to_string()));

    let result = controller.run_save(&pending);
    assert!(!controller.complete_save(&pending.ticket, result, 10).success);

    let session = controller.session().unwrap();
    assert_eq!(session.mode(), EditMode::Source);
    assert_eq!(session.pending_mode(), None);
    assert_eq!(session.phase(), SessionPhase::Dirty);
    assert_eq!(session.source(), "# b");
    assert_eq!(controller.preferred_mode(), EditMode::Source);
    assert_eq!(controller.engine().loads.len(), loads_before);
    assert_eq!(controller.status(20), SaveStatus::Error);
}

#[test]
fn toggle_during_save_waits_for_edits_made_meanwhile() {
    let repo = FakeRepo::with_memory(&[("src/MEMORY.md", "zero")]);
    let mut controller = source_session(&repo);
    controller.edit_source("one", 0).unwrap();

    let SaveDispatch::Started(pending) = controller.request_save(SaveTrigger::Manual) else {
        panic!("save should dispatch");
    };
    controller.begin_mode_switch(EditMode::Rendered);
    controller.edit_source("two", 10).unwrap();
    let loads_before = controller.engine().loads.len();

    let result = controller.run_save(&pending);
    assert!(controller.complete_save(&pending.ticket, result, 20).success);

    let session = controller.session().unwrap();
    assert_eq!(session.mode(), EditMode::Source);
    assert_eq!(session.pending_mode(), Some(EditMode::Rendered));
    assert_eq!(session.phase(), SessionPhase::Dirty);
    assert_eq!(session.source(), "two");
    assert_eq!(controller.autosave_deadline_ms(), Some(520));
    assert_eq!(controller.engine().loads.len(), loads_before);

    assert!(controller.tick(520).unwrap().success);
    let session = controller.session().unwrap();
    assert_eq!(session.mode(), EditMode::Rendered);
    assert_eq!(session.pending_mode(), None);
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(
        controller.engine().loads.last(),
        Some(&EngineLoad::Source("two".to_string()))
    );
    let contents: Vec<String> = repo.calls().into_iter().map(|call| call.content).collect();
    assert_eq!(contents, vec!["one".to_string(), "two".to_string()]);
}
