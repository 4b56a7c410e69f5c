//! End-to-end lifecycle tests over in-memory tracker/generator fakes and a
//! real JSON run store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hatch_ai::{GeneratorError, IssueDraft, IssueGenerator};
use hatch_engine::{
    BotSettings, EngineError, JsonRunStore, Orchestrator, RollbackTarget, RunStatus, RunStore,
    SpawnedIssueStatus, TriggerOutcome,
};
use hatch_github::{IssueComment, IssueTracker, NewIssue, RepoRef, TrackerError, TrackerIssue};

struct ScriptedTracker {
    fail_close_numbers: Vec<u64>,
    created: Mutex<Vec<NewIssue>>,
    comments: Mutex<Vec<String>>,
    next_number: Mutex<u64>,
}

impl ScriptedTracker {
    fn new() -> Self {
        Self {
            fail_close_numbers: Vec::new(),
            created: Mutex::new(Vec::new()),
            comments: Mutex::new(Vec::new()),
            next_number: Mutex::new(200),
        }
    }

    fn comments(&self) -> Vec<String> {
        self.comments.lock().expect("comments lock").clone()
    }
}

#[async_trait]
impl IssueTracker for ScriptedTracker {
    async fn get_issue(&self, _repo: &RepoRef, number: u64) -> Result<TrackerIssue, TrackerError> {
        Ok(TrackerIssue {
            number,
            title: "control".to_string(),
            body: None,
            html_url: format!("https://example.com/issues/{number}"),
            state: Some("open".to_string()),
            pull_request: None,
        })
    }

    async fn create_issue(
        &self,
        _repo: &RepoRef,
        issue: &NewIssue,
    ) -> Result<TrackerIssue, TrackerError> {
        let mut next = self.next_number.lock().expect("number lock");
        *next += 1;
        let number = *next;
        self.created.lock().expect("created lock").push(issue.clone());
        Ok(TrackerIssue {
            number,
            title: issue.title.clone(),
            body: Some(issue.body.clone()),
            html_url: format!("https://example.com/issues/{number}"),
            state: Some("open".to_string()),
            pull_request: None,
        })
    }

    async fn create_comment(
        &self,
        _repo: &RepoRef,
        _issue_number: u64,
        body: &str,
    ) -> Result<IssueComment, TrackerError> {
        self.comments.lock().expect("comments lock").push(body.to_string());
        Ok(IssueComment { id: 1, html_url: None })
    }

    async fn close_issue(
        &self,
        repo: &RepoRef,
        issue_number: u64,
    ) -> Result<TrackerIssue, TrackerError> {
        if self.fail_close_numbers.contains(&issue_number) {
            return Err(TrackerError::Status {
                status: 500,
                body: "close failed".to_string(),
            });
        }
        self.get_issue(repo, issue_number).await
    }

    async fn list_open_issues(&self, _repo: &RepoRef) -> Result<Vec<TrackerIssue>, TrackerError> {
        Ok(Vec::new())
    }

    async fn validate_repository_access(&self, _repo: &RepoRef) -> Result<bool, TrackerError> {
        Ok(true)
    }
}

struct TitledGenerator {
    titles: Vec<&'static str>,
}

#[async_trait]
impl IssueGenerator for TitledGenerator {
    fn name(&self) -> &'static str {
        "titled"
    }

    async fn generate(
        &self,
        template: &str,
        _components: &[String],
        count: Option<u32>,
    ) -> Result<Vec<IssueDraft>, GeneratorError> {
        let count = count.map(|value| value as usize).unwrap_or(self.titles.len());
        Ok(self
            .titles
            .iter()
            .take(count)
            .map(|title| IssueDraft {
                title: title.to_string(),
                body: format!("{title}: {template}"),
            })
            .collect())
    }
}

struct World {
    tracker: Arc<ScriptedTracker>,
    store: Arc<JsonRunStore>,
    orchestrator: Orchestrator,
    _tempdir: tempfile::TempDir,
}

fn world(tracker: ScriptedTracker, titles: Vec<&'static str>) -> World {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(JsonRunStore::load(tempdir.path().join("state.json")).expect("store"));
    let tracker = Arc::new(tracker);
    let settings = BotSettings {
        rate_limit_per_minute: 60_000,
        ..BotSettings::default()
    };
    let orchestrator = Orchestrator::new(
        tracker.clone(),
        Arc::new(TitledGenerator { titles }),
        store.clone(),
        settings,
    );
    World {
        tracker,
        store,
        orchestrator,
        _tempdir: tempdir,
    }
}

fn repo() -> RepoRef {
    RepoRef::parse("acme/widgets").expect("repo")
}

const DRY_RUN_BODY: &str = "@hatch-bot\ncount: 2\ndry_run: true\nrate_limit_per_minute: 60000\ntemplate: build the widget";

#[tokio::test]
async fn integration_dry_run_confirm_lifecycle_creates_issues_once() {
    let world = world(ScriptedTracker::new(), vec!["Task A", "Task B"]);

    // Dry run: preview comment, no issues, run pending.
    let preview = world
        .orchestrator
        .dispatch_comment(&repo(), 7, DRY_RUN_BODY)
        .await
        .expect("dispatch trigger");
    let hatch_engine::DispatchOutcome::Triggered(TriggerOutcome::DryRunPreview {
        run_id: pending_id,
        planned,
    }) = preview
    else {
        panic!("expected dry-run preview, got {preview:?}");
    };
    assert_eq!(planned, Some(2));
    assert!(world.tracker.created.lock().expect("created").is_empty());

    // Confirm via comment command: stored snapshot, dry_run forced off.
    let confirmed = world
        .orchestrator
        .dispatch_comment(&repo(), 7, "@hatch-bot confirm")
        .await
        .expect("dispatch confirm");
    let hatch_engine::DispatchOutcome::Confirmed(TriggerOutcome::Completed {
        run_id: real_id,
        created,
        errors,
    }) = confirmed
    else {
        panic!("expected completed run, got {confirmed:?}");
    };
    assert_eq!(created, 2);
    assert_eq!(errors, 0);
    assert_ne!(real_id, pending_id);

    let superseded = world
        .store
        .find_run(&pending_id)
        .expect("find")
        .expect("pending run");
    assert_eq!(superseded.status, RunStatus::Cancelled);
    assert!(superseded.confirmed);

    let replacement = world
        .store
        .find_run(&real_id)
        .expect("find")
        .expect("real run");
    assert_eq!(replacement.status, RunStatus::Completed);
    assert!(replacement.confirmed);
    assert!(!replacement.dry_run);
    assert_eq!(replacement.issues_created, 2);

    // Preview comment first, then the completion summary.
    let comments = world.tracker.comments();
    assert_eq!(comments.len(), 2);
    assert!(comments[0].contains("Confirmation Required"));
    assert!(comments[1].contains("Run completed"));
    assert!(comments[1].contains(&real_id));

    // A second confirm has nothing pending left to target.
    let error = world
        .orchestrator
        .confirm(&repo(), 7)
        .await
        .expect_err("nothing pending");
    assert!(matches!(error, EngineError::NotFound(_)));
}

#[tokio::test]
async fn integration_rollback_closes_created_issues_and_records_partial_failure() {
    let world = world(ScriptedTracker::new(), vec!["Task A", "Task B", "Task C"]);
    let body = "@hatch-bot\ncount: 3\nrate_limit_per_minute: 60000\ntemplate: build the widget";
    let TriggerOutcome::Completed { run_id, created, .. } = world
        .orchestrator
        .process_trigger(&repo(), 7, body, false)
        .await
        .expect("run")
    else {
        panic!("expected completion");
    };
    assert_eq!(created, 3);

    // Rebuild the orchestrator over the same store with the middle issue's
    // close call scripted to fail (issues were numbered 201..=203).
    let failing_tracker = Arc::new(ScriptedTracker {
        fail_close_numbers: vec![202],
        ..ScriptedTracker::new()
    });
    let orchestrator = Orchestrator::new(
        failing_tracker.clone(),
        Arc::new(TitledGenerator { titles: Vec::new() }),
        world.store.clone(),
        BotSettings::default(),
    );

    let outcome = orchestrator
        .rollback(&repo(), 7, RollbackTarget::Last)
        .await
        .expect("rollback");
    assert_eq!(outcome.run_id, run_id);
    assert_eq!(outcome.closed, 2);
    assert_eq!(outcome.failed, 1);

    let statuses: Vec<SpawnedIssueStatus> = world
        .store
        .spawned_issues_for_run(&run_id)
        .expect("issues")
        .iter()
        .map(|issue| issue.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            SpawnedIssueStatus::Deleted,
            SpawnedIssueStatus::Failed,
            SpawnedIssueStatus::Deleted,
        ]
    );

    // The run's own status is untouched by rollback.
    let run = world.store.find_run(&run_id).expect("find").expect("run");
    assert_eq!(run.status, RunStatus::Completed);

    let comments = failing_tracker.comments();
    assert!(comments.last().expect("summary").contains("**Issues closed**: 2"));
    assert!(comments.last().expect("summary").contains("**Failed to close**: 1"));
}

#[tokio::test]
async fn integration_cancel_clears_pending_runs_and_blocks_confirm() {
    let world = world(ScriptedTracker::new(), vec!["Task A"]);
    world
        .orchestrator
        .process_trigger(&repo(), 7, DRY_RUN_BODY, false)
        .await
        .expect("dry run");

    assert_eq!(world.orchestrator.cancel(&repo(), 7).await.expect("cancel"), 1);
    assert_eq!(world.orchestrator.cancel(&repo(), 7).await.expect("cancel"), 0);

    let error = world
        .orchestrator
        .confirm(&repo(), 7)
        .await
        .expect_err("cancelled runs cannot be confirmed");
    assert!(matches!(error, EngineError::NotFound(_)));
}

#[tokio::test]
async fn integration_dedup_suppresses_previously_created_issues_across_runs() {
    let world = world(ScriptedTracker::new(), vec!["Task A", "Task B"]);
    let body = "@hatch-bot\ncount: 2\nrate_limit_per_minute: 60000\ntemplate: build the widget";

    let TriggerOutcome::Completed { created, .. } = world
        .orchestrator
        .process_trigger(&repo(), 7, body, false)
        .await
        .expect("first run")
    else {
        panic!("expected completion");
    };
    assert_eq!(created, 2);

    let TriggerOutcome::Completed { run_id, created, errors } = world
        .orchestrator
        .process_trigger(&repo(), 7, body, false)
        .await
        .expect("second run")
    else {
        panic!("expected completion");
    };
    assert_eq!(created, 0, "identical drafts deduplicated against history");
    assert_eq!(errors, 0);

    let run = world.store.find_run(&run_id).expect("find").expect("run");
    assert_eq!(run.issues_planned, 0);
    assert_eq!(run.status, RunStatus::Completed);
}
