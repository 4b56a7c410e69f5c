//! End-to-end run driver: trigger processing, the dry-run/confirmation
//! gate, rate-limited issue creation, and the confirm / cancel / rollback /
//! status command protocol.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hatch_ai::IssueGenerator;
use hatch_github::{IssueTracker, NewIssue, RepoRef};
use serde::Serialize;
use tokio::time::sleep;

use crate::commands::{extract_command, BotCommand, RollbackTarget};
use crate::content_filter::ContentFilter;
use crate::dedup::DeduplicationFilter;
use crate::error::EngineError;
use crate::render::{
    provenance_footer, render_failure_comment, render_preview_comment, render_rollback_comment,
    render_rollback_failure_comment, render_status_comment, render_summary_comment,
};
use crate::run::{RunStatus, RunSummary, SpawnRun, SpawnedIssue, SpawnedIssueStatus};
use crate::run_store::RunStore;
use crate::settings::BotSettings;
use crate::spawn_config::{SpawnConfig, SpawnConfigParser};

const STATUS_RUN_LIMIT: usize = 10;
const ROLLBACK_CLOSE_SPACING_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
/// Discriminated result of processing one trigger.
pub enum TriggerOutcome {
    DryRunPreview {
        run_id: String,
        planned: Option<u32>,
    },
    AwaitingConfirmation {
        run_id: String,
        planned: Option<u32>,
    },
    Completed {
        run_id: String,
        created: u32,
        errors: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollbackOutcome {
    pub run_id: String,
    pub closed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Result of dispatching one comment body: a command, a fresh trigger, or
/// nothing addressed to the bot.
pub enum DispatchOutcome {
    Triggered(TriggerOutcome),
    Confirmed(TriggerOutcome),
    Cancelled { count: usize },
    RolledBack(RollbackOutcome),
    Status { runs: Vec<RunSummary> },
    Ignored,
}

/// Drives one run end-to-end against the tracker, generator, and store
/// capabilities. One orchestrator serves any number of repositories.
pub struct Orchestrator {
    tracker: Arc<dyn IssueTracker>,
    generator: Arc<dyn IssueGenerator>,
    store: Arc<dyn RunStore>,
    settings: BotSettings,
    parser: SpawnConfigParser,
    filter: ContentFilter,
    dedup: DeduplicationFilter,
}

impl Orchestrator {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        generator: Arc<dyn IssueGenerator>,
        store: Arc<dyn RunStore>,
        settings: BotSettings,
    ) -> Self {
        let parser = SpawnConfigParser::new(&settings);
        let filter = ContentFilter::new(&settings);
        let dedup = DeduplicationFilter::new(store.clone());
        Self {
            tracker,
            generator,
            store,
            settings,
            parser,
            filter,
            dedup,
        }
    }

    pub fn parser(&self) -> &SpawnConfigParser {
        &self.parser
    }

    /// Parses the trigger text and processes the resulting run. Parse and
    /// validation failures surface before anything durable is recorded.
    pub async fn process_trigger(
        &self,
        repo: &RepoRef,
        trigger_issue_number: u64,
        raw_text: &str,
        confirmed: bool,
    ) -> Result<TriggerOutcome, EngineError> {
        let config = self.parser.parse(raw_text)?;
        self.process_with_config(repo, trigger_issue_number, config, confirmed)
            .await
    }

    /// Commands first, then trigger detection; everything else is ignored.
    pub async fn dispatch_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<DispatchOutcome, EngineError> {
        if let Some(command) = extract_command(&self.settings, body) {
            return match command {
                BotCommand::Confirm => self
                    .confirm(repo, issue_number)
                    .await
                    .map(DispatchOutcome::Confirmed),
                BotCommand::Cancel => self
                    .cancel(repo, issue_number)
                    .await
                    .map(|count| DispatchOutcome::Cancelled { count }),
                BotCommand::Rollback(target) => self
                    .rollback(repo, issue_number, target)
                    .await
                    .map(DispatchOutcome::RolledBack),
                BotCommand::Status => self
                    .status(repo, issue_number)
                    .await
                    .map(|runs| DispatchOutcome::Status { runs }),
            };
        }

        if self.parser.has_trigger(body) {
            return self
                .process_trigger(repo, issue_number, body, false)
                .await
                .map(DispatchOutcome::Triggered);
        }

        Ok(DispatchOutcome::Ignored)
    }

    /// Confirms the most recent pending dry-run using its *stored*
    /// configuration snapshot; the live comment text is never re-parsed.
    /// The pending run is superseded (confirmed + cancelled) and a new run
    /// starts with dry_run forced off.
    pub async fn confirm(
        &self,
        repo: &RepoRef,
        trigger_issue_number: u64,
    ) -> Result<TriggerOutcome, EngineError> {
        let slug = repo.as_slug();
        let Some(mut pending) = self
            .store
            .latest_pending_dry_run(&slug, trigger_issue_number)?
        else {
            return Err(EngineError::NotFound(
                "no pending run found to confirm; start a new request".to_string(),
            ));
        };

        let mut config = pending.config.clone();
        config.dry_run = false;
        pending.confirmed = true;
        pending.mark_cancelled()?;
        self.store.update_run(&pending)?;
        tracing::info!(
            run_id = %pending.run_id,
            repository = %slug,
            "pending run confirmed, starting replacement run"
        );

        self.process_with_config(repo, trigger_issue_number, config, true)
            .await
    }

    /// Cancels every pending run for the trigger. Idempotent; returns the
    /// number of runs moved to cancelled.
    pub async fn cancel(
        &self,
        repo: &RepoRef,
        trigger_issue_number: u64,
    ) -> Result<usize, EngineError> {
        let slug = repo.as_slug();
        let pending = self.store.pending_runs(&slug, trigger_issue_number)?;
        let mut cancelled = 0_usize;
        for mut run in pending {
            run.mark_cancelled()?;
            self.store.update_run(&run)?;
            cancelled += 1;
        }
        tracing::info!(
            repository = %slug,
            trigger_issue = trigger_issue_number,
            cancelled,
            "cancelled pending runs"
        );
        Ok(cancelled)
    }

    /// Closes every still-open issue of the targeted run, isolating per-issue
    /// failures, and posts a summary. The run's own status is never changed.
    pub async fn rollback(
        &self,
        repo: &RepoRef,
        trigger_issue_number: u64,
        target: RollbackTarget,
    ) -> Result<RollbackOutcome, EngineError> {
        match self.rollback_inner(repo, trigger_issue_number, target).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                let comment = render_rollback_failure_comment(&error.to_string());
                if let Err(comment_error) = self
                    .tracker
                    .create_comment(repo, trigger_issue_number, &comment)
                    .await
                {
                    tracing::error!(
                        error = %comment_error,
                        "failed to post rollback failure comment"
                    );
                }
                Err(error)
            }
        }
    }

    async fn rollback_inner(
        &self,
        repo: &RepoRef,
        trigger_issue_number: u64,
        target: RollbackTarget,
    ) -> Result<RollbackOutcome, EngineError> {
        let slug = repo.as_slug();
        let run = match target {
            RollbackTarget::Last => self
                .store
                .latest_rollback_candidate(&slug, trigger_issue_number)?
                .ok_or_else(|| EngineError::NotFound("no run found to rollback".to_string()))?,
            RollbackTarget::Run(run_id) => self
                .store
                .find_run(&run_id)?
                .ok_or_else(|| EngineError::NotFound(format!("run not found: {run_id}")))?,
        };

        let issues = self.store.spawned_issues_for_run(&run.run_id)?;
        if !run.can_rollback(&issues) {
            return Err(EngineError::Validation(format!(
                "cannot rollback run {} (status {}, no open created issues)",
                run.run_id,
                run.status.as_str()
            )));
        }

        tracing::info!(run_id = %run.run_id, repository = %slug, "starting rollback");
        let mut closed = 0_u32;
        let mut failed = 0_u32;
        for mut issue in issues
            .into_iter()
            .filter(|issue| issue.status == SpawnedIssueStatus::Created)
        {
            match self.tracker.close_issue(repo, issue.issue_number).await {
                Ok(_) => {
                    issue.status = SpawnedIssueStatus::Deleted;
                    closed += 1;
                    tracing::info!(
                        run_id = %run.run_id,
                        issue_number = issue.issue_number,
                        "issue closed during rollback"
                    );
                    self.store.update_spawned_issue(&issue)?;
                    sleep(Duration::from_millis(ROLLBACK_CLOSE_SPACING_MS)).await;
                }
                Err(error) => {
                    issue.status = SpawnedIssueStatus::Failed;
                    failed += 1;
                    tracing::warn!(
                        run_id = %run.run_id,
                        issue_number = issue.issue_number,
                        error = %error,
                        "failed to close issue during rollback, continuing"
                    );
                    self.store.update_spawned_issue(&issue)?;
                }
            }
        }

        let comment = render_rollback_comment(&run.run_id, closed, failed);
        self.tracker
            .create_comment(repo, trigger_issue_number, &comment)
            .await?;
        tracing::info!(run_id = %run.run_id, closed, failed, "rollback completed");
        Ok(RollbackOutcome {
            run_id: run.run_id,
            closed,
            failed,
        })
    }

    /// Posts and returns summaries of the most recent runs for the trigger.
    pub async fn status(
        &self,
        repo: &RepoRef,
        trigger_issue_number: u64,
    ) -> Result<Vec<RunSummary>, EngineError> {
        let slug = repo.as_slug();
        let summaries: Vec<RunSummary> = self
            .store
            .recent_runs(&slug, trigger_issue_number, STATUS_RUN_LIMIT)?
            .iter()
            .map(SpawnRun::summary)
            .collect();
        self.tracker
            .create_comment(repo, trigger_issue_number, &render_status_comment(&summaries))
            .await?;
        Ok(summaries)
    }

    async fn process_with_config(
        &self,
        repo: &RepoRef,
        trigger_issue_number: u64,
        config: SpawnConfig,
        confirmed: bool,
    ) -> Result<TriggerOutcome, EngineError> {
        let mut run = SpawnRun::new(repo.as_slug(), trigger_issue_number, config, confirmed);
        self.store.insert_run(&run)?;
        tracing::info!(
            run_id = %run.run_id,
            repository = %run.repository,
            trigger_issue = trigger_issue_number,
            dry_run = run.dry_run,
            confirmed,
            "processing spawn trigger"
        );

        match self.execute_run(repo, &mut run).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                let message = error.to_string();
                tracing::error!(run_id = %run.run_id, error = %message, "spawn run failed");
                // Failures before the gate leave the run pending; walk it
                // through running so it lands in the failed terminal state.
                if run.status == RunStatus::Pending {
                    let _ = run.mark_started();
                }
                if run.mark_failed(&message).is_ok() {
                    if let Err(store_error) = self.store.update_run(&run) {
                        tracing::error!(
                            run_id = %run.run_id,
                            error = %store_error,
                            "failed to persist failed run"
                        );
                    }
                }
                let comment = render_failure_comment(&run.run_id, &message);
                if let Err(comment_error) = self
                    .tracker
                    .create_comment(repo, trigger_issue_number, &comment)
                    .await
                {
                    tracing::error!(
                        run_id = %run.run_id,
                        error = %comment_error,
                        "failed to post failure comment"
                    );
                }
                Err(error)
            }
        }
    }

    async fn execute_run(
        &self,
        repo: &RepoRef,
        run: &mut SpawnRun,
    ) -> Result<TriggerOutcome, EngineError> {
        if !self.tracker.validate_repository_access(repo).await? {
            return Err(EngineError::Access(format!(
                "cannot access repository {}; check token permissions",
                repo.as_slug()
            )));
        }

        let warnings = self.filter.warnings_for(&run.config);
        let requires_confirmation = self.filter.requires_confirmation(&run.config);

        if run.config.dry_run || (requires_confirmation && !run.confirmed) {
            let planned = planned_count(&run.config);
            let comment = render_preview_comment(
                run,
                planned,
                &warnings,
                &self.settings.confirm_command,
                &self.settings.cancel_command,
            );
            self.tracker
                .create_comment(repo, run.trigger_issue_number, &comment)
                .await?;
            tracing::info!(
                run_id = %run.run_id,
                dry_run = run.config.dry_run,
                requires_confirmation,
                "preview posted, run stays pending"
            );
            return Ok(if run.config.dry_run {
                TriggerOutcome::DryRunPreview {
                    run_id: run.run_id.clone(),
                    planned,
                }
            } else {
                TriggerOutcome::AwaitingConfirmation {
                    run_id: run.run_id.clone(),
                    planned,
                }
            });
        }

        run.mark_started()?;
        self.store.update_run(run)?;

        let drafts = self
            .generator
            .generate(&run.config.template, &run.config.components, run.config.count)
            .await?;
        let deduped = self.dedup.filter(drafts, run.config.unique_by)?;
        run.issues_planned = deduped.len() as u32;
        self.store.update_run(run)?;

        let delay =
            Duration::from_secs_f64(60.0 / f64::from(run.config.rate_limit_per_minute.max(1)));
        let total = deduped.len();
        let mut created: Vec<SpawnedIssue> = Vec::new();
        let mut errors = 0_u32;
        for (index, draft) in deduped.into_iter().enumerate() {
            let body = format!(
                "{}{}",
                draft.body,
                provenance_footer(&run.run_id, run.trigger_issue_number)
            );
            let mut labels = run.config.labels.clone();
            if !self.settings.spawn_label.is_empty() {
                labels.push(self.settings.spawn_label.clone());
            }
            let request = NewIssue {
                title: draft.title.clone(),
                body: body.clone(),
                labels: labels.clone(),
                assignees: run.config.assignees.clone(),
            };

            match self.tracker.create_issue(repo, &request).await {
                Ok(issue) => {
                    let spawned = SpawnedIssue {
                        run_id: run.run_id.clone(),
                        repository: run.repository.clone(),
                        issue_number: issue.number,
                        issue_url: issue.html_url,
                        title: draft.title,
                        body,
                        hash: draft.hash,
                        labels,
                        status: SpawnedIssueStatus::Created,
                        created_at: Utc::now(),
                    };
                    self.store.insert_spawned_issue(&spawned)?;
                    run.issues_created += 1;
                    self.store.update_run(run)?;
                    tracing::info!(
                        run_id = %run.run_id,
                        issue_number = spawned.issue_number,
                        title = %spawned.title,
                        "issue created"
                    );
                    created.push(spawned);
                }
                Err(error) => {
                    errors += 1;
                    tracing::warn!(
                        run_id = %run.run_id,
                        index,
                        error = %error,
                        "failed to create issue, continuing with the batch"
                    );
                }
            }

            if index + 1 < total {
                sleep(delay).await;
            }
        }

        let summary =
            render_summary_comment(run, &created, errors, &self.settings.rollback_command);
        self.tracker
            .create_comment(repo, run.trigger_issue_number, &summary)
            .await?;

        run.mark_completed()?;
        self.store.update_run(run)?;
        tracing::info!(
            run_id = %run.run_id,
            created = run.issues_created,
            errors,
            "spawn run completed"
        );
        Ok(TriggerOutcome::Completed {
            run_id: run.run_id.clone(),
            created: run.issues_created,
            errors,
        })
    }
}

/// Count shown in previews: the explicit count, else one issue per
/// component, else left to the generator.
fn planned_count(config: &SpawnConfig) -> Option<u32> {
    config.count.or_else(|| {
        if config.components.is_empty() {
            None
        } else {
            Some(config.components.len() as u32)
        }
    })
}
