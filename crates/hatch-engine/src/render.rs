//! Markdown comment bodies posted back to the triggering issue. Every
//! terminal outcome carries the run id for traceability.

use hatch_github::transport::truncate_for_error;

use crate::run::{RunSummary, SpawnRun, SpawnedIssue};

const ERROR_COMMENT_MAX_CHARS: usize = 600;

pub fn provenance_footer(run_id: &str, parent_issue_number: u64) -> String {
    format!(
        "\n\n---\n*Auto-generated by hatch. Parent issue: #{parent_issue_number} | Run ID: `{run_id}`*"
    )
}

pub fn render_preview_comment(
    run: &SpawnRun,
    planned: Option<u32>,
    warnings: &[String],
    confirm_command: &str,
    cancel_command: &str,
) -> String {
    let count_text = planned
        .map(|value| value.to_string())
        .unwrap_or_else(|| "decided by the generator".to_string());
    let labels_text = run.config.labels.join(", ");
    let mut comment = format!(
        "**Dry Run / Confirmation Required**\n\n\
         **Run ID**: `{}`\n\n\
         **Configuration**:\n\
         - Count: {}\n\
         - Labels: `{}`\n\
         - Unique by: `{}`\n\
         - Template:\n```\n{}\n```\n",
        run.run_id,
        count_text,
        labels_text,
        run.config.unique_by.as_str(),
        run.config.template
    );
    if !warnings.is_empty() {
        comment.push_str("\n**Warnings**:\n");
        for warning in warnings {
            comment.push_str(&format!("- {warning}\n"));
        }
    }
    comment.push_str(&format!(
        "\nTo proceed, reply with: `{confirm_command}`\nTo cancel, reply with: `{cancel_command}`"
    ));
    comment
}

pub fn render_summary_comment(
    run: &SpawnRun,
    created: &[SpawnedIssue],
    error_count: u32,
    rollback_command: &str,
) -> String {
    let mut comment = format!(
        "**Run completed**\n\n\
         **Run ID**: `{}`\n\
         **Issues created**: {} / {}\n\
         **Errors**: {}\n",
        run.run_id, run.issues_created, run.issues_planned, error_count
    );
    if !created.is_empty() {
        comment.push_str("\n**Created issues**:\n");
        for issue in created {
            comment.push_str(&format!(
                "- #{}: [{}]({})\n",
                issue.issue_number, issue.title, issue.issue_url
            ));
        }
    }
    comment.push_str(&format!(
        "\nTo rollback this run, reply with: `{rollback_command} last`"
    ));
    comment
}

pub fn render_failure_comment(run_id: &str, error_message: &str) -> String {
    format!(
        "**Run failed**\n\n**Run ID**: `{run_id}`\n\n**Error**: {}",
        truncate_for_error(error_message, ERROR_COMMENT_MAX_CHARS)
    )
}

pub fn render_rollback_comment(run_id: &str, closed: u32, failed: u32) -> String {
    format!(
        "**Rollback completed**\n\n\
         **Run ID**: `{run_id}`\n\
         **Issues closed**: {closed}\n\
         **Failed to close**: {failed}"
    )
}

pub fn render_rollback_failure_comment(error_message: &str) -> String {
    format!(
        "**Rollback failed**\n\n**Error**: {}",
        truncate_for_error(error_message, ERROR_COMMENT_MAX_CHARS)
    )
}

pub fn render_status_comment(summaries: &[RunSummary]) -> String {
    if summaries.is_empty() {
        return "**Run status**\n\nNo runs recorded for this issue yet.".to_string();
    }
    let mut comment = "**Run status** (most recent first)\n\n".to_string();
    for summary in summaries {
        let duration = summary
            .duration_seconds
            .map(|seconds| format!("{seconds}s"))
            .unwrap_or_else(|| "-".to_string());
        comment.push_str(&format!(
            "- `{}` | {} | created {}/{} | duration {}\n",
            summary.run_id,
            summary.status.as_str(),
            summary.issues_created,
            summary.issues_planned,
            duration
        ));
    }
    comment
}
