use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "hatch",
    about = "Spawn batches of tracker issues from a single control issue"
)]
pub struct Cli {
    /// Repository the trigger issue lives in, as owner/repo.
    #[arg(long, env = "HATCH_GITHUB_REPO")]
    pub github_repo: String,

    #[arg(long, env = "HATCH_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    #[arg(long, env = "HATCH_GITHUB_API_BASE", default_value = "https://api.github.com")]
    pub github_api_base: String,

    /// JSON state file holding run history.
    #[arg(long, env = "HATCH_STATE_FILE", default_value = "hatch-state.json")]
    pub state_file: PathBuf,

    /// Optional TOML settings file; defaults apply when omitted.
    #[arg(long, env = "HATCH_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[arg(long, env = "HATCH_GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "HATCH_OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "HATCH_OPENAI_API_BASE")]
    pub openai_api_base: Option<String>,

    #[arg(long, env = "HATCH_OPENAI_MODEL")]
    pub openai_model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process trigger text for an issue and spawn the batch.
    Process {
        #[arg(long)]
        issue: u64,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        body_file: Option<PathBuf>,
        /// Skip the confirmation gate (equivalent to a confirmed run).
        #[arg(long)]
        confirmed: bool,
    },
    /// Dispatch a comment body: bot commands first, then trigger detection.
    Comment {
        #[arg(long)]
        issue: u64,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
    /// Confirm the most recent pending dry-run for the issue.
    Confirm {
        #[arg(long)]
        issue: u64,
    },
    /// Cancel all pending runs for the issue.
    Cancel {
        #[arg(long)]
        issue: u64,
    },
    /// Close the issues created by the last run (or an explicit run id).
    Rollback {
        #[arg(long)]
        issue: u64,
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Show the most recent runs for the issue.
    Status {
        #[arg(long)]
        issue: u64,
    },
}
