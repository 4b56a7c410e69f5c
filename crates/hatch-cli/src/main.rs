//! Thin command-line entry point: wires settings, store, tracker, and
//! generator together and hands each unit of work to the orchestrator under
//! a wall-clock budget.

mod cli_args;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use hatch_ai::{select_generator, GeminiGeneratorConfig, GeneratorProviders, OpenAiGeneratorConfig};
use hatch_engine::{
    BotSettings, DispatchOutcome, JsonRunStore, Orchestrator, RollbackTarget,
};
use hatch_github::{GithubApiClient, GithubClientConfig, RepoRef};

use cli_args::{Cli, Command};

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_settings(path: Option<&PathBuf>) -> Result<BotSettings> {
    match path {
        Some(path) => BotSettings::load_toml(path)
            .map_err(|error| anyhow!("failed to load settings: {error}")),
        None => Ok(BotSettings::default()),
    }
}

fn build_orchestrator(cli: &Cli, settings: BotSettings) -> Result<Orchestrator> {
    let tracker = GithubApiClient::new(GithubClientConfig {
        api_base: cli.github_api_base.clone(),
        token: cli.github_token.clone(),
        ..GithubClientConfig::default()
    })
    .map_err(|error| anyhow!("failed to build tracker client: {error}"))?;

    let generator = select_generator(GeneratorProviders {
        gemini: cli.gemini_api_key.as_ref().map(|api_key| GeminiGeneratorConfig {
            api_key: api_key.clone(),
            ..GeminiGeneratorConfig::default()
        }),
        openai: cli.openai_api_key.as_ref().map(|api_key| {
            let mut config = OpenAiGeneratorConfig {
                api_key: api_key.clone(),
                ..OpenAiGeneratorConfig::default()
            };
            if let Some(api_base) = &cli.openai_api_base {
                config.api_base = api_base.clone();
            }
            if let Some(model) = &cli.openai_model {
                config.model = model.clone();
            }
            config
        }),
        cache_ttl_ms: settings.generator_cache_ttl_ms,
        max_count: settings.max_issues_per_run,
    });

    let store = JsonRunStore::load(cli.state_file.clone())
        .map_err(|error| anyhow!("failed to open run store: {error}"))?;

    Ok(Orchestrator::new(
        Arc::new(tracker),
        generator,
        Arc::new(store),
        settings,
    ))
}

fn read_body(body: Option<&String>, body_file: Option<&PathBuf>) -> Result<String> {
    match (body, body_file) {
        (Some(body), None) => Ok(body.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read body file {}", path.display())),
        _ => Err(anyhow!("provide exactly one of --body or --body-file")),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(cli: &Cli, orchestrator: &Orchestrator, repo: &RepoRef) -> Result<()> {
    match &cli.command {
        Command::Process {
            issue,
            body,
            body_file,
            confirmed,
        } => {
            let text = read_body(body.as_ref(), body_file.as_ref())?;
            let outcome = orchestrator
                .process_trigger(repo, *issue, &text, *confirmed)
                .await?;
            print_json(&outcome)
        }
        Command::Comment {
            issue,
            body,
            body_file,
        } => {
            let text = read_body(body.as_ref(), body_file.as_ref())?;
            let outcome = orchestrator.dispatch_comment(repo, *issue, &text).await?;
            if matches!(outcome, DispatchOutcome::Ignored) {
                tracing::info!("comment carried no bot command or trigger");
            }
            print_json(&outcome)
        }
        Command::Confirm { issue } => {
            let outcome = orchestrator.confirm(repo, *issue).await?;
            print_json(&outcome)
        }
        Command::Cancel { issue } => {
            let cancelled = orchestrator.cancel(repo, *issue).await?;
            print_json(&serde_json::json!({ "cancelled": cancelled }))
        }
        Command::Rollback { issue, run_id } => {
            let target = match run_id {
                Some(run_id) => RollbackTarget::Run(run_id.clone()),
                None => RollbackTarget::Last,
            };
            let outcome = orchestrator.rollback(repo, *issue, target).await?;
            print_json(&outcome)
        }
        Command::Status { issue } => {
            let summaries = orchestrator.status(repo, *issue).await?;
            print_json(&summaries)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings = load_settings(cli.settings.as_ref())?;
    let run_timeout = Duration::from_millis(settings.run_timeout_ms.max(1));
    let repo = RepoRef::parse(&cli.github_repo)
        .map_err(|error| anyhow!("invalid --github-repo: {error}"))?;
    let orchestrator = build_orchestrator(&cli, settings)?;

    // Each invocation is one unit of work; the budget bounds runaway runs
    // the same way a hosting queue would.
    tokio::time::timeout(run_timeout, run_command(&cli, &orchestrator, &repo))
        .await
        .map_err(|_| anyhow!("unit of work exceeded {}ms budget", run_timeout.as_millis()))?
}
