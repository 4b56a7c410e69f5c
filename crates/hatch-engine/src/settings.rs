use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Explicit bot configuration passed into every component; nothing reads
/// global state. Deserializable from a TOML file, with stock defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Mention string that activates configuration parsing.
    pub mention_trigger: String,
    /// Legacy slash command kept for backwards compatibility.
    pub legacy_trigger: String,
    pub confirm_command: String,
    pub cancel_command: String,
    /// Prefix for rollback; the remainder selects `last` or a run id.
    pub rollback_command: String,
    pub status_command: String,
    pub rate_limit_per_minute: u32,
    pub max_issues_per_run: u32,
    /// Counts above this force a confirmation round-trip.
    pub confirmation_threshold: u32,
    pub content_filtering_enabled: bool,
    pub prohibited_keywords: Vec<String>,
    /// Marker label appended to every spawned issue.
    pub spawn_label: String,
    pub generator_cache_ttl_ms: u64,
    /// Wall-clock budget per unit of work, enforced by the caller.
    pub run_timeout_ms: u64,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            mention_trigger: "@hatch-bot".to_string(),
            legacy_trigger: "/spawn-issues".to_string(),
            confirm_command: "@hatch-bot confirm".to_string(),
            cancel_command: "@hatch-bot cancel".to_string(),
            rollback_command: "@hatch-bot rollback".to_string(),
            status_command: "@hatch-bot status".to_string(),
            rate_limit_per_minute: 30,
            max_issues_per_run: 100,
            confirmation_threshold: 50,
            content_filtering_enabled: true,
            prohibited_keywords: stock_prohibited_keywords(),
            spawn_label: "auto-agent-task".to_string(),
            generator_cache_ttl_ms: 3_600_000,
            run_timeout_ms: 600_000,
        }
    }
}

impl BotSettings {
    pub fn load_toml(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            EngineError::Validation(format!(
                "failed to read settings file {}: {error}",
                path.display()
            ))
        })?;
        toml::from_str(&raw).map_err(|error| {
            EngineError::Validation(format!(
                "failed to parse settings file {}: {error}",
                path.display()
            ))
        })
    }
}

fn stock_prohibited_keywords() -> Vec<String> {
    [
        // Security threats
        "malware",
        "ddos",
        "dos attack",
        "exploit",
        "vulnerability scan",
        "brute force",
        "sql injection",
        "xss attack",
        "csrf attack",
        // Privacy violations
        "personal data",
        "credit card",
        "password",
        "social security",
        "private key",
        "api key exposed",
        "leak credentials",
        // Spam indicators
        "click here",
        "buy now",
        "limited offer",
        "act fast",
        // Hacking/illegal activities
        "hack into",
        "crack password",
        "bypass security",
        "steal data",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
