//! Mini-configuration language embedded in trigger issues and comments.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::settings::BotSettings;

const KNOWN_KEYS: &[&str] = &[
    "count",
    "labels",
    "assignees",
    "rate_limit_per_minute",
    "dry_run",
    "unique_by",
    "components_list",
    "template",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Field(s) feeding the deduplication hash.
pub enum UniqueBy {
    Title,
    Body,
    #[default]
    Hash,
}

impl UniqueBy {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "title" => Self::Title,
            "body" => Self::Body,
            _ => Self::Hash,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Body => "body",
            Self::Hash => "hash",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Validated configuration snapshot derived from trigger text. Immutable
/// once parsed; runs carry their own copy and never re-derive it.
pub struct SpawnConfig {
    pub count: Option<u32>,
    pub template: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub dry_run: bool,
    pub unique_by: UniqueBy,
    pub components: Vec<String>,
}

/// Line-oriented parser for the embedded configuration language.
#[derive(Debug, Clone)]
pub struct SpawnConfigParser {
    mention_trigger: String,
    legacy_trigger: String,
    default_rate_limit: u32,
    max_issues_per_run: u32,
}

impl SpawnConfigParser {
    pub fn new(settings: &BotSettings) -> Self {
        Self {
            mention_trigger: settings.mention_trigger.clone(),
            legacy_trigger: settings.legacy_trigger.clone(),
            default_rate_limit: settings.rate_limit_per_minute,
            max_issues_per_run: settings.max_issues_per_run,
        }
    }

    /// Either the mention trigger or the legacy command activates parsing.
    pub fn has_trigger(&self, text: &str) -> bool {
        text.contains(&self.mention_trigger) || text.contains(&self.legacy_trigger)
    }

    fn is_trigger_line(&self, line: &str) -> bool {
        line.starts_with(&self.mention_trigger) || line.starts_with(&self.legacy_trigger)
    }

    pub fn parse(&self, text: &str) -> Result<SpawnConfig, EngineError> {
        if !self.has_trigger(text) {
            return Err(EngineError::Parse(
                "text does not contain the bot trigger".to_string(),
            ));
        }

        let mut config = SpawnConfig {
            count: None,
            template: String::new(),
            labels: Vec::new(),
            assignees: Vec::new(),
            rate_limit_per_minute: self.default_rate_limit,
            dry_run: false,
            unique_by: UniqueBy::Hash,
            components: Vec::new(),
        };
        let mut count_raw: Option<i64> = None;
        let mut rate_limit_raw: Option<i64> = None;
        let mut template_lines: Vec<String> = Vec::new();
        let mut in_template_block = false;
        let mut found_explicit_config = false;

        for raw_line in text.lines() {
            let line = raw_line.trim();

            if self.is_trigger_line(line) {
                continue;
            }

            if let Some(value) = line.strip_prefix("template:") {
                in_template_block = true;
                found_explicit_config = true;
                let value = value.trim();
                if !value.is_empty() {
                    template_lines.push(value.to_string());
                }
                continue;
            }

            // A new `key:` line ends a multiline template block and re-enters
            // key scanning for the same line.
            if in_template_block {
                if config_key_of(line).is_none() {
                    template_lines.push(line.to_string());
                    continue;
                }
                in_template_block = false;
                config.template = template_lines.join("\n");
                template_lines.clear();
            }

            let Some((key, value)) = config_key_of(line) else {
                continue;
            };
            if value.is_empty() && !KNOWN_KEYS.contains(&key.as_str()) {
                // A sentence ending in a colon, not configuration.
                template_lines.push(line.to_string());
                continue;
            }

            found_explicit_config = true;
            match key.as_str() {
                "count" => count_raw = Some(value.parse().unwrap_or(0)),
                "labels" => config.labels = parse_list(value),
                "assignees" => config.assignees = parse_list(value),
                "rate_limit_per_minute" => rate_limit_raw = Some(value.parse().unwrap_or(0)),
                "dry_run" => config.dry_run = parse_boolean(value),
                "unique_by" => config.unique_by = UniqueBy::parse(value),
                "components_list" => config.components = parse_list(value),
                // Unknown keys are ignored for forward compatibility.
                _ => {}
            }
        }

        if in_template_block {
            config.template = template_lines.join("\n");
        }

        // Pure free-text usage: the whole body (minus trigger lines) is the
        // template.
        if !found_explicit_config {
            config.template = self.extract_template_from_body(text);
        }

        self.validate(config, count_raw, rate_limit_raw)
    }

    fn extract_template_from_body(&self, text: &str) -> String {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !self.is_trigger_line(line))
            .collect();
        lines.join("\n").trim().to_string()
    }

    fn validate(
        &self,
        mut config: SpawnConfig,
        count_raw: Option<i64>,
        rate_limit_raw: Option<i64>,
    ) -> Result<SpawnConfig, EngineError> {
        if let Some(count) = count_raw {
            if count < 1 {
                return Err(EngineError::Validation(
                    "count must be at least 1".to_string(),
                ));
            }
            let count = u32::try_from(count)
                .map_err(|_| EngineError::Validation("count is out of range".to_string()))?;
            if count > self.max_issues_per_run && !config.dry_run {
                return Err(EngineError::Validation(format!(
                    "count exceeds maximum allowed ({}); use dry_run mode or reduce the count",
                    self.max_issues_per_run
                )));
            }
            config.count = Some(count);
        }

        if let Some(rate_limit) = rate_limit_raw {
            if rate_limit < 1 {
                return Err(EngineError::Validation(
                    "rate limit must be at least 1".to_string(),
                ));
            }
            config.rate_limit_per_minute = u32::try_from(rate_limit)
                .map_err(|_| EngineError::Validation("rate limit is out of range".to_string()))?;
        }

        if config.template.trim().is_empty() {
            return Err(EngineError::Parse(
                "template is required - provide a description or specification".to_string(),
            ));
        }

        Ok(config)
    }
}

/// Splits `line` into a configuration key and value when the key part
/// matches `[a-z_]+` before the first colon. Prose with colons (URLs,
/// capitalized sentences) never counts as a key.
fn config_key_of(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|ch| ch.is_ascii_lowercase() || ch == '_') {
        return None;
    }
    Some((key.to_string(), value.trim()))
}

/// List values accept a JSON array, comma separation, space separation, or a
/// single bare value, tried in that order.
fn parse_list(value: &str) -> Vec<String> {
    if let Ok(parsed) = serde_json::from_str::<Vec<String>>(value) {
        return parsed;
    }
    if value.contains(',') {
        return value.split(',').map(|item| item.trim().to_string()).collect();
    }
    if value.contains(' ') {
        return value.split_whitespace().map(str::to_string).collect();
    }
    vec![value.trim().to_string()]
}

fn parse_boolean(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
