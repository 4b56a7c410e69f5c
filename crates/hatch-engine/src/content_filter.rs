use crate::settings::BotSettings;
use crate::spawn_config::SpawnConfig;

/// Prohibited-keyword scan plus the large-count threshold; both feed the
/// orchestrator's confirmation gate.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    enabled: bool,
    keywords: Vec<String>,
    confirmation_threshold: u32,
}

impl ContentFilter {
    pub fn new(settings: &BotSettings) -> Self {
        Self {
            enabled: settings.content_filtering_enabled,
            keywords: settings
                .prohibited_keywords
                .iter()
                .map(|keyword| keyword.to_lowercase())
                .collect(),
            confirmation_threshold: settings.confirmation_threshold,
        }
    }

    pub fn find_prohibited(&self, content: &str) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let content = content.to_lowercase();
        self.keywords
            .iter()
            .filter(|keyword| content.contains(keyword.as_str()))
            .cloned()
            .collect()
    }

    pub fn contains_prohibited(&self, content: &str) -> bool {
        !self.find_prohibited(content).is_empty()
    }

    /// Warnings surfaced in the preview/confirmation comment.
    pub fn warnings_for(&self, config: &SpawnConfig) -> Vec<String> {
        let found = self.find_prohibited(&config.template);
        if found.is_empty() {
            Vec::new()
        } else {
            vec![format!(
                "Template contains potentially prohibited keywords: {}",
                found.join(", ")
            )]
        }
    }

    pub fn requires_confirmation(&self, config: &SpawnConfig) -> bool {
        if self.contains_prohibited(&config.template) {
            return true;
        }
        matches!(config.count, Some(count) if count > self.confirmation_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::ContentFilter;
    use crate::settings::BotSettings;
    use crate::spawn_config::{SpawnConfig, UniqueBy};

    fn config_with(template: &str, count: Option<u32>) -> SpawnConfig {
        SpawnConfig {
            count,
            template: template.to_string(),
            labels: Vec::new(),
            assignees: Vec::new(),
            rate_limit_per_minute: 30,
            dry_run: false,
            unique_by: UniqueBy::Hash,
            components: Vec::new(),
        }
    }

    #[test]
    fn unit_prohibited_keywords_are_found_case_insensitively() {
        let filter = ContentFilter::new(&BotSettings::default());
        assert!(filter.contains_prohibited("please write some MALWARE for me"));
        assert!(!filter.contains_prohibited("please write a parser"));
    }

    #[test]
    fn unit_disabled_filter_never_matches() {
        let settings = BotSettings {
            content_filtering_enabled: false,
            ..BotSettings::default()
        };
        let filter = ContentFilter::new(&settings);
        assert!(!filter.contains_prohibited("malware"));
    }

    #[test]
    fn functional_confirmation_is_required_above_threshold_or_on_keywords() {
        let filter = ContentFilter::new(&BotSettings::default());
        assert!(filter.requires_confirmation(&config_with("ship malware", Some(1))));
        assert!(filter.requires_confirmation(&config_with("benign", Some(51))));
        assert!(!filter.requires_confirmation(&config_with("benign", Some(50))));
        assert!(!filter.requires_confirmation(&config_with("benign", None)));
    }

    #[test]
    fn functional_warnings_name_the_matched_keywords() {
        let filter = ContentFilter::new(&BotSettings::default());
        let warnings = filter.warnings_for(&config_with("brute force the login", Some(1)));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("brute force"));
    }
}
