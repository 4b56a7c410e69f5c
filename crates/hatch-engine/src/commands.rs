//! Textual bot commands recognized by prefix match in issue comments.

use crate::settings::BotSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackTarget {
    Last,
    Run(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Confirm,
    Cancel,
    Rollback(RollbackTarget),
    Status,
}

/// Prefix-matches `comment_body` against the configured command strings.
/// Rollback accepts a trailing `last` (the default) or an explicit run id.
pub fn extract_command(settings: &BotSettings, comment_body: &str) -> Option<BotCommand> {
    let trimmed = comment_body.trim();

    if trimmed.starts_with(&settings.confirm_command) {
        return Some(BotCommand::Confirm);
    }
    if trimmed.starts_with(&settings.cancel_command) {
        return Some(BotCommand::Cancel);
    }
    if trimmed.starts_with(&settings.status_command) {
        return Some(BotCommand::Status);
    }
    if let Some(remainder) = trimmed.strip_prefix(&settings.rollback_command) {
        let target = remainder.split_whitespace().next().unwrap_or("last");
        let target = if target.eq_ignore_ascii_case("last") {
            RollbackTarget::Last
        } else {
            RollbackTarget::Run(target.to_string())
        };
        return Some(BotCommand::Rollback(target));
    }
    None
}
