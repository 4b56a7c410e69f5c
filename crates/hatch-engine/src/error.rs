use hatch_ai::GeneratorError;
use hatch_github::TrackerError;
use thiserror::Error;

#[derive(Debug, Error)]
/// Engine failure taxonomy. Parse and Validation short-circuit before any
/// run exists; Access, Tracker, and Generator mark the owning run failed;
/// NotFound covers command targets that do not exist.
pub enum EngineError {
    #[error("configuration parse error: {0}")]
    Parse(String),
    #[error("configuration validation error: {0}")]
    Validation(String),
    #[error("repository access error: {0}")]
    Access(String),
    #[error("tracker api error: {0}")]
    Tracker(#[from] TrackerError),
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("illegal run state transition: {0}")]
    State(String),
    #[error("run storage error: {0}")]
    Store(String),
}
