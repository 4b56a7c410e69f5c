//! GitHub tracker capability for hatch.
//!
//! Exposes the `IssueTracker` trait consumed by the orchestration engine, a
//! retrying REST implementation, and the transport helpers that classify
//! retryable failures.

mod client;
mod repo;
pub mod transport;
mod types;

pub use client::{GithubApiClient, GithubClientConfig};
pub use repo::RepoRef;
pub use types::{IssueComment, IssueTracker, NewIssue, TrackerError, TrackerIssue};
