use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::repo::RepoRef;
use crate::transport::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};
use crate::types::{IssueComment, IssueTracker, NewIssue, TrackerError, TrackerIssue};

const ERROR_BODY_MAX_CHARS: usize = 800;

#[derive(Debug, Clone)]
/// Connection settings for the GitHub REST client.
pub struct GithubClientConfig {
    pub api_base: String,
    pub token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_backoff_base: u32,
}

impl Default for GithubClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: String::new(),
            request_timeout_ms: 30_000,
            retry_max_attempts: 3,
            retry_backoff_base: 2,
        }
    }
}

#[derive(Clone, Debug)]
/// GitHub REST implementation of `IssueTracker`. Every operation is a thin
/// path/method/payload mapping over the shared retry wrapper.
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_backoff_base: u32,
}

impl GithubApiClient {
    pub fn new(config: GithubClientConfig) -> Result<Self, TrackerError> {
        if config.token.trim().is_empty() {
            return Err(TrackerError::InvalidConfig(
                "tracker token is not configured".to_string(),
            ));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("hatch-issue-spawner"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", config.token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header).map_err(|_| {
                TrackerError::InvalidConfig("tracker token is not a valid header value".to_string())
            })?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_backoff_base: config.retry_backoff_base.max(1),
        })
    }

    fn issues_url(&self, repo: &RepoRef) -> String {
        format!("{}/repos/{}/{}/issues", self.api_base, repo.owner, repo.name)
    }

    /// Bounded retry loop shared by every tracker call: rate limits and
    /// server errors back off and retry, other client errors fail
    /// immediately, and exhaustion surfaces the last transient failure.
    async fn request_json<T, F>(&self, operation: &str, mut request_builder: F) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        let mut last_failure = String::new();
        while attempt < self.retry_max_attempts {
            attempt = attempt.saturating_add(1);
            let request = request_builder()
                .header("x-hatch-retry-attempt", attempt.saturating_sub(1).to_string());
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|error| {
                            TrackerError::InvalidResponse(format!(
                                "failed to decode {operation}: {error}"
                            ))
                        });
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let code = status.as_u16();
                    let body = response.text().await.unwrap_or_default();
                    if !is_retryable_status(code) {
                        return Err(TrackerError::Status {
                            status: code,
                            body: truncate_for_error(&body, ERROR_BODY_MAX_CHARS),
                        });
                    }

                    last_failure = format!(
                        "status {code}: {}",
                        truncate_for_error(&body, ERROR_BODY_MAX_CHARS)
                    );
                    if attempt >= self.retry_max_attempts {
                        break;
                    }
                    let delay = retry_delay(self.retry_backoff_base, attempt - 1, retry_after);
                    tracing::warn!(
                        operation,
                        status = code,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "tracker call failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(error) => {
                    if !is_retryable_transport_error(&error) {
                        return Err(TrackerError::Http(error));
                    }
                    last_failure = error.to_string();
                    if attempt >= self.retry_max_attempts {
                        break;
                    }
                    let delay = retry_delay(self.retry_backoff_base, attempt - 1, None);
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "tracker transport error, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }

        Err(TrackerError::RetriesExhausted {
            operation: operation.to_string(),
            attempts: self.retry_max_attempts,
            message: last_failure,
        })
    }
}

#[async_trait]
impl IssueTracker for GithubApiClient {
    async fn get_issue(&self, repo: &RepoRef, number: u64) -> Result<TrackerIssue, TrackerError> {
        self.request_json("get issue", || {
            self.http
                .get(format!("{}/{}", self.issues_url(repo), number))
        })
        .await
    }

    async fn create_issue(
        &self,
        repo: &RepoRef,
        issue: &NewIssue,
    ) -> Result<TrackerIssue, TrackerError> {
        let payload = json!({
            "title": issue.title,
            "body": issue.body,
            "labels": issue.labels,
            "assignees": issue.assignees,
        });
        self.request_json("create issue", || {
            self.http.post(self.issues_url(repo)).json(&payload)
        })
        .await
    }

    async fn create_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<IssueComment, TrackerError> {
        let payload = json!({ "body": body });
        self.request_json("create comment", || {
            self.http
                .post(format!("{}/{}/comments", self.issues_url(repo), issue_number))
                .json(&payload)
        })
        .await
    }

    async fn close_issue(
        &self,
        repo: &RepoRef,
        issue_number: u64,
    ) -> Result<TrackerIssue, TrackerError> {
        // GitHub has no delete endpoint for issues; closing as not-planned is
        // the reversal primitive rollback relies on.
        let payload = json!({ "state": "closed", "state_reason": "not_planned" });
        self.request_json("close issue", || {
            self.http
                .patch(format!("{}/{}", self.issues_url(repo), issue_number))
                .json(&payload)
        })
        .await
    }

    async fn list_open_issues(&self, repo: &RepoRef) -> Result<Vec<TrackerIssue>, TrackerError> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<TrackerIssue> = self
                .request_json("list issues", || {
                    self.http.get(self.issues_url(repo)).query(&[
                        ("state", "open"),
                        ("per_page", "100"),
                        ("page", page_value.as_str()),
                    ])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk.into_iter().filter(|issue| issue.pull_request.is_none()));
            if chunk_len < 100 {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    async fn validate_repository_access(&self, repo: &RepoRef) -> Result<bool, TrackerError> {
        let result: Result<Value, TrackerError> = self
            .request_json("validate repository access", || {
                self.http
                    .get(format!("{}/repos/{}/{}", self.api_base, repo.owner, repo.name))
            })
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(TrackerError::Status { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::GET, Method::PATCH, Method::POST, MockServer};
    use serde_json::json;

    use super::{GithubApiClient, GithubClientConfig};
    use crate::repo::RepoRef;
    use crate::types::{IssueTracker, NewIssue, TrackerError};

    fn client_for(server: &MockServer, attempts: usize) -> GithubApiClient {
        GithubApiClient::new(GithubClientConfig {
            api_base: server.base_url(),
            token: "test-token".to_string(),
            request_timeout_ms: 5_000,
            retry_max_attempts: attempts,
            retry_backoff_base: 2,
        })
        .expect("client")
    }

    fn repo() -> RepoRef {
        RepoRef::parse("acme/widgets").expect("repo")
    }

    #[test]
    fn unit_client_rejects_empty_token() {
        let error = GithubApiClient::new(GithubClientConfig::default()).expect_err("no token");
        assert!(matches!(error, TrackerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn functional_create_issue_sends_payload_and_decodes_response() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/acme/widgets/issues")
                .header("authorization", "Bearer test-token")
                .body_includes("\"title\":\"Add parser\"")
                .body_includes("\"labels\":[\"auto\"]");
            then.status(201).json_body(json!({
                "number": 12,
                "title": "Add parser",
                "body": "details",
                "html_url": "https://example.com/acme/widgets/issues/12",
            }));
        });

        let issue = client_for(&server, 3)
            .create_issue(
                &repo(),
                &NewIssue {
                    title: "Add parser".to_string(),
                    body: "details".to_string(),
                    labels: vec!["auto".to_string()],
                    assignees: Vec::new(),
                },
            )
            .await
            .expect("create issue");
        create.assert();
        assert_eq!(issue.number, 12);
        assert!(issue.html_url.ends_with("/issues/12"));
    }

    #[tokio::test]
    async fn integration_create_issue_retries_rate_limit_then_succeeds() {
        let server = MockServer::start();
        let limited = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/acme/widgets/issues")
                .header("x-hatch-retry-attempt", "0");
            then.status(429)
                .header("retry-after", "1")
                .body("rate limited");
        });
        let accepted = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/acme/widgets/issues")
                .header("x-hatch-retry-attempt", "1");
            then.status(201).json_body(json!({
                "number": 13,
                "title": "Add parser",
                "html_url": "https://example.com/acme/widgets/issues/13",
            }));
        });

        let started = std::time::Instant::now();
        let issue = client_for(&server, 3)
            .create_issue(
                &repo(),
                &NewIssue {
                    title: "Add parser".to_string(),
                    body: "details".to_string(),
                    labels: Vec::new(),
                    assignees: Vec::new(),
                },
            )
            .await
            .expect("second attempt succeeds");
        limited.assert_calls(1);
        accepted.assert_calls(1);
        assert_eq!(issue.number, 13);
        assert!(
            started.elapsed() >= std::time::Duration::from_secs(1),
            "client honors the Retry-After delay"
        );
    }

    #[tokio::test]
    async fn integration_exhausted_retries_surface_the_last_failure() {
        let server = MockServer::start();
        let failing = server.mock(|when, then| {
            when.method(GET).path("/repos/acme/widgets/issues/3");
            then.status(503).body("upstream down");
        });

        let error = client_for(&server, 2)
            .get_issue(&repo(), 3)
            .await
            .expect_err("server keeps failing");
        failing.assert_calls(2);
        match error {
            TrackerError::RetriesExhausted { attempts, message, .. } => {
                assert_eq!(attempts, 2);
                assert!(message.contains("503"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn integration_non_retryable_status_fails_on_first_attempt() {
        let server = MockServer::start();
        let missing = server.mock(|when, then| {
            when.method(GET).path("/repos/acme/widgets/issues/7");
            then.status(404).body("not found");
        });

        let error = client_for(&server, 3)
            .get_issue(&repo(), 7)
            .await
            .expect_err("missing issue");
        missing.assert_calls(1);
        match error {
            TrackerError::Status { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn functional_close_issue_patches_state_closed() {
        let server = MockServer::start();
        let close = server.mock(|when, then| {
            when.method(PATCH)
                .path("/repos/acme/widgets/issues/9")
                .body_includes("\"state\":\"closed\"")
                .body_includes("\"state_reason\":\"not_planned\"");
            then.status(200).json_body(json!({
                "number": 9,
                "title": "Old task",
                "html_url": "https://example.com/acme/widgets/issues/9",
                "state": "closed",
            }));
        });

        let issue = client_for(&server, 3)
            .close_issue(&repo(), 9)
            .await
            .expect("close issue");
        close.assert();
        assert_eq!(issue.state.as_deref(), Some("closed"));
    }

    #[tokio::test]
    async fn functional_validate_repository_access_maps_status_errors_to_false() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/widgets");
            then.status(404).body("missing");
        });

        let accessible = client_for(&server, 3)
            .validate_repository_access(&repo())
            .await
            .expect("validation result");
        assert!(!accessible);
    }

    #[tokio::test]
    async fn regression_list_open_issues_filters_pull_requests() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/widgets/issues");
            then.status(200).json_body(json!([
                {
                    "number": 1,
                    "title": "A real issue",
                    "html_url": "https://example.com/acme/widgets/issues/1",
                },
                {
                    "number": 2,
                    "title": "A pull request",
                    "html_url": "https://example.com/acme/widgets/pull/2",
                    "pull_request": {"url": "https://example.com/pulls/2"},
                },
            ]));
        });

        let issues = client_for(&server, 3)
            .list_open_issues(&repo())
            .await
            .expect("list issues");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 1);
    }
}
