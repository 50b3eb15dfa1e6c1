//! Fetching the sheet text.
//!
//! Published sheets are often unreachable directly (blocked hosts, CORS-only
//! deployments), so the resolver walks an ordered list of candidates: the sheet
//! URL itself, then each configured mirror wrapping it. Candidates are tried one
//! at a time and never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{AttemptFailure, ConfigError, FailedAttempt, RefreshError};

/// Bodies this short are error pages, not sheets.
pub const MIN_TEXT_LENGTH: usize = 50;

/// Mirrors in order of observed reliability. `{url}` is replaced by the
/// percent-encoded sheet URL, `{raw}` by the URL as is.
pub const DEFAULT_MIRRORS: [&str; 3] = [
    "https://api.allorigins.win/raw?url={url}",
    "https://corsproxy.io/?{url}",
    "https://api.codetabs.com/v1/proxy?quest={raw}",
];

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub label: String,
    pub url: String,
}

pub fn validate_mirror(template: &str) -> Result<(), ConfigError> {
    if template.contains("{url}") || template.contains("{raw}") {
        Ok(())
    } else {
        Err(ConfigError::InvalidMirror(template.to_string()))
    }
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split(['/', '?']).next().unwrap_or(rest)
}

/// The ordered candidate list for `primary`.
pub fn candidates(primary: &str, mirrors: &[String]) -> Vec<Candidate> {
    let encoded = urlencoding::encode(primary);

    let mut list = vec![Candidate {
        label: "direct".to_string(),
        url: primary.to_string(),
    }];
    list.extend(mirrors.iter().map(|template| Candidate {
        label: host_of(template).to_string(),
        url: template.replace("{url}", &encoded).replace("{raw}", primary),
    }));
    list
}

#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `url` and return the body. Non-success statuses are failures.
    async fn get_text(&self, url: &str) -> Result<String, AttemptFailure>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, AttemptFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))
    }
}

/// Text of the sheet and where it came from.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub text: String,
    pub source: Candidate,
}

pub struct SourceResolver {
    fetcher: Arc<dyn Fetch>,
    mirrors: Vec<String>,
    min_length: usize,
}

impl SourceResolver {
    pub fn new(fetcher: Arc<dyn Fetch>, mirrors: Vec<String>) -> Self {
        Self {
            fetcher,
            mirrors,
            min_length: MIN_TEXT_LENGTH,
        }
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Try every candidate in order and return the first plausible body.
    ///
    /// Fails with [`RefreshError::ResolutionExhausted`] listing why each
    /// candidate was rejected.
    #[instrument(skip(self))]
    pub async fn resolve(&self, primary: &str) -> Result<Resolved, RefreshError> {
        let mut attempts = Vec::new();

        for candidate in candidates(primary, &self.mirrors) {
            debug!(source = %candidate.label, "fetching");

            let reason = match self.fetcher.get_text(&candidate.url).await {
                Ok(text) => {
                    let len = text.chars().count();
                    if len > self.min_length {
                        info!(source = %candidate.label, chars = len, "sheet fetched");
                        return Ok(Resolved {
                            text,
                            source: candidate,
                        });
                    }
                    AttemptFailure::TooShort {
                        len,
                        min: self.min_length,
                    }
                }
                Err(e) => e,
            };

            warn!(source = %candidate.label, %reason, "source failed");
            attempts.push(FailedAttempt {
                source: candidate.label,
                reason,
            });
        }

        Err(RefreshError::ResolutionExhausted { attempts })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serves canned responses keyed by URL prefix and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedFetcher {
        responses: Vec<(String, Result<String, AttemptFailure>)>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub(crate) fn respond(mut self, prefix: &str, response: Result<String, AttemptFailure>) -> Self {
            self.responses.push((prefix.to_string(), response));
            self
        }
    }

    #[async_trait]
    impl Fetch for ScriptedFetcher {
        async fn get_text(&self, url: &str) -> Result<String, AttemptFailure> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses
                .iter()
                .find(|(prefix, _)| url.starts_with(prefix.as_str()))
                .map(|(_, r)| r.clone())
                .unwrap_or_else(|| Err(AttemptFailure::Transport("connection refused".to_string())))
        }
    }

    const SHEET: &str = "https://docs.example.com/sheet/pub?output=csv";

    fn mirrors() -> Vec<String> {
        DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect()
    }

    fn long_body() -> String {
        format!("Symbol,Shares,BuyPrice,BuyDate,CurrentPrice\n{}", "AAPL,1,1,2024-01-01,1\n".repeat(3))
    }

    #[test]
    fn test_candidates_order_and_encoding() {
        let list = candidates(SHEET, &mirrors());
        let labels: Vec<_> = list.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["direct", "api.allorigins.win", "corsproxy.io", "api.codetabs.com"]
        );
        assert_eq!(list[0].url, SHEET);
        assert_eq!(
            list[1].url,
            "https://api.allorigins.win/raw?url=https%3A%2F%2Fdocs.example.com%2Fsheet%2Fpub%3Foutput%3Dcsv"
        );
        assert_eq!(list[3].url, format!("https://api.codetabs.com/v1/proxy?quest={SHEET}"));
    }

    #[test]
    fn test_validate_mirror() {
        assert!(validate_mirror("https://proxy.local/?{url}").is_ok());
        assert!(validate_mirror("https://proxy.local/fetch").is_err());
    }

    #[tokio::test]
    async fn test_first_plausible_candidate_wins() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .respond(SHEET, Err(AttemptFailure::Status(403)))
                .respond("https://api.allorigins.win", Ok("<html>oops</html>".to_string()))
                .respond("https://corsproxy.io", Ok(long_body())),
        );
        let resolver = SourceResolver::new(fetcher.clone(), mirrors());

        let resolved = resolver.resolve(SHEET).await.unwrap();
        assert_eq!(resolved.source.label, "corsproxy.io");
        assert_eq!(resolved.text, long_body());

        // the last mirror is never touched
        assert_eq!(fetcher.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_keeps_every_reason() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .respond(SHEET, Err(AttemptFailure::Status(403)))
                .respond("https://api.allorigins.win", Ok("short".to_string())),
        );
        let resolver = SourceResolver::new(fetcher.clone(), mirrors());

        let err = resolver.resolve(SHEET).await.unwrap_err();
        match err {
            RefreshError::ResolutionExhausted { attempts } => {
                assert_eq!(attempts.len(), 4);
                assert_eq!(attempts[0].reason, AttemptFailure::Status(403));
                assert_eq!(attempts[1].reason, AttemptFailure::TooShort { len: 5, min: 50 });
                assert!(matches!(attempts[2].reason, AttemptFailure::Transport(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fetcher.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_exactly_min_length_is_rejected() {
        let fetcher = Arc::new(ScriptedFetcher::default().respond(SHEET, Ok("x".repeat(50))));
        let resolver = SourceResolver::new(fetcher, Vec::new());
        assert!(resolver.resolve(SHEET).await.is_err());

        let fetcher = Arc::new(ScriptedFetcher::default().respond(SHEET, Ok("x".repeat(51))));
        let resolver = SourceResolver::new(fetcher, Vec::new());
        assert_eq!(resolver.resolve(SHEET).await.unwrap().source.label, "direct");
    }

    #[tokio::test]
    async fn test_custom_min_length() {
        let fetcher = Arc::new(ScriptedFetcher::default().respond(SHEET, Ok("tiny,csv".to_string())));
        let resolver = SourceResolver::new(fetcher, Vec::new()).with_min_length(4);
        assert!(resolver.resolve(SHEET).await.is_ok());
    }
}
