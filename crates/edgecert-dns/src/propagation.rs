//! DNS propagation checks
//!
//! After a challenge record is created the ACME server will look it up from
//! its own vantage point. [`PropagationVerifier`] polls a public resolver until
//! the value is visible there, so the challenge is not submitted too early.

use edgecert_core::{poll_until, Attempt, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::DnsError;
use crate::resolver::TxtResolver;

/// How a resolver answer is compared with the expected challenge value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The answer, once unquoted, must equal the value.
    #[default]
    Exact,
    /// The raw answer must contain the value anywhere. Can report a match for
    /// an unrelated record whose content happens to embed the value.
    Substring,
}

impl MatchMode {
    pub fn matches(&self, data: &str, expected: &str) -> bool {
        match self {
            MatchMode::Exact => normalize_txt_data(data) == expected,
            MatchMode::Substring => data.contains(expected),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => f.write_str("exact"),
            MatchMode::Substring => f.write_str("substring"),
        }
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(MatchMode::Exact),
            "substring" => Ok(MatchMode::Substring),
            other => Err(format!(
                "Invalid TXT match mode '{}', expected 'exact' or 'substring'",
                other
            )),
        }
    }
}

/// Turn a presentation-format TXT `data` string into its content.
///
/// Resolvers return `"abc"` for a single string and `"ab" "c"` for a record
/// split into several strings. Unquoted data is returned trimmed.
pub fn normalize_txt_data(data: &str) -> String {
    let trimmed = data.trim();
    if !trimmed.starts_with('"') {
        return trimmed.to_string();
    }

    let mut content = String::with_capacity(trimmed.len());
    let mut in_quotes = false;
    let mut chars = trimmed.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    content.push(escaped);
                }
            }
            c if in_quotes => content.push(c),
            _ => {}
        }
    }
    content
}

/// Polls a [`TxtResolver`] until a TXT value becomes visible.
pub struct PropagationVerifier {
    resolver: Arc<dyn TxtResolver>,
    policy: RetryPolicy,
    match_mode: MatchMode,
}

impl PropagationVerifier {
    pub const DEFAULT_ATTEMPTS: u32 = 10;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    /// Ten polls, each preceded by a five second wait.
    pub fn new(resolver: Arc<dyn TxtResolver>, match_mode: MatchMode) -> Self {
        Self {
            resolver,
            policy: RetryPolicy::fixed(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_INTERVAL)
                .with_initial_delay(),
            match_mode,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    /// Wait until `record_name` resolves to `expected`.
    ///
    /// Returns the number of polls it took. Resolver errors use up a poll but
    /// do not abort the wait.
    pub async fn wait_for_txt(&self, record_name: &str, expected: &str) -> Result<u32, DnsError> {
        info!(
            record_name,
            max_attempts = self.policy.max_attempts,
            match_mode = %self.match_mode,
            "Waiting for TXT record to propagate"
        );

        let outcome = poll_until(&self.policy, |attempt| async move {
            match self.resolver.resolve_txt(record_name).await {
                Ok(values) if values.iter().any(|v| self.match_mode.matches(v, expected)) => {
                    Attempt::Done(attempt)
                }
                Ok(values) => {
                    debug!(
                        record_name,
                        attempt,
                        answers = values.len(),
                        "TXT value not visible yet"
                    );
                    Attempt::Pending
                }
                Err(e) => {
                    warn!(record_name, attempt, "TXT lookup failed: {}", e);
                    Attempt::Failed(e)
                }
            }
        })
        .await;

        match outcome {
            Ok(attempts) => {
                info!(record_name, attempts, "TXT record propagated");
                Ok(attempts)
            }
            Err(exhausted) => Err(DnsError::PropagationTimeout {
                record_name: record_name.to_string(),
                attempts: exhausted.attempts,
            }),
        }
    }
}
