use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy for a scraping run. Every variant is scoped to a
/// location, a unit, or a single listing; none of them abort the whole run
/// on their own.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The autocomplete lookup did not answer within the deadline.
    #[error("location lookup for {text:?} timed out after {deadline:?}")]
    ResolutionTimeout { text: String, deadline: Duration },

    /// The autocomplete service returned zero candidates. The owning unit is
    /// dropped from the plan and reported as a warning.
    #[error("no location candidates for {0:?}")]
    UnresolvableLocation(String),

    /// Timeout, rate limit, or server error. Retried with backoff.
    #[error("transient fetch failure for {url}: {reason}")]
    Transient { url: String, reason: String },

    /// Permanent 4xx or structurally broken response. Aborts only the unit.
    #[error("permanent fetch failure for {url} (status {status})")]
    Permanent { url: String, status: u16 },

    /// A listing missing its required fields. Dropped, unit continues.
    #[error("malformed listing {id:?}: {reason}")]
    MalformedListing { id: String, reason: String },

    /// A unit that exhausted retries or hit a permanent failure. Partial
    /// results, if any, are still emitted.
    #[error("search unit failed: {0}")]
    UnitFailed(String),

    /// The run's cancellation signal fired.
    #[error("run cancelled")]
    Cancelled,
}

impl ScrapeError {
    pub fn transient(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient { url: url.into(), reason: reason.into() }
    }

    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedListing { id: id.into(), reason: reason.into() }
    }

    /// Whether the retry policy applies.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScrapeError::Transient { .. })
    }
}

/// Rate limits and server-side errors are worth retrying; other client
/// errors are not.
pub fn transient_status(status: u16) -> bool {
    status == 429 || status == 408 || (500..600).contains(&status)
}
