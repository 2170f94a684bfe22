//! Page navigation with a bounded timeout and settle delay
//!
//! Opens a fresh page, loads the target URL, waits for the navigation
//! lifecycle, then sleeps a fixed settle delay so client-side rendering can
//! populate the gallery's explainer panel. Navigation failure is the only
//! fatal outcome in the whole extraction; there is no retry here — retry
//! policy belongs to the orchestrator.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::browser::{BrowserError, BrowserWrapper, PageGuard};

/// Upper bound on the caller-supplied navigation budget. Covers slow pages
/// and cold CDN hits; anything longer is a configuration mistake.
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("timeout of {0}ms exceeds maximum of {MAX_NAVIGATION_TIMEOUT_MS}ms")]
    InvalidTimeout(u64),

    #[error("URL must start with http:// or https://: {0}")]
    InvalidUrl(String),

    #[error("navigation timeout after {timeout_ms}ms for {url}")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("navigation failed for {url}: {reason}")]
    Failed { url: String, reason: String },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Validate a navigation timeout against the hard upper bound.
pub fn validate_navigation_timeout(timeout_ms: u64) -> Result<Duration, NavigationError> {
    if timeout_ms == 0 || timeout_ms > MAX_NAVIGATION_TIMEOUT_MS {
        return Err(NavigationError::InvalidTimeout(timeout_ms));
    }
    Ok(Duration::from_millis(timeout_ms))
}

/// Navigate a fresh page to `url` and wait until it has settled.
///
/// Returns the owning page guard; the caller must close it (or drop it,
/// which closes best-effort). The settle delay is a fixed wait after the
/// load lifecycle completes — the gallery renders its explainer panel from
/// script, and there is no single DOM predicate that covers every page
/// variant, so the bounded fixed delay is the baseline behavior.
pub async fn open_page(
    wrapper: &BrowserWrapper,
    url: &str,
    timeout_ms: u64,
    settle_delay_ms: u64,
) -> Result<PageGuard, NavigationError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(NavigationError::InvalidUrl(url.to_string()));
    }
    let timeout = validate_navigation_timeout(timeout_ms)?;

    let guard = wrapper.new_page().await?;

    tokio::time::timeout(timeout, guard.page().goto(url))
        .await
        .map_err(|_| NavigationError::Timeout {
            url: url.to_string(),
            timeout_ms,
        })?
        .map_err(|e| NavigationError::Failed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    // The goto future resolves on frame navigation; the lifecycle wait
    // covers the load event and late document requests.
    tokio::time::timeout(timeout, guard.page().wait_for_navigation())
        .await
        .map_err(|_| NavigationError::Timeout {
            url: url.to_string(),
            timeout_ms,
        })?
        .map_err(|e| NavigationError::Failed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if settle_delay_ms > 0 {
        debug!(settle_delay_ms, url, "waiting for client-side rendering");
        tokio::time::sleep(Duration::from_millis(settle_delay_ms)).await;
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_oversized_timeouts_are_rejected() {
        assert!(validate_navigation_timeout(0).is_err());
        assert!(validate_navigation_timeout(MAX_NAVIGATION_TIMEOUT_MS + 1).is_err());
    }

    #[test]
    fn in_range_timeout_converts_to_duration() {
        let d = validate_navigation_timeout(30_000).unwrap();
        assert_eq!(d, Duration::from_millis(30_000));
    }
}
