//! Session info fetched once from the backend and cached for the page.
//!
//! DESIGN
//! ======
//! The info endpoint tells the page how to talk to the backend: default
//! widget request arguments, the verify/logout/CSRF URLs, and optionally
//! the logged-in user's email. It is read on first need and never
//! invalidated, so a session change without a reload leaves it stale.
//!
//! TRADE-OFFS
//! ==========
//! `InfoCache` wraps `tokio::sync::OnceCell`: concurrent callers that
//! arrive before the first fetch resolves wait on the same fetch instead of
//! issuing their own. A failed fetch is not cached; the next caller retries.

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::backend::VerificationBackend;
use crate::error::ShimError;

/// Arguments handed to the widget's `request` primitive.
pub type RequestArgs = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Default arguments for the widget's request popup.
    #[serde(default)]
    pub request_args: RequestArgs,
    /// Assertion verification endpoint.
    pub login_url: String,
    pub logout_url: String,
    /// Endpoint returning a fresh CSRF token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_url: Option<String>,
    /// Token embedded directly in the info payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

/// Merge caller arguments over the defaults. Caller keys win.
#[must_use]
pub fn merge_request_args(defaults: &RequestArgs, overrides: Option<RequestArgs>) -> RequestArgs {
    let mut merged = defaults.clone();
    if let Some(overrides) = overrides {
        merged.extend(overrides);
    }
    merged
}

// =============================================================================
// CACHE
// =============================================================================

#[derive(Debug, Default)]
pub struct InfoCache {
    cell: OnceCell<SessionInfo>,
}

impl InfoCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached info, fetching it through `backend` on first use.
    ///
    /// # Errors
    ///
    /// Propagates the backend's fetch error. Nothing is cached in that case.
    pub async fn get_or_fetch(&self, backend: &dyn VerificationBackend) -> Result<&SessionInfo, ShimError> {
        self.cell
            .get_or_try_init(|| async {
                debug!("fetching session info");
                let info = backend.fetch_info().await;
                if let Err(e) = &info {
                    warn!(error = %e, "session info fetch failed");
                }
                info
            })
            .await
    }
}

#[cfg(test)]
#[path = "info_test.rs"]
mod tests;
