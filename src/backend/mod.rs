//! Verification backend: the site's info, CSRF, verify and logout endpoints.
//!
//! DESIGN
//! ======
//! `VerificationBackend` is the seam between the coordinator and HTTP.
//! `HttpBackend` is the real implementation; tests substitute a mock.
//! Wire types live here so both sides agree on shapes.

pub mod http;

use serde::{Deserialize, Serialize};

use crate::error::ShimError;
use crate::info::SessionInfo;

pub use http::HttpBackend;

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Form body posted to the verify endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerifyForm<'a> {
    pub assertion: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<&'a str>,
}

/// Form body posted to the logout endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogoutForm<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<&'a str>,
}

/// Successful verify response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerifyResult {
    #[serde(default)]
    pub redirect: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl VerifyResult {
    /// Where the page should go next.
    ///
    /// # Errors
    ///
    /// `ShimError::MissingRedirect` if the response had no non-empty redirect.
    pub fn redirect_target(&self) -> Result<&str, ShimError> {
        usable_redirect(self.redirect.as_deref())
    }
}

/// Successful logout response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogoutResult {
    #[serde(default)]
    pub redirect: Option<String>,
}

impl LogoutResult {
    /// Where the page should go next.
    ///
    /// # Errors
    ///
    /// `ShimError::MissingRedirect` if the response had no non-empty redirect.
    pub fn redirect_target(&self) -> Result<&str, ShimError> {
        usable_redirect(self.redirect.as_deref())
    }
}

fn usable_redirect(redirect: Option<&str>) -> Result<&str, ShimError> {
    match redirect.map(str::trim) {
        Some(target) if !target.is_empty() => Ok(target),
        _ => Err(ShimError::MissingRedirect),
    }
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait VerificationBackend: Send + Sync {
    /// `GET <info-url>`.
    async fn fetch_info(&self) -> Result<SessionInfo, ShimError>;

    /// `GET <csrf-url>`, returning the bare token.
    async fn fetch_csrf_token(&self, csrf_url: &str) -> Result<String, ShimError>;

    /// `POST <login-url>` with the assertion and optional `next`.
    ///
    /// Non-success statuses become `ShimError::VerificationRejected` with
    /// the raw body attached.
    async fn verify(&self, login_url: &str, form: &VerifyForm<'_>, csrf_token: &str) -> Result<VerifyResult, ShimError>;

    /// `POST <logout-url>` with optional `next`.
    async fn logout(&self, logout_url: &str, next: Option<&str>, csrf_token: &str) -> Result<LogoutResult, ShimError>;
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
