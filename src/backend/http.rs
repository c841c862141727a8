//! reqwest implementation of the verification backend.
//!
//! Endpoint URLs in the session info are usually relative
//! (`/browserid/login/`); they are resolved against the configured base
//! URL. POST bodies are form-encoded and carry the CSRF token in
//! `X-CSRFToken`, plus `X-Requested-With` so the backend answers with
//! JSON rather than a redirect page.

use reqwest::{Client, Response, Url};
use tracing::{debug, warn};

use super::{LogoutForm, LogoutResult, VerificationBackend, VerifyForm, VerifyResult};
use crate::config::ShimConfig;
use crate::error::ShimError;
use crate::info::SessionInfo;

const CSRF_HEADER: &str = "X-CSRFToken";
const REQUESTED_WITH_HEADER: &str = "X-Requested-With";
const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpBackend {
    http: Client,
    base_url: Url,
    info_path: String,
}

impl HttpBackend {
    /// Build a backend client from config.
    ///
    /// # Errors
    ///
    /// Returns `ShimError::Config` for an unparseable base URL or if the
    /// HTTP client cannot be built.
    pub fn new(config: &ShimConfig) -> Result<Self, ShimError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ShimError::Config(format!("invalid base URL {}: {e}", config.base_url)))?;
        let http = Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| ShimError::Config(format!("HTTP client build failed: {e}")))?;
        Ok(Self { http, base_url, info_path: config.info_path.clone() })
    }

    fn resolve(&self, target: &str) -> Result<Url, ShimError> {
        self.base_url
            .join(target)
            .map_err(|e| ShimError::Config(format!("invalid endpoint URL {target}: {e}")))
    }

    async fn post_form<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
        csrf_token: &str,
    ) -> Result<Response, ShimError> {
        let url = self.resolve(url)?;
        debug!(url = %url, "posting form");
        let response = self
            .http
            .post(url)
            .header(CSRF_HEADER, csrf_token)
            .header(REQUESTED_WITH_HEADER, REQUESTED_WITH_VALUE)
            .form(form)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait::async_trait]
impl VerificationBackend for HttpBackend {
    async fn fetch_info(&self) -> Result<SessionInfo, ShimError> {
        let url = self.resolve(&self.info_path)?;
        let response = self
            .http
            .get(url)
            .header(REQUESTED_WITH_HEADER, REQUESTED_WITH_VALUE)
            .send()
            .await?;
        let text = expect_success(response, "info").await?;
        parse_info(&text)
    }

    async fn fetch_csrf_token(&self, csrf_url: &str) -> Result<String, ShimError> {
        let url = self.resolve(csrf_url)?;
        let response = self
            .http
            .get(url)
            .header(REQUESTED_WITH_HEADER, REQUESTED_WITH_VALUE)
            .send()
            .await?;
        let text = expect_success(response, "csrf").await?;
        let token = parse_csrf_token(&text)?;
        debug!(token_len = token.len(), "fetched csrf token");
        Ok(token)
    }

    async fn verify(
        &self,
        login_url: &str,
        form: &VerifyForm<'_>,
        csrf_token: &str,
    ) -> Result<VerifyResult, ShimError> {
        let response = self.post_form(login_url, form, csrf_token).await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "assertion verification rejected");
            return Err(ShimError::VerificationRejected { status: status.as_u16(), body: text });
        }

        serde_json::from_str(&text).map_err(|e| ShimError::Decode(format!("verify response: {e}")))
    }

    async fn logout(&self, logout_url: &str, next: Option<&str>, csrf_token: &str) -> Result<LogoutResult, ShimError> {
        let response = self
            .post_form(logout_url, &LogoutForm { next }, csrf_token)
            .await?;
        let text = expect_success(response, "logout").await?;
        serde_json::from_str(&text).map_err(|e| ShimError::Decode(format!("logout response: {e}")))
    }
}

// =============================================================================
// PARSING
// =============================================================================

async fn expect_success(response: Response, endpoint: &str) -> Result<String, ShimError> {
    let status = response.status();
    if !status.is_success() {
        warn!(endpoint, status = status.as_u16(), "backend returned error status");
        return Err(ShimError::UnexpectedStatus { endpoint: endpoint.to_string(), status: status.as_u16() });
    }
    Ok(response.text().await?)
}

fn parse_info(text: &str) -> Result<SessionInfo, ShimError> {
    serde_json::from_str(text).map_err(|e| ShimError::Decode(format!("session info: {e}")))
}

/// Accept the token as plain text or as a JSON string scalar.
fn parse_csrf_token(text: &str) -> Result<String, ShimError> {
    let trimmed = text.trim();
    let token = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::String(s)) => s,
        _ => trimmed.to_string(),
    };
    if token.is_empty() {
        return Err(ShimError::Decode("empty csrf token".into()));
    }
    Ok(token)
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
