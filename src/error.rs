//! Errors produced by the assertion exchange.
//!
//! Nothing here is fatal to the page: `PageFlow` logs every variant and
//! leaves the page where it is unless a redirect target is known.

use std::fmt;

use serde::Deserialize;

/// Which half of the exchange a pending slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Login,
    Logout,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => f.write_str("login"),
            Self::Logout => f.write_str("logout"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Config(String),

    /// The HTTP request never produced a response (connect, timeout, body read).
    #[error("network request failed: {0}")]
    Network(String),

    /// An info, CSRF or logout endpoint answered with a non-success status.
    #[error("{endpoint} returned status {status}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    /// The verify endpoint refused the assertion. `body` is the raw response.
    #[error("assertion verification rejected: status {status}")]
    VerificationRejected { status: u16, body: String },

    /// A success response carried no usable redirect target.
    #[error("response carried no redirect target")]
    MissingRedirect,

    /// A response body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("session info has neither csrfUrl nor csrfToken")]
    MissingCsrf,

    #[error("widget handlers are not registered; call initialize() first")]
    NotInitialized,

    #[error("widget handlers are already registered")]
    AlreadyInitialized,

    /// A second explicit call arrived while the first was still waiting on the widget.
    #[error("a {0} request is already pending")]
    AlreadyPending(Direction),

    /// The widget answered a pending login without an assertion.
    #[error("identity widget returned no assertion")]
    NoAssertion,

    /// The widget's answer was the first login after a failed login and was
    /// swallowed; the widget has been logged out and the login can be retried.
    #[error("login event suppressed after a failed login")]
    LoginSuppressed,

    /// The event channel shut down, or the coordinator was torn down.
    #[error("identity widget event channel closed")]
    WidgetClosed,
}

impl ShimError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "E_CONFIG",
            Self::Network(_) => "E_NETWORK",
            Self::UnexpectedStatus { .. } => "E_UNEXPECTED_STATUS",
            Self::VerificationRejected { .. } => "E_VERIFICATION_REJECTED",
            Self::MissingRedirect => "E_MISSING_REDIRECT",
            Self::Decode(_) => "E_DECODE",
            Self::MissingCsrf => "E_MISSING_CSRF",
            Self::NotInitialized => "E_NOT_INITIALIZED",
            Self::AlreadyInitialized => "E_ALREADY_INITIALIZED",
            Self::AlreadyPending(_) => "E_ALREADY_PENDING",
            Self::NoAssertion => "E_NO_ASSERTION",
            Self::LoginSuppressed => "E_LOGIN_SUPPRESSED",
            Self::WidgetClosed => "E_WIDGET_CLOSED",
        }
    }

    /// Redirect target embedded in a rejected verification response, if any.
    ///
    /// Only `VerificationRejected` bodies are inspected; a body that is not
    /// JSON, or whose `redirect` is missing or empty, yields `None`.
    #[must_use]
    pub fn failure_redirect(&self) -> Option<String> {
        #[derive(Deserialize)]
        struct FailureBody {
            redirect: Option<String>,
        }

        let Self::VerificationRejected { body, .. } = self else {
            return None;
        };
        serde_json::from_str::<FailureBody>(body)
            .ok()
            .and_then(|b| b.redirect)
            .filter(|r| !r.is_empty())
    }
}

impl From<reqwest::Error> for ShimError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
