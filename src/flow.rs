//! Page flow. Login/logout triggers in, navigation out.
//!
//! SYSTEM CONTEXT
//! ==============
//! Login and logout links carry a marker and an optional `next` target.
//! Whatever wires those links (DOM handlers, a CLI) turns a click into a
//! `Trigger`; `PageFlow` runs it through the coordinator and decides where
//! the page goes.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here is fatal. A rejected verification follows the redirect the
//! backend embedded in its failure body, if any; every other failure is
//! logged and the page stays where it is.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backend::{LogoutResult, VerifyResult};
use crate::coordinator::{AssertionCoordinator, AutoLoginHandler, LoginTarget};
use crate::error::ShimError;
use crate::info::RequestArgs;

/// Where the page goes next. In a browser this sets `window.location`.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

/// A user action on a login or logout link.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Login { request_args: Option<RequestArgs>, next: Option<String> },
    Logout { next: Option<String> },
}

impl Trigger {
    #[must_use]
    pub fn login(next: Option<&str>) -> Self {
        Self::Login { request_args: None, next: next.map(str::to_string) }
    }

    #[must_use]
    pub fn logout(next: Option<&str>) -> Self {
        Self::Logout { next: next.map(str::to_string) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Navigated(String),
    Stayed,
}

pub struct PageFlow {
    coordinator: AssertionCoordinator,
    navigator: Arc<dyn Navigator>,
    auto_login: Mutex<Option<JoinHandle<()>>>,
}

impl PageFlow {
    #[must_use]
    pub fn new(coordinator: AssertionCoordinator, navigator: Arc<dyn Navigator>) -> Self {
        Self { coordinator, navigator, auto_login: Mutex::new(None) }
    }

    /// Register widget handlers. Unrequested logins are verified in the
    /// background and followed like an explicit login without `next`.
    ///
    /// # Errors
    ///
    /// Propagates `AssertionCoordinator::initialize` errors.
    pub async fn start(&self) -> Result<(), ShimError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let handler: AutoLoginHandler = Arc::new(move |assertion| {
            let _ = tx.send(assertion);
        });
        self.coordinator.initialize(Some(handler)).await?;

        let coordinator = self.coordinator.clone();
        let navigator = Arc::clone(&self.navigator);
        let handle = tokio::spawn(async move {
            while let Some(assertion) = rx.recv().await {
                info!("verifying automatically-triggered login");
                let result = coordinator.verify(&assertion, None).await;
                follow_verify(navigator.as_ref(), result);
            }
        });
        *self.auto_login.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Run one trigger to completion.
    pub async fn handle(&self, trigger: Trigger) -> Outcome {
        match trigger {
            Trigger::Login { request_args, next } => {
                let result = self
                    .coordinator
                    .login(LoginTarget::from(request_args), next.as_deref())
                    .await;
                follow_verify(self.navigator.as_ref(), result)
            }
            Trigger::Logout { next } => {
                let result = self.coordinator.logout(next.as_deref()).await;
                follow_logout(self.navigator.as_ref(), result)
            }
        }
    }

    /// Page teardown: stop background work and fail pending requests.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .auto_login
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.coordinator.shutdown();
    }
}

fn follow_verify(navigator: &dyn Navigator, result: Result<VerifyResult, ShimError>) -> Outcome {
    match result {
        Ok(verified) => match verified.redirect_target() {
            Ok(target) => go(navigator, target),
            Err(e) => {
                warn!(error = %e, email = ?verified.email, "login succeeded without a redirect target");
                Outcome::Stayed
            }
        },
        Err(e) => match e.failure_redirect() {
            Some(target) => {
                warn!(error = %e, "login failed; following failure redirect");
                go(navigator, &target)
            }
            None => {
                error!(error = %e, code = e.error_code(), "login failed");
                Outcome::Stayed
            }
        },
    }
}

fn follow_logout(navigator: &dyn Navigator, result: Result<LogoutResult, ShimError>) -> Outcome {
    match result {
        Ok(logged_out) => match logged_out.redirect_target() {
            Ok(target) => go(navigator, target),
            Err(e) => {
                warn!(error = %e, "logout succeeded without a redirect target");
                Outcome::Stayed
            }
        },
        Err(e) => {
            error!(error = %e, code = e.error_code(), "logout failed");
            Outcome::Stayed
        }
    }
}

fn go(navigator: &dyn Navigator, target: &str) -> Outcome {
    info!(redirect = target, "navigating");
    navigator.navigate(target);
    Outcome::Navigated(target.to_string())
}

#[cfg(test)]
#[path = "flow_test.rs"]
mod tests;
