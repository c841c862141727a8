//! Auto-answering widget for automated runs.
//!
//! Answers every `request` with a fixed assertion and every `logout` with
//! a logout event, so a login can be driven end to end without a popup.
//! Backends running in a test mode accept the assertion (`"fake"` by
//! default) without contacting a real verifier.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::{IdentityWidget, WatchOptions, WidgetEvent, WidgetEvents};
use crate::info::RequestArgs;

pub const DEFAULT_ASSERTION: &str = "fake";

pub struct ScriptedWidget {
    assertion: Option<String>,
    answers: bool,
    events: Mutex<Option<WidgetEvents>>,
    watched: Mutex<Option<WatchOptions>>,
    requests: Mutex<Vec<RequestArgs>>,
    logouts: AtomicUsize,
}

impl Default for ScriptedWidget {
    fn default() -> Self {
        Self::new(DEFAULT_ASSERTION)
    }
}

impl ScriptedWidget {
    /// Widget that answers requests with `assertion`.
    #[must_use]
    pub fn new(assertion: impl Into<String>) -> Self {
        Self::build(Some(assertion.into()), true)
    }

    /// Widget that answers requests with a `null` assertion.
    #[must_use]
    pub fn without_assertion() -> Self {
        Self::build(None, true)
    }

    /// Widget that records calls but never fires events on its own.
    #[must_use]
    pub fn silent() -> Self {
        Self::build(None, false)
    }

    fn build(assertion: Option<String>, answers: bool) -> Self {
        Self {
            assertion,
            answers,
            events: Mutex::new(None),
            watched: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            logouts: AtomicUsize::new(0),
        }
    }

    /// Fire an ambient event, as the real widget does on page load or
    /// cross-tab activity. Returns `false` if nothing is watching.
    pub fn emit(&self, event: WidgetEvent) -> bool {
        self.with_events(|events| events.send(event))
    }

    fn with_events(&self, f: impl FnOnce(&WidgetEvents) -> bool) -> bool {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        match events.as_ref() {
            Some(events) => f(events),
            None => {
                warn!("scripted widget emitted before watch");
                false
            }
        }
    }

    /// Options received by `watch`, if it has been called.
    #[must_use]
    pub fn watch_options(&self) -> Option<WatchOptions> {
        self.watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Arguments of every `request` call, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RequestArgs> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn logout_count(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

impl IdentityWidget for ScriptedWidget {
    fn watch(&self, options: WatchOptions, events: WidgetEvents) {
        debug!(logged_in_user = ?options.logged_in_user, "scripted widget watching");
        *self.watched.lock().unwrap_or_else(PoisonError::into_inner) = Some(options);
        if self.answers {
            events.ready();
        }
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(events);
    }

    fn request(&self, args: &RequestArgs) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(args.clone());
        if self.answers {
            self.with_events(|events| events.login(self.assertion.clone()));
        }
    }

    fn logout(&self) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        if self.answers {
            self.with_events(WidgetEvents::logout);
        }
    }
}

#[cfg(test)]
#[path = "scripted_test.rs"]
mod tests;
