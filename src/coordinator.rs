//! Assertion coordinator: bridges widget events to explicit login/logout calls.
//!
//! DESIGN
//! ======
//! The widget fires `Login`/`Logout` events on its own schedule. Each
//! direction has one pending slot holding the reply half of a oneshot:
//!
//! ```text
//! Idle --login()/logout()--> Requested --matching event--> Settled --> Idle
//! ```
//!
//! A dispatcher task drains the event channel and decides, per event,
//! whether to settle a pending slot, swallow it (first login after a failed
//! login), hand it to the auto-login handler, or drop it.
//!
//! A swallowed login that answered a pending request rejects that request
//! with `LoginSuppressed`, so the slot is free for the next click. The
//! forced widget logout that goes with it fires a `Logout` event like any
//! other; if a logout is pending at that moment, that event settles it. The
//! widget session is gone either way, and the caller's own logout event
//! then arrives unmatched.
//!
//! TRADE-OFFS
//! ==========
//! A second call in the same direction while one is pending is rejected
//! with `AlreadyPending` rather than replacing the slot, so the first
//! caller is never abandoned. A caller that drops its future frees the
//! slot. There is no timeout: if the user walks away from the popup the
//! request stays pending until the page tears the coordinator down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{LogoutResult, VerificationBackend, VerifyForm, VerifyResult};
use crate::config::ShimConfig;
use crate::error::{Direction, ShimError};
use crate::failure_flag::LoginFailureFlag;
use crate::info::{InfoCache, RequestArgs, SessionInfo, merge_request_args};
use crate::widget::{IdentityWidget, WatchOptions, WidgetEvent, WidgetEvents};

/// Receives assertions from logins nobody asked for (page load, other tabs).
pub type AutoLoginHandler = Arc<dyn Fn(String) + Send + Sync>;

type LoginReply = oneshot::Sender<Result<String, ShimError>>;
type LogoutReply = oneshot::Sender<()>;

// =============================================================================
// LOGIN TARGET
// =============================================================================

/// First argument of [`AssertionCoordinator::login`].
///
/// A bare string is the post-login redirect hint, not request arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoginTarget {
    #[default]
    Default,
    Args(RequestArgs),
    Next(String),
}

impl LoginTarget {
    /// Split into `(request_args, next)`.
    ///
    /// When the target is itself a `next` hint, it takes precedence over
    /// the explicit `next` argument.
    #[must_use]
    pub fn resolve(self, next: Option<&str>) -> (Option<RequestArgs>, Option<String>) {
        match self {
            Self::Default => (None, next.map(str::to_string)),
            Self::Args(args) => (Some(args), next.map(str::to_string)),
            Self::Next(next) => (None, Some(next)),
        }
    }
}

impl From<RequestArgs> for LoginTarget {
    fn from(args: RequestArgs) -> Self {
        Self::Args(args)
    }
}

impl From<Option<RequestArgs>> for LoginTarget {
    fn from(args: Option<RequestArgs>) -> Self {
        args.map_or(Self::Default, Self::Args)
    }
}

impl From<&str> for LoginTarget {
    fn from(next: &str) -> Self {
        Self::Next(next.to_string())
    }
}

impl From<String> for LoginTarget {
    fn from(next: String) -> Self {
        Self::Next(next)
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Set when the page was reached through a failed-login redirect.
    pub failure_flag: LoginFailureFlag,
    /// Fetch session info before `watch` to pass the logged-in user.
    pub sync_logged_in_user: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self { failure_flag: LoginFailureFlag::absent(), sync_logged_in_user: true }
    }
}

impl CoordinatorOptions {
    /// Options for a page at `page_url` (if known) under `config`.
    #[must_use]
    pub fn for_page(config: &ShimConfig, page_url: Option<&str>) -> Self {
        let failure_flag = page_url.map_or_else(LoginFailureFlag::absent, |url| {
            LoginFailureFlag::from_page_url(url, &config.failure_param)
        });
        Self { failure_flag, sync_logged_in_user: config.sync_logged_in_user }
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// One per page. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AssertionCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn VerificationBackend>,
    widget: Arc<dyn IdentityWidget>,
    info: InfoCache,
    sync_logged_in_user: bool,
    /// Armed by the failure flag, cleared by the first login event.
    suppress_next_login: AtomicBool,
    /// Set once `initialize` has started; guards double registration.
    initializing: AtomicBool,
    /// Set once `watch` has been issued.
    watching: AtomicBool,
    ready: AtomicBool,
    slots: Mutex<Slots>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct Slots {
    login: Option<LoginReply>,
    logout: Option<LogoutReply>,
    /// Set on teardown; no slot may be opened afterwards.
    closed: bool,
}

/// What the dispatcher did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Resolved(Direction),
    Suppressed,
    AutoLogin,
    Unmatched,
    Ready,
}

impl AssertionCoordinator {
    #[must_use]
    pub fn new(
        backend: Arc<dyn VerificationBackend>,
        widget: Arc<dyn IdentityWidget>,
        options: CoordinatorOptions,
    ) -> Self {
        if options.failure_flag.is_set() {
            debug!("page carries failed-login flag; next login event will be suppressed");
        }
        Self {
            inner: Arc::new(Inner {
                backend,
                widget,
                info: InfoCache::new(),
                sync_logged_in_user: options.sync_logged_in_user,
                suppress_next_login: AtomicBool::new(options.failure_flag.is_set()),
                initializing: AtomicBool::new(false),
                watching: AtomicBool::new(false),
                ready: AtomicBool::new(false),
                slots: Mutex::new(Slots::default()),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    /// Register the widget's handlers. Must complete before
    /// `request_assertion`, `login` or `logout`.
    ///
    /// When configured to sync the logged-in user, session info is fetched
    /// first so the widget receives `loggedInUser`.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` on a second call; the info fetch error if that
    /// fetch fails (initialization may then be retried).
    pub async fn initialize(&self, on_auto_login: Option<AutoLoginHandler>) -> Result<(), ShimError> {
        if self.inner.initializing.swap(true, Ordering::SeqCst) {
            return Err(ShimError::AlreadyInitialized);
        }

        let logged_in_user = if self.inner.sync_logged_in_user {
            match self.info().await {
                Ok(info) => info.user_email.clone(),
                Err(e) => {
                    self.inner.initializing.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_dispatcher(Arc::downgrade(&self.inner), rx, on_auto_login);
        *self.inner.lock_dispatcher() = Some(handle);

        info!(logged_in_user = ?logged_in_user, "registering identity widget handlers");
        self.inner
            .widget
            .watch(WatchOptions { logged_in_user }, WidgetEvents::new(tx));
        self.inner.watching.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Session info, fetched on first use and cached for the page.
    ///
    /// # Errors
    ///
    /// Propagates the backend fetch error.
    pub async fn info(&self) -> Result<&SessionInfo, ShimError> {
        self.inner.info.get_or_fetch(self.inner.backend.as_ref()).await
    }

    /// A CSRF token for the next state-changing POST.
    ///
    /// Fetched fresh from `csrfUrl` when the info names one, otherwise the
    /// inline `csrfToken`.
    ///
    /// # Errors
    ///
    /// `MissingCsrf` if the info has neither; backend errors otherwise.
    pub async fn csrf_token(&self) -> Result<String, ShimError> {
        let info = self.info().await?;
        self.csrf_token_for(info).await
    }

    /// Ask the widget for an assertion and wait for its login event.
    ///
    /// `request_args` are merged over the info's default request args.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, `AlreadyPending(Login)`, `NoAssertion` if the
    /// widget answers with `null`, `LoginSuppressed` if the answer was the
    /// first login after a failed login, `WidgetClosed` on teardown, or the
    /// info fetch error.
    pub async fn request_assertion(&self, request_args: Option<RequestArgs>) -> Result<String, ShimError> {
        self.ensure_watching()?;
        let info = self.info().await?;
        let args = merge_request_args(&info.request_args, request_args);

        let reply = open_slot(&mut self.inner.lock_open_slots()?.login, Direction::Login)?;
        debug!(arg_count = args.len(), "requesting assertion from identity widget");
        self.inner.widget.request(&args);

        reply.await.map_err(|_| ShimError::WidgetClosed)?
    }

    /// Submit an assertion to the verify endpoint.
    ///
    /// # Errors
    ///
    /// `VerificationRejected` with the raw body on a non-success status;
    /// network, decode and CSRF errors otherwise.
    pub async fn verify(&self, assertion: &str, next: Option<&str>) -> Result<VerifyResult, ShimError> {
        let info = self.info().await?;
        let csrf_token = self.csrf_token_for(info).await?;

        debug!(assertion_len = assertion.len(), next = ?next, "verifying assertion");
        let form = VerifyForm { assertion, next };
        let result = self
            .inner
            .backend
            .verify(&info.login_url, &form, &csrf_token)
            .await?;
        info!(email = ?result.email, "assertion verified");
        Ok(result)
    }

    /// `request_assertion` then `verify`.
    ///
    /// `target` is either request args or, for a bare string, the `next`
    /// redirect hint.
    ///
    /// # Errors
    ///
    /// Any error from `request_assertion` or `verify`.
    pub async fn login(&self, target: impl Into<LoginTarget>, next: Option<&str>) -> Result<VerifyResult, ShimError> {
        let (request_args, next) = target.into().resolve(next);
        let assertion = self.request_assertion(request_args).await?;
        self.verify(&assertion, next.as_deref()).await
    }

    /// Log the widget out, wait for its logout event, then POST to the
    /// logout endpoint.
    ///
    /// The backend is not contacted until the widget's logout event fires.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, `AlreadyPending(Logout)`, `WidgetClosed` on
    /// teardown, or backend errors.
    pub async fn logout(&self, next: Option<&str>) -> Result<LogoutResult, ShimError> {
        self.ensure_watching()?;
        let info = self.info().await?;

        let reply = open_slot(&mut self.inner.lock_open_slots()?.logout, Direction::Logout)?;
        debug!("requesting identity widget logout");
        self.inner.widget.logout();
        reply.await.map_err(|_| ShimError::WidgetClosed)?;

        let csrf_token = self.csrf_token_for(info).await?;
        let result = self
            .inner
            .backend
            .logout(&info.logout_url, next, &csrf_token)
            .await?;
        info!(redirect = ?result.redirect, "logged out");
        Ok(result)
    }

    /// Whether the widget has signalled `onready`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Stop the dispatcher and fail pending and later requests with
    /// `WidgetClosed`.
    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.lock_dispatcher().take() {
            handle.abort();
        }
        self.inner.close_slots();
        debug!("assertion coordinator shut down");
    }

    fn ensure_watching(&self) -> Result<(), ShimError> {
        if self.inner.lock_slots().closed {
            Err(ShimError::WidgetClosed)
        } else if self.inner.watching.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ShimError::NotInitialized)
        }
    }

    async fn csrf_token_for(&self, info: &SessionInfo) -> Result<String, ShimError> {
        match (&info.csrf_url, &info.csrf_token) {
            (Some(url), _) => self.inner.backend.fetch_csrf_token(url).await,
            (None, Some(token)) => Ok(token.clone()),
            (None, None) => Err(ShimError::MissingCsrf),
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

impl Inner {
    fn lock_slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_dispatcher(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Slots for opening a request, unless the coordinator is torn down.
    fn lock_open_slots(&self) -> Result<MutexGuard<'_, Slots>, ShimError> {
        let slots = self.lock_slots();
        if slots.closed {
            return Err(ShimError::WidgetClosed);
        }
        Ok(slots)
    }

    /// Drop both reply halves so their callers see `WidgetClosed`, and
    /// refuse new requests from here on.
    fn close_slots(&self) {
        let mut slots = self.lock_slots();
        slots.login = None;
        slots.logout = None;
        slots.closed = true;
    }

    fn dispatch(&self, event: WidgetEvent, on_auto_login: Option<&AutoLoginHandler>) -> Dispatch {
        match event {
            WidgetEvent::Ready => {
                self.ready.store(true, Ordering::SeqCst);
                debug!("identity widget ready");
                Dispatch::Ready
            }
            WidgetEvent::Login(assertion) => self.dispatch_login(assertion, on_auto_login),
            WidgetEvent::Logout => self.dispatch_logout(),
        }
    }

    fn dispatch_login(&self, assertion: Option<String>, on_auto_login: Option<&AutoLoginHandler>) -> Dispatch {
        if self.suppress_next_login.swap(false, Ordering::SeqCst) {
            info!("suppressing first login event after failed login; forcing widget logout");
            if let Some(reply) = take_open(&mut self.lock_slots().login) {
                debug!("rejecting pending login answered by the suppressed event");
                let _ = reply.send(Err(ShimError::LoginSuppressed));
            }
            self.widget.logout();
            return Dispatch::Suppressed;
        }

        let pending = take_open(&mut self.lock_slots().login);
        match (pending, assertion) {
            (Some(reply), Some(assertion)) => {
                debug!(assertion_len = assertion.len(), "resolving pending login request");
                if reply.send(Ok(assertion)).is_err() {
                    debug!("login requester went away before the assertion arrived");
                }
                Dispatch::Resolved(Direction::Login)
            }
            (Some(reply), None) => {
                warn!("identity widget answered login request without an assertion");
                let _ = reply.send(Err(ShimError::NoAssertion));
                Dispatch::Resolved(Direction::Login)
            }
            (None, Some(assertion)) => match on_auto_login {
                Some(handler) => {
                    info!("forwarding unrequested login to auto-login handler");
                    handler(assertion);
                    Dispatch::AutoLogin
                }
                None => {
                    debug!("dropping unrequested login event");
                    Dispatch::Unmatched
                }
            },
            (None, None) => {
                debug!("ignoring empty unrequested login event");
                Dispatch::Unmatched
            }
        }
    }

    fn dispatch_logout(&self) -> Dispatch {
        match take_open(&mut self.lock_slots().logout) {
            Some(reply) => {
                debug!("resolving pending logout request");
                let _ = reply.send(());
                Dispatch::Resolved(Direction::Logout)
            }
            None => {
                debug!("ignoring unrequested logout event");
                Dispatch::Unmatched
            }
        }
    }
}

fn spawn_dispatcher(
    inner: Weak<Inner>,
    mut events: mpsc::UnboundedReceiver<WidgetEvent>,
    on_auto_login: Option<AutoLoginHandler>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let outcome = inner.dispatch(event, on_auto_login.as_ref());
            debug!(?outcome, "dispatched widget event");
        }

        debug!("widget event channel closed");
        if let Some(inner) = inner.upgrade() {
            inner.close_slots();
        }
    })
}

/// Open a slot, refusing if a live request already holds it.
fn open_slot<T>(
    slot: &mut Option<oneshot::Sender<T>>,
    direction: Direction,
) -> Result<oneshot::Receiver<T>, ShimError> {
    if slot.as_ref().is_some_and(|reply| !reply.is_closed()) {
        warn!(%direction, "rejecting request while another is pending");
        return Err(ShimError::AlreadyPending(direction));
    }
    let (tx, rx) = oneshot::channel();
    *slot = Some(tx);
    Ok(rx)
}

/// Take a slot's reply half unless its requester has already gone.
fn take_open<T>(slot: &mut Option<oneshot::Sender<T>>) -> Option<oneshot::Sender<T>> {
    slot.take().filter(|reply| !reply.is_closed())
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
