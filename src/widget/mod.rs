//! Identity widget capability surface.
//!
//! SYSTEM CONTEXT
//! ==============
//! The widget is external: it owns the popup and decides when login and
//! logout events fire. Handlers are registered once through `watch`; after
//! that every event arrives on the `WidgetEvents` channel handed to it,
//! whether or not anyone asked for it.

pub mod scripted;

use tokio::sync::mpsc;

use crate::info::RequestArgs;

pub use scripted::ScriptedWidget;

/// Options passed alongside the handlers to `watch`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Email the site believes is logged in. Lets the widget skip firing a
    /// login event for a session the site already has.
    pub logged_in_user: Option<String>,
}

/// Events the widget fires on its own schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// `onlogin(assertion|null)`.
    Login(Option<String>),
    /// `onlogout()`.
    Logout,
    /// `onready()`.
    Ready,
}

/// Sending half of the inbound event channel, owned by the widget.
#[derive(Debug, Clone)]
pub struct WidgetEvents {
    tx: mpsc::UnboundedSender<WidgetEvent>,
}

impl WidgetEvents {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<WidgetEvent>) -> Self {
        Self { tx }
    }

    /// Deliver an event. Returns `false` once the dispatcher is gone.
    pub fn send(&self, event: WidgetEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn login(&self, assertion: Option<String>) -> bool {
        self.send(WidgetEvent::Login(assertion))
    }

    pub fn logout(&self) -> bool {
        self.send(WidgetEvent::Logout)
    }

    pub fn ready(&self) -> bool {
        self.send(WidgetEvent::Ready)
    }
}

/// The three primitives the coordinator consumes.
///
/// All three are fire-and-forget: results come back later as events.
pub trait IdentityWidget: Send + Sync {
    /// Register the event sink. Called exactly once per coordinator.
    fn watch(&self, options: WatchOptions, events: WidgetEvents);

    /// Open the assertion popup.
    fn request(&self, args: &RequestArgs);

    /// Drop the widget's own session; answered by a `Logout` event.
    fn logout(&self);
}
