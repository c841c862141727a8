//! Client-side glue between an identity-assertion widget and a site's
//! BrowserID login/logout endpoints.
//!
//! DESIGN
//! ======
//! The widget fires login/logout events whenever it likes (page load,
//! other tabs, popup completion). `AssertionCoordinator` turns that
//! ambient event stream into request-shaped results for explicit
//! `login()`/`logout()` calls, and hands unrequested logins to an optional
//! auto-login handler. `PageFlow` sits on top and maps results to
//! navigation.
//!
//! ```text
//! IdentityWidget --WidgetEvent--> dispatcher --> pending slot / auto-login
//!        ^                                              |
//!        +---- request()/logout() <-- coordinator <-----+--> VerificationBackend
//! ```

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod failure_flag;
pub mod flow;
pub mod info;
pub mod widget;

pub use backend::{HttpBackend, LogoutResult, VerificationBackend, VerifyForm, VerifyResult};
pub use config::ShimConfig;
pub use coordinator::{AssertionCoordinator, AutoLoginHandler, CoordinatorOptions, LoginTarget};
pub use error::{Direction, ShimError};
pub use failure_flag::LoginFailureFlag;
pub use flow::{Navigator, Outcome, PageFlow, Trigger};
pub use info::{RequestArgs, SessionInfo};
pub use widget::{IdentityWidget, ScriptedWidget, WatchOptions, WidgetEvent, WidgetEvents};
