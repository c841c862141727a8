//! Failed-login marker carried in the page URL.
//!
//! After a rejected login the backend redirects to a page whose query
//! string carries `<param>=1`. The widget will typically fire a login
//! event again as soon as handlers are attached; the coordinator uses this
//! flag to swallow that first event instead of looping.

use reqwest::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoginFailureFlag(bool);

impl LoginFailureFlag {
    /// Flag that is never set.
    #[must_use]
    pub fn absent() -> Self {
        Self(false)
    }

    /// Parse the flag from a full page URL.
    ///
    /// The flag is set only when `param` appears in the query with the
    /// value `1`. Unparseable URLs yield an unset flag.
    #[must_use]
    pub fn from_page_url(page_url: &str, param: &str) -> Self {
        let Ok(url) = Url::parse(page_url) else {
            return Self::absent();
        };
        Self(url.query_pairs().any(|(k, v)| k == param && v == "1"))
    }

    #[must_use]
    pub fn is_set(self) -> bool {
        self.0
    }
}

#[cfg(test)]
#[path = "failure_flag_test.rs"]
mod tests;
