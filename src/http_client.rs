//! Shared HTTP client with a persistent, introspectable cookie jar.
//!
//! SiriusXM's player rejects requests from agents it doesn't recognize, so
//! the `User-Agent` below is pinned to a real desktop browser string rather
//! than left to reqwest's default. The cookie jar is built on `cookie_store`
//! (not reqwest's built-in jar) because the session manager needs to read
//! individual cookie values back out, not just replay them on the wire.

use std::sync::Arc;

use cookie_store::CookieStore;
use reqwest_cookie_store::CookieStoreMutex;

/// Matches a recent desktop Safari build; part of the wire contract with
/// upstream, not a cosmetic default.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/604.5.6 (KHTML, like Gecko) Version/11.0.3 Safari/604.5.6";

#[derive(Clone)]
pub struct HttpClient {
    pub client: reqwest::Client,
    pub cookies: Arc<CookieStoreMutex>,
}

impl HttpClient {
    pub fn new() -> Self {
        let cookies = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build reqwest client");

        Self { client, cookies }
    }

    /// Drops every cookie currently held. Used when an upstream call signals
    /// that the session has been invalidated server-side so the next
    /// `ensure_authenticated()` starts cleanly from scratch instead of
    /// trusting stale cookies the server no longer honors.
    pub fn clear_cookies(&self) {
        let mut store = self.cookies.lock().expect("cookie jar poisoned");
        *store = CookieStore::default();
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        let store = self.cookies.lock().expect("cookie jar poisoned");
        store.iter_unexpired().any(|c| c.name() == name)
    }

    pub fn cookie_value(&self, name: &str) -> Option<String> {
        let store = self.cookies.lock().expect("cookie jar poisoned");
        store
            .iter_unexpired()
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}
