//! Signed-in session context.
//!
//! A [`Session`] is a cheap cloneable handle; every clone sees the same
//! state. Changes are published on a `watch` channel so views can react to
//! sign-in and sign-out without polling. No network calls happen here: the
//! login flow lives with the caller, which reports its outcome through
//! [`Session::logged_in`] and [`Session::logged_out`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Header carrying the session token on API requests.
pub const TOKEN_HEADER: &str = "token";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStatus {
    /// Not yet checked, or a check is in flight.
    #[default]
    Unknown,
    LoggedIn,
    LoggedOut,
}

/// Account record returned by the API for the signed-in user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub id: i64,
    pub email: String,
    pub image: String,
    /// Number of messages the user has posted.
    pub messages: i64,
    pub username: String,
    pub new_account: bool,
}

/// Point-in-time view of a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: AuthStatus,
    pub user: Option<UserData>,
    pub token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<watch::Sender<SessionSnapshot>>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::default());
        Self { inner: Arc::new(tx) }
    }

    /// A session with a stored token whose validity has not been checked.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.inner.send_modify(|s| s.token = Some(token.into()));
        session
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.inner.borrow().status
    }

    #[must_use]
    pub fn user(&self) -> Option<UserData> {
        self.inner.borrow().user.clone()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.borrow().token.clone()
    }

    /// Receive every subsequent change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.subscribe()
    }

    /// Mark a status check as in flight.
    pub fn begin_check(&self) {
        self.inner.send_modify(|s| s.status = AuthStatus::Unknown);
    }

    pub fn logged_in(&self, user: UserData, token: Option<String>) {
        info!(user_id = user.id, "session: logged in");
        self.inner.send_modify(|s| {
            s.status = AuthStatus::LoggedIn;
            s.user = Some(user);
            if token.is_some() {
                s.token = token;
            }
        });
    }

    /// Forget the token and user.
    pub fn logged_out(&self) {
        info!("session: logged out");
        self.inner.send_modify(|s| {
            s.status = AuthStatus::LoggedOut;
            s.user = None;
            s.token = None;
        });
    }

    /// Apply a profile edit to the cached user. Returns `false` with no user.
    pub fn update_profile(&self, username: &str, image: &str) -> bool {
        self.inner.send_if_modified(|s| {
            let Some(user) = s.user.as_mut() else {
                return false;
            };
            user.username = username.to_owned();
            user.image = image.to_owned();
            true
        })
    }

    /// Headers to attach to API requests; an empty token when signed out.
    #[must_use]
    pub fn auth_headers(&self) -> [(&'static str, String); 1] {
        [(TOKEN_HEADER, self.token().unwrap_or_default())]
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
