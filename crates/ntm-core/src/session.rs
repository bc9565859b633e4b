//! Authentication session state shared by the API client and the stores.
//!
//! The session is an explicit state machine:
//!
//! ```text
//! Anonymous --send_code--> Authenticating --verify_code--> Authenticated
//!     ^                                                        |
//!     +---------------- logout / 401 / failed validation ------+
//! ```
//!
//! `Authenticated` is only ever built from a non-empty token, so
//! "authenticated" and "holds a token" cannot disagree.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::types::User;
use crate::storage::TokenStore;

/// Observable authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Anonymous,
    /// A login code was requested for `email` and not verified yet.
    Authenticating { email: String },
    /// A token is held. `user` stays `None` until the profile is fetched.
    Authenticated { token: String, user: Option<User> },
}

impl AuthState {
    pub fn token(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated { token, .. } => Some(token),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated { user, .. } => user.as_ref(),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }
}

/// Handle to the session state and its persisted token.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct Session {
    state: Arc<watch::Sender<AuthState>>,
    store: Arc<dyn TokenStore>,
    // Set when a clear could not reach the store. The persisted token is
    // stale until the next successful `authenticate`.
    revoked: Arc<AtomicBool>,
}

impl Session {
    /// Builds a session from whatever token the store holds.
    ///
    /// An unreadable store is treated as "no token".
    pub fn restore(store: Arc<dyn TokenStore>) -> Self {
        let initial = initial_state(store.as_ref());
        let (state, _rx) = watch::channel(initial);
        Self {
            state: Arc::new(state),
            store,
            revoked: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Re-reads the persisted token, discarding the in-memory state.
    ///
    /// After a clear that failed to reach the store, the persisted token is
    /// ignored and the session stays anonymous.
    pub fn reload(&self) {
        let state = if self.revoked.load(Ordering::Acquire) {
            debug!("persisted token was revoked, staying anonymous");
            AuthState::Anonymous
        } else {
            initial_state(self.store.as_ref())
        };
        self.state.send_replace(state);
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Records that a login code was requested. No-op once authenticated.
    pub fn begin_login(&self, email: &str) {
        self.state.send_if_modified(|state| {
            if state.is_authenticated() {
                return false;
            }
            *state = AuthState::Authenticating {
                email: email.to_string(),
            };
            true
        });
    }

    /// Persists `token`, then makes it the active token.
    ///
    /// # Errors
    /// Returns an error if the token is blank or cannot be persisted; the
    /// in-memory state is left unchanged in that case.
    pub fn authenticate(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            bail!("Refusing to store an empty access token");
        }
        self.store.save(token)?;
        self.revoked.store(false, Ordering::Release);
        self.state.send_replace(AuthState::Authenticated {
            token: token.to_string(),
            user: None,
        });
        debug!("session authenticated");
        Ok(())
    }

    /// Attaches the fetched profile. Ignored unless a token is held.
    pub fn set_user(&self, profile: User) -> bool {
        self.state.send_if_modified(|state| match state {
            AuthState::Authenticated { user, .. } => {
                *user = Some(profile);
                true
            }
            _ => false,
        })
    }

    /// Drops the token, the profile and the persisted copy.
    ///
    /// If the persisted copy cannot be removed it is marked revoked, so
    /// [`Session::reload`] will not bring it back.
    pub fn clear(&self) {
        match self.store.clear() {
            Ok(()) => self.revoked.store(false, Ordering::Release),
            Err(err) => {
                warn!("failed to clear persisted token: {err:#}");
                self.revoked.store(true, Ordering::Release);
            }
        }
        self.state.send_if_modified(|state| {
            if *state == AuthState::Anonymous {
                return false;
            }
            *state = AuthState::Anonymous;
            true
        });
    }
}

fn initial_state(store: &dyn TokenStore) -> AuthState {
    match store.load() {
        Ok(Some(token)) if !token.trim().is_empty() => AuthState::Authenticated {
            token: token.trim().to_string(),
            user: None,
        },
        Ok(_) => AuthState::Anonymous,
        Err(err) => {
            warn!("ignoring unreadable persisted token: {err:#}");
            AuthState::Anonymous
        }
    }
}
