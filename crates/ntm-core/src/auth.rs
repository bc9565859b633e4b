//! Authentication store: login-code flow, profile, validation and logout.
//!
//! Two failure contracts live side by side here. `fetch_user` raises after
//! logging out, because a trusted token that cannot load its profile is
//! exceptional. `validate_token` answers a yes/no question and never raises.

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::types::{Message, TokenResponse, User};
use crate::api::{ApiClient, ApiError};
use crate::session::{AuthState, Session};

/// Owns the session lifecycle on top of the API client.
#[derive(Clone)]
pub struct AuthStore {
    client: ApiClient,
}

impl AuthStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn session(&self) -> &Session {
        self.client.session()
    }

    pub fn state(&self) -> AuthState {
        self.session().state()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.session().subscribe()
    }

    pub fn token(&self) -> Option<String> {
        self.session().token()
    }

    pub fn user(&self) -> Option<User> {
        self.session().user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    /// Requests a one-time login code for `email`.
    ///
    /// # Errors
    /// Propagates any API failure.
    pub async fn send_code(&self, email: &str) -> Result<Message> {
        let message = self.client.auth().send_code(email).await?;
        self.session().begin_login(email);
        Ok(message)
    }

    /// Exchanges the code for a token, persists it, then loads the profile.
    ///
    /// The token is persisted before the profile request, so an interrupted
    /// login still leaves a session that `validate_token` can recover.
    ///
    /// # Errors
    /// Propagates API failures, an empty token, persistence failures and
    /// profile fetch failures (after which the session is logged out).
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<TokenResponse> {
        let response = self.client.auth().verify_code(email, code).await?;
        if response.access_token.trim().is_empty() {
            return Err(ApiError::parse("Server returned an empty access token", None).into());
        }

        self.session().authenticate(&response.access_token)?;
        info!("logged in");

        self.fetch_user().await?;
        Ok(response)
    }

    /// Loads the current user's profile. Returns `None` without a token.
    ///
    /// # Errors
    /// Any failure logs the session out and is then returned.
    pub async fn fetch_user(&self) -> Result<Option<User>> {
        if !self.is_authenticated() {
            return Ok(None);
        }

        match self.client.auth().me().await {
            Ok(user) => {
                self.session().set_user(user.clone());
                Ok(Some(user))
            }
            Err(err) => {
                warn!("failed to load profile: {err}");
                self.logout().await;
                Err(err.into())
            }
        }
    }

    /// Checks the held token with the server and refreshes the profile.
    ///
    /// Returns `false` without a token. Any failure logs out and returns
    /// `false`; this never raises.
    pub async fn validate_token(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }

        if let Err(err) = self.client.auth().validate_token().await {
            debug!("token rejected: {err}");
            self.logout().await;
            return false;
        }

        match self.fetch_user().await {
            Ok(_) => true,
            Err(err) => {
                debug!("token valid but profile unavailable: {err:#}");
                self.logout().await;
                false
            }
        }
    }

    /// Tells the server (best effort) and always clears the local session.
    pub async fn logout(&self) {
        if self.is_authenticated()
            && let Err(err) = self.client.auth().logout().await
        {
            warn!("server logout failed, clearing local session anyway: {err}");
        }
        self.session().clear();
    }
}
