//! Application shell wiring config, session, client and stores together.
//!
//! Front ends build one [`App`] and route every operation through it. The
//! shell also owns the reaction to an unauthorized response: the client has
//! already cleared the session, and [`App::reload`] drops every other piece
//! of in-memory state derived from it.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::auth::AuthStore;
use crate::config::Config;
use crate::events::{ClientEvent, EventReceiver, create_event_channel};
use crate::session::Session;
use crate::storage::TokenStore;
use crate::tasks::TaskStore;
use crate::toast::Toaster;

/// Shown after the server rejected the session.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

#[derive(Clone)]
pub struct App {
    config: Config,
    client: ApiClient,
    auth: AuthStore,
    tasks: TaskStore,
    toasts: Toaster,
}

impl App {
    /// Builds the shell, restoring any persisted session from `store`.
    ///
    /// # Errors
    /// Returns an error if the API base URL cannot be resolved or the HTTP
    /// client cannot be built.
    pub fn new(config: Config, store: Arc<dyn TokenStore>) -> Result<Self> {
        let base_url = config.api.resolve_base_url()?;
        Self::with_base_url(config, store, base_url)
    }

    /// Like [`App::new`] but against an explicit base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(
        config: Config,
        store: Arc<dyn TokenStore>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let session = Session::restore(store);
        let events = create_event_channel();
        let client = ApiClient::with_base_url(base_url, &config.api, session, events)?;
        debug!(base_url = client.base_url(), "api client ready");

        Ok(Self {
            auth: AuthStore::new(client.clone()),
            tasks: TaskStore::new(client.clone()),
            toasts: Toaster::new(config.toast.duration()),
            client,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn toasts(&self) -> &Toaster {
        &self.toasts
    }

    /// Subscribes to client events. Subscribe before issuing requests.
    pub fn subscribe(&self) -> EventReceiver {
        self.client.subscribe()
    }

    /// Discards in-memory state and re-reads the persisted session.
    pub fn reload(&self) {
        self.client.session().reload();
        self.tasks.reset();
        self.toasts.clear();
        info!("application state reloaded");
    }

    /// Applies one client event.
    pub fn handle_event(&self, event: &ClientEvent) {
        match event {
            ClientEvent::Unauthorized { method, path } => {
                debug!(%method, %path, "reloading after unauthorized response");
                self.reload();
                self.toasts.error(SESSION_EXPIRED_MESSAGE);
            }
        }
    }

    /// Applies every event already queued on `events` without waiting.
    /// Returns how many were handled.
    pub fn drain_events(&self, events: &mut EventReceiver) -> usize {
        let mut handled = 0;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.handle_event(&event);
                    handled += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "client events lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return handled,
            }
        }
    }

    /// Handles client events in the background for long-lived front ends.
    /// Runs until the handle is aborted.
    pub fn spawn_event_handler(&self) -> JoinHandle<()> {
        let app = self.clone();
        let mut events = self.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => app.handle_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "client events lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
