//! HTTP client for the task service.
//!
//! Every request goes through [`ApiClient::request`], which attaches the
//! bearer token held by the [`Session`] and applies the global 401 rule:
//! an unauthorized response anywhere clears the session and its persisted
//! token, then publishes [`ClientEvent::Unauthorized`].

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, HeaderValue, USER_AGENT as USER_AGENT_HEADER};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::events::{ClientEvent, EventReceiver, EventSender};
use crate::session::Session;

pub mod auth;
pub mod tasks;
pub mod types;

pub use auth::AuthApi;
pub use tasks::TasksApi;

/// Standard User-Agent header for ntm API requests.
pub const USER_AGENT: &str = concat!("ntm/", env!("CARGO_PKG_VERSION"));

/// Categories of API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connection failure, DNS, TLS, reset
    Transport,
    /// Request exceeded its timeout
    Timeout,
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Failed to encode the request or decode the response
    Parse,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Transport => write!(f, "transport"),
            ApiErrorKind::Timeout => write!(f, "timeout"),
            ApiErrorKind::HttpStatus => write!(f, "http_status"),
            ApiErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// Structured error from the API client.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// HTTP status, for `HttpStatus` errors
    pub status: Option<u16>,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, lifting the server's `detail` into the
    /// message when the body carries one.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = (!body.is_empty()).then(|| body.to_string());
        let message = match extract_detail(body) {
            Some(detail) => format!("HTTP {status}: {detail}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind: ApiErrorKind::HttpStatus,
            status: Some(status),
            message,
            details,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Timeout, message)
    }

    pub fn parse(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            details,
            ..Self::new(ApiErrorKind::Parse, message)
        }
    }

    fn from_reqwest(err: &reqwest::Error, method: &Method, path: &str) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("{method} {path} timed out"))
        } else {
            Self {
                details: Some(err.to_string()),
                ..Self::new(
                    ApiErrorKind::Transport,
                    format!("{method} {path} failed to reach the server"),
                )
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Pulls a human-readable message out of an error body.
///
/// Handles `{"detail": "..."}` and validation errors shaped like
/// `{"detail": [{"msg": "..."}]}`.
fn extract_detail(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    match json.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

/// Per-request overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Replaces the client's default timeout.
    pub timeout: Option<Duration>,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

/// Client for the task service REST API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    test_timeout: Duration,
    session: Session,
    events: EventSender,
}

impl ApiClient {
    /// Builds a client from config, resolving the base URL from env/config.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ApiConfig, session: Session, events: EventSender) -> Result<Self> {
        let base_url = config.resolve_base_url()?;
        Self::with_base_url(base_url, config, session, events)
    }

    /// Builds a client against an explicit base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_base_url(
        base_url: impl Into<String>,
        config: &ApiConfig,
        session: Session,
        events: EventSender,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            test_timeout: config.test_timeout(),
            session,
            events,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn tasks(&self) -> TasksApi<'_> {
        TasksApi::new(self)
    }

    pub(crate) fn test_timeout(&self) -> Duration {
        self.test_timeout
    }

    /// Performs one request and decodes the JSON response.
    ///
    /// # Errors
    /// Transport, timeout, HTTP status and decode failures are returned
    /// unchanged; a 401 additionally clears the session first.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .http
            .request(method.clone(), url)
            .header(USER_AGENT_HEADER, USER_AGENT);

        if let Some(token) = self.session.token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|err| {
                ApiError::parse(format!("Stored token is not a valid header value: {err}"), None)
            })?;
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ApiError::from_reqwest(&err, &method, path))?;
        let status = response.status();
        debug!(%method, path, status = status.as_u16(), "api response");

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(&method, path);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| ApiError::from_reqwest(&err, &method, path))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(ApiError::http_status(status.as_u16(), &body));
        }

        serde_json::from_slice(&bytes).map_err(|err| {
            ApiError::parse(
                format!("Failed to decode response of {method} {path}: {err}"),
                Some(String::from_utf8_lossy(&bytes).into_owned()),
            )
        })
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> ApiResult<T> {
        self.request(Method::GET, path, None::<&Value>, options).await
    }

    pub(crate) async fn post<T, B>(&self, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, body, &RequestOptions::default())
            .await
    }

    fn handle_unauthorized(&self, method: &Method, path: &str) {
        warn!(%method, path, "unauthorized response, clearing session");
        self.session.clear();
        // No subscribers is fine; the session is already cleared.
        let _ = self.events.send(ClientEvent::Unauthorized {
            method: method.to_string(),
            path: path.to_string(),
        });
    }
}
