//! Authentication endpoints (`/auth/*`).

use super::types::{Message, SendCodeRequest, TokenResponse, User, VerifyCodeRequest};
use super::{ApiClient, ApiResult, RequestOptions};

/// Typed wrappers over the `/auth` resource.
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Asks the server to mail a one-time login code.
    pub async fn send_code(&self, email: &str) -> ApiResult<Message> {
        self.client
            .post("/auth/send-code", Some(&SendCodeRequest { email }))
            .await
    }

    /// Exchanges a login code for an access token.
    pub async fn verify_code(&self, email: &str, code: &str) -> ApiResult<TokenResponse> {
        self.client
            .post("/auth/verify-code", Some(&VerifyCodeRequest { email, code }))
            .await
    }

    pub async fn validate_token(&self) -> ApiResult<Message> {
        self.client
            .post("/auth/validate-token", None::<&()>)
            .await
    }

    pub async fn logout(&self) -> ApiResult<Message> {
        self.client.post("/auth/logout", None::<&()>).await
    }

    pub async fn me(&self) -> ApiResult<User> {
        self.client
            .get("/auth/me", &RequestOptions::default())
            .await
    }
}
