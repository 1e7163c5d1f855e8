//! HTTP Auth Provider
//!
//! Talks to the CauseHive user service. Responses use the API envelope
//! `{ success, data, message, errors }`.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{AuthProvider, AuthResponse, AuthTokens, LoginCredentials, SignupData, UserIdentity};
use crate::error::{CoreError, Result};

mod endpoints {
    pub const SIGNUP: &str = "/api/user/auth/signup/";
    pub const LOGIN: &str = "/api/user/auth/login/";
    pub const LOGOUT: &str = "/api/user/auth/logout/";
    pub const VERIFY: &str = "/api/user/auth/verify";
    pub const RESEND_VERIFICATION: &str = "/api/user/auth/resend-verification/";
    pub const PASSWORD_RESET: &str = "/api/user/auth/password-reset/";
    pub const PASSWORD_RESET_CONFIRM: &str = "/api/user/auth/password-reset-confirm/";
    pub const REFRESH: &str = "/api/user/auth/refresh/";
    pub const PROFILE: &str = "/api/user/profile/";
    pub const GOOGLE_URL: &str = "/api/user/google/url/";
    pub const GOOGLE_CALLBACK: &str = "/api/user/google/callback/";
}

/// API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<HashMap<String, Vec<String>>>,
}

impl<T> ApiResponse<T> {
    /// First error message the envelope carries
    fn error_message(&self) -> String {
        if let Some(message) = self.message.as_ref().filter(|m| !m.is_empty()) {
            return message.clone();
        }
        self.errors
            .as_ref()
            .and_then(|errors| errors.values().flatten().next().cloned())
            .unwrap_or_else(|| "An error occurred".into())
    }
}

#[derive(Debug, Deserialize)]
struct MessageData {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UrlData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct GoogleOAuthData {
    access_token: String,
    refresh_token: String,
    user: UserIdentity,
}

#[derive(Debug, Deserialize)]
struct RefreshData {
    access: String,
}

#[derive(Serialize)]
struct EmailBody<'a> {
    email: &'a str,
}

/// Auth provider backed by the CauseHive API
pub struct HttpAuthProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from `CAUSEHIVE_API_URL`
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CAUSEHIVE_API_URL")
            .map_err(|_| CoreError::Config("CAUSEHIVE_API_URL not set".into()))?;
        Ok(Self::new(base_url))
    }

    /// Send a request and check the envelope
    async fn envelope<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned + Send,
        B: Serialize + ?Sized + Sync,
    {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.request(method, &url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await?;

        if !status.is_success() || !envelope.success {
            let message = envelope.error_message();
            tracing::warn!(%status, path, message = %message, "Auth request failed");
            return Err(CoreError::Auth(message));
        }
        Ok(envelope)
    }

    async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>, token: Option<&str>) -> Result<T>
    where
        T: DeserializeOwned + Send,
        B: Serialize + ?Sized + Sync,
    {
        self.envelope(method, path, body, token)
            .await?
            .data
            .ok_or_else(|| CoreError::Api(format!("{path} returned no data")))
    }

    /// Confirmation message from `data.message` or the envelope itself
    async fn message<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String>
    where
        B: Serialize + ?Sized + Sync,
    {
        let envelope: ApiResponse<MessageData> = self.envelope(method, path, body, None).await?;
        Ok(envelope
            .data
            .and_then(|d| d.message)
            .or(envelope.message)
            .unwrap_or_else(|| "Request completed successfully.".into()))
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse> {
        self.request(Method::POST, endpoints::LOGIN, Some(credentials), None).await
    }

    async fn signup(&self, data: &SignupData) -> Result<String> {
        self.message(Method::POST, endpoints::SIGNUP, Some(data)).await
    }

    async fn logout(&self, tokens: &AuthTokens) -> Result<()> {
        let body = serde_json::json!({ "refresh": tokens.refresh_token });
        let _: ApiResponse<serde_json::Value> = self
            .envelope(Method::POST, endpoints::LOGOUT, Some(&body), Some(&tokens.access_token))
            .await?;
        Ok(())
    }

    async fn verify_email(&self, uid: &str, token: &str) -> Result<String> {
        let path = format!("{}/{uid}/{token}/", endpoints::VERIFY);
        self.message::<()>(Method::GET, &path, None).await
    }

    async fn resend_verification(&self, email: &str) -> Result<String> {
        self.message(Method::POST, endpoints::RESEND_VERIFICATION, Some(&EmailBody { email }))
            .await
    }

    async fn request_password_reset(&self, email: &str) -> Result<String> {
        self.message(Method::POST, endpoints::PASSWORD_RESET, Some(&EmailBody { email }))
            .await
    }

    async fn confirm_password_reset(&self, uid: &str, token: &str, new_password: &str) -> Result<String> {
        let body = serde_json::json!({ "uid": uid, "token": token, "new_password": new_password });
        self.message(Method::POST, endpoints::PASSWORD_RESET_CONFIRM, Some(&body))
            .await
    }

    async fn google_oauth_url(&self) -> Result<String> {
        let data: UrlData = self.request::<_, ()>(Method::GET, endpoints::GOOGLE_URL, None, None).await?;
        Ok(data.url)
    }

    async fn google_callback(&self, code: &str) -> Result<AuthResponse> {
        let body = serde_json::json!({ "code": code });
        let data: GoogleOAuthData = self
            .request(Method::POST, endpoints::GOOGLE_CALLBACK, Some(&body), None)
            .await?;
        Ok(AuthResponse {
            user: data.user,
            access_token: data.access_token,
            refresh_token: data.refresh_token,
        })
    }

    /// The refresh endpoint answers with a bare `{ "access": ... }` body
    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, endpoints::REFRESH);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "refresh": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CoreError::Auth("Session expired. Please log in again.".into()));
        }
        Ok(response.json::<RefreshData>().await?.access)
    }

    async fn profile(&self, access_token: &str) -> Result<UserIdentity> {
        self.request::<_, ()>(Method::GET, endpoints::PROFILE, None, Some(access_token))
            .await
    }

    fn name(&self) -> &str {
        "CauseHiveApi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_error_message() {
        let envelope: ApiResponse<()> = serde_json::from_str(
            r#"{"success": false, "errors": {"email": ["Enter a valid email address."]}}"#,
        )
        .unwrap();
        assert_eq!(envelope.error_message(), "Enter a valid email address.");

        let envelope: ApiResponse<()> =
            serde_json::from_str(r#"{"success": false, "message": "Invalid credentials"}"#).unwrap();
        assert_eq!(envelope.error_message(), "Invalid credentials");
    }

    #[test]
    fn test_login_payload_shape() {
        let data: ApiResponse<AuthResponse> = serde_json::from_str(
            r#"{
                "success": true,
                "data": {
                    "id": "7",
                    "email": "ama@example.com",
                    "first_name": "Ama",
                    "last_name": "Owusu",
                    "phone": "+233241234567",
                    "occupation": "Nurse",
                    "role": "organizer",
                    "access_token": "a",
                    "refresh_token": "r"
                }
            }"#,
        )
        .unwrap();

        let response = data.data.unwrap();
        assert_eq!(response.user.full_name(), "Ama Owusu");
        assert_eq!(response.tokens().refresh_token, "r");
    }
}
