//! Auth Session
//!
//! Authentication itself is delegated to an external provider. This module
//! only keeps what the rest of the system consumes: the signed-in user's
//! identity and whether anyone is signed in, persisted under fixed keys.

mod demo;
mod http;

pub use demo::DemoAuthProvider;
pub use http::HttpAuthProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{CoreError, Result};
use crate::storage::{self, ClientStorage};

pub const ACCESS_TOKEN_KEY: &str = "causehive_access_token";
pub const REFRESH_TOKEN_KEY: &str = "causehive_refresh_token";
pub const USER_DATA_KEY: &str = "causehive_user_data";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Organizer,
}

/// The signed-in user, as consumed by checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub role: Role,
}

impl UserIdentity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Successful login: the user plus their tokens
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: UserIdentity,
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthResponse {
    pub fn tokens(&self) -> AuthTokens {
        AuthTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignupData {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub location: String,
    pub phone: String,
    pub occupation: String,
}

/// External auth collaborator
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse>;

    /// Create an account; returns the provider's confirmation message
    async fn signup(&self, data: &SignupData) -> Result<String>;

    async fn logout(&self, tokens: &AuthTokens) -> Result<()>;

    async fn verify_email(&self, uid: &str, token: &str) -> Result<String>;

    async fn resend_verification(&self, email: &str) -> Result<String>;

    async fn request_password_reset(&self, email: &str) -> Result<String>;

    async fn confirm_password_reset(&self, uid: &str, token: &str, new_password: &str) -> Result<String>;

    /// URL to send the user to for Google sign-in
    async fn google_oauth_url(&self) -> Result<String>;

    /// Exchange the OAuth callback code for a session
    async fn google_callback(&self, code: &str) -> Result<AuthResponse>;

    /// Exchange a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> Result<String>;

    async fn profile(&self, access_token: &str) -> Result<UserIdentity>;

    fn name(&self) -> &str;
}

/// Signed-in state of this client
pub struct AuthSession {
    storage: Arc<dyn ClientStorage>,
    tokens: Option<AuthTokens>,
    user: Option<UserIdentity>,
    notifier: watch::Sender<Option<UserIdentity>>,
}

impl AuthSession {
    /// Restore tokens and user data from storage
    pub fn restore(storage: Arc<dyn ClientStorage>) -> Self {
        let access = storage.get(ACCESS_TOKEN_KEY).ok().flatten();
        let refresh = storage.get(REFRESH_TOKEN_KEY).ok().flatten();
        let tokens = access.map(|access_token| AuthTokens {
            access_token,
            refresh_token: refresh.unwrap_or_default(),
        });

        // A stored user without an access token is stale
        let user = if tokens.is_some() {
            storage::load_json::<UserIdentity>(storage.as_ref(), USER_DATA_KEY).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discarding unreadable user data");
                None
            })
        } else {
            None
        };

        let (notifier, _) = watch::channel(user.clone());
        Self {
            storage,
            tokens,
            user,
            notifier,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    /// The signed-in user, or `CoreError::Unauthenticated`
    pub fn require_user(&self) -> Result<&UserIdentity> {
        self.user.as_ref().ok_or(CoreError::Unauthenticated)
    }

    pub fn tokens(&self) -> Option<&AuthTokens> {
        self.tokens.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.notifier.subscribe()
    }

    /// Record a successful login and persist it
    pub fn sign_in(&mut self, response: AuthResponse) -> &UserIdentity {
        let tokens = response.tokens();
        self.persist(&tokens, &response.user);
        tracing::info!(user_id = %response.user.id, "Signed in");

        self.tokens = Some(tokens);
        self.notifier.send_replace(Some(response.user.clone()));
        self.user.insert(response.user)
    }

    /// Forget the session locally
    pub fn sign_out(&mut self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_DATA_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::error!(key, error = %e, "Failed to clear auth state");
            }
        }
        self.tokens = None;
        self.user = None;
        self.notifier.send_replace(None);
    }

    pub async fn login(
        &mut self,
        provider: &dyn AuthProvider,
        credentials: &LoginCredentials,
    ) -> Result<&UserIdentity> {
        let response = provider.login(credentials).await?;
        Ok(self.sign_in(response))
    }

    pub async fn complete_google_login(&mut self, provider: &dyn AuthProvider, code: &str) -> Result<&UserIdentity> {
        let response = provider.google_callback(code).await?;
        Ok(self.sign_in(response))
    }

    /// Log out remotely (best effort) and always clear local state
    pub async fn logout(&mut self, provider: &dyn AuthProvider) {
        if let Some(tokens) = &self.tokens {
            if let Err(e) = provider.logout(tokens).await {
                tracing::warn!(error = %e, "Logout request failed");
            }
        }
        self.sign_out();
    }

    /// Re-establish the user on startup.
    ///
    /// Uses stored user data when present, otherwise fetches the profile,
    /// refreshing the access token once if needed. Any failure signs out.
    pub async fn refresh_user(&mut self, provider: &dyn AuthProvider) -> Option<&UserIdentity> {
        let tokens = self.tokens.clone()?;
        if self.user.is_some() {
            return self.user.as_ref();
        }

        let profile = match provider.profile(&tokens.access_token).await {
            Ok(user) => Some((tokens, user)),
            Err(e) => {
                tracing::warn!(error = %e, "Profile fetch failed, refreshing token");
                self.retry_with_refresh(provider, tokens).await
            }
        };

        match profile {
            Some((tokens, user)) => {
                self.persist(&tokens, &user);
                self.tokens = Some(tokens);
                self.notifier.send_replace(Some(user.clone()));
                Some(&*self.user.insert(user))
            }
            None => {
                self.sign_out();
                None
            }
        }
    }

    async fn retry_with_refresh(
        &self,
        provider: &dyn AuthProvider,
        tokens: AuthTokens,
    ) -> Option<(AuthTokens, UserIdentity)> {
        if tokens.refresh_token.is_empty() {
            return None;
        }
        let access_token = provider.refresh(&tokens.refresh_token).await.ok()?;
        let refreshed = AuthTokens {
            access_token,
            refresh_token: tokens.refresh_token,
        };
        match provider.profile(&refreshed.access_token).await {
            Ok(user) => Some((refreshed, user)),
            Err(e) => {
                tracing::warn!(error = %e, "Profile fetch after refresh failed");
                None
            }
        }
    }

    fn persist(&self, tokens: &AuthTokens, user: &UserIdentity) {
        let result = self
            .storage
            .set(ACCESS_TOKEN_KEY, &tokens.access_token)
            .and_then(|()| self.storage.set(REFRESH_TOKEN_KEY, &tokens.refresh_token))
            .and_then(|()| storage::save_json(self.storage.as_ref(), USER_DATA_KEY, user));
        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to save auth state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn credentials(password: &str) -> LoginCredentials {
        LoginCredentials {
            email: DemoAuthProvider::DEMO_EMAIL.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_login_persists_and_restores() {
        let storage = Arc::new(MemoryStorage::new());
        let provider = DemoAuthProvider::new();

        let mut session = AuthSession::restore(storage.clone());
        assert!(!session.is_authenticated());
        assert!(matches!(session.require_user(), Err(CoreError::Unauthenticated)));

        let user = session.login(&provider, &credentials("demo123")).await.unwrap();
        assert_eq!(user.email, DemoAuthProvider::DEMO_EMAIL);

        let restored = AuthSession::restore(storage);
        assert!(restored.is_authenticated());
        assert_eq!(restored.require_user().unwrap().full_name(), "Demo User");
    }

    #[tokio::test]
    async fn test_bad_password_keeps_signed_out() {
        let storage = Arc::new(MemoryStorage::new());
        let provider = DemoAuthProvider::new();
        let mut session = AuthSession::restore(storage);

        let err = session.login(&provider, &credentials("wrong")).await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(_)));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_storage_and_notifies() {
        let storage = Arc::new(MemoryStorage::new());
        let provider = DemoAuthProvider::new();
        let mut session = AuthSession::restore(storage.clone());
        session.login(&provider, &credentials("demo123")).await.unwrap();

        let rx = session.subscribe();
        session.logout(&provider).await;

        assert!(rx.borrow().is_none());
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert!(!AuthSession::restore(storage).is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_user_fetches_missing_profile() {
        let storage = Arc::new(MemoryStorage::new());
        let provider = DemoAuthProvider::new();
        let response = provider.login(&credentials("demo123")).await.unwrap();

        // Tokens survived but user data did not
        storage.set(ACCESS_TOKEN_KEY, &response.access_token).unwrap();
        storage.set(REFRESH_TOKEN_KEY, &response.refresh_token).unwrap();

        let mut session = AuthSession::restore(storage.clone());
        assert!(!session.is_authenticated());

        let user = session.refresh_user(&provider).await.unwrap();
        assert_eq!(user.email, DemoAuthProvider::DEMO_EMAIL);
        assert!(storage.get(USER_DATA_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refresh_user_signs_out_on_unknown_token() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(ACCESS_TOKEN_KEY, "stale").unwrap();

        let mut session = AuthSession::restore(storage.clone());
        assert!(session.refresh_user(&DemoAuthProvider::new()).await.is_none());
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }
}
