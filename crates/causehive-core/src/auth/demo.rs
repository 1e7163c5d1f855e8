//! Demo Auth Provider
//!
//! In-memory accounts for running without an auth backend. Seeded with one
//! demo user.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::{AuthProvider, AuthResponse, AuthTokens, LoginCredentials, Role, SignupData, UserIdentity};
use crate::error::{CoreError, Result};

struct DemoAccount {
    user: UserIdentity,
    password: String,
}

#[derive(Default)]
struct DemoState {
    accounts: Vec<DemoAccount>,
    /// Issued access token -> account email
    sessions: HashMap<String, String>,
    /// Issued refresh token -> account email
    refresh: HashMap<String, String>,
}

/// Demo auth provider
pub struct DemoAuthProvider {
    state: RwLock<DemoState>,
}

impl Default for DemoAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoAuthProvider {
    pub const DEMO_EMAIL: &'static str = "demo@causehive.com";
    const DEMO_PASSWORD: &'static str = "demo123";

    pub fn new() -> Self {
        let demo = DemoAccount {
            user: UserIdentity {
                id: "1".into(),
                email: Self::DEMO_EMAIL.into(),
                first_name: "Demo".into(),
                last_name: "User".into(),
                phone: Some("+1 (555) 123-4567".into()),
                location: Some("San Francisco, CA".into()),
                is_verified: true,
                role: Role::User,
            },
            password: Self::DEMO_PASSWORD.into(),
        };

        Self {
            state: RwLock::new(DemoState {
                accounts: vec![demo],
                ..Default::default()
            }),
        }
    }

    fn lock_error() -> CoreError {
        CoreError::Auth("demo auth state unavailable".into())
    }

    fn issue(state: &mut DemoState, user: &UserIdentity) -> AuthResponse {
        let stamp = Utc::now().timestamp_millis();
        let serial = state.sessions.len();
        let access_token = format!("demo_access_token_{stamp}_{serial}");
        let refresh_token = format!("demo_refresh_token_{stamp}_{serial}");

        state.sessions.insert(access_token.clone(), user.email.clone());
        state.refresh.insert(refresh_token.clone(), user.email.clone());

        AuthResponse {
            user: user.clone(),
            access_token,
            refresh_token,
        }
    }
}

#[async_trait]
impl AuthProvider for DemoAuthProvider {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse> {
        let mut state = self.state.write().map_err(|_| Self::lock_error())?;

        let account = state
            .accounts
            .iter()
            .find(|a| a.user.email.eq_ignore_ascii_case(&credentials.email))
            .ok_or_else(|| CoreError::Auth("No account found with this email address".into()))?;

        if account.password != credentials.password {
            return Err(CoreError::Auth("Invalid password".into()));
        }

        let user = account.user.clone();
        Ok(Self::issue(&mut state, &user))
    }

    async fn signup(&self, data: &SignupData) -> Result<String> {
        let mut state = self.state.write().map_err(|_| Self::lock_error())?;

        if state.accounts.iter().any(|a| a.user.email.eq_ignore_ascii_case(&data.email)) {
            return Err(CoreError::Auth("User with this email already exists".into()));
        }

        state.accounts.push(DemoAccount {
            user: UserIdentity {
                id: Utc::now().timestamp_millis().to_string(),
                email: data.email.clone(),
                first_name: data.first_name.clone(),
                last_name: data.last_name.clone(),
                phone: Some(data.phone.clone()),
                location: Some(data.location.clone()),
                is_verified: true,
                role: Role::User,
            },
            password: data.password.clone(),
        });

        Ok("Account created successfully! You can now sign in.".into())
    }

    async fn logout(&self, tokens: &AuthTokens) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Self::lock_error())?;
        state.sessions.remove(&tokens.access_token);
        state.refresh.remove(&tokens.refresh_token);
        Ok(())
    }

    async fn verify_email(&self, _uid: &str, _token: &str) -> Result<String> {
        Ok("Email verified successfully.".into())
    }

    async fn resend_verification(&self, _email: &str) -> Result<String> {
        Ok("Verification email sent.".into())
    }

    async fn request_password_reset(&self, _email: &str) -> Result<String> {
        Ok("If an account exists, a reset link has been sent.".into())
    }

    async fn confirm_password_reset(&self, _uid: &str, _token: &str, _new_password: &str) -> Result<String> {
        Err(CoreError::Auth("Password reset is not available in demo mode".into()))
    }

    async fn google_oauth_url(&self) -> Result<String> {
        Err(CoreError::Auth("Google sign-in is not available in demo mode".into()))
    }

    async fn google_callback(&self, _code: &str) -> Result<AuthResponse> {
        Err(CoreError::Auth("Google sign-in is not available in demo mode".into()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let mut state = self.state.write().map_err(|_| Self::lock_error())?;
        let email = state
            .refresh
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| CoreError::Auth("Refresh token expired".into()))?;

        let access_token = format!("demo_access_token_{}_{}", Utc::now().timestamp_millis(), state.sessions.len());
        state.sessions.insert(access_token.clone(), email);
        Ok(access_token)
    }

    async fn profile(&self, access_token: &str) -> Result<UserIdentity> {
        let state = self.state.read().map_err(|_| Self::lock_error())?;
        let email = state
            .sessions
            .get(access_token)
            .ok_or_else(|| CoreError::Auth("Session expired".into()))?;

        state
            .accounts
            .iter()
            .find(|a| &a.user.email == email)
            .map(|a| a.user.clone())
            .ok_or_else(|| CoreError::Auth("Account no longer exists".into()))
    }

    fn name(&self) -> &str {
        "Demo"
    }
}
