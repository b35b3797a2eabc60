use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::store::TokenStore;
use crate::api::{ApiClient, UserProfile};
use crate::error::{PodiumError, Result};

/// Authentication state of the client.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// A persisted token was found and its identity is being resolved
    Initializing,
    Authenticated(UserProfile),
    Unauthenticated,
}

/// Owns the credential lifecycle: token load at startup, identity
/// resolution, login/register, logout.
///
/// The token itself lives in the [`ApiClient`] so every request reads it
/// from one place; this manager decides when it changes.
pub struct AuthManager {
    api: Arc<ApiClient>,
    store: TokenStore,
    state: RwLock<AuthState>,
}

impl AuthManager {
    pub fn new(api: Arc<ApiClient>, store: TokenStore) -> Self {
        Self {
            api,
            store,
            state: RwLock::new(AuthState::Initializing),
        }
    }

    /// Load the persisted token, if any, and resolve the identity behind it.
    ///
    /// With no persisted token the client goes straight to
    /// `Unauthenticated` without any network traffic. This never fails:
    /// an unreadable token file or a rejected token both land in
    /// `Unauthenticated`.
    pub async fn initialize(&self) {
        let token = match self.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!("could not read persisted token: {e}");
                None
            }
        };

        match token {
            Some(token) => {
                self.api.set_token(token).await;
                self.resolve_identity().await;
            }
            None => {
                *self.state.write().await = AuthState::Unauthenticated;
            }
        }
    }

    /// Ask the service who the current token belongs to.
    ///
    /// Any failure demotes the client to `Unauthenticated` and discards the
    /// token; a token that cannot resolve an identity is treated as "not
    /// logged in", never as an error.
    pub async fn resolve_identity(&self) {
        match self.api.me().await {
            Ok(user) => {
                info!("authenticated as {}", user.email);
                *self.state.write().await = AuthState::Authenticated(user);
            }
            Err(e) => {
                info!("identity resolution failed, signing out: {e}");
                self.drop_credential().await;
            }
        }
    }

    /// Exchange credentials for a token.
    ///
    /// On success the token is persisted and the client becomes
    /// `Authenticated` with the identity carried in the response. On a
    /// rejected login the state is left untouched and the server's message
    /// is surfaced verbatim.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        if email.trim().is_empty() || password.trim().is_empty() {
            return Err(
                PodiumError::Validation("email and password are required".to_string()).into(),
            );
        }

        let response = self.api.login(email, password).await?;
        self.install_credential(response.access_token, response.user.clone())
            .await;
        Ok(response.user)
    }

    /// Create an account and sign in with it in one step.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserProfile> {
        if name.trim().is_empty() || email.trim().is_empty() || password.trim().is_empty() {
            return Err(
                PodiumError::Validation("name, email and password are required".to_string()).into(),
            );
        }

        let response = self.api.register(name, email, password).await?;
        self.install_credential(response.access_token, response.user.clone())
            .await;
        Ok(response.user)
    }

    /// Drop the credential. Always succeeds.
    pub async fn logout(&self) {
        info!("signing out");
        self.drop_credential().await;
    }

    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<UserProfile> {
        match &*self.state.read().await {
            AuthState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(&*self.state.read().await, AuthState::Authenticated(_))
    }

    async fn install_credential(&self, token: String, user: UserProfile) {
        if let Err(e) = self.store.save(&token) {
            // The in-memory credential still works for this run.
            warn!("could not persist token: {e}");
        }
        self.api.set_token(token).await;
        info!("authenticated as {}", user.email);
        *self.state.write().await = AuthState::Authenticated(user);
    }

    async fn drop_credential(&self) {
        if let Err(e) = self.store.clear() {
            warn!("could not remove persisted token: {e}");
        }
        self.api.clear_token().await;
        *self.state.write().await = AuthState::Unauthenticated;
    }
}
