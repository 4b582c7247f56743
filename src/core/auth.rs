//! Sign-in state and the bearer-token client for the account backend.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::core::persistence::{LocalBackend, PersistenceError};
use crate::core::providers::summarize_api_error;
use crate::utils::url::construct_api_url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A signed-in user and the token that authorises their requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: User,
    pub token: String,
}

/// Process-wide sign-in state. Cloning shares the same state.
#[derive(Clone)]
pub struct AuthState {
    tx: Arc<watch::Sender<Option<Identity>>>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AuthState {
    pub fn new(initial: Option<Identity>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn set(&self, identity: Option<Identity>) {
        self.tx.send_replace(identity);
    }

    pub fn subscribe(&self) -> IdentitySubscription {
        IdentitySubscription {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receives identity changes until dropped or unsubscribed.
pub struct IdentitySubscription {
    rx: watch::Receiver<Option<Identity>>,
}

impl IdentitySubscription {
    /// Waits for the next sign-in or sign-out. Returns `None` once the auth
    /// state itself is gone.
    pub async fn changed(&mut self) -> Option<Option<Identity>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn current(&self) -> Option<Identity> {
        self.rx.borrow().clone()
    }

    /// Stops receiving changes. Same as dropping the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

#[derive(Debug)]
pub enum AuthError {
    NotConfigured,
    Http(reqwest::Error),
    /// Rejected by the server, e.g. bad password or existing account.
    Rejected {
        status: u16,
        message: Option<String>,
    },
    Decode(String),
    Storage(PersistenceError),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotConfigured => write!(
                f,
                "No account server configured. Set [remote] base_url in the config file."
            ),
            AuthError::Http(err) => write!(f, "Could not reach the account server: {err}"),
            AuthError::Rejected {
                message: Some(message),
                ..
            } => write!(f, "{message}"),
            AuthError::Rejected {
                status,
                message: None,
            } => write!(f, "Account server returned {status}"),
            AuthError::Decode(detail) => write!(f, "Unexpected account server response: {detail}"),
            AuthError::Storage(err) => write!(f, "Failed to store session: {err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AuthError::Http(err) => Some(err),
            AuthError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Http(err)
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    user: User,
    token: String,
}

#[derive(Deserialize)]
struct MeResponse {
    user: User,
}

/// Talks to `/api/auth/*` and keeps [`AuthState`] and the stored token in
/// step.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Option<String>,
    local: LocalBackend,
    state: AuthState,
}

impl AuthClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Option<String>,
        local: LocalBackend,
        state: AuthState,
    ) -> Self {
        Self {
            http,
            base_url,
            local,
            state,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    fn endpoint(&self, path: &str) -> Result<String, AuthError> {
        self.base_url
            .as_deref()
            .map(|base| construct_api_url(base, path))
            .ok_or(AuthError::NotConfigured)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.authenticate("api/auth/login", email, password).await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.authenticate("api/auth/register", email, password).await
    }

    async fn authenticate(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .json(&Credentials { email, password })
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: summarize_api_error(&body),
            });
        }
        let parsed: AuthResponse =
            serde_json::from_str(&body).map_err(|err| AuthError::Decode(err.to_string()))?;

        self.local
            .save_token(&parsed.token)
            .map_err(AuthError::Storage)?;
        let identity = Identity {
            user: parsed.user,
            token: parsed.token,
        };
        info!(user = %identity.user.email, "signed in");
        self.state.set(Some(identity.clone()));
        Ok(identity)
    }

    /// Re-validates a stored token. An expired or rejected token is removed
    /// and the user is treated as signed out.
    pub async fn restore(&self) -> Option<Identity> {
        let token = match self.local.load_token() {
            Ok(Some(token)) if !token.trim().is_empty() => token,
            Ok(_) => return None,
            Err(err) => {
                warn!("failed to read stored session: {err}");
                return None;
            }
        };
        let url = self.endpoint("api/auth/me").ok()?;

        let response = match self.http.get(url).bearer_auth(&token).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("could not verify stored session: {err}");
                return None;
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            info!("stored session expired");
            if let Err(err) = self.local.clear_token() {
                warn!("failed to clear expired session: {err}");
            }
            return None;
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "could not verify stored session");
            return None;
        }

        let me: MeResponse = match response.json().await {
            Ok(me) => me,
            Err(err) => {
                warn!("unexpected session response: {err}");
                return None;
            }
        };
        let identity = Identity {
            user: me.user,
            token,
        };
        self.state.set(Some(identity.clone()));
        Some(identity)
    }

    pub fn logout(&self) {
        if let Err(err) = self.local.clear_token() {
            warn!("failed to clear stored session: {err}");
        }
        self.state.set(None);
        info!("signed out");
    }
}
