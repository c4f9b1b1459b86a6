use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::client::{Credentials, ProtocolClient, UserAttributes};
use crate::shared::BridgeError;

/// Lifecycle of the single session this bridge tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Connecting,
    Ready,
    Failed,
}

struct SessionState {
    connection: ConnectionState,
    home_server: Option<String>,
    credentials: Option<Credentials>,
    user: Option<UserAttributes>,
}

/// Wraps one authenticated connection to the protocol client.
///
/// All state transitions are serialized behind one lock, so concurrent
/// `login`/`start_session` calls cannot race each other past the fast-path
/// checks.
pub struct SessionHandle {
    client: Arc<dyn ProtocolClient>,
    state: Mutex<SessionState>,
}

impl SessionHandle {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            client,
            state: Mutex::new(SessionState {
                connection: ConnectionState::Unauthenticated,
                home_server: None,
                credentials: None,
                user: None,
            }),
        }
    }

    /// Sets the target home server. No network effect; must happen before
    /// any connection attempt.
    pub async fn configure(&self, home_server: &str) {
        let mut state = self.state.lock().await;
        state.home_server = Some(home_server.to_string());
        debug!(home_server = %home_server, "home server configured");
    }

    /// Logs in by username and password.
    ///
    /// When credentials already exist this returns them immediately without
    /// re-authenticating. That fast path deliberately skips freshness
    /// checks; a revoked token surfaces on the next protocol operation.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Credentials, BridgeError> {
        let mut state = self.state.lock().await;

        if let Some(credentials) = &state.credentials {
            debug!(user_id = %credentials.user_id, "already logged in, returning stored credentials");
            return Ok(credentials.clone());
        }

        let home_server = state.home_server.clone().ok_or_else(|| {
            BridgeError::NotConnected("no home server configured; call configure first".to_string())
        })?;

        let credentials = self
            .client
            .authenticate(&home_server, username, password)
            .await?;
        info!(user_id = %credentials.user_id, "login succeeded");
        state.credentials = Some(credentials.clone());
        Ok(credentials)
    }

    /// Installs previously persisted credentials without a network call.
    ///
    /// No validation happens here; a garbage token only surfaces as a
    /// failure on the next protocol operation.
    pub async fn set_credentials(
        &self,
        access_token: &str,
        device_id: &str,
        user_id: &str,
        home_server: &str,
        refresh_token: Option<String>,
    ) {
        let mut state = self.state.lock().await;
        state.home_server = Some(home_server.to_string());
        state.credentials = Some(Credentials {
            user_id: user_id.to_string(),
            home_server: home_server.to_string(),
            access_token: access_token.to_string(),
            device_id: device_id.to_string(),
            refresh_token,
        });
        debug!(user_id = %user_id, "credentials installed");
    }

    /// Opens the local store and runs the sync loop to its first success.
    ///
    /// Idempotent when already `Ready` (returns the cached user attributes
    /// without revalidating). The `Connecting -> Ready | Failed` transition
    /// is one-shot; there is no re-entry from `Failed`.
    #[instrument(skip(self))]
    pub async fn start_session(&self) -> Result<UserAttributes, BridgeError> {
        let mut state = self.state.lock().await;

        match state.connection {
            ConnectionState::Ready => {
                if let Some(user) = &state.user {
                    debug!(user_id = %user.user_id, "session already running");
                    return Ok(user.clone());
                }
            }
            ConnectionState::Failed => {
                return Err(BridgeError::NotConnected(
                    "session startup failed previously; no re-entry from failed state".to_string(),
                ));
            }
            ConnectionState::Unauthenticated | ConnectionState::Connecting => {}
        }

        let credentials = state.credentials.clone().ok_or_else(|| {
            BridgeError::NotConnected(
                "no credentials; call login or set_credentials first".to_string(),
            )
        })?;

        state.connection = ConnectionState::Connecting;
        match self.client.start_sync(&credentials).await {
            Ok(user) => {
                info!(user_id = %user.user_id, "session ready");
                state.connection = ConnectionState::Ready;
                state.user = Some(user.clone());
                Ok(user)
            }
            Err(error) => {
                warn!(error = %error, "session startup failed");
                state.connection = ConnectionState::Failed;
                Err(BridgeError::Protocol(error))
            }
        }
    }

    /// Guard used by every other call-surface operation.
    pub async fn ensure_ready(&self) -> Result<(), BridgeError> {
        let state = self.state.lock().await;
        if state.connection == ConnectionState::Ready {
            Ok(())
        } else {
            Err(BridgeError::NotConnected(
                "client is not connected yet".to_string(),
            ))
        }
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    pub async fn credentials(&self) -> Option<Credentials> {
        self.state.lock().await.credentials.clone()
    }

    pub async fn user(&self) -> Option<UserAttributes> {
        self.state.lock().await.user.clone()
    }
}
