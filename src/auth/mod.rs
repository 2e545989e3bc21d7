// Operator authentication and the role state machine of a session

#[cfg(test)]
mod tests;

pub mod password;

pub use password::{hash_password, verify_password};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::database::{ConnectionManager, Operator, OperatorQueries, Role};
use crate::{RegistryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Only the gatekeeper connection is available
    Unauthenticated,
    Authenticated(Operator),
}

impl AuthState {
    #[inline]
    pub fn operator(&self) -> Option<&Operator> {
        match self {
            AuthState::Unauthenticated => None,
            AuthState::Authenticated(operator) => Some(operator),
        }
    }
}

/// Connection plus authentication state for one UI session
#[derive(Debug)]
pub struct Session {
    connections: ConnectionManager,
    state: RwLock<AuthState>,
}

impl Session {
    /// Create an unauthenticated session without connecting
    #[inline]
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            connections: ConnectionManager::new(config),
            state: RwLock::new(AuthState::Unauthenticated),
        }
    }

    /// Create a session and open the gatekeeper connection
    #[inline]
    pub async fn start(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let session = Self::new(config);
        session.connections.connect_as(Role::Gatekeeper).await?;
        Ok(session)
    }

    #[inline]
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    #[inline]
    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    #[inline]
    pub async fn current_operator(&self) -> Option<Operator> {
        self.state.read().await.operator().cloned()
    }

    /// The logged-in operator, or `NotAuthenticated`
    #[inline]
    pub async fn require_operator(&self) -> Result<Operator> {
        self.current_operator()
            .await
            .ok_or(RegistryError::NotAuthenticated)
    }

    /// Verify credentials and switch the connection to the operator's stored role
    #[inline]
    pub async fn login(&self, username: &str, password: &str) -> Result<Operator> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(RegistryError::Validation(
                "Username and password are required".into(),
            ));
        }

        let mut state = self.state.write().await;

        if self.connections.active_role().await != Some(Role::Gatekeeper) {
            debug!("Returning to gatekeeper connection for login");
            *state = AuthState::Unauthenticated;
            self.connections.connect_as(Role::Gatekeeper).await?;
        }

        let credentials = {
            let mut active = self.connections.acquire().await?;
            OperatorQueries::get_credentials_by_username(active.conn(), username).await?
        };

        let Some(credentials) = credentials else {
            warn!("Login rejected for unknown username");
            return Err(RegistryError::InvalidCredentials);
        };

        let verified = password::verify_password_blocking(
            password.to_string(),
            credentials.password_hash,
        )
        .await?;
        if !verified {
            warn!("Login rejected for {}", credentials.operator.op_number);
            return Err(RegistryError::InvalidCredentials);
        }

        let operator = credentials.operator;
        self.connections
            .connect_as(operator.role.connection_role())
            .await?;
        *state = AuthState::Authenticated(operator.clone());

        info!("Operator {} logged in as {}", operator.op_number, operator.role);
        Ok(operator)
    }

    /// Drop the operator and return to the gatekeeper connection
    #[inline]
    pub async fn logout(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if let AuthState::Authenticated(operator) = &*state {
            info!("Operator {} logged out", operator.op_number);
        }
        *state = AuthState::Unauthenticated;
        self.connections.connect_as(Role::Gatekeeper).await
    }

    /// Close the connection; the session is unusable until restarted
    #[inline]
    pub async fn shutdown(&self) {
        *self.state.write().await = AuthState::Unauthenticated;
        self.connections.disconnect().await;
    }
}
