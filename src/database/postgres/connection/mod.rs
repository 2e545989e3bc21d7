#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::DatabaseConfig;
use crate::{RegistryError, Result};

const APPLICATION_NAME: &str = "clinic-registry";
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Credential scope of the live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Gatekeeper,
    User,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Gatekeeper, Role::User, Role::Admin];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Gatekeeper => "gatekeeper",
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RegistryError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gatekeeper" => Ok(Role::Gatekeeper),
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(RegistryError::Validation(format!("Unknown role: {}", other))),
        }
    }
}

/// The connection currently in use together with the role it was opened as
#[derive(Debug)]
pub struct ActiveConnection {
    role: Role,
    conn: PgConnection,
}

impl ActiveConnection {
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

/// Holds at most one live connection, scoped to a single role.
///
/// Every operation holds the slot lock for its whole duration and
/// [`ConnectionManager::connect_as`] takes the same lock, so a role switch
/// waits for in-flight queries and never closes a connection mid-query.
#[derive(Debug)]
pub struct ConnectionManager {
    config: DatabaseConfig,
    active: Mutex<Option<ActiveConnection>>,
}

impl ConnectionManager {
    /// Create a manager without connecting
    #[inline]
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    #[inline]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Replace the active connection with one opened as `role`
    #[inline]
    pub async fn connect_as(&self, role: Role) -> Result<()> {
        let mut slot = self.active.lock().await;

        if let Some(previous) = slot.take() {
            debug!("Closing {} connection before switching to {}", previous.role, role);
            if let Err(e) = previous.conn.close().await {
                warn!("Failed to close {} connection cleanly: {}", previous.role, e);
            }
        }

        let conn = self.open_with_retry(role).await?;
        *slot = Some(ActiveConnection { role, conn });

        info!("Connected to PostgreSQL as {}", role);
        Ok(())
    }

    /// Lock the active connection for the duration of one operation
    #[inline]
    pub async fn acquire(&self) -> Result<MappedMutexGuard<'_, ActiveConnection>> {
        MutexGuard::try_map(self.active.lock().await, Option::as_mut)
            .map_err(|_| RegistryError::NotConnected)
    }

    #[inline]
    pub async fn active_role(&self) -> Option<Role> {
        self.active.lock().await.as_ref().map(ActiveConnection::role)
    }

    #[inline]
    pub async fn is_connected(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Close the active connection, if any
    #[inline]
    pub async fn disconnect(&self) {
        let mut slot = self.active.lock().await;
        if let Some(previous) = slot.take() {
            if let Err(e) = previous.conn.close().await {
                warn!("Failed to close {} connection cleanly: {}", previous.role, e);
            } else {
                debug!("Closed {} connection", previous.role);
            }
        }
    }

    /// Connection options for `role` built from the configured credentials
    #[inline]
    pub fn connect_options(&self, role: Role) -> PgConnectOptions {
        let credentials = self.config.credentials(role);
        PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .database(&self.config.name)
            .username(&credentials.username)
            .password(&credentials.password)
            .application_name(APPLICATION_NAME)
    }

    async fn open_with_retry(&self, role: Role) -> Result<PgConnection> {
        let options = self.connect_options(role);
        let timeout = Duration::from_secs(self.config.connect_timeout_seconds);
        let attempts = self.config.retry_attempts.max(1);

        let mut last_error = None;
        for attempt in 1..=attempts {
            debug!("Connecting as {}, attempt {}/{}", role, attempt, attempts);

            let error = match tokio::time::timeout(timeout, PgConnection::connect_with(&options)).await
            {
                Ok(Ok(conn)) => return Ok(conn),
                Ok(Err(e)) if is_transient(&e) => {
                    warn!(
                        "Transient connection error as {}: {}, attempt {}/{}",
                        role, e, attempt, attempts
                    );
                    RegistryError::Connection(e.to_string())
                }
                Ok(Err(e)) => {
                    error!("Failed to connect as {}: {}", role, e);
                    return Err(RegistryError::Connection(format!(
                        "Failed to connect as {}: {}",
                        role, e
                    )));
                }
                Err(_) => {
                    warn!(
                        "Connection as {} timed out after {:?}, attempt {}/{}",
                        role, timeout, attempt, attempts
                    );
                    RegistryError::Connection(format!("Connection timed out after {:?}", timeout))
                }
            };
            last_error = Some(error);

            if attempt < attempts {
                let delay = backoff_delay(self.config.retry_base_delay_ms, attempt);
                debug!("Waiting {:?} before retry", delay);
                tokio::time::sleep(delay).await;
            }
        }

        error!("All connection attempts as {} failed", role);
        Err(last_error.unwrap_or(RegistryError::NotConnected))
    }
}

/// Failures worth another attempt: the server may come up or the network recover
fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_error) => db_error.is_transient_in_connect_phase(),
        _ => false,
    }
}

fn backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    Duration::from_millis(base_delay_ms.saturating_mul(EXPONENTIAL_BACKOFF_BASE.pow(exponent)))
}
