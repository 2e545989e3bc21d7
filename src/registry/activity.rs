use sqlx::PgConnection;
use tracing::{debug, warn};

use crate::config::AuditMode;
use crate::database::ActivityQueries;
use crate::{RegistryError, Result};

/// Appends audit entries attributed to an operator
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityLogger {
    mode: AuditMode,
}

impl ActivityLogger {
    #[inline]
    pub fn new(mode: AuditMode) -> Self {
        Self { mode }
    }

    #[inline]
    pub fn mode(&self) -> AuditMode {
        self.mode
    }

    /// Resolve the operator and append one entry
    #[inline]
    pub async fn log(conn: &mut PgConnection, op_number: &str, description: &str) -> Result<()> {
        match ActivityQueries::append(conn, op_number, description).await? {
            Some(activity_id) => {
                debug!("Logged activity {} for {}: {}", activity_id, op_number, description);
                Ok(())
            }
            None => Err(RegistryError::NotFound {
                entity: "operator",
                key: op_number.to_string(),
            }),
        }
    }

    /// Write the entry inside the mutation's transaction when auditing is transactional
    #[inline]
    pub async fn within(&self, tx: &mut PgConnection, op_number: &str, description: &str) -> Result<()> {
        match self.mode {
            AuditMode::Transactional => Self::log(tx, op_number, description).await,
            AuditMode::BestEffort => Ok(()),
        }
    }

    /// Write the entry after commit when auditing is best effort; failures are only logged
    #[inline]
    pub async fn after_commit(&self, conn: &mut PgConnection, op_number: &str, description: &str) {
        if self.mode == AuditMode::BestEffort {
            if let Err(e) = Self::log(conn, op_number, description).await {
                warn!(
                    "Failed to record activity for {} ({}): {}",
                    op_number, description, e
                );
            }
        }
    }
}
