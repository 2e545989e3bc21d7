use sqlx::PgConnection;
use sqlx::migrate::Migrator;
use tracing::info;

use crate::Result;

pub mod connection;
pub mod models;
pub mod queries;

pub use connection::{ActiveConnection, ConnectionManager, Role};
pub use models::*;
pub use queries::{ActivityQueries, OperatorQueries, PersonQueries, RelationQueries, VectorQueries};

/// Schema and role grants, applied by the database owner
pub static MIGRATOR: Migrator = sqlx::migrate!("src/database/postgres/migrations");

/// Apply pending migrations on a connection opened with owner privileges
#[inline]
pub async fn run_migrations(conn: &mut PgConnection) -> Result<()> {
    MIGRATOR
        .run(conn)
        .await
        .map_err(|e| crate::RegistryError::Database(format!("Failed to run migrations: {}", e)))?;
    info!("Database migrations applied");
    Ok(())
}
