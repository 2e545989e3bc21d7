use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// SQLSTATE raised on unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE raised when the connected role lacks a privilege
const INSUFFICIENT_PRIVILEGE: &str = "42501";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{entity} {key} was not found or is inactive")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} {key} already exists")]
    Duplicate { entity: &'static str, key: String },

    #[error("Parent {parent_hn} is already linked to child {child_hn}")]
    AlreadyLinked { parent_hn: String, child_hn: String },

    #[error("Insufficient privilege: {0}")]
    PermissionDenied(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("No operator is logged in")]
    NotAuthenticated,

    #[error("Not connected to the database")]
    NotConnected,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RegistryError {
    /// Stable identifier used on the gateway wire
    #[inline]
    pub fn kind(&self) -> &'static str {
        match *self {
            Self::NotFound { .. } => "not_found",
            Self::Duplicate { .. } => "duplicate",
            Self::AlreadyLinked { .. } => "already_linked",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidCredentials => "invalid_credentials",
            Self::NotAuthenticated => "not_authenticated",
            Self::NotConnected => "not_connected",
            Self::Validation(_) => "validation",
            Self::Connection(_) => "connection",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Io(_) | Self::Other(_) => "internal",
        }
    }

    #[inline]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

impl From<config::ConfigError> for RegistryError {
    #[inline]
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<sqlx::Error> for RegistryError {
    #[inline]
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) => match db_error.code().as_deref() {
                Some(UNIQUE_VIOLATION) => Self::Duplicate {
                    entity: "record",
                    key: db_error.constraint().unwrap_or("unique key").to_string(),
                },
                Some(INSUFFICIENT_PRIVILEGE) => Self::PermissionDenied(db_error.message().to_string()),
                _ => Self::Database(error.to_string()),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connection(error.to_string()),
            _ => Self::Database(error.to_string()),
        }
    }
}

pub mod auth;
pub mod capture;
pub mod commands;
pub mod config;
pub mod database;
pub mod gateway;
pub mod matcher;
pub mod registry;

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::fmt;

    #[derive(Debug)]
    struct FakeDbError {
        code: &'static str,
        constraint: Option<&'static str>,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake database error {}", self.code)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl sqlx::error::DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "permission denied for table child"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn database_error(code: &'static str, constraint: Option<&'static str>) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError { code, constraint }))
    }

    #[test]
    fn unique_violation_maps_to_duplicate() {
        let error = RegistryError::from(database_error("23505", Some("child_hn_key")));
        assert!(error.is_unique_violation());
        assert_eq!(error.kind(), "duplicate");
        assert!(error.to_string().contains("child_hn_key"));
    }

    #[test]
    fn insufficient_privilege_maps_to_permission_denied() {
        let error = RegistryError::from(database_error("42501", None));
        assert_eq!(error.kind(), "permission_denied");
        assert!(error.to_string().contains("permission denied"));
    }

    #[test]
    fn other_sqlstate_maps_to_database() {
        let error = RegistryError::from(database_error("22P02", None));
        assert_eq!(error.kind(), "database");
    }

    #[test]
    fn transport_errors_map_to_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let error = RegistryError::from(sqlx::Error::Io(io));
        assert_eq!(error.kind(), "connection");

        let error = RegistryError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(error.kind(), "connection");
    }

    #[test]
    fn not_found_and_permission_denied_are_distinct() {
        let missing = RegistryError::NotFound {
            entity: "child",
            key: "C-404".to_string(),
        };
        let denied = RegistryError::PermissionDenied("permission denied for table child".into());
        assert_ne!(missing.kind(), denied.kind());
    }
}
