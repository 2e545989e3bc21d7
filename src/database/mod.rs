// Database module
// Role-scoped PostgreSQL access for the registry (records, vectors, audit trail)

pub mod postgres;

pub use postgres::*;
