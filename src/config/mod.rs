// Configuration management module
// TOML settings for database credentials, matching and auditing

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    AuditConfig, AuditMode, Config, ConfigError, Credentials, DatabaseConfig, MatcherConfig,
    RoleCredentials,
};
