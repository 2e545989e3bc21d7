use anyhow::Result;
use clap::{Parser, Subcommand};
use clinic_registry::commands::{
    bootstrap_admin, migrate, search, serve_gateway, show_activity, show_status,
};
use clinic_registry::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "clinic-registry")]
#[command(about = "Patient registry core with role-scoped PostgreSQL access and identity matching")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the database connection, role credentials and matching
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Apply schema migrations and role grants
    Migrate {
        /// Connection URL with owner privileges
        #[arg(long, env = "CLINIC_REGISTRY_OWNER_URL")]
        database_url: String,
    },
    /// Create the first administrator account
    BootstrapAdmin {
        /// Connection URL with owner privileges
        #[arg(long, env = "CLINIC_REGISTRY_OWNER_URL")]
        database_url: String,
        /// Operator number of the administrator
        #[arg(long)]
        op_number: String,
        /// Login name of the administrator
        #[arg(long)]
        username: String,
    },
    /// Start the UI gateway on stdio
    Serve,
    /// Search active records by name or HN
    Search {
        /// Name fragment, or HN with --hn
        query: String,
        /// Treat the query as an exact HN
        #[arg(long)]
        hn: bool,
    },
    /// Show recent operator activity
    Activity {
        /// Number of entries to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show configuration and role connectivity
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries gateway responses, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config().await?;
            }
        }
        Commands::Migrate { database_url } => {
            migrate(&database_url).await?;
        }
        Commands::BootstrapAdmin {
            database_url,
            op_number,
            username,
        } => {
            bootstrap_admin(&database_url, &op_number, &username).await?;
        }
        Commands::Serve => {
            serve_gateway().await?;
        }
        Commands::Search { query, hn } => {
            search(&query, hn).await?;
        }
        Commands::Activity { limit } => {
            show_activity(limit).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn serve_command() {
        let cli = Cli::try_parse_from(["clinic-registry", "serve"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Serve));
        }
    }

    #[test]
    fn search_by_name_is_default() {
        let cli = Cli::try_parse_from(["clinic-registry", "search", "Somsak"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search { query, hn } = parsed.command {
                assert_eq!(query, "Somsak");
                assert!(!hn);
            }
        }
    }

    #[test]
    fn search_by_hn_flag() {
        let cli = Cli::try_parse_from(["clinic-registry", "search", "C-001", "--hn"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Search { hn: true, .. }));
        }
    }

    #[test]
    fn bootstrap_admin_arguments() {
        let cli = Cli::try_parse_from([
            "clinic-registry",
            "bootstrap-admin",
            "--database-url",
            "postgres://owner@localhost/ear_db",
            "--op-number",
            "OP-001",
            "--username",
            "chief",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::BootstrapAdmin {
                database_url,
                op_number,
                username,
            } = parsed.command
            {
                assert_eq!(database_url, "postgres://owner@localhost/ear_db");
                assert_eq!(op_number, "OP-001");
                assert_eq!(username, "chief");
            }
        }
    }

    #[test]
    fn activity_default_limit() {
        let cli = Cli::try_parse_from(["clinic-registry", "activity"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Activity { limit: 20 }));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["clinic-registry", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["clinic-registry", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["clinic-registry", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
