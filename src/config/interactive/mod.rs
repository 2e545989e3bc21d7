#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};

use super::{AuditMode, Config, ConfigError, Credentials, DatabaseConfig, MatcherConfig};
use crate::database::{ConnectionManager, Role};

#[inline]
pub async fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Clinic Registry Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Database Configuration").bold().yellow());
    eprintln!("Configure the PostgreSQL server and the credentials of each role.");
    eprintln!();

    configure_database(&mut config.database)?;

    eprintln!();
    eprintln!("{}", style("Identification Settings").bold().yellow());
    configure_matcher(&mut config.matcher)?;
    config.audit.mode = select_audit_mode(config.audit.mode)?;

    eprintln!();
    eprintln!("{}", style("Testing gatekeeper connection...").yellow());

    let manager = ConnectionManager::new(config.database.clone());
    match manager.connect_as(Role::Gatekeeper).await {
        Ok(()) => {
            eprintln!("{}", style("✓ Database connection successful!").green());
            manager.disconnect().await;
        }
        Err(e) => {
            eprintln!(
                "{}",
                style(format!("⚠ Warning: Could not connect to PostgreSQL: {}", e)).yellow()
            );
            eprintln!("You can continue, but make sure the database is reachable before serving.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Database Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.database.host).cyan());
    eprintln!("  Port: {}", style(config.database.port).cyan());
    eprintln!("  Database: {}", style(&config.database.name).cyan());
    for role in Role::ALL {
        let credentials = config.database.credentials(role);
        eprintln!(
            "  {} login: {} (password {})",
            role,
            style(&credentials.username).cyan(),
            if credentials.password.is_empty() {
                style("not set").red()
            } else {
                style("set").green()
            }
        );
    }

    eprintln!();
    eprintln!("{}", style("Identification Settings:").bold().yellow());
    eprintln!(
        "  Embedding dimension: {}",
        style(config.matcher.embedding_dimension).cyan()
    );
    match config.matcher.max_distance {
        Some(max) => eprintln!("  Max distance: {}", style(max).cyan()),
        None => eprintln!("  Max distance: {}", style("disabled").dim()),
    }
    eprintln!("  Audit mode: {}", style(format!("{:?}", config.audit.mode)).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load_default().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_database(database: &mut DatabaseConfig) -> Result<()> {
    let host: String = Input::new()
        .with_prompt("PostgreSQL host")
        .default(database.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let mut candidate = database.clone();
            candidate.set_host(input.clone())
        })
        .interact_text()?;
    database.set_host(host)?;

    let port: u16 = Input::new()
        .with_prompt("PostgreSQL port")
        .default(database.port)
        .validate_with(|input: &u16| -> Result<(), ConfigError> {
            if *input == 0 {
                Err(ConfigError::InvalidPort(*input))
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    database.set_port(port)?;

    database.name = Input::new()
        .with_prompt("Database name")
        .default(database.name.clone())
        .interact_text()?;

    for role in Role::ALL {
        let current = database.credentials(role).clone();
        let updated = prompt_credentials(role, &current)?;
        match role {
            Role::Gatekeeper => database.roles.gatekeeper = updated,
            Role::User => database.roles.user = updated,
            Role::Admin => database.roles.admin = updated,
        }
    }

    Ok(())
}

fn prompt_credentials(role: Role, current: &Credentials) -> Result<Credentials> {
    let username: String = Input::new()
        .with_prompt(format!("Login for the {} role", role))
        .default(current.username.clone())
        .interact_text()?;

    let password = Password::new()
        .with_prompt(format!(
            "Password for {} (leave empty to keep the current one)",
            username
        ))
        .allow_empty_password(true)
        .interact()?;

    Ok(Credentials {
        username,
        password: if password.is_empty() {
            current.password.clone()
        } else {
            password
        },
    })
}

fn configure_matcher(matcher: &mut MatcherConfig) -> Result<()> {
    matcher.embedding_dimension = Input::new()
        .with_prompt("Embedding dimension")
        .default(matcher.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), ConfigError> {
            MatcherConfig {
                embedding_dimension: *input,
                max_distance: None,
            }
            .validate()
        })
        .interact_text()?;

    let current = matcher
        .max_distance
        .map(|value| value.to_string())
        .unwrap_or_default();
    let raw: String = Input::new()
        .with_prompt("Maximum accepted cosine distance (empty disables the threshold)")
        .default(current)
        .allow_empty(true)
        .validate_with(|input: &String| -> Result<(), String> {
            parse_max_distance(input).map(|_| ())
        })
        .interact_text()?;

    matcher
        .set_max_distance(parse_max_distance(&raw).map_err(anyhow::Error::msg)?)
        .context("Invalid maximum distance")?;

    Ok(())
}

fn select_audit_mode(current: AuditMode) -> Result<AuditMode> {
    let modes = [AuditMode::Transactional, AuditMode::BestEffort];
    let labels = &[
        "transactional (mutation fails if the audit entry cannot be written)",
        "best effort (audit failures are only logged)",
    ];
    let default_index = modes.iter().position(|mode| *mode == current).unwrap_or(0);

    let index = Select::new()
        .with_prompt("Audit mode")
        .default(default_index)
        .items(labels)
        .interact()?;

    Ok(modes.get(index).copied().unwrap_or_default())
}

/// Empty input disables the threshold
fn parse_max_distance(input: &str) -> Result<Option<f64>, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: f64 = trimmed
        .parse()
        .map_err(|_| format!("'{}' is not a number", trimmed))?;
    if !(0.0..=2.0).contains(&value) {
        return Err(ConfigError::InvalidMaxDistance(value).to_string());
    }
    Ok(Some(value))
}
