use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::{Input, Password};
use sqlx::{Connection, PgConnection};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{Session, hash_password};
use crate::config::Config;
use crate::database::{
    ActivityQueries, OperatorQueries, OperatorRole, RelationRow, Role, run_migrations,
};
use crate::gateway::Gateway;
use crate::matcher::IdentityMatcher;
use crate::registry::RecordStore;

/// Apply schema migrations and role grants using an owner connection
#[inline]
pub async fn migrate(database_url: &str) -> Result<()> {
    info!("Running migrations");

    let mut conn = PgConnection::connect(database_url)
        .await
        .context("Failed to connect with owner credentials")?;
    run_migrations(&mut conn).await?;
    conn.close().await.context("Failed to close connection")?;

    println!("{}", style("✓ Migrations applied").green());
    println!("Grant the configured login roles membership in registry_gatekeeper,");
    println!("registry_user and registry_admin to finish setup.");
    Ok(())
}

/// Create the first administrator directly through an owner connection
#[inline]
pub async fn bootstrap_admin(database_url: &str, op_number: &str, username: &str) -> Result<()> {
    let op_number = op_number.trim();
    let username = username.trim();
    if op_number.is_empty() || username.is_empty() {
        bail!("Operator number and username must not be empty");
    }

    let password = Password::new()
        .with_prompt(format!("Password for {}", username))
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;
    let password_hash = hash_password(&password)?;

    let mut conn = PgConnection::connect(database_url)
        .await
        .context("Failed to connect with owner credentials")?;

    if OperatorQueries::get_by_op_number(&mut conn, op_number)
        .await?
        .is_some()
    {
        bail!("Operator {} already exists", op_number);
    }

    let mut tx = conn.begin().await?;
    let operator = OperatorQueries::insert(
        &mut tx,
        op_number,
        username,
        &password_hash,
        OperatorRole::Admin,
    )
    .await
    .context("Failed to create administrator")?;
    ActivityQueries::append(&mut tx, &operator.op_number, "Bootstrapped administrator account")
        .await
        .context("Failed to record bootstrap activity")?;
    tx.commit().await?;
    conn.close().await.context("Failed to close connection")?;

    info!("Created administrator {}", operator.op_number);
    println!(
        "{}",
        style(format!(
            "✓ Administrator {} ({}) created",
            operator.username, operator.op_number
        ))
        .green()
    );
    Ok(())
}

/// Run the UI gateway on stdio
#[inline]
pub async fn serve_gateway() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    let session = Arc::new(
        Session::start(config.database.clone())
            .await
            .context("Failed to open gatekeeper connection")?,
    );
    let gateway = Gateway::from_config(Arc::clone(&session), &config);

    let result = gateway.serve_stdio().await;
    session.shutdown().await;
    result
}

/// Log in interactively and print matching records
#[inline]
pub async fn search(query: &str, by_hn: bool) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let session = login_interactive(&config).await?;
    let records = RecordStore::from_config(&config);

    let rows = if by_hn {
        records.search_by_hn(&session, query).await
    } else {
        records.search_by_name(&session, query).await
    };
    session.shutdown().await;
    let rows = rows?;

    if rows.is_empty() {
        println!("No active records match '{}'.", query);
        return Ok(());
    }

    println!("Records ({} found):", rows.len());
    println!();
    for row in &rows {
        print_row(row);
    }
    Ok(())
}

/// Log in interactively and print the most recent audit entries
#[inline]
pub async fn show_activity(limit: i64) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let session = login_interactive(&config).await?;
    let records = RecordStore::from_config(&config);

    let entries = records.activity_log(&session, Some(limit)).await;
    session.shutdown().await;
    let entries = entries?;

    if entries.is_empty() {
        println!("No activity recorded yet.");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{}  {}  {}",
            style(entry.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
            style(&entry.op_number).cyan(),
            entry.activity
        );
    }
    Ok(())
}

/// Report configuration and whether each role can connect
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let database = &config.database;

    println!("{}", style("Clinic Registry Status").bold().cyan());
    println!();
    println!(
        "Database: {}:{}/{}",
        database.host, database.port, database.name
    );
    let matcher = IdentityMatcher::from_config(&config.matcher);
    let records = RecordStore::from_config(&config);
    println!("Embedding dimension: {}", matcher.dimension());
    match matcher.max_distance() {
        Some(max) => println!("Max distance: {}", max),
        None => println!("Max distance: disabled"),
    }
    println!("Audit mode: {:?}", records.activity().mode());
    println!();

    let session = Session::new(database.clone());
    for role in Role::ALL {
        match session.connections().connect_as(role).await {
            Ok(()) => println!("  {} {}", style("✓").green(), role),
            Err(e) => {
                warn!("Status check for {} failed: {}", role, e);
                println!("  {} {}: {}", style("✗").red(), role, e);
            }
        }
    }
    session.shutdown().await;

    Ok(())
}

async fn login_interactive(config: &Config) -> Result<Session> {
    let session = Session::start(config.database.clone())
        .await
        .context("Failed to open gatekeeper connection")?;

    let username: String = Input::new().with_prompt("Username").interact_text()?;
    let password = Password::new().with_prompt("Password").interact()?;

    match session.login(&username, &password).await {
        Ok(operator) => {
            eprintln!(
                "{}",
                style(format!("Logged in as {} ({})", operator.op_number, operator.role)).green()
            );
            Ok(session)
        }
        Err(e) => {
            session.shutdown().await;
            Err(e.into())
        }
    }
}

fn print_row(row: &RelationRow) {
    if let Some(hn) = &row.child_hn {
        println!(
            "👶 {} {} {} (age {})",
            style(hn).bold(),
            row.child_firstname.as_deref().unwrap_or_default(),
            row.child_lastname.as_deref().unwrap_or_default(),
            row.child_age.map_or_else(|| "-".to_string(), |age| age.to_string())
        );
    }
    if let Some(hn) = &row.parent_hn {
        println!(
            "   parent {} {} {}",
            style(hn).bold(),
            row.parent_firstname.as_deref().unwrap_or_default(),
            row.parent_lastname.as_deref().unwrap_or_default()
        );
    }
    if !row.is_linked() {
        println!("   {}", style("no linked record").dim());
    }
    println!();
}
