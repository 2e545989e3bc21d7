use super::*;

fn unreachable_config() -> DatabaseConfig {
    DatabaseConfig {
        host: "127.0.0.1".to_string(),
        // Nothing listens on the discard port in test environments
        port: 9,
        connect_timeout_seconds: 2,
        retry_attempts: 2,
        retry_base_delay_ms: 10,
        ..DatabaseConfig::default()
    }
}

#[test]
fn role_round_trip() {
    for role in Role::ALL {
        let parsed: Role = role.as_str().parse().expect("role parses");
        assert_eq!(parsed, role);
        assert_eq!(role.to_string(), role.as_str());
    }

    assert_eq!("ADMIN".parse::<Role>().ok(), Some(Role::Admin));
    assert!("root".parse::<Role>().is_err());
}

#[test]
fn role_serializes_lowercase() {
    let json = serde_json::to_string(&Role::Gatekeeper).expect("serializes");
    assert_eq!(json, "\"gatekeeper\"");
}

#[test]
fn backoff_grows_exponentially() {
    assert_eq!(backoff_delay(100, 1), Duration::from_millis(100));
    assert_eq!(backoff_delay(100, 2), Duration::from_millis(200));
    assert_eq!(backoff_delay(100, 3), Duration::from_millis(400));
}

#[test]
fn only_transport_errors_are_transient() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
    assert!(is_transient(&sqlx::Error::Io(io)));
    assert!(is_transient(&sqlx::Error::PoolTimedOut));
    assert!(!is_transient(&sqlx::Error::RowNotFound));
    assert!(!is_transient(&sqlx::Error::Configuration("bad url".into())));
}

#[test]
fn connect_options_use_role_credentials() {
    let mut config = DatabaseConfig::default();
    config.roles.admin.username = "chief".to_string();
    let manager = ConnectionManager::new(config);

    let options = manager.connect_options(Role::Admin);
    assert_eq!(options.get_username(), "chief");
    assert_eq!(options.get_port(), 5433);
    assert_eq!(options.get_database(), Some("ear_db"));
}

#[tokio::test]
async fn acquire_without_connection_is_not_connected() {
    let manager = ConnectionManager::new(DatabaseConfig::default());

    assert!(!manager.is_connected().await);
    assert_eq!(manager.active_role().await, None);
    assert!(matches!(
        manager.acquire().await,
        Err(RegistryError::NotConnected)
    ));
}

#[tokio::test]
async fn failed_connect_reports_connection_error() {
    let manager = ConnectionManager::new(unreachable_config());

    let result = manager.connect_as(Role::Gatekeeper).await;
    assert!(matches!(result, Err(RegistryError::Connection(_))));
    assert!(!manager.is_connected().await);
}

#[tokio::test]
async fn disconnect_without_connection_is_a_no_op() {
    let manager = ConnectionManager::new(DatabaseConfig::default());
    manager.disconnect().await;
    assert!(!manager.is_connected().await);
}
