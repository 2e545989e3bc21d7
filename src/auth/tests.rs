use super::*;
use crate::database::OperatorRole;
use chrono::Utc;
use uuid::Uuid;

fn operator() -> Operator {
    Operator {
        op_id: Uuid::new_v4(),
        op_number: "OP-001".to_string(),
        username: "nurse".to_string(),
        role: OperatorRole::User,
        created_at: Utc::now(),
    }
}

#[test]
fn hash_and_verify() {
    let hash = hash_password("s3cret").expect("hashes");

    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("s3cret", &hash));
    assert!(!verify_password("S3cret", &hash));
}

#[test]
fn hashes_are_salted() {
    let first = hash_password("same").expect("hashes");
    let second = hash_password("same").expect("hashes");
    assert_ne!(first, second);
}

#[test]
fn empty_password_is_rejected() {
    assert!(matches!(hash_password(""), Err(RegistryError::Validation(_))));
}

#[test]
fn malformed_hash_never_verifies() {
    assert!(!verify_password("anything", "plaintext-password"));
    assert!(!verify_password("anything", ""));
}

#[tokio::test]
async fn blocking_wrappers_agree() {
    let hash = password::hash_password_blocking("pw".to_string())
        .await
        .expect("hashes");
    let ok = password::verify_password_blocking("pw".to_string(), hash)
        .await
        .expect("verifies");
    assert!(ok);
}

#[test]
fn state_exposes_operator() {
    assert_eq!(AuthState::Unauthenticated.operator(), None);

    let op = operator();
    let state = AuthState::Authenticated(op.clone());
    assert_eq!(state.operator(), Some(&op));
}

#[tokio::test]
async fn new_session_is_unauthenticated() {
    let session = Session::new(DatabaseConfig::default());

    assert_eq!(session.state().await, AuthState::Unauthenticated);
    assert!(matches!(
        session.require_operator().await,
        Err(RegistryError::NotAuthenticated)
    ));
    assert!(!session.connections().is_connected().await);
}

#[tokio::test]
async fn login_requires_username_and_password() {
    let session = Session::new(DatabaseConfig::default());

    assert!(matches!(
        session.login("  ", "pw").await,
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        session.login("nurse", "").await,
        Err(RegistryError::Validation(_))
    ));
}

#[tokio::test]
async fn shutdown_clears_state() {
    let session = Session::new(DatabaseConfig::default());
    *session.state.write().await = AuthState::Authenticated(operator());

    session.shutdown().await;
    assert_eq!(session.current_operator().await, None);
}

#[tokio::test]
async fn start_rejects_invalid_configuration() {
    let config = DatabaseConfig {
        port: 0,
        ..DatabaseConfig::default()
    };

    assert!(matches!(
        Session::start(config).await,
        Err(RegistryError::Config(_))
    ));
}
