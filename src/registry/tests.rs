use super::*;
use crate::config::{AuditMode, DatabaseConfig};
use chrono::{Days, NaiveDate, Utc};

fn store() -> RecordStore {
    RecordStore::new(ActivityLogger::default(), 3)
}

fn person(hn: &str) -> NewPerson {
    NewPerson {
        hn: hn.to_string(),
        firstname: "Somsak".to_string(),
        lastname: "Jaidee".to_string(),
        age: Some(4),
        sex: Some("M".to_string()),
        dob: NaiveDate::from_ymd_opt(2021, 6, 1),
    }
}

fn operator_request() -> NewOperator {
    NewOperator {
        op_number: "OP-002".to_string(),
        username: "clerk".to_string(),
        password: "pw".to_string(),
        role: crate::database::OperatorRole::User,
    }
}

#[test]
fn new_person_is_trimmed() {
    let mut input = person("  C-001 ");
    input.firstname = " Somsak ".to_string();
    input.sex = Some("   ".to_string());

    let cleaned = validation::new_person(input).expect("valid");
    assert_eq!(cleaned.hn, "C-001");
    assert_eq!(cleaned.firstname, "Somsak");
    assert_eq!(cleaned.sex, None);
}

#[test]
fn new_person_requires_names_and_hn() {
    let mutations: [fn(&mut NewPerson); 6] = [
        |p: &mut NewPerson| p.hn = " ".to_string(),
        |p: &mut NewPerson| p.firstname = String::new(),
        |p: &mut NewPerson| p.lastname = "\t".to_string(),
        |p: &mut NewPerson| p.age = Some(-1),
        |p: &mut NewPerson| p.age = Some(200),
        |p: &mut NewPerson| p.hn = "H".repeat(300),
    ];

    for mutate in mutations {
        let mut input = person("C-001");
        mutate(&mut input);
        assert!(matches!(
            validation::new_person(input),
            Err(RegistryError::Validation(_))
        ));
    }
}

#[test]
fn future_dob_is_rejected() {
    let mut input = person("C-001");
    input.dob = Utc::now().date_naive().checked_add_days(Days::new(2));
    assert!(matches!(
        validation::new_person(input),
        Err(RegistryError::Validation(_))
    ));
}

#[test]
fn update_needs_at_least_one_field() {
    assert!(matches!(
        validation::person_update(PersonUpdate::default()),
        Err(RegistryError::Validation(_))
    ));

    // Blank optional text is dropped, leaving nothing to update
    let blank = PersonUpdate {
        sex: Some("  ".to_string()),
        ..PersonUpdate::default()
    };
    assert!(validation::person_update(blank).is_err());

    let update = PersonUpdate {
        lastname: Some(" Rakdee ".to_string()),
        ..PersonUpdate::default()
    };
    let cleaned = validation::person_update(update).expect("valid");
    assert_eq!(cleaned.lastname.as_deref(), Some("Rakdee"));
}

#[test]
fn update_rejects_blank_names() {
    let update = PersonUpdate {
        firstname: Some(String::new()),
        ..PersonUpdate::default()
    };
    assert!(validation::person_update(update).is_err());
}

#[test]
fn vector_set_bounds() {
    let v = vec![0.1, 0.2, 0.3];

    assert!(validation::vector_set(&[v.clone()], 3).is_ok());
    assert!(validation::vector_set(&[v.clone(), v.clone(), v.clone()], 3).is_ok());
    assert!(validation::vector_set(&[], 3).is_err());
    assert!(validation::vector_set(&[v.clone(), v.clone(), v.clone(), v.clone()], 3).is_err());

    let error = validation::vector_set(&[v, vec![0.1]], 3).expect_err("wrong dimension");
    assert!(error.to_string().contains("Vector 2"));
}

#[test]
fn operator_requires_credentials() {
    let mut request = operator_request();
    request.password = String::new();
    assert!(validation::new_operator(request).is_err());

    let mut request = operator_request();
    request.username = "  ".to_string();
    assert!(validation::new_operator(request).is_err());

    let mut request = operator_request();
    request.op_number = " OP-002 ".to_string();
    let cleaned = validation::new_operator(request).expect("valid");
    assert_eq!(cleaned.op_number, "OP-002");
}

#[test]
fn store_follows_configuration() {
    let mut config = Config::default();
    config.audit.mode = AuditMode::BestEffort;
    config.matcher.embedding_dimension = 8;

    let store = RecordStore::from_config(&config);
    assert_eq!(store.activity().mode(), AuditMode::BestEffort);
    assert_eq!(store.dimension, 8);
}

#[tokio::test]
async fn mutations_require_login() {
    let session = Session::new(DatabaseConfig::default());
    let store = store();

    assert!(matches!(
        store.insert(&session, PersonKind::Child, person("C-001")).await,
        Err(RegistryError::NotAuthenticated)
    ));
    assert!(matches!(
        store.link(&session, "P-001", "C-001").await,
        Err(RegistryError::NotAuthenticated)
    ));
    assert!(matches!(
        store.hard_delete(&session, PersonKind::Parent, "P-001").await,
        Err(RegistryError::NotAuthenticated)
    ));
    assert!(matches!(
        store.list_relations(&session).await,
        Err(RegistryError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn validation_runs_before_login_check() {
    let session = Session::new(DatabaseConfig::default());
    let store = store();

    assert!(matches!(
        store.insert(&session, PersonKind::Child, person("")).await,
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        store.search_multi_criteria(&session, SearchFilter::default()).await,
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        store.search_by_name(&session, "   ").await,
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        store
            .insert_vectors(&session, PersonKind::Child, "C-001", vec![vec![1.0]], None)
            .await,
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        store.activity_log(&session, Some(0)).await,
        Err(RegistryError::Validation(_))
    ));
}
