use super::*;

#[test]
fn person_kind_tables() {
    assert_eq!(PersonKind::Child.table(), "child");
    assert_eq!(PersonKind::Parent.vector_table(), "identity_vector_parent");
    assert_eq!(PersonKind::Child.relation_column(), "child_id");
    assert_eq!(PersonKind::Child.counterpart(), PersonKind::Parent);
    assert_eq!(PersonKind::Parent.counterpart(), PersonKind::Child);
}

#[test]
fn person_kind_parsing() {
    assert_eq!("Child".parse::<PersonKind>().ok(), Some(PersonKind::Child));
    assert_eq!(" parent ".parse::<PersonKind>().ok(), Some(PersonKind::Parent));
    assert!(matches!(
        "sibling".parse::<PersonKind>(),
        Err(RegistryError::Validation(_))
    ));
}

#[test]
fn new_person_from_json() {
    let person: NewPerson = serde_json::from_value(serde_json::json!({
        "hn": "C-001",
        "firstname": "Somsak",
        "lastname": "Jaidee",
        "age": 1,
        "sex": "M",
        "dob": "2024-03-01"
    }))
    .expect("deserializes");

    assert_eq!(person.hn, "C-001");
    assert_eq!(person.age, Some(1));
    assert_eq!(person.dob, NaiveDate::from_ymd_opt(2024, 3, 1));

    let minimal: NewPerson = serde_json::from_value(serde_json::json!({
        "hn": "P-001",
        "firstname": "Somsri",
        "lastname": "Jaidee"
    }))
    .expect("optional fields default");
    assert_eq!(minimal.sex, None);
}

#[test]
fn person_update_emptiness() {
    assert!(PersonUpdate::default().is_empty());

    let update = PersonUpdate {
        age: Some(2),
        ..PersonUpdate::default()
    };
    assert!(!update.is_empty());
}

#[test]
fn search_filter_normalization() {
    let filter = SearchFilter {
        hn: Some("  ".to_string()),
        name: None,
        firstname: Some(" Som ".to_string()),
        lastname: Some(String::new()),
    }
    .normalized();

    assert_eq!(filter.hn, None);
    assert_eq!(filter.firstname.as_deref(), Some("Som"));
    assert_eq!(filter.lastname, None);
    assert!(!filter.is_empty());

    assert!(SearchFilter::default().normalized().is_empty());
    assert_eq!(SearchFilter::by_hn("C-001").hn.as_deref(), Some("C-001"));
    assert_eq!(SearchFilter::by_name("Som").name.as_deref(), Some("Som"));
}

#[test]
fn operator_role_conversion() {
    assert_eq!(
        OperatorRole::try_from("admin".to_string()).ok(),
        Some(OperatorRole::Admin)
    );
    assert!(OperatorRole::try_from("root".to_string()).is_err());
    assert_eq!(OperatorRole::User.connection_role(), Role::User);
    assert_eq!(OperatorRole::Admin.connection_role(), Role::Admin);
}

#[test]
fn unlinked_row_has_no_relation() {
    let row = RelationRow {
        relation_id: None,
        child_hn: Some("C-001".to_string()),
        child_firstname: Some("Somsak".to_string()),
        child_lastname: None,
        child_age: Some(1),
        child_sex: Some("M".to_string()),
        child_dob: None,
        parent_hn: None,
        parent_firstname: None,
        parent_lastname: None,
        parent_age: None,
        parent_sex: None,
        parent_dob: None,
    };
    assert!(!row.is_linked());
}
