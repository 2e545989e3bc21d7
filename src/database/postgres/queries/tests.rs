use super::*;

#[test]
fn like_pattern_wraps_input() {
    assert_eq!(like_pattern("Som"), "%Som%");
    assert_eq!(like_pattern(""), "%%");
}

#[test]
fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("50%"), "%50\\%%");
    assert_eq!(like_pattern("a_b"), "%a\\_b%");
    assert_eq!(like_pattern("back\\slash"), "%back\\\\slash%");
}

#[test]
fn search_combines_both_populations() {
    let filter = SearchFilter {
        hn: Some("C-001".to_string()),
        name: Some("Som".to_string()),
        ..SearchFilter::default()
    };

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("");
    push_search_branch(&mut builder, PersonKind::Child, &filter);
    let sql = builder.sql().to_string();

    assert!(sql.contains("FROM child c"));
    assert!(sql.contains("JOIN parent p"));
    assert!(sql.contains("pr.child_id = c.person_id"));
    assert!(sql.contains("c.hn = $1"));
    assert!(sql.contains("c.firstname ILIKE $2"));
    assert!(sql.contains("c.lastname ILIKE $3"));
}

#[test]
fn parent_branch_filters_on_parent_columns() {
    let filter = SearchFilter {
        lastname: Some("Jaidee".to_string()),
        ..SearchFilter::default()
    };

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("");
    push_search_branch(&mut builder, PersonKind::Parent, &filter);
    let sql = builder.sql().to_string();

    assert!(sql.contains("FROM parent p"));
    assert!(sql.contains("JOIN child c"));
    assert!(sql.contains("pr.parent_id = p.person_id"));
    assert!(sql.contains("WHERE p.active_status AND p.lastname ILIKE $1"));
    assert!(!sql.contains("p.hn ="));
}
