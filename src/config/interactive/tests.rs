use super::parse_max_distance;

#[test]
fn empty_max_distance_disables_threshold() {
    assert_eq!(parse_max_distance(""), Ok(None));
    assert_eq!(parse_max_distance("   "), Ok(None));
}

#[test]
fn max_distance_parsing() {
    assert_eq!(parse_max_distance("0.35"), Ok(Some(0.35)));
    assert_eq!(parse_max_distance(" 2 "), Ok(Some(2.0)));
    assert!(parse_max_distance("abc").is_err());
    assert!(parse_max_distance("2.5").is_err());
    assert!(parse_max_distance("-1").is_err());
}
