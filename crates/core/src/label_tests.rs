use super::*;

#[test]
fn access_masks_table_has_seven_distinct_entries() {
    let strs: std::collections::HashSet<_> = ACCESS_MASKS.iter().map(|m| m.as_str()).collect();
    assert_eq!(strs.len(), 7);
}

#[test]
fn label_display_matches_constructor() {
    let label = Label::new("app.myApp");
    assert_eq!(label.to_string(), "app.myApp");
    assert_eq!(label.as_str(), "app.myApp");
}
