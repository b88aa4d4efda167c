use outpost::http::fields::Fields;

#[test]
fn test_get_is_case_insensitive() {
    let mut fields = Fields::new();
    fields.set("Content-Type", "text/html");

    assert_eq!(fields.get("content-type"), Some("text/html"));
    assert_eq!(fields.get("CONTENT-TYPE"), Some("text/html"));
    assert_eq!(fields.get("missing"), None);
}

#[test]
fn test_set_last_value_wins() {
    let mut fields = Fields::new();
    fields.set("X-Tag", "one");
    fields.set("x-tag", "two");
    fields.set("X-TAG", "three");

    assert_eq!(fields.len(), 1);
    assert_eq!(fields.get("X-Tag"), Some("three"));
}

#[test]
fn test_iteration_keeps_insertion_order() {
    let mut fields = Fields::new();
    fields.set("First", "1");
    fields.set("Second", "2");
    fields.set("Third", "3");
    fields.set("first", "updated");

    let order: Vec<(&str, &str)> = fields.iter().collect();
    assert_eq!(
        order,
        vec![("First", "updated"), ("Second", "2"), ("Third", "3")]
    );
}

#[test]
fn test_remove_returns_value() {
    let mut fields = Fields::new();
    fields.set("Connection", "close");

    assert_eq!(fields.remove("connection").as_deref(), Some("close"));
    assert_eq!(fields.remove("connection"), None);
    assert!(fields.is_empty());
}

#[test]
fn test_contains_and_clear() {
    let mut fields = Fields::new();
    fields.set("Host", "example.com");

    assert!(fields.contains("host"));
    fields.clear();
    assert!(!fields.contains("host"));
    assert_eq!(fields.len(), 0);
}
