use super::*;
use crate::value::{AttrMap, Value};
use proptest::prelude::*;

fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
        .collect()
}

#[test]
fn encode_prefers_item_properties_over_parent() {
    let template = KeyTemplate::parse("{id}-order-{order_id}").unwrap();
    let item = attrs(&[("order_id", "55")]);
    let parent = attrs(&[("id", "cust-1"), ("order_id", "SHADOWED")]);

    let key = template.encode(&item, &parent).unwrap();

    assert_eq!(key, "cust-1-order-55");
}

#[test]
fn encode_fails_fast_on_unresolved_placeholder() {
    let template = KeyTemplate::parse("{id}-order-{order_id}").unwrap();
    let item = attrs(&[("order_id", "55")]);
    let parent = AttrMap::new();

    let err = template.encode(&item, &parent).unwrap_err();

    assert!(matches!(
        err,
        TemplateError::UnresolvedPlaceholder { name } if name == "id"
    ));
}

#[test]
fn decode_recovers_placeholder_values() {
    let template = KeyTemplate::parse("{id}-order-{order_id}").unwrap();

    let values = template.decode("cust-1-order-55").unwrap();

    assert_eq!(values.get("id").map(String::as_str), Some("cust-1"));
    assert_eq!(values.get("order_id").map(String::as_str), Some("55"));
}

#[test]
fn decode_rejects_foreign_keys() {
    let template = KeyTemplate::parse("{id}-order-{order_id}").unwrap();

    assert!(template.decode("cust-1-address-55").is_none());
}

#[test]
fn adjacent_placeholders_are_rejected_at_parse() {
    let err = KeyTemplate::parse("{id}{order_id}-order").unwrap_err();

    assert!(matches!(
        err,
        TemplateError::AdjacentPlaceholders { first, second }
            if first == "id" && second == "order_id"
    ));
}

#[test]
fn malformed_templates_are_rejected() {
    assert!(matches!(
        KeyTemplate::parse("{id"),
        Err(TemplateError::UnbalancedBrace { .. })
    ));
    assert!(matches!(
        KeyTemplate::parse("id}-x"),
        Err(TemplateError::UnbalancedBrace { .. })
    ));
    assert!(matches!(
        KeyTemplate::parse("{}-x"),
        Err(TemplateError::EmptyPlaceholder { .. })
    ));
    assert!(matches!(
        KeyTemplate::parse("{or der}"),
        Err(TemplateError::InvalidPlaceholderName { .. })
    ));
}

#[test]
fn derived_keyword_picks_first_alphabetic_literal_token() {
    let template = KeyTemplate::parse("{id}-v2-order-{order_id}").unwrap();

    assert_eq!(template.derived_keyword().as_deref(), Some("order"));
}

#[test]
fn derived_keyword_absent_when_literals_are_short() {
    let template = KeyTemplate::parse("{id}-x-{order_id}").unwrap();

    assert_eq!(template.derived_keyword(), None);
}

#[test]
fn row_key_constraints_are_enforced() {
    assert!(validate_row_key("task-001", 1024).is_ok());
    assert!(matches!(validate_row_key("", 1024), Err(KeyError::Empty)));
    assert!(matches!(
        validate_row_key("a/b", 1024),
        Err(KeyError::ForbiddenCharacter { ch: '/', .. })
    ));
    assert!(matches!(
        validate_row_key("a#b", 1024),
        Err(KeyError::ForbiddenCharacter { ch: '#', .. })
    ));
    assert!(matches!(
        validate_row_key("a\tb", 1024),
        Err(KeyError::ForbiddenCharacter { .. })
    ));
    assert!(matches!(
        validate_row_key(&"x".repeat(1025), 1024),
        Err(KeyError::TooLong { len: 1025, max: 1024 })
    ));
}

#[test]
fn key_slot_assigns_exactly_once() {
    let mut slot = KeySlot::new();
    assert!(!slot.is_assigned());

    slot.assign(RowKey::new("task-001")).unwrap();
    assert_eq!(slot.get().map(RowKey::as_str), Some("task-001"));

    let err = slot.assign(RowKey::new("task-002")).unwrap_err();
    assert!(matches!(
        err,
        KeyError::AlreadyAssigned { existing } if existing == "task-001"
    ));
    assert_eq!(slot.get().map(RowKey::as_str), Some("task-001"));
}

proptest! {
    /// Round-trip law: with a literal separator between adjacent
    /// placeholders and values that cannot contain the separator, decode
    /// recovers every encoded placeholder value exactly.
    #[test]
    fn template_round_trip(
        id in "[a-z0-9]{1,12}",
        order_id in "[a-z0-9]{1,12}",
    ) {
        let template = KeyTemplate::parse("{id}-order-{order_id}").unwrap();
        let item = attrs(&[("order_id", order_id.as_str())]);
        let parent = attrs(&[("id", id.as_str())]);

        let key = template.encode(&item, &parent).unwrap();
        let values = template.decode(&key).expect("encoded key must decode");

        prop_assert_eq!(values.get("id").map(String::as_str), Some(id.as_str()));
        prop_assert_eq!(
            values.get("order_id").map(String::as_str),
            Some(order_id.as_str())
        );
    }
}
