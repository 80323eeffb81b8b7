//! Tests for schema metadata types

use super::*;

#[test]
fn test_table_ref_parse_qualified() {
    let table = TableRef::parse("public.orders");
    assert_eq!(table.schema.as_deref(), Some("public"));
    assert_eq!(table.name, "orders");
    assert_eq!(table.to_string(), "public.orders");
}

#[test]
fn test_table_ref_parse_unqualified() {
    let table = TableRef::parse("orders");
    assert_eq!(table, TableRef::new("orders"));
    assert_eq!(table.schema_or("main"), "main");
}

#[test]
fn test_table_ref_parse_splits_on_first_dot_only() {
    let table = TableRef::parse("a.b.c");
    assert_eq!(table.schema.as_deref(), Some("a"));
    assert_eq!(table.name, "b.c");
}

#[test]
fn test_table_ref_parse_ignores_empty_parts() {
    assert_eq!(TableRef::parse(".orders"), TableRef::new(".orders"));
    assert_eq!(TableRef::parse("orders."), TableRef::new("orders."));
}

#[test]
fn test_default_options_are_default() {
    assert!(ForeignKeyOptions::default().is_default());
}

#[test]
fn test_any_set_option_is_not_default() {
    assert!(!ForeignKeyOptions::default().with_inherited().is_default());
    assert!(
        !ForeignKeyOptions::default()
            .with_schema_override("audit")
            .is_default()
    );
}

#[test]
fn test_foreign_key_action_parse() {
    assert_eq!(ForeignKeyAction::parse("CASCADE"), ForeignKeyAction::Cascade);
    assert_eq!(ForeignKeyAction::parse("set null"), ForeignKeyAction::SetNull);
    assert_eq!(
        ForeignKeyAction::parse("SET DEFAULT"),
        ForeignKeyAction::SetDefault
    );
    assert_eq!(ForeignKeyAction::parse("RESTRICT"), ForeignKeyAction::Restrict);
    assert_eq!(ForeignKeyAction::parse("NO ACTION"), ForeignKeyAction::NoAction);
    assert_eq!(ForeignKeyAction::parse("bogus"), ForeignKeyAction::NoAction);
}

#[test]
fn test_foreign_key_action_sql_round_trips_through_parse() {
    for action in [
        ForeignKeyAction::NoAction,
        ForeignKeyAction::Restrict,
        ForeignKeyAction::Cascade,
        ForeignKeyAction::SetNull,
        ForeignKeyAction::SetDefault,
    ] {
        assert_eq!(ForeignKeyAction::parse(action.as_sql()), action);
    }
}

#[test]
fn test_foreign_key_info_new() {
    let fk = ForeignKeyInfo::new("fk_orders_customer", "customer_id", "customers", "id");
    assert_eq!(fk.columns, vec!["customer_id".to_string()]);
    assert_eq!(fk.referenced_columns, vec!["id".to_string()]);
    assert_eq!(fk.on_delete, ForeignKeyAction::NoAction);
    assert!(fk.referenced_schema.is_none());
}
