//! Cascade Scenarios
//!
//! End-to-end checks of rule evaluation through the public API, starting
//! from schema documents the way a form host would.

use std::collections::BTreeMap;

use form_cascade::cascade::{parse_rules, PendingValue};
use form_cascade::{evaluate_rules, CascadeEngine, FormConfig};
use serde_json::{json, Value};

fn vpc_schema() -> Value {
    json!({
        "openapi": "3.0.0",
        "x-iac-platform": {
            "ui": {"fields": {
                "subnet_id": {"cascade": {"showWhen": {"field": "enable_vpc", "value": true}}},
                "nat_gateway": {"cascade": {"requiredWith": ["subnet_id"]}}
            }},
            "cascade": {"rules": [
                {"id": "lock-prod", "trigger": {"field": "env", "operator": "eq", "value": "prod"},
                 "actions": [{"type": "disable", "fields": ["instance_type"], "message": "Locked in prod"}]}
            ]}
        }
    })
}

#[test]
fn test_show_when_toggles_visibility() {
    let engine = CascadeEngine::new(FormConfig::from_schema(&vpc_schema()).rules);

    let hidden = engine.evaluate(&json!({"enable_vpc": false}));
    assert!(!hidden.field_visibility("subnet_id"));

    let shown = engine.evaluate(&json!({"enable_vpc": true}));
    assert!(shown.field_visibility("subnet_id"));

    // Missing trigger field counts as "not equal"
    assert!(!engine.evaluate(&json!({})).field_visibility("subnet_id"));
}

#[test]
fn test_required_with_and_disable_message() {
    let engine = CascadeEngine::new(FormConfig::from_schema(&vpc_schema()).rules);
    let state = engine.evaluate(&json!({"enable_vpc": true, "nat_gateway": "nat-1", "env": "prod"}));

    assert_eq!(state.field_required("subnet_id"), Some(true));
    assert!(state.field_disabled("instance_type"));
    assert_eq!(state.field_disabled_reason("instance_type"), Some("Locked in prod"));

    let relaxed = engine.evaluate(&json!({"enable_vpc": true, "env": "dev"}));
    assert_eq!(relaxed.field_required("subnet_id"), None);
    assert!(!relaxed.field_disabled("instance_type"));
}

#[test]
fn test_later_rule_wins_on_same_slot() {
    let rules = parse_rules(&json!([
        {"id": "hide", "trigger": {"field": "mode", "operator": "eq", "value": "simple"},
         "actions": [{"type": "hide", "fields": ["advanced"]}]},
        {"id": "show", "trigger": {"field": "force", "operator": "eq", "value": true},
         "actions": [{"type": "show", "fields": ["advanced"]}]}
    ]));

    let state = evaluate_rules(&rules, &BTreeMap::new(), &json!({"mode": "simple", "force": true}));
    assert!(state.field_visibility("advanced"));

    let reversed: Vec<_> = rules.iter().rev().cloned().collect();
    let state = evaluate_rules(&reversed, &BTreeMap::new(), &json!({"mode": "simple", "force": true}));
    assert!(!state.field_visibility("advanced"));
}

#[test]
fn test_evaluation_is_deterministic_and_leaves_values_untouched() {
    let engine = CascadeEngine::new(FormConfig::from_schema(&vpc_schema()).rules);
    let values = json!({"enable_vpc": true, "subnet_id": "s", "env": "prod"});
    let snapshot = values.clone();

    let first = engine.evaluate(&values);
    let second = engine.evaluate(&values);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(values, snapshot);
}

#[test]
fn test_empty_operators_treat_blank_values_alike() {
    let rules = parse_rules(&json!([
        {"id": "need-name", "trigger": {"field": "name", "operator": "empty"},
         "actions": [{"type": "setRequired", "fields": ["name"], "required": true}]}
    ]));
    let engine = CascadeEngine::new(rules);

    for blank in [json!({}), json!({"name": null}), json!({"name": ""}), json!({"name": []})] {
        assert_eq!(engine.evaluate(&blank).field_required("name"), Some(true), "{}", blank);
    }
    assert_eq!(engine.evaluate(&json!({"name": "web"})).field_required("name"), None);
}

#[test]
fn test_values_and_deferred_actions() {
    let rules = parse_rules(&json!([
        {"id": "defaults", "trigger": {"field": "size", "operator": "in", "value": ["small", "medium"]},
         "actions": [
            {"type": "setValue", "field": "instance_type", "value": "t3.micro"},
            {"type": "clearValue", "fields": ["gpu"]},
            {"type": "reloadSource", "field": "ami"},
            {"type": "teleport", "fields": ["x"]}
         ]}
    ]));
    let state = CascadeEngine::new(rules).evaluate(&json!({"size": "small"}));

    assert_eq!(
        state.pending_value("instance_type"),
        Some(&PendingValue::Set(json!("t3.micro")))
    );
    assert_eq!(state.pending_value("gpu"), Some(&PendingValue::Clear));
    assert_eq!(state.deferred.len(), 1);
    assert_eq!(state.deferred[0].rule_id, "defaults");
}

#[test]
fn test_initial_visibility_is_the_baseline() {
    let baseline = BTreeMap::from([("debug_port".to_string(), false)]);
    let engine = CascadeEngine::new(vec![]).with_initial_visibility(baseline);

    let state = engine.evaluate(&json!({}));
    assert!(!state.field_visibility("debug_port"));
    assert!(state.field_visibility("anything_else"));
}

#[test]
fn test_hide_when_generates_reverse_show() {
    let schema = json!({
        "x-iac-platform": {"ui": {"fields": {
            "subnet_id": {"cascade": {"hideWhen": {"field": "enable_vpc", "operator": "eq", "value": true}}}
        }}}
    });
    let engine = CascadeEngine::new(FormConfig::from_schema(&schema).rules);

    let off = engine.evaluate(&json!({"enable_vpc": false}));
    assert_eq!(off.visibility.get("subnet_id"), Some(&true));

    let on = engine.evaluate(&json!({"enable_vpc": true}));
    assert_eq!(on.visibility.get("subnet_id"), Some(&false));
}

#[test]
fn test_set_value_null_forces_null() {
    let rules = parse_rules(&json!([
        {"id": "reset", "trigger": {"field": "a", "operator": "eq", "value": 1},
         "actions": [
            {"type": "setValue", "field": "x", "value": null},
            {"type": "setValue", "field": "y"}
         ]}
    ]));
    let state = CascadeEngine::new(rules).evaluate(&json!({"a": 1}));

    assert_eq!(state.pending_value("x"), Some(&PendingValue::Set(Value::Null)));
    assert_eq!(state.pending_value("y"), None);
}
