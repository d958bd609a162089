//! Cascade Rule Engine
//!
//! Derives field visibility, enablement, required-ness and forced values from
//! the current form values. Rules run in list order and the last applicable
//! write to a slot wins.

mod actions;
mod generator;
mod operators;
mod rule;
mod state;

pub use actions::{Action, DeferredPayload};
pub use generator::{rules_from_ui_fields, Condition, FieldCascade};
pub use operators::{matches_pattern, Operator};
pub use rule::{parse_rules, Rule, Trigger};
pub use state::{CascadeState, DeferredAction, PendingValue};

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

/// Evaluate `rules` against `values`, starting from `initial_visibility`.
///
/// Pure: the same inputs always produce the same state and `values` is
/// never touched.
pub fn evaluate_rules(
    rules: &[Rule],
    initial_visibility: &BTreeMap<String, bool>,
    values: &Value,
) -> CascadeState {
    let mut state = CascadeState::with_visibility(initial_visibility.clone());

    for rule in rules {
        if !rule.trigger.is_satisfied(values) {
            continue;
        }
        trace!("Cascade rule {} triggered", rule.id);
        for action in &rule.actions {
            action.apply(&mut state, &rule.id);
        }
    }

    state
}

/// Holds one form's rule list and visibility baseline.
#[derive(Debug, Clone, Default)]
pub struct CascadeEngine {
    rules: Vec<Rule>,
    initial_visibility: BTreeMap<String, bool>,
}

impl CascadeEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            initial_visibility: BTreeMap::new(),
        }
    }

    pub fn with_initial_visibility(mut self, visibility: BTreeMap<String, bool>) -> Self {
        self.initial_visibility = visibility;
        self
    }

    pub fn set_rules(&mut self, rules: Vec<Rule>) {
        self.rules = rules;
    }

    pub fn set_initial_visibility(&mut self, visibility: BTreeMap<String, bool>) {
        self.initial_visibility = visibility;
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Called on every value change.
    pub fn evaluate(&self, values: &Value) -> CascadeState {
        evaluate_rules(&self.rules, &self.initial_visibility, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hide_rule(id: &str, trigger_value: Value, field: &str) -> Rule {
        Rule {
            id: id.into(),
            description: None,
            trigger: Trigger::new("mode", Operator::Eq, Some(trigger_value)),
            actions: vec![Action::Hide { fields: vec![field.into()] }],
        }
    }

    #[test]
    fn test_later_rule_wins() {
        let mut show = hide_rule("show-x", json!("a"), "x");
        show.actions = vec![Action::Show { fields: vec!["x".into()] }];
        let engine = CascadeEngine::new(vec![hide_rule("hide-x", json!("a"), "x"), show.clone()]);
        assert!(engine.evaluate(&json!({"mode": "a"})).field_visibility("x"));

        let engine = CascadeEngine::new(vec![show, hide_rule("hide-x", json!("a"), "x")]);
        assert!(!engine.evaluate(&json!({"mode": "a"})).field_visibility("x"));
    }

    #[test]
    fn test_initial_visibility_is_baseline() {
        let baseline = BTreeMap::from([("advanced".to_string(), false)]);
        let engine = CascadeEngine::new(vec![]).with_initial_visibility(baseline);
        let state = engine.evaluate(&json!({}));
        assert!(!state.field_visibility("advanced"));
        assert!(state.field_visibility("other"));
    }

    #[test]
    fn test_untriggered_rules_leave_no_trace() {
        let engine = CascadeEngine::new(vec![hide_rule("r", json!("b"), "x")]);
        assert_eq!(engine.evaluate(&json!({"mode": "a"})), CascadeState::default());
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let rules = parse_rules(&json!([
            {"id": "1", "trigger": {"field": "size", "operator": "gt", "value": 100},
             "actions": [{"type": "setRequired", "fields": ["iops"]},
                         {"type": "setValue", "field": "type", "value": "io2"}]},
            {"id": "2", "trigger": {"field": "size", "operator": "notEmpty"},
             "actions": [{"type": "disable", "fields": ["legacy"], "message": "n/a"}]}
        ]));
        let engine = CascadeEngine::new(rules);
        let values = json!({"size": 200});
        let first = engine.evaluate(&values);
        let second = engine.evaluate(&values);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(values, json!({"size": 200}));
    }
}
