//! Field-level cascade shorthand.
//!
//! UI field configs may carry `cascade: { showWhen, hideWhen, requiredWith,
//! conflictsWith }`. This expands them into ordinary [`Rule`]s.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::actions::Action;
use super::operators::Operator;
use super::rule::{Rule, Trigger};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCascade {
    #[serde(default)]
    pub show_when: Option<Condition>,
    #[serde(default)]
    pub hide_when: Option<Condition>,
    #[serde(default)]
    pub required_with: Vec<String>,
    #[serde(default)]
    pub conflicts_with: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl Condition {
    fn trigger(&self) -> Trigger {
        Trigger::new(
            self.field.clone(),
            self.operator.unwrap_or(Operator::Eq),
            self.value.clone(),
        )
    }

    fn reverse_trigger(&self) -> Trigger {
        Trigger::new(
            self.field.clone(),
            self.operator.unwrap_or(Operator::Eq).inverse(),
            self.value.clone(),
        )
    }
}

impl FieldCascade {
    /// Rules for the field `name`, in a fixed order: show, hide, required, conflicts.
    pub fn to_rules(&self, name: &str) -> Vec<Rule> {
        let mut rules = Vec::new();

        if let Some(cond) = &self.show_when {
            rules.push(rule(
                format!("{}-show", name),
                format!("show {}", name),
                cond.trigger(),
                vec![Action::Show { fields: vec![name.to_string()] }],
            ));
            rules.push(rule(
                format!("{}-hide-reverse", name),
                format!("hide {} (reverse)", name),
                cond.reverse_trigger(),
                vec![Action::Hide { fields: vec![name.to_string()] }],
            ));
        }

        if let Some(cond) = &self.hide_when {
            rules.push(rule(
                format!("{}-hide", name),
                format!("hide {}", name),
                cond.trigger(),
                vec![Action::Hide { fields: vec![name.to_string()] }],
            ));
            rules.push(rule(
                format!("{}-show-reverse", name),
                format!("show {} (reverse)", name),
                cond.reverse_trigger(),
                vec![Action::Show { fields: vec![name.to_string()] }],
            ));
        }

        if !self.required_with.is_empty() {
            rules.push(rule(
                format!("{}-required-with", name),
                format!("{} requires companions", name),
                Trigger::new(name, Operator::NotEmpty, None),
                vec![Action::SetRequired {
                    fields: self.required_with.clone(),
                    required: Some(true),
                }],
            ));
        }

        if !self.conflicts_with.is_empty() {
            rules.push(rule(
                format!("{}-conflicts-with", name),
                format!("{} clears conflicting fields", name),
                Trigger::new(name, Operator::NotEmpty, None),
                vec![Action::ClearValue { fields: self.conflicts_with.clone() }],
            ));
        }

        rules
    }
}

fn rule(id: String, description: String, trigger: Trigger, actions: Vec<Action>) -> Rule {
    Rule {
        id,
        description: Some(description),
        trigger,
        actions,
    }
}

/// Expand every `<field>.cascade` block of a UI `fields` map into rules.
/// A malformed block is logged and contributes nothing.
pub fn rules_from_ui_fields(fields: &Value) -> Vec<Rule> {
    let Some(fields) = fields.as_object() else {
        return Vec::new();
    };

    let mut rules = Vec::new();
    for (name, ui) in fields {
        let Some(raw) = ui.get("cascade") else {
            continue;
        };
        match FieldCascade::deserialize(raw) {
            Ok(cascade) => rules.extend(cascade.to_rules(name)),
            Err(e) => warn!("Ignoring cascade config of field {}: {}", name, e),
        }
    }
    debug!("Generated {} cascade rules from field configs", rules.len());
    rules
}
