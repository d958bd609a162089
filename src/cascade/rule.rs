use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::actions::{self, Action};
use super::operators::Operator;
use crate::value;

/// A single field/operator/value condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub field: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Trigger {
    pub fn new(field: impl Into<String>, operator: Operator, value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Resolve the trigger field in `values` and apply the operator.
    pub fn is_satisfied(&self, values: &Value) -> bool {
        let field_value = value::resolve(values, &self.field);
        self.operator.evaluate(field_value, self.value.as_ref())
    }
}

/// A trigger/actions pair. Rules are applied in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub trigger: Trigger,
    #[serde(default, deserialize_with = "actions::deserialize_lenient")]
    pub actions: Vec<Action>,
}

/// Parse a JSON rule list. Rules that fail to parse (unknown operator,
/// missing trigger, ...) are logged and skipped; the rest keep their order.
pub fn parse_rules(raw: &Value) -> Vec<Rule> {
    let Some(items) = raw.as_array() else {
        if !raw.is_null() {
            warn!("Cascade rules must be a list, ignoring {}", raw);
        }
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Rule>(item.clone()) {
            Ok(rule) => Some(rule),
            Err(e) => {
                let id = item.get("id").and_then(Value::as_str).unwrap_or("<unnamed>");
                warn!("Skipping cascade rule #{} ({}): {}", index, id, e);
                None
            }
        })
        .collect()
}
