//! Rule Actions
//!
//! The closed set of effects a triggered rule can have on [`CascadeState`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use super::state::{CascadeState, DeferredAction, PendingValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Show {
        #[serde(default)]
        fields: Vec<String>,
    },
    Hide {
        #[serde(default)]
        fields: Vec<String>,
    },
    Enable {
        #[serde(default)]
        fields: Vec<String>,
    },
    Disable {
        #[serde(default)]
        fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Without a `value` key the action does nothing. An explicit `null` is
    /// kept and forces the field to `null`.
    SetValue {
        #[serde(default)]
        field: Option<String>,
        #[serde(
            default,
            deserialize_with = "present",
            skip_serializing_if = "Option::is_none"
        )]
        value: Option<Value>,
    },
    SetRequired {
        #[serde(default)]
        fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        required: Option<bool>,
    },
    ClearValue {
        #[serde(default)]
        fields: Vec<String>,
    },
    SetOptions(DeferredPayload),
    ReloadSource(DeferredPayload),
}

/// Raw fields of an action the engine does not interpret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeferredPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Action {
    /// Apply this action to the accumulator. `rule_id` only labels deferred actions.
    pub fn apply(&self, state: &mut CascadeState, rule_id: &str) {
        match self {
            Action::Show { fields } => {
                for f in fields {
                    state.visibility.insert(f.clone(), true);
                }
            }
            Action::Hide { fields } => {
                for f in fields {
                    state.visibility.insert(f.clone(), false);
                }
            }
            Action::Enable { fields } => {
                for f in fields {
                    state.disabled.remove(f);
                    state.disabled_reasons.remove(f);
                }
            }
            Action::Disable { fields, message } => {
                for f in fields {
                    state.disabled.insert(f.clone(), true);
                    if let Some(message) = message {
                        state.disabled_reasons.insert(f.clone(), message.clone());
                    }
                }
            }
            Action::SetValue { field, value } => {
                if let (Some(field), Some(value)) = (field, value) {
                    state
                        .pending_values
                        .insert(field.clone(), PendingValue::Set(value.clone()));
                }
            }
            Action::SetRequired { fields, required } => {
                let required = required.unwrap_or(true);
                for f in fields {
                    state.required.insert(f.clone(), required);
                }
            }
            Action::ClearValue { fields } => {
                for f in fields {
                    state.pending_values.insert(f.clone(), PendingValue::Clear);
                }
            }
            Action::SetOptions(_) | Action::ReloadSource(_) => {
                state.deferred.push(DeferredAction {
                    rule_id: rule_id.to_string(),
                    action: self.clone(),
                });
            }
        }
    }
}

/// A key that is present always yields `Some`, `null` included.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Deserialize an action list, dropping entries whose `type` is unknown or
/// whose shape does not fit, so one bad action cannot void its whole rule.
pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Vec<Action>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| {
            let kind = value.get("type").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<Action>(value) {
                Ok(action) => Some(action),
                Err(e) => {
                    warn!("Ignoring cascade action of type {}: {}", kind, e);
                    None
                }
            }
        })
        .collect())
}
