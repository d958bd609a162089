//! Derived UI state produced by rule evaluation.
//!
//! Every map is an override delta on top of the static schema: a missing key
//! means "no override", never "false".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::actions::Action;

/// A value the form layer should write into a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PendingValue {
    /// Force the field to this value.
    Set(Value),
    /// Blank the field. Distinct from having no pending change at all.
    Clear,
}

/// A `setOptions` / `reloadSource` action left for the owning layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredAction {
    pub rule_id: String,
    pub action: Action,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeState {
    pub visibility: BTreeMap<String, bool>,
    pub disabled: BTreeMap<String, bool>,
    pub disabled_reasons: BTreeMap<String, String>,
    pub required: BTreeMap<String, bool>,
    pub pending_values: BTreeMap<String, PendingValue>,
    /// Inert actions in evaluation order; nothing in the engine reacts to them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<DeferredAction>,
}

impl CascadeState {
    /// Start from a caller supplied visibility baseline.
    pub fn with_visibility(visibility: BTreeMap<String, bool>) -> Self {
        Self {
            visibility,
            ..Self::default()
        }
    }

    /// Fields are visible unless a rule or the baseline says otherwise.
    pub fn field_visibility(&self, field: &str) -> bool {
        self.visibility.get(field).copied().unwrap_or(true)
    }

    pub fn field_disabled(&self, field: &str) -> bool {
        self.disabled.get(field).copied().unwrap_or(false)
    }

    pub fn field_disabled_reason(&self, field: &str) -> Option<&str> {
        self.disabled_reasons.get(field).map(String::as_str)
    }

    /// `None` means the schema's own required flag applies.
    pub fn field_required(&self, field: &str) -> Option<bool> {
        self.required.get(field).copied()
    }

    pub fn pending_values(&self) -> &BTreeMap<String, PendingValue> {
        &self.pending_values
    }

    pub fn pending_value(&self, field: &str) -> Option<&PendingValue> {
        self.pending_values.get(field)
    }
}
