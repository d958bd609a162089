use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Where a data source gets its options from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Static,
    Api,
    /// Declared by schemas but not loadable; always yields no options.
    Terraform,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Seconds, fractions allowed. Anything that is not a positive number
    /// (absent, `null`, `0`, negative, a string) means "use the engine default".
    #[serde(
        default,
        deserialize_with = "lenient_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub ttl: Option<f64>,
    /// Template for the cache key, expanded like the URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl CachePolicy {
    pub fn with_ttl(mut self, seconds: f64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    /// Effective TTL; falls back to `default` unless `ttl` is a positive,
    /// representable number of seconds.
    pub fn ttl_or(&self, default: Duration) -> Duration {
        self.ttl
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(default)
    }
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    if !raw.is_null() && !raw.is_number() {
        warn!("Cache ttl must be a number of seconds, using the default instead of {}", raw);
    }
    Ok(raw.as_f64())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Jmespath,
    Jsonpath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(rename = "type")]
    pub kind: TransformKind,
    pub expression: String,
}

/// Declarative description of an option list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// URL template, e.g. `/api/v1/aws/ami?region=${providers.aws.region}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Query parameter templates. Ordered so cache keys are stable.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CachePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Options of a `static` source, returned verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<SelectOption>,
}

impl DataSource {
    pub fn depends_on(&self, field: &str) -> bool {
        self.depends_on.iter().any(|f| f == field)
    }

    pub fn has_dependencies(&self) -> bool {
        !self.depends_on.is_empty()
    }
}

/// A normalized selectable option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            ..Self::default()
        }
    }
}

/// Per-source load state observed by the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceState {
    pub loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data: Vec<SelectOption>,
}

impl DataSourceState {
    pub fn loading() -> Self {
        Self {
            loading: true,
            error: None,
            data: Vec::new(),
        }
    }

    pub fn loaded(data: Vec<SelectOption>) -> Self {
        Self {
            loading: false,
            error: None,
            data,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            loading: false,
            error: Some(error.into()),
            data: Vec::new(),
        }
    }
}

/// Parse a JSON source list, skipping (and logging) entries that do not fit.
pub fn parse_sources(raw: &Value) -> Vec<DataSource> {
    let Some(items) = raw.as_array() else {
        if !raw.is_null() {
            warn!("External sources must be a list, ignoring {}", raw);
        }
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<DataSource>(item.clone()) {
            Ok(source) => Some(source),
            Err(e) => {
                let id = item.get("id").and_then(Value::as_str).unwrap_or("<unnamed>");
                warn!("Skipping data source {}: {}", id, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_api_source() {
        let source: DataSource = serde_json::from_value(json!({
            "id": "ami_list",
            "type": "api",
            "api": "/api/v1/aws/ami",
            "params": {"region": "${providers.aws.region}"},
            "cache": {"ttl": 600},
            "transform": {"type": "jmespath", "expression": "items[*].{value: id, label: name}"},
            "dependsOn": ["region"]
        }))
        .unwrap();

        assert_eq!(source.kind, SourceKind::Api);
        assert_eq!(source.cache.as_ref().and_then(|c| c.ttl), Some(600.0));
        assert_eq!(source.transform.as_ref().map(|t| t.kind), Some(TransformKind::Jmespath));
        assert!(source.depends_on("region"));
        assert!(!source.depends_on("vpc_id"));
    }

    #[test]
    fn test_parse_sources_skips_unknown_kind() {
        let sources = parse_sources(&json!([
            {"id": "a", "type": "static", "data": [{"value": "x", "label": "X"}]},
            {"id": "b", "type": "graphql"}
        ]));
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].data, vec![SelectOption::new("x", "X")]);
    }

    #[test]
    fn test_loose_cache_ttls_keep_the_source() {
        let sources = parse_sources(&json!([
            {"id": "a", "type": "static", "cache": {"ttl": 300.0}},
            {"id": "b", "type": "static", "cache": {"ttl": null}},
            {"id": "c", "type": "static", "cache": {"ttl": 300}},
            {"id": "d", "type": "static", "cache": {"ttl": "soon"}},
            {"id": "e", "type": "static", "cache": {"ttl": 0.5}},
            {"id": "f", "type": "static", "cache": {"ttl": -10}},
            {"id": "g", "type": "static", "cache": {}}
        ]));
        let ids: Vec<_> = sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e", "f", "g"]);

        let default = Duration::from_secs(300);
        let ttls: Vec<_> = sources
            .iter()
            .map(|s| s.cache.as_ref().unwrap().ttl_or(default))
            .collect();
        assert_eq!(
            ttls,
            vec![
                Duration::from_secs(300),
                default,
                Duration::from_secs(300),
                default,
                Duration::from_millis(500),
                default,
                default,
            ]
        );
    }

    #[test]
    fn test_oversized_ttl_falls_back() {
        let policy = CachePolicy::default().with_ttl(1e300);
        assert_eq!(policy.ttl_or(Duration::from_secs(7)), Duration::from_secs(7));
    }

    #[test]
    fn test_option_serialization_omits_defaults() {
        let out = serde_json::to_value(SelectOption::new("a", "A")).unwrap();
        assert_eq!(out, json!({"value": "a", "label": "A"}));
    }
}
