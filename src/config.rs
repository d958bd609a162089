//! Engine and form configuration.
//!
//! `EngineConfig` carries runtime knobs (cache TTL default, request timeout,
//! auth token). `FormConfig` is the declarative part embedded in a schema
//! document under the `x-iac-platform` vendor extension.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cascade::{parse_rules, rules_from_ui_fields, Rule};
use crate::datasource::{parse_sources, DataSource};
use crate::error::ConfigError;

pub const ENV_DEFAULT_TTL: &str = "FORM_CASCADE_DEFAULT_TTL_SECS";
pub const ENV_TIMEOUT: &str = "FORM_CASCADE_TIMEOUT_SECS";
pub const ENV_AUTH_TOKEN: &str = "FORM_CASCADE_AUTH_TOKEN";
pub const ENV_EVENT_CAPACITY: &str = "FORM_CASCADE_EVENT_CAPACITY";

/// Vendor extension key holding the declarative form config.
pub const VENDOR_KEY: &str = "x-iac-platform";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// TTL for sources whose cache policy leaves `ttl` at 0.
    pub default_ttl: Duration,
    /// Upper bound for a single load; `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Sent as a bearer token with every API request.
    pub auth_token: Option<String>,
    /// Buffer size of the state change broadcast channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            request_timeout: Some(Duration::from_secs(30)),
            auth_token: None,
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `FORM_CASCADE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = parse_u64(&lookup, ENV_DEFAULT_TTL)? {
            config.default_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64(&lookup, ENV_TIMEOUT)? {
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN).filter(|t| !t.trim().is_empty()) {
            config.auth_token = Some(token.trim().to_string());
        }
        if let Some(capacity) = parse_u64(&lookup, ENV_EVENT_CAPACITY)? {
            config.event_capacity = capacity.max(1) as usize;
        }

        Ok(config)
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value: raw,
            }),
    }
}

/// Rules and sources declared by a schema document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormConfig {
    pub rules: Vec<Rule>,
    pub sources: Vec<DataSource>,
}

impl FormConfig {
    /// Extract `cascade.rules`, `ui.fields.*.cascade` and `external.sources`
    /// from the vendor block. Global rules come first, generated ones after.
    /// Malformed entries are skipped with a warning.
    pub fn from_schema(schema: &Value) -> Self {
        let Some(block) = schema.get(VENDOR_KEY) else {
            tracing::debug!("Schema has no {} block", VENDOR_KEY);
            return Self::default();
        };
        let at = |path: &[&str]| {
            path.iter()
                .try_fold(block, |node, key| node.get(*key))
                .cloned()
                .unwrap_or(Value::Null)
        };

        let mut rules = parse_rules(&at(&["cascade", "rules"]));
        rules.extend(rules_from_ui_fields(&at(&["ui", "fields"])));
        let sources = parse_sources(&at(&["external", "sources"]));

        tracing::info!("Loaded {} cascade rules and {} data sources", rules.len(), sources.len());
        Self { rules, sources }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let schema: Value = serde_json::from_str(&content)?;
        Ok(Self::from_schema(&schema))
    }
}
