//! Payload Transform
//!
//! A deliberately small path language for reshaping API payloads into option
//! lists. Supported forms (identical for `jmespath` and `jsonpath`, the latter
//! may start with `$.`):
//!
//! - `a.b` walks object keys
//! - `items[*]` requires an array; later plain segments apply per element
//! - `{value: id, label: meta.name}` builds one object per array element
//!
//! Anything else is an error, which the loader turns into an empty list.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::types::{SelectOption, Transform, TransformKind};
use crate::error::TransformError;
use crate::value::{self, display, is_truthy};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Project(String),
    Construct(Vec<(String, String)>),
}

/// A parsed transform expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    segments: Vec<Segment>,
}

impl Expression {
    pub fn parse(expression: &str) -> Result<Self, TransformError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(TransformError::EmptyExpression);
        }

        let segments = split_top_level(trimmed)?
            .into_iter()
            .map(|piece| parse_segment(piece, trimmed))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: trimmed.to_string(),
            segments,
        })
    }

    /// Parse according to the declared notation.
    pub fn for_transform(transform: &Transform) -> Result<Self, TransformError> {
        match transform.kind {
            TransformKind::Jmespath => Self::parse(&transform.expression),
            TransformKind::Jsonpath => {
                let path = transform.expression.trim();
                let path = path.strip_prefix('$').unwrap_or(path);
                let path = path.strip_prefix('.').unwrap_or(path);
                Self::parse(path)
            }
        }
    }

    pub fn apply(&self, data: &Value) -> Result<Value, TransformError> {
        let mut current = data.clone();
        let mut projected = false;
        let mut walked: Vec<String> = Vec::new();

        for segment in &self.segments {
            if current.is_null() {
                return Ok(Value::Array(Vec::new()));
            }

            match segment {
                Segment::Field(key) => {
                    walked.push(key.clone());
                    current = if projected {
                        project_field(&current, key)
                    } else {
                        match &current {
                            Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
                            _ => return Err(TransformError::NotAnObject(walked.join("."))),
                        }
                    };
                }
                Segment::Project(key) => {
                    walked.push(format!("{}[*]", key));
                    if !key.is_empty() {
                        current = if projected {
                            flatten(project_field(&current, key))
                        } else {
                            match &current {
                                Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
                                _ => return Err(TransformError::NotAnObject(walked.join("."))),
                            }
                        };
                    }
                    if !current.is_array() {
                        return Err(TransformError::NotAnArray(walked.join(".")));
                    }
                    projected = true;
                }
                Segment::Construct(mapping) => {
                    let Value::Array(items) = &current else {
                        return Err(TransformError::NotAnArray(walked.join(".")));
                    };
                    let built = items
                        .iter()
                        .map(|item| {
                            let object: Map<String, Value> = mapping
                                .iter()
                                .map(|(key, path)| {
                                    let v = value::resolve(item, path).cloned().unwrap_or(Value::Null);
                                    (key.clone(), v)
                                })
                                .collect();
                            Value::Object(object)
                        })
                        .collect();
                    return Ok(Value::Array(built));
                }
            }
        }

        Ok(current)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn split_top_level(expression: &str) -> Result<Vec<&str>, TransformError> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in expression.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| TransformError::UnbalancedBraces(expression.to_string()))?;
            }
            '.' if depth == 0 => {
                pieces.push(&expression[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(TransformError::UnbalancedBraces(expression.to_string()));
    }
    pieces.push(&expression[start..]);
    Ok(pieces)
}

fn parse_segment(piece: &str, expression: &str) -> Result<Segment, TransformError> {
    let piece = piece.trim();
    if piece.is_empty() {
        return Err(TransformError::EmptySegment(expression.to_string()));
    }

    if let Some(body) = piece.strip_prefix('{') {
        let body = body
            .strip_suffix('}')
            .ok_or_else(|| TransformError::InvalidMapping(piece.to_string()))?;
        let mut mapping = Vec::new();
        for pair in body.split(',') {
            let (key, path) = pair
                .split_once(':')
                .ok_or_else(|| TransformError::InvalidMapping(piece.to_string()))?;
            let (key, path) = (key.trim(), path.trim());
            if key.is_empty() || path.is_empty() {
                return Err(TransformError::InvalidMapping(piece.to_string()));
            }
            mapping.push((key.to_string(), path.to_string()));
        }
        return Ok(Segment::Construct(mapping));
    }

    if let Some(key) = piece.strip_suffix("[*]") {
        return Ok(Segment::Project(key.trim().to_string()));
    }

    if piece.contains(['[', ']', '{', '}']) {
        return Err(TransformError::UnsupportedSegment(piece.to_string()));
    }
    Ok(Segment::Field(piece.to_string()))
}

fn project_field(current: &Value, key: &str) -> Value {
    match current {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter_map(|item| item.get(key))
                .filter(|v| !v.is_null())
                .cloned()
                .collect(),
        ),
        _ => Value::Null,
    }
}

fn flatten(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .flat_map(|item| match item {
                    Value::Array(inner) => inner,
                    other => vec![other],
                })
                .collect(),
        ),
        other => other,
    }
}

/// Turn one raw item into an option.
pub fn normalize_option(item: &Value) -> SelectOption {
    match item {
        Value::String(s) => SelectOption::new(s.clone(), s.clone()),
        Value::Object(obj) => {
            let first = |keys: &[&str]| {
                keys.iter()
                    .filter_map(|k| obj.get(*k))
                    .find(|v| !v.is_null())
                    .map(display)
                    .unwrap_or_default()
            };
            let optional = |key: &str| obj.get(key).filter(|v| is_truthy(v)).map(display);

            SelectOption {
                value: first(&["value", "id"]),
                label: first(&["label", "name", "value", "id"]),
                description: optional("description"),
                group: optional("group"),
                disabled: obj.get("disabled").map(is_truthy).unwrap_or(false),
            }
        }
        other => {
            let text = display(other);
            SelectOption::new(text.clone(), text)
        }
    }
}

/// Reshape a fetched payload into options. Never fails: problems are logged
/// and produce an empty list.
pub fn to_options(payload: &Value, transform: Option<&Transform>) -> Vec<SelectOption> {
    let Some(transform) = transform else {
        return match payload {
            Value::Array(items) => items.iter().map(normalize_option).collect(),
            _ => {
                debug!("Payload is not a list and no transform is configured");
                Vec::new()
            }
        };
    };

    let result = Expression::for_transform(transform).and_then(|expr| {
        match expr.apply(payload)? {
            Value::Array(items) => Ok(items),
            _ => Err(TransformError::NotAList),
        }
    });

    match result {
        Ok(items) => items.iter().map(normalize_option).collect(),
        Err(e) => {
            warn!("Transform `{}` failed: {}", transform.expression, e);
            Vec::new()
        }
    }
}
