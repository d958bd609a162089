//! Value Tree Helpers
//!
//! Dotted path resolution over `serde_json::Value` trees, shared by rule
//! evaluation, variable expansion and transform expressions, plus the small
//! set of coercions (display string, truthiness, loose equality) the engine
//! applies to loosely typed form values.

use serde_json::Value;

/// Resolve a dot-separated path (`"a.b.c"`) against a value tree.
///
/// Returns `None` as soon as a segment is missing or an intermediate value is
/// `null` or a scalar. Numeric segments index into arrays. Never panics.
pub fn resolve<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    resolve_segments(tree, path.split('.'))
}

/// Segment-wise variant of [`resolve`]. An empty segment list yields the root
/// itself unless the root is `null`.
pub fn resolve_segments<'a, 'p>(
    tree: &'a Value,
    segments: impl IntoIterator<Item = &'p str>,
) -> Option<&'a Value> {
    let mut current = tree;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Null if std::ptr::eq(current, tree) => None,
        _ => Some(current),
    }
}

/// Render a value the way it is shown in option labels and URLs.
///
/// Strings are returned verbatim, integral floats drop their fraction,
/// arrays join their elements with `,`, objects render as `[object Object]`.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => display_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => display(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn display_number(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Truthiness used for optional flags such as `disabled` or `description`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Equality with numbers compared by value, so `1` equals `1.0`.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// `loose_eq` lifted over possibly missing values; two missing values are equal.
pub fn loose_eq_opt(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => loose_eq(x, y),
        (None, None) => true,
        _ => false,
    }
}

/// `None`, `null`, whitespace-only strings, empty arrays and empty objects.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}
