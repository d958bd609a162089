//! Template variable expansion.
//!
//! `${namespace.path}` tokens are resolved against a [`FormContext`].
//! Recognised namespaces: `providers`, `fields`, `workspace`, `organization`;
//! any other first segment is looked up as a full path in the form values.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value;

lazy_static::lazy_static! {
    static ref VARIABLE: Regex = Regex::new(r"\$\{([^}]+)\}").expect("static variable pattern");
}

/// Everything a template may refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormContext {
    /// Current form values (`fields` namespace).
    #[serde(default)]
    pub values: Value,
    #[serde(default)]
    pub providers: Value,
    #[serde(default)]
    pub workspace: Value,
    #[serde(default)]
    pub organization: Value,
}

impl FormContext {
    pub fn new(values: Value) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    pub fn with_providers(mut self, providers: Value) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_workspace(mut self, workspace: Value) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn with_organization(mut self, organization: Value) -> Self {
        self.organization = organization;
        self
    }

    /// Resolve a token body such as `providers.aws.region`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let (namespace, rest) = match path.split_once('.') {
            Some((ns, rest)) => (ns, Some(rest)),
            None => (path, None),
        };
        let root = match namespace {
            "providers" => &self.providers,
            "fields" => &self.values,
            "workspace" => &self.workspace,
            "organization" => &self.organization,
            _ => return value::resolve(&self.values, path),
        };
        match rest {
            Some(rest) => value::resolve(root, rest),
            None => value::resolve_segments(root, std::iter::empty::<&str>()),
        }
    }

    /// Replace every `${...}` token. Unresolvable or `null` tokens become "".
    pub fn expand(&self, template: &str) -> String {
        VARIABLE
            .replace_all(template, |caps: &Captures| match self.lookup(&caps[1]) {
                None | Some(Value::Null) => String::new(),
                Some(v) => value::display(v),
            })
            .into_owned()
    }
}
