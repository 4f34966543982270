//! Kwalify-style schema validation for the YAML config.
//!
//! Supported rule keys: `type`, `required`, `nullable`, `mapping`, `range`
//! (`min`/`max`, integers only) and `desc`. Supported types: `map`, `str`,
//! `int`, `float`, `number`, `text`, `bool`, `any`.
//!
//! As in kwalify, `nullable` defaults to true and a `required` key must
//! hold a non-null value. Keys not listed in a `mapping` are rejected.

use serde_yaml::{Mapping, Value};
use std::fmt;

/// Value type accepted by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Mapping
    Map,
    /// String
    Str,
    /// Integer
    Int,
    /// Floating point
    Float,
    /// Integer or float
    Number,
    /// String or number
    Text,
    /// Boolean
    Bool,
    /// Anything
    Any,
}

impl Kind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "map" => Some(Self::Map),
            "str" => Some(Self::Str),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "number" => Some(Self::Number),
            "text" => Some(Self::Text),
            "bool" => Some(Self::Bool),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Map => value.is_mapping(),
            Self::Str => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_f64(),
            Self::Number => value.is_number(),
            Self::Text => value.is_string() || value.is_number(),
            Self::Bool => value.is_bool(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Map => "map",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Number => "number",
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// One node of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Accepted type
    pub kind: Kind,
    /// Key must be present in its parent mapping with a non-null value
    pub required: bool,
    /// Null is accepted when the key is not required
    pub nullable: bool,
    /// Child rules for `map`
    pub mapping: Vec<(String, Rule)>,
    /// Inclusive lower bound for `int`
    pub min: Option<i64>,
    /// Inclusive upper bound for `int`
    pub max: Option<i64>,
}

/// A parsed schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    root: Rule,
}

impl Schema {
    /// Parse a schema from YAML text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not YAML or not a valid schema.
    pub fn from_yaml(text: &str) -> Result<Self, SchemaError> {
        let value: Value =
            serde_yaml::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Build a schema from a parsed YAML value.
    ///
    /// # Errors
    ///
    /// Returns error if the value is not a valid schema.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            root: parse_rule(value, "")?,
        })
    }

    /// Validate a document, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns the violations if the document does not match.
    pub fn validate(&self, document: &Value) -> Result<(), Violations> {
        let mut violations = Vec::new();
        check(&self.root, document, "", &mut violations);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(Violations(violations))
        }
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

fn invalid(path: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::InvalidRule {
        path: display_path(path).to_string(),
        message: message.into(),
    }
}

fn parse_rule(value: &Value, path: &str) -> Result<Rule, SchemaError> {
    let Some(map) = value.as_mapping() else {
        return Err(invalid(path, "rule must be a mapping"));
    };

    let mut rule = Rule {
        kind: if map.contains_key("mapping") {
            Kind::Map
        } else {
            Kind::Str
        },
        required: false,
        nullable: true,
        mapping: Vec::new(),
        min: None,
        max: None,
    };

    for (key, entry) in map {
        let key = key
            .as_str()
            .ok_or_else(|| invalid(path, "rule keys must be strings"))?;
        match key {
            "type" => {
                let name = entry
                    .as_str()
                    .ok_or_else(|| invalid(path, "type must be a string"))?;
                rule.kind = Kind::parse(name)
                    .ok_or_else(|| invalid(path, format!("unknown type '{name}'")))?;
            }
            "required" => {
                rule.required = entry
                    .as_bool()
                    .ok_or_else(|| invalid(path, "required must be a bool"))?;
            }
            "nullable" => {
                rule.nullable = entry
                    .as_bool()
                    .ok_or_else(|| invalid(path, "nullable must be a bool"))?;
            }
            "mapping" => rule.mapping = parse_mapping(entry, path)?,
            "range" => {
                let range = entry
                    .as_mapping()
                    .ok_or_else(|| invalid(path, "range must be a mapping"))?;
                rule.min = parse_bound(range, "min", path)?;
                rule.max = parse_bound(range, "max", path)?;
            }
            "desc" => {}
            other => return Err(invalid(path, format!("unsupported rule key '{other}'"))),
        }
    }

    if rule.kind != Kind::Map && !rule.mapping.is_empty() {
        return Err(invalid(path, format!("mapping given for type {}", rule.kind)));
    }
    if (rule.min.is_some() || rule.max.is_some()) && rule.kind != Kind::Int {
        return Err(invalid(path, "range is only supported for int"));
    }

    Ok(rule)
}

fn parse_mapping(value: &Value, path: &str) -> Result<Vec<(String, Rule)>, SchemaError> {
    let map = value
        .as_mapping()
        .ok_or_else(|| invalid(path, "mapping must be a mapping"))?;

    map.iter()
        .map(|(key, child)| {
            let key = key
                .as_str()
                .ok_or_else(|| invalid(path, "mapping keys must be strings"))?;
            let rule = parse_rule(child, &child_path(path, key))?;
            Ok((key.to_string(), rule))
        })
        .collect()
}

fn parse_bound(range: &Mapping, name: &str, path: &str) -> Result<Option<i64>, SchemaError> {
    range
        .get(name)
        .map(|bound| {
            bound
                .as_i64()
                .ok_or_else(|| invalid(path, format!("range {name} must be an int")))
        })
        .transpose()
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Sequence(_) => "seq",
        Value::Mapping(_) => "map",
        Value::Tagged(_) => "tagged value",
    }
}

fn check(rule: &Rule, value: &Value, path: &str, out: &mut Vec<Violation>) {
    let violation = |message: String| Violation {
        path: display_path(path).to_string(),
        message,
    };

    if value.is_null() {
        if rule.required {
            out.push(violation("required key has no value".to_string()));
        } else if !rule.nullable && rule.kind != Kind::Any {
            out.push(violation("value must not be null".to_string()));
        }
        return;
    }

    if !rule.kind.accepts(value) {
        out.push(violation(format!(
            "expected {}, found {}",
            rule.kind,
            describe(value)
        )));
        return;
    }

    if let Some(n) = value.as_i64() {
        if rule.min.is_some_and(|min| n < min) || rule.max.is_some_and(|max| n > max) {
            out.push(violation(format!(
                "{n} is outside range {}..={}",
                rule.min.map_or_else(String::new, |v| v.to_string()),
                rule.max.map_or_else(String::new, |v| v.to_string()),
            )));
        }
    }

    let Some(map) = value.as_mapping() else {
        return;
    };
    if rule.kind != Kind::Map {
        return;
    }

    for (key, child) in &rule.mapping {
        match map.get(key.as_str()) {
            Some(entry) => check(child, entry, &child_path(path, key), out),
            None if child.required => out.push(Violation {
                path: child_path(path, key),
                message: "required key is missing".to_string(),
            }),
            None => {}
        }
    }

    if rule.mapping.is_empty() {
        return;
    }
    for (key, _) in map {
        match key.as_str() {
            Some(name) if rule.mapping.iter().any(|(known, _)| known == name) => {}
            Some(name) => out.push(Violation {
                path: child_path(path, name),
                message: "key is not defined in the schema".to_string(),
            }),
            None => out.push(violation(format!("non-string key of type {}", describe(key)))),
        }
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path of the offending value
    pub path: String,
    /// What is wrong
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All violations found in a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} schema violation(s){}", .0.len(), bullet_list(.0))]
pub struct Violations(pub Vec<Violation>);

fn bullet_list(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| format!("\n  - {violation}"))
        .collect()
}

/// Errors in the schema document itself.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    /// Schema is not valid YAML
    #[error("schema parse error: {0}")]
    Parse(String),
    /// Schema contains an unsupported or malformed rule
    #[error("invalid schema rule at {path}: {message}")]
    InvalidRule {
        /// Dotted path of the rule
        path: String,
        /// What is wrong
        message: String,
    },
}
