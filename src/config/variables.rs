use serde_yaml::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;
use thiserror::Error;

/// Variables substituted into every `{{ .name }}` token of a run.
///
/// Values are always strings. Anything else is rejected when the mapping is
/// ingested, never at substitution time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables(BTreeMap<String, String>);

#[derive(Error, Debug)]
pub enum VariablesError {
    #[error("variables must be a mapping of names to strings, found {found}")]
    NotAMapping { found: &'static str },

    #[error("variable names must be strings, found {found}")]
    NonStringName { found: &'static str },

    #[error("variable '{name}' must be a string, found {found} (quote the value in YAML)")]
    NonStringValue { name: String, found: &'static str },

    #[error("invalid variable name '{name}': names cannot be empty or contain whitespace or braces")]
    InvalidName { name: String },

    #[error("invalid variable assignment '{input}': expected KEY=VALUE")]
    InvalidAssignment { input: String },

    #[error("failed to parse variables YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a variable, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Overlay `other` on top of `self`; names present in both take `other`'s value.
    pub fn merge(&mut self, other: Variables) {
        self.0.extend(other.0);
    }

    /// Build from a YAML value, rejecting anything but a string-to-string mapping.
    ///
    /// A YAML `null` (an empty `variables:` key) is treated as no variables.
    pub fn from_yaml_value(value: &Value) -> Result<Self, VariablesError> {
        let mapping = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(VariablesError::NotAMapping {
                    found: yaml_kind(other),
                })
            }
        };

        let mut variables = Self::default();
        for (name, value) in mapping {
            let name = match name {
                Value::String(name) => name,
                other => {
                    return Err(VariablesError::NonStringName {
                        found: yaml_kind(other),
                    })
                }
            };
            check_name(name)?;
            match value {
                Value::String(value) => {
                    variables.insert(name.clone(), value.clone());
                }
                other => {
                    return Err(VariablesError::NonStringValue {
                        name: name.clone(),
                        found: yaml_kind(other),
                    })
                }
            }
        }
        Ok(variables)
    }

    /// Parse a standalone YAML document holding a variables mapping.
    pub fn from_yaml_str(input: &str) -> Result<Self, VariablesError> {
        let value: Value = serde_yaml::from_str(input)?;
        Self::from_yaml_value(&value)
    }
}

impl<K, V> FromIterator<(K, V)> for Variables
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Variables {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Split a `KEY=VALUE` command-line assignment on its first `=`.
pub fn parse_assignment(input: &str) -> Result<(String, String), VariablesError> {
    match input.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            let name = name.trim();
            check_name(name)?;
            Ok((name.to_string(), value.to_string()))
        }
        _ => Err(VariablesError::InvalidAssignment {
            input: input.to_string(),
        }),
    }
}

/// A name must be expressible as a `{{ .name }}` token.
fn check_name(name: &str) -> Result<(), VariablesError> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '{' || c == '}') {
        return Err(VariablesError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
