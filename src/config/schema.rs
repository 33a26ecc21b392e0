use crate::config::variables::Variables;
use crate::substitute::line_regex;
use serde::Deserialize;
use std::fmt;

pub const DEFAULT_VALIDATE_BEFORE: bool = true;
pub const DEFAULT_VALIDATE_AFTER: bool = false;

fn default_validate_before() -> bool {
    DEFAULT_VALIDATE_BEFORE
}

fn default_validate_after() -> bool {
    DEFAULT_VALIDATE_AFTER
}

/// A loaded configuration document.
///
/// Unknown top-level sections are ignored so configs shared with other
/// tooling still load. Unknown keys inside a path entry are rejected.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct RepexConfig {
    pub paths: Vec<PathSpec>,
    /// Filled in by the loader; the `variables` key needs stricter checks than serde gives.
    #[serde(skip_deserializing)]
    pub variables: Variables,
}

impl RepexConfig {
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut issues = Vec::new();

        if self.paths.is_empty() {
            issues.push(SchemaIssue::EmptyPathList);
        }

        for spec in &self.paths {
            let label = if spec.path.trim().is_empty() {
                issues.push(SchemaIssue::MissingField {
                    spec: None,
                    field: "path",
                });
                None
            } else {
                Some(spec.path.clone())
            };

            if spec.replace.is_empty() {
                issues.push(SchemaIssue::MissingField {
                    spec: label.clone(),
                    field: "replace",
                });
            }
            if matches!(spec.base_directory.as_deref(), Some(dir) if dir.trim().is_empty()) {
                issues.push(SchemaIssue::MissingField {
                    spec: label.clone(),
                    field: "base_directory",
                });
            }
            if matches!(spec.file_type.as_deref(), Some(name) if name.trim().is_empty()) {
                issues.push(SchemaIssue::MissingField {
                    spec: label.clone(),
                    field: "type",
                });
            }
            if matches!(spec.to_file.as_deref(), Some(target) if target.trim().is_empty()) {
                issues.push(SchemaIssue::MissingField {
                    spec: label.clone(),
                    field: "to_file",
                });
            }
            for needle in &spec.must_include {
                if let Err(err) = line_regex(needle) {
                    issues.push(SchemaIssue::InvalidRegex {
                        spec: label.clone(),
                        pattern: needle.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(SchemaError { issues })
        }
    }
}

/// One configured unit of work: which files to target and how to rewrite them.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PathSpec {
    /// A file path, or a regex searched against directory paths under `base_directory`.
    pub path: String,
    #[serde(default)]
    pub base_directory: Option<String>,
    /// Exact file name collected during a directory scan.
    #[serde(default, rename = "type")]
    pub file_type: Option<String>,
    pub replace: String,
    pub with: String,
    /// Alternate output path. Only legal when `path` is a single existing file.
    #[serde(default)]
    pub to_file: Option<String>,
    #[serde(default = "default_validate_before")]
    pub validate_before: bool,
    /// Accepted but not enforced.
    #[serde(default = "default_validate_after")]
    pub validate_after: bool,
    #[serde(default)]
    pub must_include: Vec<String>,
}

impl PathSpec {
    /// A single-file spec with every optional field at its default.
    pub fn new(
        path: impl Into<String>,
        replace: impl Into<String>,
        with: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            base_directory: None,
            file_type: None,
            replace: replace.into(),
            with: with.into(),
            to_file: None,
            validate_before: DEFAULT_VALIDATE_BEFORE,
            validate_after: DEFAULT_VALIDATE_AFTER,
            must_include: Vec::new(),
        }
    }

    /// Turn this into a directory scan for files named `file_type` under `base_directory`.
    pub fn scanning(mut self, base_directory: impl Into<String>, file_type: impl Into<String>) -> Self {
        self.base_directory = Some(base_directory.into());
        self.file_type = Some(file_type.into());
        self
    }

    pub fn to_file(mut self, target: impl Into<String>) -> Self {
        self.to_file = Some(target.into());
        self
    }

    pub fn must_include<I, S>(mut self, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.must_include = needles.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate_before(mut self, enabled: bool) -> Self {
        self.validate_before = enabled;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SchemaError {
    pub issues: Vec<SchemaIssue>,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

#[derive(Debug, Clone)]
pub enum SchemaIssue {
    EmptyPathList,
    MissingField {
        spec: Option<String>,
        field: &'static str,
    },
    InvalidRegex {
        spec: Option<String>,
        pattern: String,
        message: String,
    },
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaIssue::EmptyPathList => write!(f, "config contains no paths"),
            SchemaIssue::MissingField { spec, field } => match spec {
                Some(path) => write!(f, "path '{path}' missing required field '{field}'"),
                None => write!(f, "path entry missing required field '{field}'"),
            },
            SchemaIssue::InvalidRegex {
                spec,
                pattern,
                message,
            } => match spec {
                Some(path) => write!(
                    f,
                    "path '{path}' has invalid must_include pattern '{pattern}': {message}"
                ),
                None => write!(f, "invalid must_include pattern '{pattern}': {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let spec: PathSpec = serde_yaml::from_str(
            r#"
path: conf/app.yml
replace: "version: .*"
with: "version: 2"
"#,
        )
        .unwrap();

        assert!(spec.validate_before);
        assert!(!spec.validate_after);
        assert!(spec.must_include.is_empty());
        assert_eq!(spec.to_file, None);
        assert_eq!(spec, PathSpec::new("conf/app.yml", "version: .*", "version: 2"));
    }

    #[test]
    fn test_type_key_maps_to_file_type() {
        let spec: PathSpec = serde_yaml::from_str(
            r#"
path: env.*
base_directory: /srv
type: settings.yml
replace: a
with: b
"#,
        )
        .unwrap();

        assert_eq!(spec.file_type.as_deref(), Some("settings.yml"));
        assert_eq!(spec.base_directory.as_deref(), Some("/srv"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<PathSpec, _> =
            serde_yaml::from_str("path: a\nreplace: b\nwith: c\nreplace_all: true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_empty_paths() {
        let config = RepexConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err.issues[0], SchemaIssue::EmptyPathList));
    }

    #[test]
    fn test_validate_collects_all_issues() {
        let config = RepexConfig {
            paths: vec![
                PathSpec::new("", "x", "y"),
                PathSpec::new("a.txt", "", "y").must_include(["(unclosed"]),
            ],
            variables: Variables::default(),
        };

        let err = config.validate().unwrap_err();
        assert_eq!(err.issues.len(), 3);
        let rendered = err.to_string();
        assert!(rendered.contains("missing required field 'path'"));
        assert!(rendered.contains("path 'a.txt' missing required field 'replace'"));
        assert!(rendered.contains("invalid must_include pattern '(unclosed'"));
    }

    #[test]
    fn test_empty_with_is_legal() {
        let config = RepexConfig {
            paths: vec![PathSpec::new("a.txt", "debug: true\n", "")],
            variables: Variables::default(),
        };
        assert!(config.validate().is_ok());
    }
}
