use crate::config::schema::{RepexConfig, SchemaError};
use crate::config::variables::{Variables, VariablesError};
use serde_yaml::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Malformed or missing configuration. Always fatal.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Yaml {
        path: Option<PathBuf>,
        source: serde_yaml::Error,
    },
    MissingPaths {
        path: Option<PathBuf>,
    },
    Variables {
        path: Option<PathBuf>,
        source: VariablesError,
    },
    Schema {
        path: Option<PathBuf>,
        source: SchemaError,
    },
    /// `to_file` on a spec whose `path` is not an existing file.
    ToFileWithDirectoryScan {
        spec: String,
    },
    MissingBaseDirectory {
        spec: String,
    },
    MissingType {
        spec: String,
    },
    InvalidPattern {
        spec: String,
        pattern: String,
        source: regex::Error,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Yaml { path: None, source } => ConfigError::Yaml {
                path: Some(path),
                source,
            },
            ConfigError::MissingPaths { path: None } => ConfigError::MissingPaths { path: Some(path) },
            ConfigError::Variables { path: None, source } => ConfigError::Variables {
                path: Some(path),
                source,
            },
            ConfigError::Schema { path: None, source } => ConfigError::Schema {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot access config file {}: {}", path.display(), source)
            }
            ConfigError::Yaml { path, source } => match path {
                Some(path) => write!(f, "invalid yaml file ({}): {}", path.display(), source),
                None => write!(f, "invalid yaml: {}", source),
            },
            ConfigError::MissingPaths { path } => match path {
                Some(path) => write!(f, "no paths configured in {}", path.display()),
                None => write!(f, "no paths configured"),
            },
            ConfigError::Variables { path, source } => match path {
                Some(path) => write!(f, "invalid variables ({}): {}", path.display(), source),
                None => write!(f, "invalid variables: {}", source),
            },
            ConfigError::Schema { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
            ConfigError::ToFileWithDirectoryScan { spec } => write!(
                f,
                "path '{spec}': \"to_file\" requires an explicit path to an existing file"
            ),
            ConfigError::MissingBaseDirectory { spec } => write!(
                f,
                "path '{spec}' is not an existing file and no base_directory is set"
            ),
            ConfigError::MissingType { spec } => write!(
                f,
                "path '{spec}' scans base_directory but has no \"type\" to match"
            ),
            ConfigError::InvalidPattern {
                spec,
                pattern,
                source,
            } => write!(f, "path '{spec}' has invalid pattern '{pattern}': {source}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Yaml { source, .. } => Some(source),
            ConfigError::Variables { source, .. } => Some(source),
            ConfigError::Schema { source, .. } => Some(source),
            ConfigError::InvalidPattern { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<RepexConfig, ConfigError> {
    let document: Value = serde_yaml::from_str(input)
        .map_err(|source| ConfigError::Yaml { path: None, source })?;

    let mut root = match document {
        Value::Mapping(root) => root,
        _ => return Err(ConfigError::MissingPaths { path: None }),
    };
    if matches!(root.get("paths"), None | Some(Value::Null)) {
        return Err(ConfigError::MissingPaths { path: None });
    }

    for key in root.keys() {
        match key.as_str() {
            Some("paths") | Some("variables") => {}
            Some(other) => log::warn!("ignoring unknown config section '{other}'"),
            None => log::warn!("ignoring non-string config key"),
        }
    }

    let variables = match root.remove("variables") {
        Some(value) => Variables::from_yaml_value(&value)
            .map_err(|source| ConfigError::Variables { path: None, source })?,
        None => Variables::default(),
    };

    let mut config: RepexConfig = serde_yaml::from_value(Value::Mapping(root))
        .map_err(|source| ConfigError::Yaml { path: None, source })?;
    config.variables = variables;
    config
        .validate()
        .map_err(|source| ConfigError::Schema { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<RepexConfig, ConfigError> {
    let path = path.as_ref();
    log::debug!("config file is: {}", path.display());
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}
