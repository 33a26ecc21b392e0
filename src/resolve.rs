//! Expands a [`PathSpec`] into the concrete files it targets.
//!
//! A spec whose `path` names an existing file targets exactly that file.
//! Anything else is a directory scan: `path` is a regex searched against the
//! full path of each immediate entry of `base_directory`, and every matching
//! directory is walked for files named exactly `type`.

use crate::config::{ConfigError, PathSpec};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot list directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed walking {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Resolve a spec to its target files, in directory-then-walk order.
///
/// An empty result is not an error.
pub fn resolve(spec: &PathSpec) -> Result<Vec<PathBuf>, ResolveError> {
    let literal = Path::new(&spec.path);
    if literal.is_file() {
        if spec.base_directory.is_some() {
            log::warn!(
                "base_directory is irrelevant when dealing with single file {}",
                literal.display()
            );
        }
        return Ok(vec![literal.to_path_buf()]);
    }

    if spec.to_file.is_some() {
        return Err(ConfigError::ToFileWithDirectoryScan {
            spec: spec.path.clone(),
        }
        .into());
    }

    let base = spec
        .base_directory
        .as_deref()
        .ok_or_else(|| ConfigError::MissingBaseDirectory {
            spec: spec.path.clone(),
        })?;
    let file_name = spec
        .file_type
        .as_deref()
        .ok_or_else(|| ConfigError::MissingType {
            spec: spec.path.clone(),
        })?;
    let dir_pattern = Regex::new(&spec.path).map_err(|source| ConfigError::InvalidPattern {
        spec: spec.path.clone(),
        pattern: spec.path.clone(),
        source,
    })?;

    find_files(Path::new(base), &dir_pattern, file_name)
}

/// Collect files named `file_name` below the immediate subdirectories of
/// `base` whose full path matches `dir_pattern`.
pub fn find_files(
    base: &Path,
    dir_pattern: &Regex,
    file_name: &str,
) -> Result<Vec<PathBuf>, ResolveError> {
    log::info!(
        "looking for {}'s under {} in {}",
        file_name,
        dir_pattern.as_str(),
        base.display()
    );

    let io_err = |source: std::io::Error| ResolveError::Io {
        path: base.to_path_buf(),
        source,
    };

    let mut dirs = Vec::new();
    for entry in fs::read_dir(base).map_err(io_err)? {
        let candidate = entry.map_err(io_err)?.path();
        if candidate.is_dir() && dir_pattern.is_match(&candidate.to_string_lossy()) {
            dirs.push(candidate);
        }
    }
    dirs.sort();

    let mut files = Vec::new();
    for dir in dirs {
        log::debug!("searching {}", dir.display());
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|source| ResolveError::Walk {
                root: dir.clone(),
                source,
            })?;
            if entry.file_name() == file_name && entry.path().is_file() {
                files.push(entry.into_path());
            }
        }
    }

    log::debug!("found {} file(s) named {}", files.len(), file_name);
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"key: value\n").unwrap();
    }

    fn env_tree() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("envA/settings.yml"));
        touch(&root.path().join("envB/nested/settings.yml"));
        touch(&root.path().join("envB/nested/other.yml"));
        touch(&root.path().join("other/settings.yml"));
        root
    }

    #[test]
    fn test_directory_scan_filters_by_dir_and_name() {
        let root = env_tree();
        let spec = PathSpec::new("/env", "key", "KEY")
            .scanning(root.path().to_string_lossy(), "settings.yml");

        let files = resolve(&spec).unwrap();

        assert_eq!(
            files,
            vec![
                root.path().join("envA/settings.yml"),
                root.path().join("envB/nested/settings.yml"),
            ]
        );
    }

    #[test]
    fn test_single_file_ignores_base_directory() {
        let root = env_tree();
        let file = root.path().join("other/settings.yml");
        let spec = PathSpec::new(file.to_string_lossy(), "key", "KEY")
            .scanning(root.path().to_string_lossy(), "unused.yml");

        assert_eq!(resolve(&spec).unwrap(), vec![file]);
    }

    #[test]
    fn test_single_file_with_to_file() {
        let root = env_tree();
        let file = root.path().join("envA/settings.yml");
        let spec = PathSpec::new(file.to_string_lossy(), "key", "KEY").to_file("out.yml");

        assert_eq!(resolve(&spec).unwrap(), vec![file]);
    }

    #[test]
    fn test_to_file_rejected_for_directory_scan() {
        let root = env_tree();
        let spec = PathSpec::new("/env", "key", "KEY")
            .scanning(root.path().to_string_lossy(), "settings.yml")
            .to_file("out.yml");

        let err = resolve(&spec).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Config(ConfigError::ToFileWithDirectoryScan { .. })
        ));
    }

    #[test]
    fn test_no_matches_is_empty() {
        let root = env_tree();
        let spec = PathSpec::new("/prod", "key", "KEY")
            .scanning(root.path().to_string_lossy(), "settings.yml");

        assert!(resolve(&spec).unwrap().is_empty());
    }

    #[test]
    fn test_missing_base_directory_field() {
        let spec = PathSpec::new("does/not/exist.yml", "key", "KEY");
        assert!(matches!(
            resolve(&spec),
            Err(ResolveError::Config(ConfigError::MissingBaseDirectory { .. }))
        ));
    }

    #[test]
    fn test_missing_type_field() {
        let root = env_tree();
        let mut spec = PathSpec::new("/env", "key", "KEY");
        spec.base_directory = Some(root.path().to_string_lossy().into_owned());
        assert!(matches!(
            resolve(&spec),
            Err(ResolveError::Config(ConfigError::MissingType { .. }))
        ));
    }

    #[test]
    fn test_unlistable_base_directory_is_io() {
        let root = tempfile::tempdir().unwrap();
        let spec = PathSpec::new("/env", "key", "KEY")
            .scanning(root.path().join("gone").to_string_lossy(), "settings.yml");
        assert!(matches!(resolve(&spec), Err(ResolveError::Io { .. })));
    }

    #[test]
    fn test_invalid_directory_regex() {
        let root = env_tree();
        let spec = PathSpec::new("env(", "key", "KEY")
            .scanning(root.path().to_string_lossy(), "settings.yml");
        assert!(matches!(
            resolve(&spec),
            Err(ResolveError::Config(ConfigError::InvalidPattern { .. }))
        ));
    }
}
