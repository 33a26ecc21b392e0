//! Task driver - runs every path spec of a configuration
//!
//! For each spec, in input order:
//! - Interpolate variables and compile the pattern
//! - Resolve the spec to concrete files
//! - Validate each file (unless `validate_before` is off)
//! - Rewrite each file, committing atomically
//!
//! The run is fail-fast: the first error ends it. Files committed before the
//! failure stay committed.

use crate::config::loader::ConfigError;
use crate::config::schema::PathSpec;
use crate::config::variables::Variables;
use crate::resolve::{resolve, ResolveError};
use crate::substitute::{SubstituteError, Substitution};
use crate::validate::{validate, validate_contents, ScanError, ValidationPolicy, ValidationReport};
use log::Level;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Explicit run context, threaded from the CLI through every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Render rewrites in memory instead of committing them.
    pub dry_run: bool,
    /// Raise per-file detail from debug to info.
    pub verbose: bool,
    /// Keep before/after contents on each outcome (for diffs).
    pub capture: bool,
}

impl RunOptions {
    fn detail(&self) -> Level {
        if self.verbose {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

/// One spec bound to one concrete file.
///
/// The task owns its path, so binding never mutates the shared spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask<'a> {
    pub spec: &'a PathSpec,
    pub path: PathBuf,
}

impl<'a> FileTask<'a> {
    pub fn new(spec: &'a PathSpec, path: PathBuf) -> Self {
        Self { spec, path }
    }

    /// Where the rewrite lands: `to_file` if set, otherwise the file itself.
    pub fn destination(&self) -> &Path {
        self.spec
            .to_file
            .as_deref()
            .map(Path::new)
            .unwrap_or(self.path.as_path())
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "FileOutcome should be reported"]
pub struct FileOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub lines_changed: usize,
    pub dry_run: bool,
    /// Source contents before the rewrite, when captured.
    pub before: Option<String>,
    /// Rewritten contents; always set on a dry run, set on a real run when captured.
    pub after: Option<String>,
}

/// Validation status of one file, as reported by [`check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub spec: String,
    pub file: PathBuf,
    /// `None` when the spec disables `validate_before`.
    pub report: Option<ValidationReport>,
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(ConfigError),

    #[error("prevalidation failed: {report}")]
    Validation { report: ValidationReport },

    #[error(transparent)]
    Resolve(ResolveError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Substitute(#[from] SubstituteError),
}

/// Coarse classification of a [`RunError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Validation,
    Io,
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::Config(_) => ErrorKind::Config,
            RunError::Validation { .. } => ErrorKind::Validation,
            RunError::Scan(ScanError::InvalidPattern { .. }) => ErrorKind::Config,
            RunError::Resolve(_) | RunError::Scan(_) | RunError::Substitute(_) => ErrorKind::Io,
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

impl From<ResolveError> for RunError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Config(e) => RunError::Config(e),
            other => RunError::Resolve(other),
        }
    }
}

/// Dry-run rewrites that a real run would already have committed, by destination.
type Staged = HashMap<PathBuf, String>;

/// Everything needed to process the files of one spec.
struct Prepared {
    substitution: Substitution,
    policy: ValidationPolicy,
}

fn prepare(spec: &PathSpec, variables: &Variables) -> Result<Prepared, RunError> {
    let substitution = Substitution::new(&spec.replace, &spec.with, variables).map_err(|source| {
        ConfigError::InvalidPattern {
            spec: spec.path.clone(),
            pattern: spec.replace.clone(),
            source,
        }
    })?;
    let policy = ValidationPolicy::select(substitution.pattern(), &spec.must_include)?;
    Ok(Prepared {
        substitution,
        policy,
    })
}

fn resolve_targets(spec: &PathSpec, options: &RunOptions) -> Result<Vec<PathBuf>, RunError> {
    let files = resolve(spec)?;
    if files.is_empty() {
        log::info!("no files found for {}", spec.path);
    }
    for file in &files {
        log::log!(options.detail(), "found {}", file.display());
    }
    Ok(files)
}

/// Run every spec against the filesystem, stopping at the first error.
pub fn run(
    specs: &[PathSpec],
    variables: &Variables,
    options: &RunOptions,
) -> Result<Vec<FileOutcome>, RunError> {
    for (name, value) in variables {
        log::log!(options.detail(), "variable {name}: {value}");
    }

    let mut outcomes = Vec::new();
    let mut staged = Staged::new();
    for spec in specs {
        let prepared = prepare(spec, variables)?;
        if spec.validate_after {
            log::warn!(
                "validate_after is not enforced; {} will not be re-checked after writing",
                spec.path
            );
        }
        // A dry-run output from an earlier spec stands in for a file on disk.
        let targets = if staged.contains_key(Path::new(&spec.path)) {
            vec![PathBuf::from(&spec.path)]
        } else {
            resolve_targets(spec, options)?
        };
        for path in targets {
            let task = FileTask::new(spec, path);
            outcomes.push(process(&task, &prepared, options, &mut staged)?);
        }
    }
    Ok(outcomes)
}

fn process(
    task: &FileTask<'_>,
    prepared: &Prepared,
    options: &RunOptions,
    staged: &mut Staged,
) -> Result<FileOutcome, RunError> {
    // Only a dry run stages anything; a real run reads what it committed.
    let pending = staged.get(&task.path).cloned();

    if task.spec.validate_before {
        let report = match &pending {
            Some(contents) => validate_contents(&task.path, contents, &prepared.policy)?,
            None => validate(&task.path, &prepared.policy)?,
        };
        if !report.passed() {
            return Err(RunError::Validation { report });
        }
    }

    let destination = task.destination().to_path_buf();

    if options.dry_run {
        let current = match pending {
            Some(contents) => contents,
            None => read_contents(&task.path)?,
        };
        let rendered = prepared
            .substitution
            .render_contents(&task.path, &current)?;
        log::log!(
            options.detail(),
            "would write {} changed line(s) to {}",
            rendered.lines_changed,
            destination.display()
        );
        staged.insert(destination.clone(), rendered.content.clone());
        return Ok(FileOutcome {
            source: task.path.clone(),
            destination,
            lines_changed: rendered.lines_changed,
            dry_run: true,
            before: options.capture.then_some(current),
            after: Some(rendered.content),
        });
    }

    let before = if options.capture {
        Some(read_contents(&task.path)?)
    } else {
        None
    };

    let applied = prepared
        .substitution
        .apply(&task.path, Some(&destination))?;
    let after = if options.capture {
        Some(read_contents(&applied.destination)?)
    } else {
        None
    };

    Ok(FileOutcome {
        source: task.path.clone(),
        destination: applied.destination,
        lines_changed: applied.lines_changed,
        dry_run: false,
        before,
        after,
    })
}

fn read_contents(path: &Path) -> Result<String, SubstituteError> {
    fs::read_to_string(path).map_err(|source| SubstituteError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve and validate every spec without writing anything.
///
/// Unlike [`run`], a failed validation is reported and checking continues.
/// Configuration and I/O errors are still fatal.
pub fn check(specs: &[PathSpec], variables: &Variables) -> Result<Vec<CheckOutcome>, RunError> {
    let options = RunOptions::default();
    let mut outcomes = Vec::new();
    for spec in specs {
        let prepared = prepare(spec, variables)?;
        for path in resolve_targets(spec, &options)? {
            let report = if spec.validate_before {
                Some(validate(&path, &prepared.policy)?)
            } else {
                None
            };
            outcomes.push(CheckOutcome {
                spec: spec.path.clone(),
                file: path,
                report,
            });
        }
    }
    Ok(outcomes)
}
