//! Repex: declarative, config-driven search and replace
//!
//! A configuration lists path specs. Each spec names either a single file or
//! a directory scan (directories under `base_directory` whose path matches a
//! regex, walked for files with an exact name), plus a regex and its
//! replacement.
//!
//! # Architecture
//!
//! - [`resolve`] expands a spec into concrete files
//! - [`validate`] gates each file on pattern presence or required strings
//! - [`substitute`] interpolates `{{ .name }}` variables and rewrites the file
//!   line by line
//! - [`config::run`] drives the three in order, failing fast
//!
//! # Safety
//!
//! - Nothing is written to a file that failed validation
//! - Atomic file writes (tempfile + fsync + rename)
//! - No rollback across files: earlier commits survive a later failure
//!
//! # Example
//!
//! ```no_run
//! use repex::config::{load_from_path, run, RunOptions};
//!
//! let config = load_from_path("config.yml")?;
//! let outcomes = run(&config.paths, &config.variables, &RunOptions::default())?;
//! for outcome in outcomes {
//!     println!("{} -> {}", outcome.source.display(), outcome.destination.display());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod resolve;
pub mod substitute;
pub mod validate;

// Re-exports
pub use config::{
    check, load_from_path, load_from_str, run, ConfigError, FileOutcome, PathSpec, RepexConfig,
    RunError, RunOptions, Variables,
};
pub use resolve::{resolve, ResolveError};
pub use substitute::{interpolate, line_regex, Substitution, SubstituteError};
pub use validate::{
    validate, validate_contents, validate_file, ScanError, ValidationPolicy, ValidationReport,
};
