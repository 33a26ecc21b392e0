//! Pre-write validation of file contents.
//!
//! The policy is chosen by `must_include`:
//! - empty: the replace pattern must match at least one line.
//! - non-empty: every required string must match at least one line each.
//!   The replace pattern itself is then NOT checked; a must-include list
//!   replaces the presence check rather than adding to it.
//!
//! Failures are reported, not raised. The caller decides whether a failed
//! report aborts the run.

use crate::substitute::line_regex;
use regex::Regex;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone)]
pub enum ValidationPolicy {
    PatternPresent(Regex),
    MustInclude(Vec<Regex>),
}

impl ValidationPolicy {
    pub fn select(pattern: &Regex, must_include: &[String]) -> Result<Self, ScanError> {
        if must_include.is_empty() {
            return Ok(ValidationPolicy::PatternPresent(pattern.clone()));
        }
        let needles = must_include
            .iter()
            .map(|needle| {
                line_regex(needle).map_err(|source| ScanError::InvalidPattern {
                    pattern: needle.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ValidationPolicy::MustInclude(needles))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    PatternPresent,
    MustInclude,
}

/// Outcome of validating one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "ValidationReport should be checked with passed()"]
pub struct ValidationReport {
    pub file: PathBuf,
    pub check: CheckKind,
    /// Patterns or required strings that matched no line.
    pub missing: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.missing.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return write!(f, "{} passed validation", self.file.display());
        }
        match self.check {
            CheckKind::PatternPresent => write!(
                f,
                "pattern {} not found in {}",
                self.missing.join(", "),
                self.file.display()
            ),
            CheckKind::MustInclude => write!(
                f,
                "required string(s) {} not found in {}",
                self.missing.join(", "),
                self.file.display()
            ),
        }
    }
}

/// Validate `path` under `policy`.
///
/// Each required string is scanned with a freshly opened reader.
pub fn validate(path: &Path, policy: &ValidationPolicy) -> Result<ValidationReport, ScanError> {
    evaluate(path, policy, |regex| any_line_matches(path, regex))
}

/// Validate contents that are not on disk yet, reporting them as `path`.
///
/// Used by dry runs, where an earlier spec's rewrite of `path` only exists
/// in memory.
pub fn validate_contents(
    path: &Path,
    contents: &str,
    policy: &ValidationPolicy,
) -> Result<ValidationReport, ScanError> {
    evaluate(path, policy, |regex| {
        scan_lines(contents.as_bytes(), regex).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })
    })
}

fn evaluate<F>(path: &Path, policy: &ValidationPolicy, mut matches: F) -> Result<ValidationReport, ScanError>
where
    F: FnMut(&Regex) -> Result<bool, ScanError>,
{
    match policy {
        ValidationPolicy::PatternPresent(pattern) => {
            log::debug!("looking for pattern to replace");
            let mut missing = Vec::new();
            if matches(pattern)? {
                log::debug!("pattern {} found in {}", pattern.as_str(), path.display());
            } else {
                log::warn!("pattern {} not found in {}", pattern.as_str(), path.display());
                missing.push(pattern.as_str().to_string());
            }
            Ok(ValidationReport {
                file: path.to_path_buf(),
                check: CheckKind::PatternPresent,
                missing,
            })
        }
        ValidationPolicy::MustInclude(needles) => {
            log::debug!("looking for required strings in {}", path.display());
            let mut missing = Vec::new();
            // Keep going after a miss so every absent string is reported.
            for needle in needles {
                if !matches(needle)? {
                    log::error!(
                        "required string {} not found in {}",
                        needle.as_str(),
                        path.display()
                    );
                    missing.push(needle.as_str().to_string());
                }
            }
            Ok(ValidationReport {
                file: path.to_path_buf(),
                check: CheckKind::MustInclude,
                missing,
            })
        }
    }
}

/// Convenience form: compile, validate and collapse the report to a pass/fail flag.
pub fn validate_file(path: &Path, pattern: &str, must_include: &[String]) -> Result<bool, ScanError> {
    let pattern = line_regex(pattern).map_err(|source| ScanError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let policy = ValidationPolicy::select(&pattern, must_include)?;
    Ok(validate(path, &policy)?.passed())
}

/// Search each line of `path` (terminator included) for `regex`.
fn any_line_matches(path: &Path, regex: &Regex) -> Result<bool, ScanError> {
    let io_err = |source: io::Error| ScanError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    scan_lines(BufReader::new(file), regex).map_err(io_err)
}

fn scan_lines<R: BufRead>(mut reader: R, regex: &Regex) -> io::Result<bool> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        if regex.is_match(&line) {
            return Ok(true);
        }
    }
}
