use crate::config::Variables;
use regex::{Captures, Regex, RegexBuilder};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// `{{ .name }}`: exactly one space inside each brace pair, name is any run
/// of non-space, non-brace characters.
const TOKEN_GRAMMAR: &str = r"\{\{ \.([^\s{}]+) \}\}";

static TOKEN: OnceLock<Regex> = OnceLock::new();

fn token() -> &'static Regex {
    TOKEN.get_or_init(|| Regex::new(TOKEN_GRAMMAR).expect("token grammar is a valid regex"))
}

/// Compile a pattern that is matched against one line at a time.
///
/// Lines keep their terminator, so `$` must also match just before a
/// trailing `\n`; multi-line mode gives `^` and `$` line semantics.
pub fn line_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).multi_line(true).build()
}

/// Replace every `{{ .name }}` token whose name is a known variable.
///
/// Single pass: substituted values are never rescanned, and tokens naming
/// unknown variables are left as written.
pub fn interpolate(text: &str, variables: &Variables) -> String {
    if variables.is_empty() {
        return text.to_string();
    }
    token()
        .replace_all(text, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[derive(Error, Debug)]
pub enum SubstituteError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where a streaming rewrite failed.
#[derive(Debug)]
enum StreamError {
    Read(io::Error),
    Write(io::Error),
}

/// A compiled pattern/replacement pair, variables already interpolated.
#[derive(Debug, Clone)]
#[must_use = "Substitution does nothing until apply() is called"]
pub struct Substitution {
    pattern: Regex,
    replacement: String,
}

/// Result of committing a substitution to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub destination: PathBuf,
    pub lines_changed: usize,
}

/// Result of rendering a substitution in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content: String,
    pub lines_changed: usize,
}

impl Substitution {
    /// Interpolate `variables` into both texts, then compile the pattern.
    pub fn new(pattern: &str, replacement: &str, variables: &Variables) -> Result<Self, regex::Error> {
        let pattern = interpolate(pattern, variables);
        let replacement = interpolate(replacement, variables);
        Ok(Self {
            pattern: line_regex(&pattern)?,
            replacement,
        })
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Substitute all matches in one line.
    pub fn replace_line<'t>(&self, line: &'t str) -> Cow<'t, str> {
        self.pattern.replace_all(line, self.replacement.as_str())
    }

    /// Stream `reader` into `writer` line by line, terminators included.
    ///
    /// Returns the number of lines whose text changed.
    fn rewrite<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> Result<usize, StreamError> {
        let mut line = String::new();
        let mut changed = 0;
        loop {
            line.clear();
            if reader.read_line(&mut line).map_err(StreamError::Read)? == 0 {
                break;
            }
            let replaced = self.replace_line(&line);
            if matches!(&replaced, Cow::Owned(new) if *new != line) {
                changed += 1;
            }
            writer
                .write_all(replaced.as_bytes())
                .map_err(StreamError::Write)?;
        }
        writer.flush().map_err(StreamError::Write)?;
        Ok(changed)
    }

    /// Rewrite `source` in memory without touching the filesystem.
    pub fn render(&self, source: &Path) -> Result<Rendered, SubstituteError> {
        let input = File::open(source).map_err(|e| read_err(source, e))?;
        self.render_from(source, BufReader::new(input))
    }

    /// Rewrite `contents` in memory; `source` only names them in errors.
    pub fn render_contents(&self, source: &Path, contents: &str) -> Result<Rendered, SubstituteError> {
        self.render_from(source, contents.as_bytes())
    }

    fn render_from<R: BufRead>(&self, source: &Path, reader: R) -> Result<Rendered, SubstituteError> {
        let mut content = Vec::new();
        let lines_changed = self.rewrite(reader, &mut content).map_err(|e| match e {
            StreamError::Read(e) | StreamError::Write(e) => read_err(source, e),
        })?;
        // Every byte written came from a line that was read as UTF-8.
        let content = String::from_utf8(content).map_err(|e| {
            read_err(source, io::Error::new(io::ErrorKind::InvalidData, e))
        })?;
        Ok(Rendered {
            content,
            lines_changed,
        })
    }

    /// Rewrite `source` and commit the result atomically.
    ///
    /// The result is streamed into a temporary file in the destination's
    /// directory, synced, then renamed over `output` (or `source` when no
    /// output is given). A failure before the rename leaves the destination
    /// untouched and the temporary file is removed.
    pub fn apply(&self, source: &Path, output: Option<&Path>) -> Result<Applied, SubstituteError> {
        let destination = output.unwrap_or(source);
        let input = File::open(source).map_err(|e| read_err(source, e))?;
        let permissions = input
            .metadata()
            .map_err(|e| read_err(source, e))?
            .permissions();

        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::Builder::new()
            .prefix(".repex")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| write_err(destination, e))?;

        log::info!(
            "{}: replacing {} with {}",
            source.display(),
            self.pattern.as_str(),
            self.replacement
        );
        let lines_changed = self
            .rewrite(BufReader::new(input), BufWriter::new(temp.as_file_mut()))
            .map_err(|e| match e {
                StreamError::Read(e) => read_err(source, e),
                StreamError::Write(e) => write_err(destination, e),
            })?;

        temp.as_file()
            .sync_all()
            .map_err(|e| write_err(destination, e))?;
        fs::set_permissions(temp.path(), permissions).map_err(|e| write_err(destination, e))?;

        log::info!("writing output to {}", destination.display());
        temp.persist(destination)
            .map_err(|e| write_err(destination, e.error))?;

        Ok(Applied {
            destination: destination.to_path_buf(),
            lines_changed,
        })
    }
}

fn read_err(path: &Path, source: io::Error) -> SubstituteError {
    SubstituteError::Read {
        path: path.to_path_buf(),
        source,
    }
}

fn write_err(path: &Path, source: io::Error) -> SubstituteError {
    SubstituteError::Write {
        path: path.to_path_buf(),
        source,
    }
}
