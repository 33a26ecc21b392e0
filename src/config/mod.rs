pub mod applicator;
pub mod loader;
pub mod schema;
pub mod variables;

pub use applicator::{
    check, run, CheckOutcome, ErrorKind, FileOutcome, FileTask, RunError, RunOptions,
};
pub use loader::{load_from_path, load_from_str, ConfigError, DEFAULT_CONFIG_FILE};
pub use schema::{
    PathSpec, RepexConfig, SchemaError, SchemaIssue, DEFAULT_VALIDATE_AFTER,
    DEFAULT_VALIDATE_BEFORE,
};
pub use variables::{parse_assignment, Variables, VariablesError};
