use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use repex::config::{
    check, load_from_path, parse_assignment, run, ErrorKind, FileOutcome, RunError, RunOptions,
    Variables, DEFAULT_CONFIG_FILE,
};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "repex")]
#[command(about = "Config-driven regex search and replace across file trees", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and rewrite every file named by the config
    Apply {
        #[command(flatten)]
        common: CommonArgs,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Resolve and validate every file without writing anything
    Check {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Path to the YAML config listing the paths to process
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Set a variable for `{{ .name }}` tokens (repeatable)
    #[arg(short = 't', long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// YAML file with a mapping of variable names to string values
    #[arg(long, value_name = "FILE")]
    vars_file: Option<PathBuf>,

    /// Verbose diagnostic output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_var(input: &str) -> Result<(String, String), String> {
    parse_assignment(input).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            common,
            dry_run,
            diff,
        } => cmd_apply(common, dry_run, diff),

        Commands::Check { common } => cmd_check(common),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Merge variables: config file, then --vars-file, then --var (later wins).
fn collect_variables(config_vars: Variables, common: &CommonArgs) -> Result<Variables> {
    let mut variables = config_vars;

    if let Some(path) = &common.vars_file {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("cannot access variables file {}", path.display()))?;
        let from_file = Variables::from_yaml_str(&contents)
            .with_context(|| format!("invalid variables file {}", path.display()))?;
        variables.merge(from_file);
    }

    variables.merge(common.vars.iter().cloned().collect());
    Ok(variables)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(source: &Path, destination: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", source.display()).dimmed()
    );
    println!(
        "{}",
        format!("+++ {} (rewritten)", destination.display()).dimmed()
    );

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", sign);
    }
}

fn report_outcome(outcome: &FileOutcome, show_diff: bool) {
    let verb = if outcome.dry_run {
        "Would rewrite"
    } else {
        "Rewrote"
    };
    let target = if outcome.destination == outcome.source {
        outcome.source.display().to_string()
    } else {
        format!(
            "{} -> {}",
            outcome.source.display(),
            outcome.destination.display()
        )
    };
    println!(
        "{} {} {} ({} line(s) changed)",
        "✓".green(),
        verb,
        target,
        outcome.lines_changed
    );

    if show_diff {
        if let (Some(before), Some(after)) = (&outcome.before, &outcome.after) {
            if before != after {
                display_diff(&outcome.source, &outcome.destination, before, after);
            }
        }
    }
}

fn report_failure(err: &RunError) {
    let label = match err.kind() {
        ErrorKind::Config => "CONFIG",
        ErrorKind::Validation => "VALIDATION",
        ErrorKind::Io => "I/O",
    };
    eprintln!("{} {}: {}", "✗".red(), label.red().bold(), err);
    if let RunError::Validation { .. } = err {
        eprintln!("  The failing file was not modified; files rewritten before it stay rewritten.");
    }
}

fn cmd_apply(common: CommonArgs, dry_run: bool, show_diff: bool) -> Result<()> {
    init_logging(common.verbose);

    let config = load_from_path(&common.config)?;
    let variables = collect_variables(config.variables.clone(), &common)?;
    let options = RunOptions {
        dry_run,
        verbose: common.verbose,
        capture: show_diff,
    };

    if dry_run {
        println!("{}", "[DRY RUN - no files will be modified]".cyan());
    }

    let outcomes = match run(&config.paths, &variables, &options) {
        Ok(outcomes) => outcomes,
        Err(err) => {
            report_failure(&err);
            std::process::exit(1);
        }
    };

    let mut changed = 0;
    for outcome in &outcomes {
        report_outcome(outcome, show_diff);
        if outcome.lines_changed > 0 {
            changed += 1;
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} file(s) processed", format!("{}", outcomes.len()).green());
    println!("  {} file(s) with changes", format!("{}", changed).green());

    Ok(())
}

fn cmd_check(common: CommonArgs) -> Result<()> {
    init_logging(common.verbose);

    let config = load_from_path(&common.config)?;
    let variables = collect_variables(config.variables.clone(), &common)?;

    let outcomes = match check(&config.paths, &variables) {
        Ok(outcomes) => outcomes,
        Err(err) => {
            report_failure(&err);
            std::process::exit(1);
        }
    };

    let mut passed = 0;
    let mut failed = 0;
    let mut unchecked = 0;

    for outcome in &outcomes {
        match &outcome.report {
            Some(report) if report.passed() => {
                println!("{} {}: Valid", "✓".green(), outcome.file.display());
                passed += 1;
            }
            Some(report) => {
                eprintln!("{} {}: {}", "✗".red(), outcome.file.display(), report);
                failed += 1;
            }
            None => {
                println!(
                    "{} {}: Not validated (validate_before is off)",
                    "⊘".cyan(),
                    outcome.file.display()
                );
                unchecked += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} valid", format!("{}", passed).green());
    println!("  {} invalid", format!("{}", failed).red());
    println!("  {} not validated", format!("{}", unchecked).cyan());

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
