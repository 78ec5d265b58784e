//! Command-line interface for Conflate
//!
//! Reads, inspects and edits a single key-value configuration file.

use crate::{
    literal::parse_literal,
    logging::{init_logging, LogConfig},
    ConfigManager, InitialConfig, LoadOptions, Result,
};
use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Conflate command-line interface
#[derive(Parser, Debug)]
#[command(name = "conflate")]
#[command(about = "Read and edit key-value configuration files without losing comments")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct ConflateCli {
    /// Configuration file to operate on
    #[arg(short, long)]
    pub file: PathBuf,

    /// Token separating keys from values
    #[arg(long, default_value = "=")]
    pub assign_op: String,

    /// Token starting a comment
    #[arg(long, default_value = "#")]
    pub comment_op: String,

    /// Create a missing file without asking
    #[arg(short, long)]
    pub silent: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable JSON output for machine-readable results
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the configuration held in the file
    Show {
        /// Only read these keys (comma separated); default reads every key
        #[arg(short, long, value_delimiter = ',')]
        keys: Vec<String>,

        /// Keep well-formed values even if others are malformed
        #[arg(long)]
        no_protect: bool,
    },

    /// Print one value
    Get {
        key: String,
    },

    /// Set one value and write it back
    Set {
        key: String,

        /// Value literal, e.g. 960, 'text', [1, 2] or {'a': True}
        value: String,
    },

    /// Report malformed values
    Check,

    /// Seed the file from a key list (['a', 'b']) or a mapping ({'a': 1})
    Init {
        spec: String,
    },
}

/// A failure whose details were already written to the output, so
/// [`write_failure`] adds nothing.
#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct AlreadyReported(pub String);

/// CLI command executor
pub struct ConflateCliExecutor {
    file: PathBuf,
    assign_op: String,
    comment_op: String,
    silent: bool,
    json_output: bool,
}

impl ConflateCliExecutor {
    pub fn new(cli: &ConflateCli) -> Self {
        Self {
            file: cli.file.clone(),
            assign_op: cli.assign_op.clone(),
            comment_op: cli.comment_op.clone(),
            silent: cli.silent,
            json_output: cli.json,
        }
    }

    fn manager(&self, initial: InitialConfig) -> Result<ConfigManager> {
        let manager = ConfigManager::builder(&self.file)
            .assign_op(self.assign_op.as_str())
            .comment_op(self.comment_op.as_str())
            .silent(self.silent)
            .initial(initial)
            .build()?;
        Ok(manager)
    }

    /// Execute a CLI command, writing results to `out`
    pub fn execute(&self, command: Commands, out: &mut dyn Write) -> Result<()> {
        match command {
            Commands::Show { keys, no_protect } => self.show(keys, no_protect, out),
            Commands::Get { key } => self.get(key, out),
            Commands::Set { key, value } => self.set(key, &value, out),
            Commands::Check => self.check(out),
            Commands::Init { spec } => self.init(&spec, out),
        }
    }

    fn show(&self, keys: Vec<String>, no_protect: bool, out: &mut dyn Write) -> Result<()> {
        let options = LoadOptions {
            discover_new_keys: keys.is_empty(),
            protect_on_error: !no_protect,
        };
        let mut manager = self.manager(InitialConfig::Keys(keys))?;
        let report = manager.load(options)?;
        if report.rolled_back {
            warn!("Showing values from before the failed read");
        }

        if self.json_output {
            writeln!(out, "{}", serde_json::to_string_pretty(manager.config())?)?;
        } else {
            manager.write_report(out)?;
        }
        Ok(())
    }

    fn get(&self, key: String, out: &mut dyn Write) -> Result<()> {
        let mut manager = self.manager(InitialConfig::Keys(vec![key.clone()]))?;
        let report = manager.load(LoadOptions::default())?;
        if report.rolled_back {
            bail!("Malformed value for property '{}'", key);
        }

        let value = manager
            .get(&key)
            .filter(|_| report.applied > 0)
            .ok_or_else(|| anyhow!("Key '{}' not found in '{}'", key, self.file.display()))?;

        if self.json_output {
            writeln!(out, "{}", serde_json::to_string(value)?)?;
        } else {
            writeln!(out, "{}", value)?;
        }
        Ok(())
    }

    fn set(&self, key: String, literal: &str, out: &mut dyn Write) -> Result<()> {
        // only this key is loaded so no other line gets rewritten
        let mut manager = self.manager(InitialConfig::Keys(vec![key.clone()]))?;
        let report = manager.load(LoadOptions::default().with_protection(false))?;
        let previous = if report.applied > 0 && report.malformed.is_empty() {
            manager.get(&key).cloned()
        } else {
            None
        };

        manager.set_literal(key.as_str(), literal)?;
        manager.save()?;
        info!("Set '{}' in '{}'", key, self.file.display());

        let current = manager.get(&key).cloned().unwrap_or_default();
        if self.json_output {
            let result = serde_json::json!({
                "key": key,
                "previous": previous,
                "value": current,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        } else {
            match previous {
                Some(previous) => writeln!(out, "{}: {} -> {}", key, previous, current)?,
                None => writeln!(out, "{}: {}", key, current)?,
            }
        }
        Ok(())
    }

    fn check(&self, out: &mut dyn Write) -> Result<()> {
        let mut manager = self.manager(InitialConfig::Keys(Vec::new()))?;
        let report = manager.load(LoadOptions::discover())?;
        let summary = format!(
            "{} malformed value(s) in '{}'",
            report.malformed.len(),
            self.file.display()
        );

        if self.json_output {
            let problems: Vec<_> = report
                .malformed
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "key": m.key,
                        "line": m.line,
                        "text": m.text,
                        "error": m.error.to_string(),
                    })
                })
                .collect();
            let result = serde_json::json!({
                "file": self.file.display().to_string(),
                "clean": report.is_clean(),
                "malformed": problems,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
            if !report.is_clean() {
                return Err(AlreadyReported(summary).into());
            }
            return Ok(());
        } else if report.is_clean() {
            writeln!(
                out,
                "{}: {} keys, no malformed values",
                self.file.display(),
                report.discovered.len()
            )?;
        } else {
            for malformed in &report.malformed {
                writeln!(
                    out,
                    "line {}: {} {} {} ({})",
                    malformed.line, malformed.key, self.assign_op, malformed.text, malformed.error
                )?;
            }
        }

        if !report.is_clean() {
            bail!(summary);
        }
        Ok(())
    }

    fn init(&self, spec: &str, out: &mut dyn Write) -> Result<()> {
        let spec_value = parse_literal(spec).context("Initial configuration is not a valid literal")?;
        let initial = InitialConfig::try_from(spec_value)?;
        let seeds_values = matches!(initial, InitialConfig::Values(_));

        let mut manager = self.manager(initial)?;
        if !seeds_values {
            // keep whatever the file already holds for the listed keys
            let report = manager.load(LoadOptions::default())?;
            debug!("Picked up {} existing values", report.applied);
        }
        let report = manager.save()?;

        if self.json_output {
            let result = serde_json::json!({
                "updated": report.updated,
                "appended": report.appended,
                "comment_clashes": report.comment_clashes,
                "created": report.created,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        } else {
            writeln!(
                out,
                "{}: {} updated, {} appended",
                self.file.display(),
                report.updated.len(),
                report.appended.len()
            )?;
        }
        Ok(())
    }
}

/// Describe a failed command. In JSON mode this is a single error object,
/// unless the command already wrote its own result document.
pub fn write_failure(error: &anyhow::Error, json: bool, out: &mut dyn Write) -> Result<()> {
    if !json {
        error!("Command failed: {:#}", error);
        return Ok(());
    }
    if error.downcast_ref::<AlreadyReported>().is_some() {
        debug!("{:#}", error);
        return Ok(());
    }
    let error_json = serde_json::json!({
        "error": true,
        "message": format!("{:#}", error),
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&error_json)?)?;
    Ok(())
}

/// Run the CLI interface
pub fn run_cli() -> Result<()> {
    let cli = ConflateCli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose().with_env_overrides()
    } else {
        LogConfig::from_env()
    };
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    debug!("Verbose output enabled");

    let executor = ConflateCliExecutor::new(&cli);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Err(e) = executor.execute(cli.command, &mut out) {
        write_failure(&e, cli.json, &mut out)?;
        out.flush()?;
        std::process::exit(1);
    }

    Ok(())
}
