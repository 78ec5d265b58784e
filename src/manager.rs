//! In-memory configuration mapping synchronized with a line-oriented file.

use crate::line::{ConfigText, Operators};
use crate::literal::{parse_literal, LiteralError};
use crate::prompt::{ConfirmCreation, SilentConfirm, TerminalConfirm};
use crate::value::{ConfigMap, Quoted, Value};
use crate::ConflateError;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Width under which the report stays on a single line.
const REPORT_WIDTH: usize = 80;

/// How the mapping is seeded.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialConfig {
    /// Known keys, each starting as `None`.
    Keys(Vec<String>),
    /// Ready-made key-value pairs.
    Values(ConfigMap),
}

impl InitialConfig {
    fn into_map(self) -> ConfigMap {
        match self {
            InitialConfig::Keys(keys) => keys.into_iter().map(|k| (k, Value::None)).collect(),
            InitialConfig::Values(map) => map,
        }
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            InitialConfig::Keys(keys) => Box::new(keys.iter().map(String::as_str)),
            InitialConfig::Values(map) => Box::new(map.keys().map(String::as_str)),
        }
    }
}

impl TryFrom<Value> for InitialConfig {
    type Error = ConflateError;

    /// A list of strings becomes a key set and a mapping is taken as-is.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Map(map) => Ok(InitialConfig::Values(map)),
            Value::List(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Str(key) => Ok(key),
                    other => Err(ConflateError::InvalidInitialConfig {
                        found: format!("a list containing a {}", other.type_name()),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(InitialConfig::Keys),
            other => Err(ConflateError::InvalidInitialConfig {
                found: format!("a {}", other.type_name()),
            }),
        }
    }
}

/// Options for [`ConfigManager::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Add keys found in the file but not in the mapping.
    pub discover_new_keys: bool,
    /// Discard every change from the call if any value is malformed.
    pub protect_on_error: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            discover_new_keys: false,
            protect_on_error: true,
        }
    }
}

impl LoadOptions {
    pub fn discover() -> Self {
        Self {
            discover_new_keys: true,
            ..Self::default()
        }
    }

    pub fn with_discovery(mut self, discover: bool) -> Self {
        self.discover_new_keys = discover;
        self
    }

    pub fn with_protection(mut self, protect: bool) -> Self {
        self.protect_on_error = protect;
        self
    }
}

/// A value that failed to parse during a load.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedValue {
    pub key: String,
    /// 1-based line number in the file.
    pub line: usize,
    pub text: String,
    pub error: LiteralError,
}

/// Outcome of a load. When `rolled_back` is set none of the applied or
/// discovered entries took effect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Number of lines whose value was assigned.
    pub applied: usize,
    pub discovered: Vec<String>,
    pub malformed: Vec<MalformedValue>,
    pub rolled_back: bool,
    /// The file was missing and has been created empty.
    pub created: bool,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty()
    }
}

/// Outcome of a save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub updated: Vec<String>,
    pub appended: Vec<String>,
    /// Keys whose rendered value holds the comment token. Their lines were
    /// written, but the next load cuts the value at that token.
    pub comment_clashes: Vec<String>,
    pub created: bool,
}

/// Builder for [`ConfigManager`].
pub struct ConfigManagerBuilder {
    path: PathBuf,
    assign_op: String,
    comment_op: String,
    silent: bool,
    confirm: Option<Box<dyn ConfirmCreation>>,
    initial: Option<InitialConfig>,
}

impl ConfigManagerBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let ops = Operators::default();
        Self {
            path: path.into(),
            assign_op: ops.assign().to_string(),
            comment_op: ops.comment().to_string(),
            silent: false,
            confirm: None,
            initial: None,
        }
    }

    pub fn assign_op(mut self, op: impl Into<String>) -> Self {
        self.assign_op = op.into();
        self
    }

    pub fn comment_op(mut self, op: impl Into<String>) -> Self {
        self.comment_op = op.into();
        self
    }

    /// Create a missing file without asking.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Replace the default prompt used for a missing file. Takes precedence
    /// over `silent`.
    pub fn confirm_with(mut self, confirm: Box<dyn ConfirmCreation>) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial = Some(InitialConfig::Keys(keys.into_iter().map(Into::into).collect()));
        self
    }

    pub fn values(mut self, values: ConfigMap) -> Self {
        self.initial = Some(InitialConfig::Values(values));
        self
    }

    pub fn initial(mut self, initial: InitialConfig) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn build(self) -> Result<ConfigManager, ConflateError> {
        let ops = Operators::new(self.assign_op, self.comment_op)?;

        let confirm = match self.confirm {
            Some(confirm) => confirm,
            None if self.silent => Box::new(SilentConfirm),
            None => Box::new(TerminalConfirm::stdio()),
        };

        let mut manager = ConfigManager {
            path: self.path,
            ops,
            silent: self.silent,
            confirm,
            config: ConfigMap::new(),
        };

        if let Some(initial) = self.initial {
            manager.set_config(initial)?;
        }

        debug!(
            "Config manager for '{}' ready with {} keys",
            manager.path.display(),
            manager.config.len()
        );
        Ok(manager)
    }
}

/// Holds a configuration mapping and keeps it in step with a file on disk.
pub struct ConfigManager {
    path: PathBuf,
    ops: Operators,
    silent: bool,
    confirm: Box<dyn ConfirmCreation>,
    config: ConfigMap,
}

impl fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigManager")
            .field("path", &self.path)
            .field("ops", &self.ops)
            .field("silent", &self.silent)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConfigManager {
    pub fn builder(path: impl Into<PathBuf>) -> ConfigManagerBuilder {
        ConfigManagerBuilder::new(path)
    }

    /// Interactive manager with default operators.
    pub fn new(path: impl Into<PathBuf>, initial: InitialConfig) -> Result<Self, ConflateError> {
        Self::builder(path).initial(initial).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn operators(&self) -> &Operators {
        &self.ops
    }

    pub fn assign_op(&self) -> &str {
        self.ops.assign()
    }

    pub fn comment_op(&self) -> &str {
        self.ops.comment()
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// Replace the whole mapping after checking every key.
    pub fn set_config(&mut self, initial: InitialConfig) -> Result<(), ConflateError> {
        for key in initial.keys() {
            self.ops.validate_key(key)?;
        }
        self.config = initial.into_map();
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.config.contains_key(key)
    }

    /// Insert or replace a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>, ConflateError> {
        let key = key.into();
        self.ops.validate_key(&key)?;
        Ok(self.config.insert(key, value.into()))
    }

    /// Parse `literal` and store it under `key`.
    pub fn set_literal(&mut self, key: impl Into<String>, literal: &str) -> Result<Option<Value>, ConflateError> {
        let key = key.into();
        let value = parse_literal(literal).map_err(|source| ConflateError::MalformedValue {
            key: key.clone(),
            source,
        })?;
        self.set(key, value)
    }

    /// Drop a key from the mapping. Its line stays in the file, and the
    /// remaining keys keep their order.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.config.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.config.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
    }

    /// Read values from the file into the mapping.
    ///
    /// Every assignment line whose key is in the mapping is parsed; when a
    /// key appears on several lines the last one wins. Keys without a line
    /// keep their current value. With `discover_new_keys` set, keys only
    /// present in the file are added first.
    ///
    /// A malformed value is logged and recorded in the report. With
    /// `protect_on_error` set the mapping is left exactly as it was before
    /// the call; otherwise the bad key keeps its previous value and every
    /// other change stands.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn load(&mut self, options: LoadOptions) -> Result<LoadReport, ConflateError> {
        let mut report = LoadReport::default();

        let content = match self.read_file()? {
            Some(content) => content,
            None => {
                report.created = true;
                return Ok(report);
            }
        };

        let text = ConfigText::parse(&content);
        let assignments: Vec<_> = text
            .lines
            .iter()
            .enumerate()
            .filter_map(|(n, line)| self.ops.assignment(line).map(|a| (n + 1, a)))
            .collect();

        let mut staged = self.config.clone();

        if options.discover_new_keys {
            for (_, assignment) in &assignments {
                if !staged.contains_key(assignment.key) {
                    debug!("Discovered key '{}'", assignment.key);
                    staged.insert(assignment.key.to_string(), Value::None);
                    report.discovered.push(assignment.key.to_string());
                }
            }
        }

        for (line, assignment) in &assignments {
            let Some(slot) = staged.get_mut(assignment.key) else {
                continue;
            };

            match parse_literal(assignment.value) {
                Ok(value) => {
                    debug!(line, "Read '{}' = {}", assignment.key, value);
                    *slot = value;
                    report.applied += 1;
                }
                Err(error) => {
                    warn!(
                        line,
                        "Malformed value for property '{}': {}", assignment.key, error
                    );
                    report.malformed.push(MalformedValue {
                        key: assignment.key.to_string(),
                        line: *line,
                        text: assignment.value.to_string(),
                        error,
                    });
                }
            }
        }

        if !report.malformed.is_empty() && options.protect_on_error {
            warn!(
                "Discarding all values read from '{}' after {} malformed value(s)",
                self.path.display(),
                report.malformed.len()
            );
            report.rolled_back = true;
        } else {
            self.config = staged;
        }

        debug!(
            applied = report.applied,
            discovered = report.discovered.len(),
            "Load complete"
        );
        Ok(report)
    }

    /// Write the mapping to the file.
    ///
    /// The first line assigning a key is rewritten with the current value and
    /// keeps its comment; later duplicates of that key are left untouched.
    /// Keys with no line are appended in mapping order. Every other line is
    /// written back unchanged. The file is rewritten in place, not atomically.
    ///
    /// Only a missing file runs the creation procedure. Any other read
    /// failure, and any failed write, returns [`ConflateError::Io`].
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn save(&self) -> Result<SaveReport, ConflateError> {
        let mut report = SaveReport::default();

        let content = match self.read_file()? {
            Some(content) => content,
            None => {
                report.created = true;
                String::new()
            }
        };

        let mut text = ConfigText::parse(&content);

        for (key, value) in &self.config {
            let rendered = value.to_string();
            if rendered.contains(self.ops.comment()) {
                warn!(
                    "Value of '{}' contains the comment token '{}'; it will be cut short when read back",
                    key,
                    self.ops.comment()
                );
                report.comment_clashes.push(key.clone());
            }
            match text.find_key(key, &self.ops) {
                Some(index) => {
                    let (_, comment) = self.ops.split_comment(&text.lines[index]);
                    let line = self.ops.render(key, &rendered, comment);
                    text.lines[index] = line;
                    report.updated.push(key.clone());
                }
                None => {
                    text.lines.push(self.ops.render(key, &rendered, ""));
                    report.appended.push(key.clone());
                }
            }
        }

        fs::write(&self.path, text.render()).map_err(|source| self.io_error(source))?;

        info!(
            "Saved {} keys to '{}' ({} updated, {} appended)",
            self.config.len(),
            self.path.display(),
            report.updated.len(),
            report.appended.len()
        );
        Ok(report)
    }

    /// Pretty rendering of the mapping with keys in insertion order.
    pub fn report(&self) -> String {
        let single = format!("{{{}}}", self.join_entries(", "));
        if single.len() <= REPORT_WIDTH || self.config.len() <= 1 {
            return single;
        }
        format!("{{ {}}}", self.join_entries(",\n  "))
    }

    fn join_entries(&self, separator: &str) -> String {
        self.config
            .iter()
            .map(|(key, value)| format!("{}: {}", Quoted(key), value))
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn write_report<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.report())
    }

    /// Print the report to standard output.
    pub fn print_report(&self) {
        println!("{}", self.report());
    }

    /// Read the whole file. `None` means it was missing and has just been
    /// created empty.
    fn read_file(&self) -> Result<Option<String>, ConflateError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.create_missing_file()?;
                Ok(None)
            }
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn create_missing_file(&self) -> Result<(), ConflateError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        if !self.confirm.confirm_create(&self.path, &cwd) {
            return Err(ConflateError::CreationDeclined {
                path: self.path.clone(),
            });
        }

        info!(
            "No config file found. Touching '{}' in {}",
            self.path.display(),
            cwd.display()
        );
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> ConflateError {
        ConflateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
