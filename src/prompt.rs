//! Confirmation capability used when the configuration file is missing.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// Answers accepted as "yes", compared case-insensitively.
pub const AFFIRMATIVE: &[&str] = &["yes", "y", "yes'm"];
/// Answers accepted as "no". Anything outside both sets also declines.
pub const NEGATIVE: &[&str] = &["no", "n", "nope"];

/// Decides whether a missing configuration file may be created.
#[cfg_attr(test, mockall::automock)]
pub trait ConfirmCreation: Send + Sync {
    fn confirm_create(&self, path: &Path, cwd: &Path) -> bool;
}

/// Classification of a typed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Unrecognized,
}

impl Answer {
    pub fn classify(input: &str) -> Self {
        let input = input.trim().to_lowercase();
        if AFFIRMATIVE.contains(&input.as_str()) {
            Answer::Yes
        } else if NEGATIVE.contains(&input.as_str()) {
            Answer::No
        } else {
            Answer::Unrecognized
        }
    }
}

/// Always agrees. Installed for silent managers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentConfirm;

impl ConfirmCreation for SilentConfirm {
    fn confirm_create(&self, _path: &Path, _cwd: &Path) -> bool {
        true
    }
}

/// Asks a question on `output` and reads one answer line from `input`.
pub struct TerminalConfirm<R, W> {
    io: Mutex<(R, W)>,
}

impl TerminalConfirm<io::BufReader<io::Stdin>, io::Stderr> {
    /// Prompt on stderr, read from stdin.
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }

    fn ask(&self, path: &Path, cwd: &Path) -> io::Result<Answer> {
        let mut guard = self
            .io
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "prompt lock poisoned"))?;
        let (input, output) = &mut *guard;

        write!(
            output,
            "No config file found. Create '{}' in {}? [y/N] ",
            path.display(),
            cwd.display()
        )?;
        output.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        Ok(Answer::classify(&answer))
    }
}

impl<R: BufRead + Send, W: Write + Send> ConfirmCreation for TerminalConfirm<R, W> {
    fn confirm_create(&self, path: &Path, cwd: &Path) -> bool {
        match self.ask(path, cwd) {
            Ok(Answer::Yes) => true,
            Ok(_) => false,
            Err(e) => {
                warn!("Could not read an answer, treating as no: {}", e);
                false
            }
        }
    }
}
