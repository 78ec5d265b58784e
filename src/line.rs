//! Line-level splitting shared by reading and writing.
//!
//! A line is `<key> <assign> <value> <comment> <text>`. Everything from the
//! first comment token on is never part of an assignment, and the key ends at
//! the first assignment token. There is no escaping for either token.

use crate::ConflateError;

/// Assignment and comment tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operators {
    assign: String,
    comment: String,
}

impl Default for Operators {
    fn default() -> Self {
        Self {
            assign: "=".to_string(),
            comment: "#".to_string(),
        }
    }
}

impl Operators {
    /// Both tokens must be non-empty and neither may contain the other,
    /// otherwise a line could not be split unambiguously.
    pub fn new(assign: impl Into<String>, comment: impl Into<String>) -> Result<Self, ConflateError> {
        let assign = assign.into();
        let comment = comment.into();

        if assign.trim().is_empty() {
            return Err(ConflateError::InvalidOperator {
                message: "assignment operator cannot be empty".to_string(),
            });
        }
        if comment.trim().is_empty() {
            return Err(ConflateError::InvalidOperator {
                message: "comment operator cannot be empty".to_string(),
            });
        }
        if assign.contains(&comment) || comment.contains(&assign) {
            return Err(ConflateError::InvalidOperator {
                message: format!(
                    "assignment operator '{}' and comment operator '{}' overlap",
                    assign, comment
                ),
            });
        }

        Ok(Self { assign, comment })
    }

    pub fn assign(&self) -> &str {
        &self.assign
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Split off the comment. The returned tail keeps its marker and is
    /// empty when the line has no comment.
    pub fn split_comment<'a>(&self, line: &'a str) -> (&'a str, &'a str) {
        match line.find(&self.comment) {
            Some(at) => line.split_at(at),
            None => (line, ""),
        }
    }

    /// Parse a line into an assignment. Lines without an assignment token
    /// before the comment, or with an empty key, are inert.
    pub fn assignment<'a>(&self, line: &'a str) -> Option<Assignment<'a>> {
        let (head, comment) = self.split_comment(line);
        let (key, value) = head.split_once(self.assign.as_str())?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Assignment {
            key,
            value: value.trim(),
            comment,
        })
    }

    /// Render `key <assign> value`, followed by the comment tail if any.
    pub fn render(&self, key: &str, value: &str, comment: &str) -> String {
        let mut line = format!("{} {} {}", key, self.assign, value);
        if !comment.is_empty() {
            line.push(' ');
            line.push_str(comment);
        }
        line
    }

    /// Check that a key can be written and found again.
    pub fn validate_key(&self, key: &str) -> Result<(), ConflateError> {
        let reason = if key.trim().is_empty() {
            Some("key cannot be empty")
        } else if key.trim() != key {
            Some("key has surrounding whitespace")
        } else if key.contains(&self.assign) {
            Some("key contains the assignment operator")
        } else if key.contains(&self.comment) {
            Some("key contains the comment operator")
        } else if key.contains('\n') || key.contains('\r') {
            Some("key contains a line break")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ConflateError::InvalidKey {
                key: key.to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// The pieces of an assignment line, borrowed from the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub key: &'a str,
    pub value: &'a str,
    pub comment: &'a str,
}

/// A configuration file held as lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigText {
    pub lines: Vec<String>,
    trailing_newline: bool,
}

impl ConfigText {
    /// Split file content into lines. A `\r` before each `\n` is dropped.
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(str::to_string).collect(),
            trailing_newline: content.is_empty() || content.ends_with('\n'),
        }
    }

    /// Index of the first line assigning `key`.
    pub fn find_key(&self, key: &str, ops: &Operators) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| ops.assignment(line).is_some_and(|a| a.key == key))
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }
}
