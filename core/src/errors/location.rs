//! Source locations attached to diagnostics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location of an AST node, supplied by the external parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TextLocation {
    /// The source text covered by the node
    #[serde(default)]
    pub text: String,
    /// Start byte offset
    #[serde(default)]
    pub start: usize,
    /// End byte offset
    #[serde(default)]
    pub end: usize,
    /// Start line (0-indexed)
    #[serde(default)]
    pub start_line: usize,
    /// Start column (0-indexed)
    #[serde(default)]
    pub start_col: usize,
    /// End line (0-indexed)
    #[serde(default)]
    pub end_line: usize,
    /// End column (0-indexed)
    #[serde(default)]
    pub end_col: usize,
}

impl TextLocation {
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            ..Self::default()
        }
    }

    /// Set line/column information
    pub fn with_lines(
        mut self,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        self.start_line = start_line;
        self.start_col = start_col;
        self.end_line = end_line;
        self.end_col = end_col;
        self
    }

    /// Create a location that covers both self and other
    pub fn merge(&self, other: &TextLocation) -> TextLocation {
        let (first, last) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        let end_source = if self.end >= other.end { self } else { other };

        TextLocation {
            text: if first.end >= last.start {
                first.text.clone()
            } else {
                format!("{} .. {}", first.text, last.text)
            },
            start: first.start,
            end: end_source.end,
            start_line: first.start_line,
            start_col: first.start_col,
            end_line: end_source.end_line,
            end_col: end_source.end_col,
        }
    }
}

impl fmt::Display for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, col {}",
            self.start_line + 1,
            self.start_col + 1
        )?;
        if !self.text.is_empty() {
            write!(f, " '{}'", self.text)?;
        }
        Ok(())
    }
}

/// Where an error happened: the step that raised it and, when known,
/// the source text of that step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorLocation {
    pub step_name: Option<String>,
    pub text_location: Option<TextLocation>,
}

impl ErrorLocation {
    /// A location that is not yet known
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn new(step_name: impl Into<String>, text_location: Option<TextLocation>) -> Self {
        Self {
            step_name: Some(step_name.into()),
            text_location,
        }
    }

    pub fn from_text(text_location: Option<TextLocation>) -> Self {
        Self {
            step_name: None,
            text_location,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.step_name.is_none() && self.text_location.is_none()
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.step_name, &self.text_location) {
            (Some(step), Some(text)) => write!(f, "{} at {}", step, text),
            (Some(step), None) => write!(f, "{}", step),
            (None, Some(text)) => write!(f, "{}", text),
            (None, None) => write!(f, "unknown location"),
        }
    }
}
