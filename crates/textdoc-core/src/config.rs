//! Document options.
//!
//! ## Learning: Serde for Serialization
//!
//! Serde is Rust's standard for serialization/deserialization.
//! The `#[derive(Serialize, Deserialize)]` macro generates
//! code to convert structs to/from TOML.
//!
//! `#[serde(default)]` uses Default::default() for missing fields,
//! so an empty file is a valid configuration.
//!
//! ```toml
//! buffer = "gap"
//! line_ending = "crlf"
//! line_breaks = "cr-lf-or-lf"
//! undo_limit = 200
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use textdoc_buffer::history::DEFAULT_UNDO_LIMIT;
use textdoc_buffer::{BufferStrategy, LineBreakMode, LineEnding};

use crate::event::DEFAULT_EVENT_CAPACITY;

/// Options a document is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    /// Storage strategy
    pub buffer: BufferStrategy,

    /// Newline used when the text itself gives no hint
    pub line_ending: LineEnding,

    /// Which delimiters split lines
    pub line_breaks: LineBreakMode,

    /// Maximum number of undo steps
    pub undo_limit: usize,

    /// Events buffered per async receiver
    pub event_capacity: usize,
}

impl DocumentOptions {
    /// Parses options from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads options from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Serializes the options as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            buffer: BufferStrategy::default(),
            line_ending: LineEnding::default(),
            line_breaks: LineBreakMode::default(),
            undo_limit: DEFAULT_UNDO_LIMIT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = DocumentOptions::default();
        assert_eq!(options.buffer, BufferStrategy::Rope);
        assert_eq!(options.line_ending, LineEnding::Lf);
        assert_eq!(options.line_breaks, LineBreakMode::Standard);
        assert_eq!(options.undo_limit, 1000);
    }

    #[test]
    fn test_options_serialization() {
        let options = DocumentOptions {
            buffer: BufferStrategy::Gap,
            line_ending: LineEnding::CrLf,
            ..DocumentOptions::default()
        };
        let toml = options.to_toml_string().unwrap();
        let parsed = DocumentOptions::from_toml_str(&toml).unwrap();
        assert_eq!(parsed, options);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let options = DocumentOptions::from_toml_str(
            r#"
            buffer = "gap"
            line_breaks = "cr-lf-or-lf"
            "#,
        )
        .unwrap();
        assert_eq!(options.buffer, BufferStrategy::Gap);
        assert_eq!(options.line_breaks, LineBreakMode::CrLfOrLf);
        assert_eq!(options.undo_limit, DEFAULT_UNDO_LIMIT);
    }

    #[test]
    fn test_bad_value_is_parse_error() {
        let err = DocumentOptions::from_toml_str("buffer = \"piece-table\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("textdoc.toml");
        std::fs::write(&path, "undo_limit = 3\nline_ending = \"cr\"\n").unwrap();

        let options = DocumentOptions::load_from(&path).unwrap();
        assert_eq!(options.undo_limit, 3);
        assert_eq!(options.line_ending, LineEnding::Cr);
        assert_eq!(options.buffer, BufferStrategy::Rope);
    }

    #[test]
    fn test_load_missing_file() {
        let err = DocumentOptions::load_from("/nonexistent/textdoc.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
