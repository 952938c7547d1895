//! Line/column coordinates.
//!
//! ## Learning: Newtype Pattern
//!
//! `TextLocation` wraps line/column coordinates instead of passing
//! `(usize, usize)` around:
//! - Type safety: Can't accidentally swap line and column
//! - Named fields: Self-documenting code
//! - Ordering: Locations compare line-major, like positions in a file

use serde::{Deserialize, Serialize};

/// A position in a document expressed as line and column.
///
/// Both line and column are **1-based**, matching how editors display them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextLocation {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, in characters)
    pub column: usize,
}

impl TextLocation {
    /// Creates a new location.
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// The "no location" value (0:0). Never produced by a document.
    pub const EMPTY: TextLocation = TextLocation { line: 0, column: 0 };

    /// Returns true if this is [`TextLocation::EMPTY`].
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Returns true if this location is before another.
    pub fn is_before(&self, other: &TextLocation) -> bool {
        self.line < other.line || (self.line == other.line && self.column < other.column)
    }
}

impl PartialOrd for TextLocation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TextLocation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.line.cmp(&other.line) {
            std::cmp::Ordering::Equal => self.column.cmp(&other.column),
            other => other,
        }
    }
}

impl std::fmt::Display for TextLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_line_major() {
        let a = TextLocation::new(1, 9);
        let b = TextLocation::new(2, 1);
        assert!(a < b);
        assert!(a.is_before(&b));
        assert!(!b.is_before(&a));
        assert_eq!(a.max(b), b);
    }

    #[test]
    fn test_display() {
        assert_eq!(TextLocation::new(3, 7).to_string(), "3:7");
        assert!(TextLocation::EMPTY.is_empty());
    }
}
