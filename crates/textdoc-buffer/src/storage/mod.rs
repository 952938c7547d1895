//! Character storage behind a document.
//!
//! ## Two strategies, one interface
//!
//! | Strategy      | Edit anywhere | Edit near last edit | Index   | Snapshot |
//! |---------------|---------------|---------------------|---------|----------|
//! | `RopeStorage` | O(log n)      | O(log n)            | O(log n)| O(1)     |
//! | `GapStorage`  | O(distance)   | amortised O(1)      | O(1)    | O(n)     |
//!
//! The rope is the default: it never degrades on large documents and its
//! snapshots are free thanks to structural sharing. The gap buffer wins for
//! the typical "typing at one caret" workload on small and medium documents.
//!
//! Everything outside this module talks to `dyn TextStorage`, so the
//! strategy is a run-time choice (see [`BufferStrategy`]).

mod gap;
mod rope;

pub use gap::GapStorage;
pub use rope::{RopeStorage, TextSnapshot};

use serde::{Deserialize, Serialize};

use crate::{BufferError, BufferResult};

/// Read-only access to a sequence of characters.
///
/// Offsets count Unicode scalar values (`char`s), not bytes.
pub trait TextSource {
    /// Number of characters.
    fn len_chars(&self) -> usize;

    /// Returns the character at `offset`.
    fn char_at(&self, offset: usize) -> BufferResult<char>;

    /// Returns `length` characters starting at `offset`.
    fn slice(&self, offset: usize, length: usize) -> BufferResult<String>;

    /// Iterates forward starting at `offset` (clamped to the length).
    fn chars_from(&self, offset: usize) -> Box<dyn Iterator<Item = char> + '_>;

    /// Iterates backward over the characters before `offset` (clamped),
    /// yielding `offset - 1`, `offset - 2`, ... down to `0`.
    fn chars_before(&self, offset: usize) -> Box<dyn Iterator<Item = char> + '_>;

    /// Returns the whole text.
    fn text(&self) -> String {
        self.chars_from(0).collect()
    }

    /// Returns true if there are no characters.
    fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }

    /// Finds the first occurrence of `needle` fully inside
    /// `[start, start + count)`.
    fn index_of(&self, needle: &str, start: usize, count: usize) -> BufferResult<Option<usize>> {
        check_range(start, count, self.len_chars())?;
        let needle: Vec<char> = needle.chars().collect();
        if needle.is_empty() {
            return Ok(Some(start));
        }
        let window: Vec<char> = self.chars_from(start).take(count).collect();
        Ok(window
            .windows(needle.len())
            .position(|w| w == needle.as_slice())
            .map(|pos| start + pos))
    }

    /// Finds the first character in `[start, start + count)` contained in `chars`.
    fn index_of_any(&self, chars: &[char], start: usize, count: usize) -> BufferResult<Option<usize>> {
        check_range(start, count, self.len_chars())?;
        Ok(self
            .chars_from(start)
            .take(count)
            .position(|c| chars.contains(&c))
            .map(|pos| start + pos))
    }

    /// Finds the last occurrence of `needle` fully inside
    /// `[start, start + count)`.
    fn last_index_of(&self, needle: &str, start: usize, count: usize) -> BufferResult<Option<usize>> {
        check_range(start, count, self.len_chars())?;
        let needle: Vec<char> = needle.chars().collect();
        if needle.is_empty() {
            return Ok(Some(start + count));
        }
        let window: Vec<char> = self.chars_from(start).take(count).collect();
        Ok(window
            .windows(needle.len())
            .rposition(|w| w == needle.as_slice())
            .map(|pos| start + pos))
    }
}

/// Mutable character storage.
///
/// Implementations must validate every argument before touching their
/// contents: a call that returns an error leaves the storage unchanged.
pub trait TextStorage: TextSource + std::fmt::Debug + Send {
    /// Inserts `text` at `offset` (`0 <= offset <= len`).
    fn insert(&mut self, offset: usize, text: &str) -> BufferResult<()>;

    /// Removes `length` characters at `offset` and returns them.
    fn remove(&mut self, offset: usize, length: usize) -> BufferResult<String>;

    /// Takes an immutable copy of the current text.
    fn snapshot(&self) -> TextSnapshot;

    /// Which strategy backs this storage.
    fn strategy(&self) -> BufferStrategy;
}

/// Selects the storage implementation for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferStrategy {
    /// Balanced rope (`ropey`)
    #[default]
    Rope,
    /// Gap buffer over `Vec<char>`
    Gap,
}

impl BufferStrategy {
    /// Creates storage of this kind holding `text`.
    pub fn create(self, text: &str) -> Box<dyn TextStorage> {
        match self {
            BufferStrategy::Rope => Box::new(RopeStorage::from(text)),
            BufferStrategy::Gap => Box::new(GapStorage::from(text)),
        }
    }
}

/// Validates a single offset against `[0, text_length]`.
pub fn check_offset(offset: usize, text_length: usize) -> BufferResult<()> {
    if offset > text_length {
        return Err(BufferError::OffsetOutOfRange {
            offset,
            text_length,
        });
    }
    Ok(())
}

/// Validates `[offset, offset + length)` against `[0, text_length]`.
pub fn check_range(offset: usize, length: usize, text_length: usize) -> BufferResult<()> {
    match offset.checked_add(length) {
        Some(end) if end <= text_length => Ok(()),
        _ => Err(BufferError::RangeOutOfRange {
            offset,
            length,
            text_length,
        }),
    }
}

/// Plain strings are text sources too.
///
/// Character offsets into a `str` cost O(n); this is meant for the pure
/// utilities and tests, not for documents.
impl TextSource for str {
    fn len_chars(&self) -> usize {
        self.chars().count()
    }

    fn char_at(&self, offset: usize) -> BufferResult<char> {
        self.chars().nth(offset).ok_or(BufferError::OffsetOutOfRange {
            offset,
            text_length: self.len_chars(),
        })
    }

    fn slice(&self, offset: usize, length: usize) -> BufferResult<String> {
        check_range(offset, length, self.len_chars())?;
        Ok(self.chars().skip(offset).take(length).collect())
    }

    fn chars_from(&self, offset: usize) -> Box<dyn Iterator<Item = char> + '_> {
        Box::new(self.chars().skip(offset))
    }

    fn chars_before(&self, offset: usize) -> Box<dyn Iterator<Item = char> + '_> {
        let byte = self
            .char_indices()
            .nth(offset)
            .map(|(i, _)| i)
            .unwrap_or(self.len());
        Box::new(self[..byte].chars().rev())
    }

    fn text(&self) -> String {
        self.to_string()
    }
}
