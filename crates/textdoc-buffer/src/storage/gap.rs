//! Gap buffer storage.
//!
//! A gap buffer is a character array with a movable gap at the position of
//! the last edit. Insertions and deletions at the gap are O(1); moving the
//! gap is O(distance) but amortises well because edits tend to cluster
//! around the caret.

use super::{check_offset, check_range, BufferStrategy, TextSnapshot, TextSource, TextStorage};
use crate::{BufferError, BufferResult};

const INITIAL_GAP_SIZE: usize = 64;
const GAP_GROWTH_FACTOR: usize = 2;

/// Storage backed by a gap buffer.
#[derive(Debug, Clone)]
pub struct GapStorage {
    /// [pre-gap content | gap | post-gap content]
    data: Vec<char>,
    /// First unused slot.
    gap_start: usize,
    /// First used slot after the gap.
    gap_end: usize,
}

impl GapStorage {
    /// Creates an empty gap buffer.
    pub fn new() -> Self {
        Self {
            data: vec!['\0'; INITIAL_GAP_SIZE],
            gap_start: 0,
            gap_end: INITIAL_GAP_SIZE,
        }
    }

    #[inline]
    fn gap_len(&self) -> usize {
        self.gap_end - self.gap_start
    }

    /// Logical position of the gap.
    pub fn gap_position(&self) -> usize {
        self.gap_start
    }

    /// Moves the gap so that it starts at logical position `pos`.
    fn move_gap_to(&mut self, pos: usize) {
        if pos < self.gap_start {
            let shift = self.gap_start - pos;
            self.data
                .copy_within(pos..self.gap_start, self.gap_end - shift);
            self.gap_start = pos;
            self.gap_end -= shift;
        } else if pos > self.gap_start {
            let shift = pos - self.gap_start;
            self.data
                .copy_within(self.gap_end..self.gap_end + shift, self.gap_start);
            self.gap_start += shift;
            self.gap_end += shift;
        }
    }

    /// Grows the gap in place to at least `min_size` slots.
    ///
    /// The gap keeps its logical position.
    fn ensure_gap(&mut self, min_size: usize) {
        if self.gap_len() >= min_size {
            return;
        }

        let needed = min_size - self.gap_len();
        let growth = needed.max(self.data.len() * GAP_GROWTH_FACTOR);

        let old_len = self.data.len();
        let post_gap_len = old_len - self.gap_end;
        let new_size = old_len + growth;
        self.data.resize(new_size, '\0');

        if post_gap_len > 0 {
            self.data
                .copy_within(self.gap_end..old_len, new_size - post_gap_len);
        }
        self.gap_end = new_size - post_gap_len;
    }

    #[inline]
    fn physical(&self, pos: usize) -> usize {
        if pos < self.gap_start {
            pos
        } else {
            pos + self.gap_len()
        }
    }
}

impl Default for GapStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for GapStorage {
    fn from(text: &str) -> Self {
        let mut data: Vec<char> = text.chars().collect();
        let len = data.len();
        let capacity = len + INITIAL_GAP_SIZE;
        data.resize(capacity, '\0');

        Self {
            data,
            gap_start: len,
            gap_end: capacity,
        }
    }
}

impl TextSource for GapStorage {
    #[inline]
    fn len_chars(&self) -> usize {
        self.data.len() - self.gap_len()
    }

    fn char_at(&self, offset: usize) -> BufferResult<char> {
        if offset >= self.len_chars() {
            return Err(BufferError::OffsetOutOfRange {
                offset,
                text_length: self.len_chars(),
            });
        }
        Ok(self.data[self.physical(offset)])
    }

    fn slice(&self, offset: usize, length: usize) -> BufferResult<String> {
        check_range(offset, length, self.len_chars())?;
        Ok(self.chars_from(offset).take(length).collect())
    }

    fn chars_from(&self, offset: usize) -> Box<dyn Iterator<Item = char> + '_> {
        let offset = offset.min(self.len_chars());
        if offset < self.gap_start {
            Box::new(
                self.data[offset..self.gap_start]
                    .iter()
                    .chain(self.data[self.gap_end..].iter())
                    .copied(),
            )
        } else {
            Box::new(self.data[self.physical(offset)..].iter().copied())
        }
    }

    fn chars_before(&self, offset: usize) -> Box<dyn Iterator<Item = char> + '_> {
        let offset = offset.min(self.len_chars());
        if offset <= self.gap_start {
            Box::new(self.data[..offset].iter().rev().copied())
        } else {
            let physical_end = self.physical(offset);
            Box::new(
                self.data[self.gap_end..physical_end]
                    .iter()
                    .rev()
                    .chain(self.data[..self.gap_start].iter().rev())
                    .copied(),
            )
        }
    }
}

impl TextStorage for GapStorage {
    fn insert(&mut self, offset: usize, text: &str) -> BufferResult<()> {
        check_offset(offset, self.len_chars())?;
        if text.is_empty() {
            return Ok(());
        }
        let count = text.chars().count();
        self.move_gap_to(offset);
        self.ensure_gap(count);
        for ch in text.chars() {
            self.data[self.gap_start] = ch;
            self.gap_start += 1;
        }
        Ok(())
    }

    fn remove(&mut self, offset: usize, length: usize) -> BufferResult<String> {
        check_range(offset, length, self.len_chars())?;
        let removed = self.slice(offset, length)?;
        self.move_gap_to(offset);
        self.gap_end += length;
        Ok(removed)
    }

    fn snapshot(&self) -> TextSnapshot {
        TextSnapshot::new(ropey::Rope::from_str(&self.text()), 0)
    }

    fn strategy(&self) -> BufferStrategy {
        BufferStrategy::Gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_empty() {
        let buf = GapStorage::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len_chars(), 0);
    }

    #[test]
    fn test_gap_follows_edits() {
        let mut buf = GapStorage::from("abcdef");
        assert_eq!(buf.gap_position(), 6);

        buf.insert(3, "X").unwrap();
        assert_eq!(buf.gap_position(), 4);
        assert_eq!(buf.text(), "abcXdef");

        buf.remove(0, 1).unwrap();
        assert_eq!(buf.gap_position(), 0);
        assert_eq!(buf.text(), "bcXdef");
    }

    #[test]
    fn test_growth_preserves_content() {
        let mut buf = GapStorage::from("head|tail");
        let big: String = std::iter::repeat('x').take(500).collect();
        buf.insert(5, &big).unwrap();
        assert_eq!(buf.len_chars(), 509);
        assert_eq!(buf.slice(0, 5).unwrap(), "head|");
        assert_eq!(buf.slice(505, 4).unwrap(), "tail");
    }

    #[test]
    fn test_char_at_with_gap_in_middle() {
        let mut buf = GapStorage::from("hello");
        buf.insert(2, "").unwrap();
        buf.remove(2, 0).unwrap();
        assert_eq!(buf.char_at(0).unwrap(), 'h');
        assert_eq!(buf.char_at(2).unwrap(), 'l');
        assert_eq!(buf.char_at(4).unwrap(), 'o');
        assert!(buf.char_at(5).is_err());
    }

    #[test]
    fn test_snapshot() {
        let buf = GapStorage::from("snap");
        assert_eq!(buf.snapshot().text(), "snap");
    }
}
