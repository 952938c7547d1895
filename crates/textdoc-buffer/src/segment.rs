//! Offset ranges and the overlap algebra used by editing features.
//!
//! ## Learning: Option instead of a sentinel
//!
//! Ranges that don't intersect have no overlap. Rather than returning a
//! magic "invalid" segment, `overlap` returns `Option<Segment>` so callers
//! are forced to handle the disjoint case.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A range of text described by a start offset and a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Segment {
    /// Start offset (inclusive)
    pub offset: usize,
    /// Number of characters covered
    pub length: usize,
}

impl Segment {
    /// Creates a new segment.
    pub const fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// Creates an empty segment at an offset.
    pub const fn empty_at(offset: usize) -> Self {
        Self { offset, length: 0 }
    }

    /// Creates a segment from a half-open range.
    ///
    /// Reversed ranges produce an empty segment at `range.start`.
    pub fn from_range(range: Range<usize>) -> Self {
        Self {
            offset: range.start,
            length: range.end.saturating_sub(range.start),
        }
    }

    /// Offset just past the last character.
    #[inline]
    pub const fn end_offset(&self) -> usize {
        self.offset + self.length
    }

    /// Returns true if the segment covers no characters.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns true if `offset` lies in `[self.offset, self.end_offset()]`.
    ///
    /// The end is inclusive: a caret sitting right after a segment is
    /// considered to touch it.
    pub fn contains_offset(&self, offset: usize) -> bool {
        offset >= self.offset && offset <= self.end_offset()
    }

    /// Returns the segment as a half-open range.
    pub fn to_range(&self) -> Range<usize> {
        self.offset..self.end_offset()
    }

    /// Returns the intersection with another segment.
    pub fn overlap(&self, other: &Segment) -> Option<Segment> {
        overlap(*self, *other)
    }

    /// Returns true if `other` lies completely within this segment.
    pub fn contains(&self, other: &Segment) -> bool {
        contains(*self, *other)
    }
}

impl From<Range<usize>> for Segment {
    fn from(range: Range<usize>) -> Self {
        Self::from_range(range)
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end_offset())
    }
}

/// Returns the intersection of two segments.
///
/// Segments that merely touch (`a.end == b.start`) overlap in an empty
/// segment; segments with a gap between them return `None`.
pub fn overlap(a: Segment, b: Segment) -> Option<Segment> {
    let start = a.offset.max(b.offset);
    let end = a.end_offset().min(b.end_offset());
    if start <= end {
        Some(Segment::new(start, end - start))
    } else {
        None
    }
}

/// Returns true if `other` lies completely inside `container`.
pub fn contains(container: Segment, other: Segment) -> bool {
    overlap(container, other) == Some(other)
}
