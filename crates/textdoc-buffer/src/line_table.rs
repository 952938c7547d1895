//! Line table: line numbers ⇄ character offsets.
//!
//! ## Structure
//!
//! Lines live in an implicit treap (a randomised balanced binary tree
//! ordered by position, not by key). Every node stores the *length* of its
//! line, never its absolute offset; each subtree caches the sum of the
//! lengths and the number of lines below it. An absolute offset is
//! therefore recovered on the way down the tree, and an edit only touches
//! the lines it actually changes:
//!
//! ```text
//!            [line 3: len 6]          offset(line 4) = total(left) + 6
//!           /              \                           + total(left of right)
//!   [line 1..2: 8 chars]  [line 4..5: 11 chars]
//! ```
//!
//! - `line_at(offset)` / `line(number)`: O(log n)
//! - `apply_edit`: O(log n + k), k = lines rescanned
//!
//! Nodes are stored in a `Vec` arena and linked by index, so the tree needs
//! no `Box`/`Rc` juggling and freed slots are recycled.

use crate::location::TextLocation;
use crate::search::LineBreakMode;
use crate::segment::Segment;
use crate::storage::{check_offset, check_range, TextSource};
use crate::{BufferError, BufferResult};

const NIL: u32 = u32::MAX;

/// One physical line.
///
/// Lines are values: they describe the line at the time they were obtained
/// and are not updated by later edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Line {
    /// Line number (1-based)
    pub number: usize,
    /// Offset of the first character
    pub offset: usize,
    /// Length excluding the delimiter
    pub length: usize,
    /// 0 (last line), 1 (`\n` or `\r`) or 2 (`\r\n`)
    pub delimiter_length: usize,
}

impl Line {
    /// Offset just past the content (where the delimiter starts).
    #[inline]
    pub fn end_offset(&self) -> usize {
        self.offset + self.length
    }

    /// Length including the delimiter.
    #[inline]
    pub fn total_length(&self) -> usize {
        self.length + self.delimiter_length
    }

    /// The line's content as a segment.
    pub fn segment(&self) -> Segment {
        Segment::new(self.offset, self.length)
    }

    /// The delimiter as a segment (empty for the last line).
    pub fn delimiter_segment(&self) -> Segment {
        Segment::new(self.end_offset(), self.delimiter_length)
    }
}

#[derive(Debug, Clone)]
struct Node {
    left: u32,
    right: u32,
    priority: u32,
    /// Length of this line including its delimiter.
    total: usize,
    delimiter: u8,
    subtree_total: usize,
    subtree_count: usize,
}

/// Incrementally maintained index of the lines of a text.
#[derive(Debug, Clone)]
pub struct LineTable {
    nodes: Vec<Node>,
    free: Vec<u32>,
    root: u32,
    rng: u64,
    mode: LineBreakMode,
}

impl LineTable {
    /// Creates the table of an empty text: a single empty line.
    pub fn new() -> Self {
        Self::with_mode(LineBreakMode::Standard)
    }

    /// Creates an empty-text table using the given delimiter rules.
    pub fn with_mode(mode: LineBreakMode) -> Self {
        let mut table = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NIL,
            rng: 0x9E37_79B9_7F4A_7C15,
            mode,
        };
        table.root = table.alloc(0, 0);
        table
    }

    /// Builds the table for `source`.
    pub fn from_source<S: TextSource + ?Sized>(source: &S, mode: LineBreakMode) -> Self {
        let mut table = Self::with_mode(mode);
        table.rebuild(source);
        table
    }

    /// Delimiter rules in effect.
    pub fn mode(&self) -> LineBreakMode {
        self.mode
    }

    /// Discards all lines and rescans `source` from scratch.
    pub fn rebuild<S: TextSource + ?Sized>(&mut self, source: &S) {
        self.nodes.clear();
        self.free.clear();
        self.root = NIL;
        let lines = scan_lines(source.chars_from(0), self.mode);
        self.root = self.build(&lines);
    }

    /// Number of lines (always at least 1).
    #[inline]
    pub fn line_count(&self) -> usize {
        self.count(self.root)
    }

    /// Length of the indexed text.
    #[inline]
    pub fn text_length(&self) -> usize {
        self.total(self.root)
    }

    /// Returns line `number` (1-based).
    pub fn line(&self, number: usize) -> BufferResult<Line> {
        if number == 0 || number > self.line_count() {
            return Err(BufferError::LineOutOfRange {
                line: number,
                line_count: self.line_count(),
            });
        }
        let (node, offset) = self.find_by_index(number - 1);
        Ok(self.make_line(node, number - 1, offset))
    }

    /// Returns the line containing `offset` (`0 <= offset <= text_length`).
    ///
    /// An offset inside a delimiter belongs to the line the delimiter ends.
    pub fn line_at(&self, offset: usize) -> BufferResult<Line> {
        check_offset(offset, self.text_length())?;
        let (node, index, start) = self.find_by_offset(offset);
        Ok(self.make_line(node, index, start))
    }

    /// Converts an offset to a 1-based line/column location.
    pub fn location_of(&self, offset: usize) -> BufferResult<TextLocation> {
        let line = self.line_at(offset)?;
        Ok(TextLocation::new(line.number, offset - line.offset + 1))
    }

    /// Converts a 1-based line/column to an offset.
    ///
    /// The line must exist; the column is clamped into the line
    /// (`column < 1` → line start, past the end → end of content).
    pub fn offset_of(&self, line: usize, column: usize) -> BufferResult<usize> {
        let line = self.line(line)?;
        Ok(line.offset + (column.max(1) - 1).min(line.length))
    }

    /// Iterates over all lines in order.
    pub fn lines(&self) -> Lines<'_> {
        let mut lines = Lines {
            table: self,
            stack: Vec::new(),
            number: 0,
            offset: 0,
        };
        lines.push_left(self.root);
        lines
    }

    /// Updates the table after the text changed.
    ///
    /// `text_after` is the text *after* `removed` characters at `offset`
    /// were replaced with `inserted` characters. The table itself must still
    /// describe the text before the edit. Only the lines touched by the
    /// edit are rescanned.
    pub fn apply_edit<S: TextSource + ?Sized>(
        &mut self,
        text_after: &S,
        offset: usize,
        removed: usize,
        inserted: usize,
    ) -> BufferResult<()> {
        let old_length = self.text_length();
        check_range(offset, removed, old_length)?;
        debug_assert_eq!(text_after.len_chars(), old_length - removed + inserted);

        let (_, mut first, mut region_start) = self.find_by_offset(offset);
        if offset == region_start && first > 0 {
            // A delimiter ending the previous line may merge with or lose
            // characters at our start (`\r` + `\n`).
            first -= 1;
            let (node, start) = self.find_by_index(first);
            debug_assert_eq!(start + self.nodes[node as usize].total, region_start);
            region_start = start;
        }
        let (last_node, last, last_start) = self.find_by_offset(offset + removed);
        let region_end = last_start + self.nodes[last_node as usize].total;
        // Only the final line has no delimiter; every other region ends with
        // one, even when the final line behind it is empty.
        let reaches_end = last + 1 == self.line_count();

        let new_region_length = region_end + inserted - removed - region_start;
        let mut lines = scan_lines(
            text_after.chars_from(region_start).take(new_region_length),
            self.mode,
        );
        if !reaches_end {
            // The region ends with an untouched delimiter, so the scan
            // produced an empty trailing piece that belongs to the next line.
            debug_assert_eq!(lines.last(), Some(&(0, 0)));
            lines.pop();
        }

        let (before, rest) = self.split(self.root, first);
        let (old, after) = self.split(rest, last - first + 1);
        self.release_subtree(old);
        let fresh = self.build(&lines);
        let merged = self.merge(before, fresh);
        self.root = self.merge(merged, after);

        tracing::trace!(
            offset,
            removed,
            inserted,
            rescanned = lines.len(),
            line_count = self.line_count(),
            "line table updated"
        );
        Ok(())
    }

    // ==================== Tree internals ====================

    #[inline]
    fn count(&self, t: u32) -> usize {
        if t == NIL {
            0
        } else {
            self.nodes[t as usize].subtree_count
        }
    }

    #[inline]
    fn total(&self, t: u32) -> usize {
        if t == NIL {
            0
        } else {
            self.nodes[t as usize].subtree_total
        }
    }

    fn next_priority(&mut self) -> u32 {
        // xorshift64*
        self.rng ^= self.rng >> 12;
        self.rng ^= self.rng << 25;
        self.rng ^= self.rng >> 27;
        (self.rng.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 32) as u32
    }

    fn alloc(&mut self, total: usize, delimiter: u8) -> u32 {
        let node = Node {
            left: NIL,
            right: NIL,
            priority: self.next_priority(),
            total,
            delimiter,
            subtree_total: total,
            subtree_count: 1,
        };
        match self.free.pop() {
            Some(index) => {
                self.nodes[index as usize] = node;
                index
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    fn release_subtree(&mut self, t: u32) {
        let mut stack = vec![t];
        while let Some(t) = stack.pop() {
            if t == NIL {
                continue;
            }
            let node = &self.nodes[t as usize];
            stack.push(node.left);
            stack.push(node.right);
            self.free.push(t);
        }
    }

    fn update(&mut self, t: u32) {
        let (left, right) = {
            let node = &self.nodes[t as usize];
            (node.left, node.right)
        };
        let subtree_total = self.total(left) + self.total(right) + self.nodes[t as usize].total;
        let subtree_count = self.count(left) + self.count(right) + 1;
        let node = &mut self.nodes[t as usize];
        node.subtree_total = subtree_total;
        node.subtree_count = subtree_count;
    }

    /// Splits `t` into its first `k` lines and the rest.
    fn split(&mut self, t: u32, k: usize) -> (u32, u32) {
        if t == NIL {
            return (NIL, NIL);
        }
        let left = self.nodes[t as usize].left;
        let left_count = self.count(left);
        if k <= left_count {
            let (l, r) = self.split(left, k);
            self.nodes[t as usize].left = r;
            self.update(t);
            (l, t)
        } else {
            let right = self.nodes[t as usize].right;
            let (l, r) = self.split(right, k - left_count - 1);
            self.nodes[t as usize].right = l;
            self.update(t);
            (t, r)
        }
    }

    /// Concatenates two trees (all of `a` precedes all of `b`).
    fn merge(&mut self, a: u32, b: u32) -> u32 {
        if a == NIL {
            return b;
        }
        if b == NIL {
            return a;
        }
        if self.nodes[a as usize].priority > self.nodes[b as usize].priority {
            let right = self.nodes[a as usize].right;
            let merged = self.merge(right, b);
            self.nodes[a as usize].right = merged;
            self.update(a);
            a
        } else {
            let left = self.nodes[b as usize].left;
            let merged = self.merge(a, left);
            self.nodes[b as usize].left = merged;
            self.update(b);
            b
        }
    }

    fn build(&mut self, lines: &[(usize, u8)]) -> u32 {
        let mut root = NIL;
        for &(total, delimiter) in lines {
            let node = self.alloc(total, delimiter);
            root = self.merge(root, node);
        }
        root
    }

    /// Returns `(node, start offset)` of the line at 0-based `index`.
    fn find_by_index(&self, mut index: usize) -> (u32, usize) {
        let mut t = self.root;
        let mut base = 0;
        loop {
            let node = &self.nodes[t as usize];
            let left_count = self.count(node.left);
            if index < left_count {
                t = node.left;
            } else if index == left_count {
                return (t, base + self.total(node.left));
            } else {
                index -= left_count + 1;
                base += self.total(node.left) + node.total;
                t = node.right;
            }
        }
    }

    /// Returns `(node, 0-based index, start offset)` of the line holding `offset`.
    fn find_by_offset(&self, offset: usize) -> (u32, usize, usize) {
        if offset >= self.text_length() {
            let last = self.line_count() - 1;
            let (node, start) = self.find_by_index(last);
            return (node, last, start);
        }
        let mut t = self.root;
        let mut base = 0;
        let mut index = 0;
        loop {
            let node = &self.nodes[t as usize];
            let left_total = self.total(node.left);
            if offset < base + left_total {
                t = node.left;
            } else if offset < base + left_total + node.total {
                return (t, index + self.count(node.left), base + left_total);
            } else {
                base += left_total + node.total;
                index += self.count(node.left) + 1;
                t = node.right;
            }
        }
    }

    fn make_line(&self, t: u32, index: usize, offset: usize) -> Line {
        let node = &self.nodes[t as usize];
        Line {
            number: index + 1,
            offset,
            length: node.total - node.delimiter as usize,
            delimiter_length: node.delimiter as usize,
        }
    }
}

impl Default for LineTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits characters into `(total length, delimiter length)` pieces.
///
/// The final piece has no delimiter and may be empty.
fn scan_lines(chars: impl Iterator<Item = char>, mode: LineBreakMode) -> Vec<(usize, u8)> {
    let mut lines = Vec::new();
    let mut current = 0;
    let mut chars = chars.peekable();
    while let Some(c) = chars.next() {
        current += 1;
        match c {
            '\n' => {
                lines.push((current, 1));
                current = 0;
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    lines.push((current + 1, 2));
                    current = 0;
                } else if mode == LineBreakMode::Standard {
                    lines.push((current, 1));
                    current = 0;
                }
            }
            _ => {}
        }
    }
    lines.push((current, 0));
    lines
}

/// In-order iterator over the lines of a [`LineTable`].
pub struct Lines<'a> {
    table: &'a LineTable,
    stack: Vec<u32>,
    number: usize,
    offset: usize,
}

impl Lines<'_> {
    fn push_left(&mut self, mut t: u32) {
        while t != NIL {
            self.stack.push(t);
            t = self.table.nodes[t as usize].left;
        }
    }
}

impl Iterator for Lines<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        let t = self.stack.pop()?;
        let line = self.table.make_line(t, self.number, self.offset);
        self.number += 1;
        self.offset += line.total_length();
        self.push_left(self.table.nodes[t as usize].right);
        Some(line)
    }
}
