//! Newline handling and character scanning over any [`TextSource`].
//!
//! The scanners here back editor features such as bracket matching and
//! link detection, so they are forgiving about their inputs:
//! indices are `isize`, and out-of-range values are clamped instead of
//! reported as errors.

use serde::{Deserialize, Serialize};

use crate::segment::Segment;
use crate::storage::TextSource;
use crate::{BufferError, BufferResult};

/// Line ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style: \n
    #[default]
    Lf,
    /// Windows-style: \r\n
    CrLf,
    /// Classic Mac: \r
    Cr,
}

impl LineEnding {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }

    /// Parses one of the three canonical delimiters.
    pub fn from_newline(newline: &str) -> Option<Self> {
        match newline {
            "\n" => Some(LineEnding::Lf),
            "\r\n" => Some(LineEnding::CrLf),
            "\r" => Some(LineEnding::Cr),
            _ => None,
        }
    }

    /// Detects the line ending used by the first delimiter in `text`.
    pub fn detect(text: &str) -> Option<Self> {
        let segment = find_next_newline(text, 0)?;
        Some(match (segment.length, text.chars().nth(segment.offset)) {
            (2, _) => LineEnding::CrLf,
            (_, Some('\r')) => LineEnding::Cr,
            _ => LineEnding::Lf,
        })
    }

    /// Length of the delimiter in characters.
    pub fn delimiter_length(&self) -> usize {
        self.as_str().len()
    }
}

/// Which character sequences terminate a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineBreakMode {
    /// `\r\n`, `\n` and a lone `\r` all end a line.
    #[default]
    Standard,
    /// Only `\r\n` and `\n` end a line; a lone `\r` is ordinary content.
    CrLfOrLf,
}

/// Finds the next line delimiter at or after `offset`.
///
/// Recognises `\r\n` (length 2), `\n` and `\r`.
pub fn find_next_newline<S: TextSource + ?Sized>(source: &S, offset: usize) -> Option<Segment> {
    find_next_newline_with(source, offset, LineBreakMode::Standard)
}

/// Like [`find_next_newline`], honouring a [`LineBreakMode`].
pub fn find_next_newline_with<S: TextSource + ?Sized>(
    source: &S,
    offset: usize,
    mode: LineBreakMode,
) -> Option<Segment> {
    let mut chars = source.chars_from(offset).peekable();
    let mut pos = offset;
    while let Some(c) = chars.next() {
        match c {
            '\n' => return Some(Segment::new(pos, 1)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    return Some(Segment::new(pos, 2));
                }
                if mode == LineBreakMode::Standard {
                    return Some(Segment::new(pos, 1));
                }
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

/// Returns true for `\r` and `\n`.
pub fn is_newline_char(c: char) -> bool {
    c == '\r' || c == '\n'
}

/// Rewrites every recognised delimiter in `input` to `target`.
///
/// `target` must be `"\n"`, `"\r\n"` or `"\r"`.
pub fn normalize_newlines(input: &str, target: &str) -> BufferResult<String> {
    let ending = LineEnding::from_newline(target).ok_or_else(|| {
        BufferError::InvalidArgument(format!("{target:?} is not a line delimiter"))
    })?;
    let target = ending.as_str();

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str(target);
            }
            '\n' => out.push_str(target),
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// Clamps `[start, end)` into `[0, len]`.
fn clamp_forward(start: isize, end: isize, len: usize) -> (usize, usize) {
    let start = start.max(0) as usize;
    let end = end.max(0) as usize;
    (start.min(len), end.min(len))
}

/// Finds the first character of `set` in `[start, end)`.
///
/// `end` is clamped to the text length and a negative `start` to 0.
pub fn find_any_char<S: TextSource + ?Sized>(
    source: &S,
    start: isize,
    end: isize,
    set: &[char],
) -> Option<usize> {
    let (start, end) = clamp_forward(start, end, source.len_chars());
    if start >= end {
        return None;
    }
    source
        .chars_from(start)
        .take(end - start)
        .position(|c| set.contains(&c))
        .map(|pos| start + pos)
}

fn scan_reverse<S, F>(source: &S, start: isize, end: isize, mut hit: F) -> Option<usize>
where
    S: TextSource + ?Sized,
    F: FnMut(char) -> bool,
{
    let len = source.len_chars();
    if len == 0 || end < 0 {
        return None;
    }
    let start = start.max(0) as usize;
    let end = (end as usize).min(len - 1);
    if start > end {
        return None;
    }
    source
        .chars_before(end + 1)
        .take(end + 1 - start)
        .position(&mut hit)
        .map(|steps| end - steps)
}

/// Scans backward from `end` (inclusive) down to `start` for a character of
/// `set`.
///
/// `end` is clamped to the last character and a negative `start` to 0.
pub fn find_any_char_reverse<S: TextSource + ?Sized>(
    source: &S,
    start: isize,
    end: isize,
    set: &[char],
) -> Option<usize> {
    scan_reverse(source, start, end, |c| set.contains(&c))
}

/// Scans backward from `end` (inclusive) down to `start` for a character
/// *not* in `set`.
pub fn find_any_char_except_reverse<S: TextSource + ?Sized>(
    source: &S,
    start: isize,
    end: isize,
    set: &[char],
) -> Option<usize> {
    scan_reverse(source, start, end, |c| !set.contains(&c))
}

/// Finds `chars` one after another inside `[start, end)`.
///
/// Each character is searched for after the previous match. The result
/// holds the offsets of every character found, in order; it stops at the
/// first character that is missing, so a partial match yields a shorter
/// vector.
///
/// ```
/// use textdoc_buffer::search::find_chars_pattern;
///
/// let text = "[Test](http://test.com)";
/// assert_eq!(find_chars_pattern(text, 0, 100, &['[', ']', '(', ')']), vec![0, 5, 6, 22]);
/// assert_eq!(find_chars_pattern(text, 0, 100, &['[', '{']), vec![0]);
/// ```
pub fn find_chars_pattern<S: TextSource + ?Sized>(
    source: &S,
    start: isize,
    end: isize,
    chars: &[char],
) -> Vec<usize> {
    let mut found = Vec::with_capacity(chars.len());
    let mut pos = start;
    for &c in chars {
        match find_any_char(source, pos, end, &[c]) {
            Some(offset) => {
                found.push(offset);
                pos = offset as isize + 1;
            }
            None => break,
        }
    }
    found
}

/// Finds `needles` one after another inside `[start, end)`.
///
/// Works like [`find_chars_pattern`] with whole strings: each needle must
/// start after the end of the previous match. Used to pair up multi-char
/// delimiters such as fenced code blocks.
pub fn match_strings<S: TextSource + ?Sized>(
    source: &S,
    start: isize,
    end: isize,
    needles: &[&str],
) -> Vec<usize> {
    let len = source.len_chars();
    let (mut pos, end) = clamp_forward(start, end, len);
    let mut found = Vec::with_capacity(needles.len());
    for needle in needles {
        if pos > end {
            break;
        }
        match source.index_of(needle, pos, end - pos) {
            Ok(Some(offset)) => {
                found.push(offset);
                pos = offset + needle.chars().count();
            }
            _ => break,
        }
    }
    found
}

/// Returns the run of spaces and tabs starting at `offset`.
pub fn whitespace_after<S: TextSource + ?Sized>(source: &S, offset: usize) -> Segment {
    let length = source
        .chars_from(offset)
        .take_while(|&c| c == ' ' || c == '\t')
        .count();
    Segment::new(offset.min(source.len_chars()), length)
}

/// Returns the run of spaces and tabs ending at `offset`.
pub fn whitespace_before<S: TextSource + ?Sized>(source: &S, offset: usize) -> Segment {
    let offset = offset.min(source.len_chars());
    let length = source
        .chars_before(offset)
        .take_while(|&c| c == ' ' || c == '\t')
        .count();
    Segment::new(offset - length, length)
}
