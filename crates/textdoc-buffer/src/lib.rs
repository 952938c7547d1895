//! # Textdoc Buffer
//!
//! The data structures behind a text document: character storage, the line
//! table, anchors, change records, the undo stack and the search helpers.
//!
//! Nothing in this crate knows about listeners or configuration files;
//! `textdoc-core` ties the pieces together into a `Document`.
//!
//! ## Key Concepts for Learning Rust
//!
//! ### Ownership & Borrowing
//! - A document exclusively owns its `TextStorage`, `LineTable` and
//!   `AnchorTable`; nothing else holds a reference into them
//! - Readers on other threads get a `TextSnapshot`, an owned copy that
//!   shares the rope's chunks
//!
//! ### Handles instead of references
//! - Anchors are addressed by generational `AnchorId`s, so a released
//!   anchor can never be read through an old handle
//!
//! ### Errors are values
//! - Every fallible operation validates its arguments first and returns a
//!   `BufferResult`; a failed call never leaves a structure half-modified

pub mod anchor;
pub mod change;
pub mod history;
pub mod line_table;
pub mod location;
pub mod search;
pub mod segment;
pub mod storage;

pub use anchor::{Anchor, AnchorId, AnchorMovementType, AnchorSegment, AnchorTable};
pub use change::{DocumentChange, OffsetChangeMap, OffsetChangeMapEntry, OffsetChangeMappingType};
pub use history::{OperationGroup, UndoOperation, UndoStack, UndoStackState};
pub use line_table::{Line, LineTable};
pub use location::TextLocation;
pub use search::{LineBreakMode, LineEnding};
pub use segment::Segment;
pub use storage::{BufferStrategy, GapStorage, RopeStorage, TextSnapshot, TextSource, TextStorage};

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("Offset {offset} is outside the text (length {text_length})")]
    OffsetOutOfRange { offset: usize, text_length: usize },

    #[error("Range {offset}+{length} is outside the text (length {text_length})")]
    RangeOutOfRange {
        offset: usize,
        length: usize,
        text_length: usize,
    },

    #[error("Line {line} does not exist (line count {line_count})")]
    LineOutOfRange { line: usize, line_count: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{0} was released")]
    StaleAnchor(AnchorId),
}

impl BufferError {
    /// Returns true for the out-of-range family of errors.
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            BufferError::OffsetOutOfRange { .. }
                | BufferError::RangeOutOfRange { .. }
                | BufferError::LineOutOfRange { .. }
        )
    }

    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, BufferError::InvalidOperation(_))
    }
}
