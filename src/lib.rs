//! # Textdoc
//!
//! An in-memory text document for editors: rope or gap-buffer storage, a
//! balanced line index, anchors that follow edits, grouped undo/redo and
//! ordered change notification.
//!
//! ## Quick Start
//!
//! ```
//! use textdoc::{Document, DocumentEvent};
//!
//! let mut doc = Document::from("fn main() {}\n");
//! let caret = doc.create_anchor(10).unwrap();
//!
//! doc.subscribe(|doc, event| {
//!     if let DocumentEvent::Changed(change) = event {
//!         println!("{} chars at {} -> {} lines", change.insertion_length(), change.offset(), doc.line_count());
//!     }
//! });
//!
//! doc.insert(0, "pub ").unwrap();
//! assert_eq!(doc.anchor_offset(caret).unwrap(), 14);
//!
//! doc.undo().unwrap();
//! assert_eq!(doc.text(), "fn main() {}\n");
//! ```
//!
//! ## Crates
//!
//! - `textdoc-buffer`: storage, line table, anchors, change records, undo
//!   stack and search helpers
//! - `textdoc-core`: the `Document` that ties them together, its events and
//!   options

pub use textdoc_buffer as buffer;

pub use textdoc_buffer::{
    search, AnchorId, AnchorMovementType, AnchorSegment, BufferError, BufferResult,
    BufferStrategy, DocumentChange, Line, LineBreakMode, LineEnding, OffsetChangeMap,
    OffsetChangeMapEntry, OffsetChangeMappingType, Segment, TextLocation, TextSnapshot,
    TextSource,
};
pub use textdoc_core::{
    CoreError, CoreResult, Document, DocumentEvent, DocumentId, DocumentNotification,
    DocumentOptions, EventHandler, ListenerToken, UndoGroup,
};
