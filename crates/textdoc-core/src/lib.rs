//! # Textdoc Core
//!
//! The `Document`: a mutable text with a line index, anchors, grouped
//! undo/redo and change notification.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Document                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐│
//! │  │ TextStorage │ │  LineTable  │ │     AnchorTable     ││
//! │  │ (rope/gap)  │ │   (treap)   │ │  (generational ids) ││
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘│
//! │         │                                                │
//! │  ┌──────┴──────────────────┐  ┌────────────────────────┐│
//! │  │        UndoStack        │  │ Listeners + EventBus   ││
//! │  │  groups of changes      │  │ sync + tokio broadcast ││
//! │  └─────────────────────────┘  └────────────────────────┘│
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The data structures live in `textdoc-buffer`; this crate keeps them in
//! step and decides when observers hear about it.
//!
//! ## Learning: Module Organization
//!
//! Rust modules map to files:
//! - `mod foo;` looks for `foo.rs` or `foo/mod.rs`
//! - `pub use` re-exports items for cleaner public APIs

pub mod config;
pub mod document;
pub mod event;

pub use config::{ConfigError, DocumentOptions};
pub use document::{Document, DocumentId, UndoGroup};
pub use event::{
    DocumentEvent, DocumentNotification, EventBus, EventHandler, Listener, ListenerToken,
};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Buffer error: {0}")]
    Buffer(#[from] textdoc_buffer::BufferError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl CoreError {
    /// Returns true if an offset, range or line number was outside the text.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, CoreError::Buffer(err) if err.is_out_of_range())
    }

    /// Returns true if the call was not allowed in the document's current
    /// state (re-entrant edits, unbalanced updates, undo inside a group).
    pub fn is_invalid_operation(&self) -> bool {
        match self {
            CoreError::InvalidOperation(_) => true,
            CoreError::Buffer(err) => err.is_invalid_operation(),
            CoreError::Config(_) => false,
        }
    }
}
