//! Change notification.
//!
//! ## Learning: Observer Pattern in Rust
//!
//! Rust's ownership model makes traditional observer patterns tricky: a
//! listener that holds `&mut Document` while the document is notifying it
//! would alias the document mutably. Two mechanisms are offered instead:
//!
//! - **Synchronous listeners** (`Document::subscribe`) are closures that
//!   receive `&Document`. They run inline, in edit order, and can read the
//!   document (before the change for `Changing`, after it for `Changed`),
//!   but the borrow checker stops them from editing it.
//! - **The event bus** mirrors every event onto a `tokio::sync::broadcast`
//!   channel for consumers living on other tasks.

use std::sync::Arc;

use textdoc_buffer::{AnchorId, DocumentChange};
use tokio::sync::broadcast;

use crate::document::{Document, DocumentId};

/// Default capacity of the broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events fired by a document.
///
/// For one edit the order is always `Changing` → `Changed` →
/// `AnchorDeleted`*. Edits are bracketed by a single
/// `UpdateStarted`/`UpdateFinished` pair per outermost update group;
/// `ChangeCompleted` follows `UpdateFinished` when the group changed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// The outermost update group was opened
    UpdateStarted,
    /// A change is about to be applied; the document still shows the old text
    Changing(Arc<DocumentChange>),
    /// A change was applied
    Changed(Arc<DocumentChange>),
    /// An anchor was deleted by the preceding change
    AnchorDeleted(AnchorId),
    /// The line count differs from the one at `UpdateStarted`
    LineCountChanged { old: usize, new: usize },
    /// The outermost update group was closed
    UpdateFinished,
    /// The closed group changed the text
    ChangeCompleted,
    /// The whole text was replaced with `set_text`
    TextReplaced,
}

impl DocumentEvent {
    /// The change carried by `Changing`/`Changed`, if any.
    pub fn change(&self) -> Option<&DocumentChange> {
        match self {
            DocumentEvent::Changing(change) | DocumentEvent::Changed(change) => Some(change),
            _ => None,
        }
    }
}

/// An event tagged with the document that fired it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNotification {
    pub document: DocumentId,
    pub event: DocumentEvent,
}

/// Callback invoked for every event.
pub type Listener = Box<dyn FnMut(&Document, &DocumentEvent) + Send>;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

/// Registered synchronous listeners.
#[derive(Default)]
pub(crate) struct Listeners {
    next_token: u64,
    entries: Vec<(ListenerToken, Listener)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, listener: Listener) -> ListenerToken {
        let token = ListenerToken(self.next_token);
        self.next_token += 1;
        self.entries.push((token, listener));
        token
    }

    pub(crate) fn remove(&mut self, token: ListenerToken) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(t, _)| *t != token);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Moves the listeners out so they can be called with `&Document`.
    pub(crate) fn take(&mut self) -> Vec<(ListenerToken, Listener)> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn restore(&mut self, entries: Vec<(ListenerToken, Listener)>) {
        self.entries = entries;
    }
}

/// Event bus mirroring document events to async subscribers.
///
/// ## Design
///
/// Using a broadcast channel allows:
/// - Multiple subscribers on other tasks
/// - Lagged receivers don't block the document
/// - No direct coupling between the document and its consumers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DocumentNotification>,
}

impl EventBus {
    /// Creates a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a bus buffering up to `capacity` events per receiver.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, notification: DocumentNotification) {
        // Ignore error if no receivers (not a problem)
        let _ = self.sender.send(notification);
    }

    /// Subscribes to events.
    ///
    /// Returns a receiver that will get all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentNotification> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper for processing events asynchronously.
///
/// ## Example
///
/// ```ignore
/// let mut handler = EventHandler::new(document.event_receiver());
///
/// tokio::spawn(async move {
///     while let Some(notification) = handler.next().await {
///         if let DocumentEvent::Changed(change) = notification.event {
///             // Re-highlight the changed region
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<DocumentNotification>,
}

impl EventHandler {
    /// Creates a new event handler.
    pub fn new(receiver: broadcast::Receiver<DocumentNotification>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event, skipping over any that were missed.
    pub async fn next(&mut self) -> Option<DocumentNotification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
