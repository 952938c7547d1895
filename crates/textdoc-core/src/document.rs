//! The text document.
//!
//! ## Learning: Composition over Inheritance
//!
//! Rust doesn't have inheritance. `Document` composes the pieces from
//! `textdoc-buffer` (storage, line table, anchors, undo stack) and keeps
//! them consistent: every edit goes through one private path that updates
//! all of them before anyone gets to look.
//!
//! ## Edit sequence
//!
//! ```text
//! validate ─▶ UpdateStarted? ─▶ Changing ─▶ storage/lines/anchors ─▶ record undo
//!          ─▶ Changed ─▶ AnchorDeleted* ─▶ UpdateFinished? ─▶ ChangeCompleted?
//! ```
//!
//! Validation happens before anything is fired or touched, so a rejected
//! edit leaves no trace. A panicking listener unwinds out of the edit, but
//! the document stays usable: listeners are restored, the change flag is
//! cleared and open groups are closed by their guards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use textdoc_buffer::line_table::Lines;
use textdoc_buffer::storage::{check_offset, check_range};
use textdoc_buffer::{
    Anchor, AnchorId, AnchorMovementType, AnchorSegment, AnchorTable, BufferResult,
    DocumentChange, Line, LineEnding, LineTable, OffsetChangeMap, OffsetChangeMappingType,
    Segment, TextLocation, TextSnapshot, TextSource, TextStorage, UndoOperation, UndoStack,
};

use crate::config::DocumentOptions;
use crate::event::{
    DocumentEvent, DocumentNotification, EventBus, Listener, ListenerToken, Listeners,
};
use crate::{CoreError, CoreResult};

/// Unique identifier for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new unique document ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mutable, observable, undoable text.
pub struct Document {
    /// Unique identifier
    id: DocumentId,

    /// Character storage (rope or gap buffer)
    storage: Box<dyn TextStorage>,

    /// Line index kept in sync with `storage`
    lines: LineTable,

    /// Positions tracked across edits
    anchors: AnchorTable,

    undo_stack: UndoStack,

    options: DocumentOptions,

    /// Synchronous listeners
    listeners: Listeners,

    /// Async mirror of all events
    bus: EventBus,

    /// Incremented by every applied change
    version: u64,

    /// Nesting depth of `begin_update`
    update_depth: usize,

    /// Set while a change is being applied and announced
    in_change: bool,

    /// The current outermost update changed the text
    update_changed_text: bool,

    /// Line count when the outermost update started
    line_count_at_update_start: usize,
}

impl Document {
    /// Creates an empty document with default options.
    pub fn new() -> Self {
        Self::with_options(DocumentOptions::default())
    }

    /// Creates an empty document.
    pub fn with_options(options: DocumentOptions) -> Self {
        Self::from_text_with_options("", options)
    }

    /// Creates a document holding `text`, with default options.
    pub fn from_text(text: &str) -> Self {
        Self::from_text_with_options(text, DocumentOptions::default())
    }

    /// Creates a document holding `text`.
    ///
    /// The initial text is not an undoable change.
    pub fn from_text_with_options(text: &str, options: DocumentOptions) -> Self {
        let storage = options.buffer.create(text);
        let lines = LineTable::from_source(&*storage, options.line_breaks);
        let id = DocumentId::new();
        tracing::debug!(
            document = %id,
            strategy = ?options.buffer,
            length = storage.len_chars(),
            line_count = lines.line_count(),
            "document created"
        );
        Self {
            id,
            storage,
            line_count_at_update_start: lines.line_count(),
            lines,
            anchors: AnchorTable::new(),
            undo_stack: UndoStack::with_limit(options.undo_limit),
            bus: EventBus::with_capacity(options.event_capacity),
            options,
            listeners: Listeners::default(),
            version: 0,
            update_depth: 0,
            in_change: false,
            update_changed_text: false,
        }
    }

    // ==================== Getters ====================

    /// Returns the document ID.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    /// Incremented by every applied change (including undo and redo).
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns true if the text differs from the last state marked as
    /// original (see [`UndoStack::mark_as_original_file`]).
    pub fn is_modified(&self) -> bool {
        !self.undo_stack.is_original_file()
    }

    /// Number of characters.
    pub fn text_length(&self) -> usize {
        self.storage.len_chars()
    }

    /// Returns all text.
    pub fn text(&self) -> String {
        self.storage.text()
    }

    /// Returns `length` characters at `offset`.
    pub fn get_text(&self, offset: usize, length: usize) -> CoreResult<String> {
        Ok(self.storage.slice(offset, length)?)
    }

    /// Returns the text covered by `segment`.
    pub fn get_segment_text(&self, segment: Segment) -> CoreResult<String> {
        self.get_text(segment.offset, segment.length)
    }

    pub fn char_at(&self, offset: usize) -> CoreResult<char> {
        Ok(self.storage.char_at(offset)?)
    }

    /// Takes an immutable copy of the text for use on another thread.
    pub fn snapshot(&self) -> TextSnapshot {
        self.storage.snapshot().with_version(self.version)
    }

    // ==================== Lines & Locations ====================

    pub fn line_count(&self) -> usize {
        self.lines.line_count()
    }

    /// Returns line `number` (1-based).
    pub fn line_by_number(&self, number: usize) -> CoreResult<Line> {
        Ok(self.lines.line(number)?)
    }

    /// Returns the line containing `offset`.
    pub fn line_by_offset(&self, offset: usize) -> CoreResult<Line> {
        Ok(self.lines.line_at(offset)?)
    }

    /// Iterates over all lines.
    pub fn lines(&self) -> Lines<'_> {
        self.lines.lines()
    }

    /// Returns the content of line `number`, without its delimiter.
    pub fn line_text(&self, number: usize) -> CoreResult<String> {
        let line = self.line_by_number(number)?;
        self.get_text(line.offset, line.length)
    }

    /// Converts an offset to a 1-based line/column location.
    pub fn location(&self, offset: usize) -> CoreResult<TextLocation> {
        Ok(self.lines.location_of(offset)?)
    }

    /// Converts a 1-based line/column to an offset (column clamped).
    pub fn offset_of(&self, line: usize, column: usize) -> CoreResult<usize> {
        Ok(self.lines.offset_of(line, column)?)
    }

    pub fn offset_of_location(&self, location: TextLocation) -> CoreResult<usize> {
        self.offset_of(location.line, location.column)
    }

    /// The newline to use when splitting line `number`.
    ///
    /// That is the line's own delimiter; for the last line (which has none)
    /// the previous line's, and for a single-line document the configured
    /// default.
    pub fn newline_for_line(&self, number: usize) -> CoreResult<LineEnding> {
        let line = self.line_by_number(number)?;
        if line.delimiter_length > 0 {
            return Ok(self.delimiter_of(&line));
        }
        if number > 1 {
            let previous = self.line_by_number(number - 1)?;
            return Ok(self.delimiter_of(&previous));
        }
        Ok(self.options.line_ending)
    }

    fn delimiter_of(&self, line: &Line) -> LineEnding {
        match (line.delimiter_length, self.storage.char_at(line.end_offset())) {
            (2, _) => LineEnding::CrLf,
            (_, Ok('\r')) => LineEnding::Cr,
            _ => LineEnding::Lf,
        }
    }

    // ==================== Editing ====================

    /// Inserts `text` at `offset`; `Default` anchors at `offset` end up
    /// behind the inserted text.
    pub fn insert(&mut self, offset: usize, text: &str) -> CoreResult<()> {
        self.replace(offset, 0, text)
    }

    /// Inserts `text` at `offset`, deciding where `Default` anchors at
    /// `offset` go.
    pub fn insert_with_movement(
        &mut self,
        offset: usize,
        text: &str,
        movement: AnchorMovementType,
    ) -> CoreResult<()> {
        let mapping = match movement {
            AnchorMovementType::BeforeInsertion => OffsetChangeMappingType::KeepAnchorBeforeInsertion,
            _ => OffsetChangeMappingType::Normal,
        };
        self.replace_with_mapping(offset, 0, text, mapping)
    }

    /// Removes `length` characters at `offset`.
    pub fn remove(&mut self, offset: usize, length: usize) -> CoreResult<()> {
        self.replace(offset, length, "")
    }

    /// Replaces `length` characters at `offset` with `text`.
    pub fn replace(&mut self, offset: usize, length: usize, text: &str) -> CoreResult<()> {
        self.replace_with_mapping(offset, length, text, OffsetChangeMappingType::Normal)
    }

    /// Replaces text, moving anchors according to `mapping`.
    pub fn replace_with_mapping(
        &mut self,
        offset: usize,
        length: usize,
        text: &str,
        mapping: OffsetChangeMappingType,
    ) -> CoreResult<()> {
        let map = mapping.build_map(offset, length, text.chars().count());
        self.replace_with_map(offset, length, text, map)
    }

    /// Replaces text, moving anchors through an explicit offset map.
    ///
    /// Fails with `InvalidArgument` if the map does not describe the edit.
    pub fn replace_with_map(
        &mut self,
        offset: usize,
        length: usize,
        text: &str,
        map: OffsetChangeMap,
    ) -> CoreResult<()> {
        self.check_not_in_change()?;
        check_range(offset, length, self.text_length())?;
        if length == 0 && text.is_empty() {
            return Ok(());
        }
        let removed = self.storage.slice(offset, length)?;
        let change = DocumentChange::with_map(offset, removed, text, map)?;
        self.run_change(change)
    }

    /// Replaces the whole text.
    ///
    /// Performed as a removal and an insertion inside one update, neither
    /// recorded; the undo history is cleared and the new text becomes the
    /// original state.
    pub fn set_text(&mut self, text: &str) -> CoreResult<()> {
        self.check_not_in_change()?;
        if self.update_depth > 0 {
            return Err(CoreError::InvalidOperation(
                "set_text cannot be called inside an update group".into(),
            ));
        }
        let accept = self.undo_stack.accept_changes();
        self.undo_stack.set_accept_changes(false);
        let result = self.run_update(|doc| {
            let length = doc.text_length();
            doc.remove(0, length)?;
            doc.insert(0, text)
        });
        self.undo_stack.set_accept_changes(accept);
        result?;

        self.undo_stack.clear_all()?;
        self.undo_stack.mark_as_original_file();
        tracing::debug!(
            document = %self.id,
            length = self.text_length(),
            line_count = self.line_count(),
            "text replaced"
        );
        self.emit(DocumentEvent::TextReplaced);
        Ok(())
    }

    fn run_change(&mut self, change: DocumentChange) -> CoreResult<()> {
        let mut group = self.open_undo_group()?;
        let result = group.apply_change(Arc::new(change));
        let end = group.close();
        result.and(end)
    }

    /// Applies a validated change inside an open update.
    fn apply_change(&mut self, change: Arc<DocumentChange>) -> CoreResult<()> {
        self.in_change = true;
        self.emit(DocumentEvent::Changing(Arc::clone(&change)));

        let deleted = match self.mutate(&change) {
            Ok(deleted) => deleted,
            Err(err) => {
                self.in_change = false;
                return Err(err.into());
            }
        };

        self.update_changed_text = true;
        // Recorded before anyone hears about it, so the history matches the
        // text even if a listener unwinds.
        let recorded = self
            .undo_stack
            .push(UndoOperation::DocumentEdit((*change).clone()));

        self.emit(DocumentEvent::Changed(change));
        for id in deleted {
            self.emit(DocumentEvent::AnchorDeleted(id));
        }
        self.in_change = false;
        recorded?;
        Ok(())
    }

    fn mutate(&mut self, change: &DocumentChange) -> BufferResult<Vec<AnchorId>> {
        let offset = change.offset();
        self.storage.remove(offset, change.removal_length())?;
        self.storage.insert(offset, change.inserted_text())?;
        self.lines.apply_edit(
            &*self.storage,
            offset,
            change.removal_length(),
            change.insertion_length(),
        )?;
        self.version += 1;
        tracing::trace!(
            document = %self.id,
            offset,
            removed = change.removal_length(),
            inserted = change.insertion_length(),
            version = self.version,
            "change applied"
        );
        Ok(self
            .anchors
            .apply_change(change.offset_change_map(), self.storage.len_chars()))
    }

    fn check_not_in_change(&self) -> CoreResult<()> {
        if self.in_change {
            return Err(CoreError::InvalidOperation(
                "the document cannot be modified while a change is being applied".into(),
            ));
        }
        Ok(())
    }

    // ==================== Update groups ====================

    /// Opens an update group. All edits until the matching `end_update`
    /// form a single undo step and are bracketed by one
    /// `UpdateStarted`/`UpdateFinished` pair. Groups nest.
    pub fn begin_update(&mut self) -> CoreResult<()> {
        self.check_not_in_change()?;
        self.undo_stack.start_undo_group();
        self.update_depth += 1;
        if self.update_depth == 1 {
            self.update_changed_text = false;
            self.line_count_at_update_start = self.line_count();
            self.emit(DocumentEvent::UpdateStarted);
        }
        Ok(())
    }

    /// Closes the innermost update group.
    pub fn end_update(&mut self) -> CoreResult<()> {
        self.check_not_in_change()?;
        self.close_update(true)
    }

    /// Closes the innermost group without the in-change check. With
    /// `notify` unset no events are fired, which is what a guard dropped
    /// during unwinding needs.
    fn close_update(&mut self, notify: bool) -> CoreResult<()> {
        if self.update_depth == 0 {
            return Err(CoreError::InvalidOperation(
                "end_update called without a matching begin_update".into(),
            ));
        }
        self.undo_stack.end_undo_group()?;
        self.update_depth -= 1;
        if self.update_depth > 0 {
            return Ok(());
        }
        if notify {
            let old = self.line_count_at_update_start;
            let new = self.line_count();
            if old != new {
                self.emit(DocumentEvent::LineCountChanged { old, new });
            }
            self.emit(DocumentEvent::UpdateFinished);
            if std::mem::take(&mut self.update_changed_text) {
                self.emit(DocumentEvent::ChangeCompleted);
            }
        }
        self.update_changed_text = false;
        Ok(())
    }

    /// Returns true while an update group is open.
    pub fn is_in_update(&self) -> bool {
        self.update_depth > 0
    }

    /// Opens an update group that is closed when the guard is dropped.
    ///
    /// ```ignore
    /// let mut group = document.open_undo_group()?;
    /// group.insert(0, "a")?;
    /// group.insert(1, "b")?;
    /// drop(group); // one undo step
    /// ```
    pub fn open_undo_group(&mut self) -> CoreResult<UndoGroup<'_>> {
        self.begin_update()?;
        Ok(UndoGroup { document: self })
    }

    /// Runs `f` inside an update group.
    pub fn run_update<T>(
        &mut self,
        f: impl FnOnce(&mut Document) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut group = self.open_undo_group()?;
        let result = f(&mut group);
        let end = group.close();
        let value = result?;
        end?;
        Ok(value)
    }

    // ==================== Undo/Redo ====================

    /// Undoes the last undo step. Returns `false` if there was none.
    pub fn undo(&mut self) -> CoreResult<bool> {
        self.check_not_in_change()?;
        let Some(group) = self.undo_stack.begin_undo()? else {
            return Ok(false);
        };
        tracing::debug!(document = %self.id, operations = group.len(), "undo");
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.play_back(group.undo_operations())
        }));
        self.undo_stack.end_undo(group);
        resume(result).map(|()| true)
    }

    /// Redoes the last undone step. Returns `false` if there was none.
    pub fn redo(&mut self) -> CoreResult<bool> {
        self.check_not_in_change()?;
        let Some(group) = self.undo_stack.begin_redo()? else {
            return Ok(false);
        };
        tracing::debug!(document = %self.id, operations = group.len(), "redo");
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.play_back(group.redo_operations())
        }));
        self.undo_stack.end_redo(group);
        resume(result).map(|()| true)
    }

    fn play_back(&mut self, operations: impl Iterator<Item = UndoOperation>) -> CoreResult<()> {
        let mut group = self.open_undo_group()?;
        let mut result = Ok(());
        for operation in operations {
            match operation {
                UndoOperation::DocumentEdit(change) => {
                    group.undo_stack.enter_modify();
                    result = group.apply_change(Arc::new(change));
                    group.undo_stack.exit_modify();
                }
            }
            if result.is_err() {
                break;
            }
        }
        let end = group.close();
        result.and(end)
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_stack.can_redo()
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo_stack
    }

    pub fn undo_stack_mut(&mut self) -> &mut UndoStack {
        &mut self.undo_stack
    }

    // ==================== Anchors ====================

    /// Creates a `Default` anchor at `offset` that is deleted with its text.
    pub fn create_anchor(&mut self, offset: usize) -> CoreResult<AnchorId> {
        self.create_anchor_with(offset, AnchorMovementType::Default, false)
    }

    /// Creates an anchor at `offset` (`0 <= offset <= text_length`).
    pub fn create_anchor_with(
        &mut self,
        offset: usize,
        movement: AnchorMovementType,
        survive_deletion: bool,
    ) -> CoreResult<AnchorId> {
        check_offset(offset, self.text_length())?;
        Ok(self.anchors.create(offset, movement, survive_deletion))
    }

    /// Stops tracking an anchor; its handle becomes stale.
    pub fn release_anchor(&mut self, id: AnchorId) -> CoreResult<()> {
        Ok(self.anchors.release(id)?)
    }

    pub fn anchor(&self, id: AnchorId) -> CoreResult<Anchor> {
        Ok(self.anchors.get(id)?)
    }

    pub fn anchor_offset(&self, id: AnchorId) -> CoreResult<usize> {
        Ok(self.anchors.offset(id)?)
    }

    /// Line/column of an anchor.
    pub fn anchor_location(&self, id: AnchorId) -> CoreResult<TextLocation> {
        self.location(self.anchor_offset(id)?)
    }

    pub fn is_anchor_deleted(&self, id: AnchorId) -> CoreResult<bool> {
        Ok(self.anchors.is_deleted(id)?)
    }

    pub fn set_anchor_movement(
        &mut self,
        id: AnchorId,
        movement: AnchorMovementType,
    ) -> CoreResult<()> {
        Ok(self.anchors.set_movement(id, movement)?)
    }

    pub fn set_anchor_survive_deletion(&mut self, id: AnchorId, survive: bool) -> CoreResult<()> {
        Ok(self.anchors.set_survive_deletion(id, survive)?)
    }

    pub fn anchors(&self) -> &AnchorTable {
        &self.anchors
    }

    /// Tracks `[offset, offset + length)` with a pair of anchors that
    /// survive deletion.
    pub fn create_anchor_segment(&mut self, offset: usize, length: usize) -> CoreResult<AnchorSegment> {
        check_range(offset, length, self.text_length())?;
        Ok(AnchorSegment::create(
            &mut self.anchors,
            Segment::new(offset, length),
            true,
        ))
    }

    /// Current range of an anchor segment.
    pub fn anchor_segment(&self, segment: &AnchorSegment) -> CoreResult<Segment> {
        Ok(segment.segment(&self.anchors)?)
    }

    pub fn release_anchor_segment(&mut self, segment: AnchorSegment) -> CoreResult<()> {
        Ok(segment.release(&mut self.anchors)?)
    }

    // ==================== Events ====================

    /// Registers a synchronous listener.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&Document, &DocumentEvent) + Send + 'static,
    ) -> ListenerToken {
        let listener: Listener = Box::new(listener);
        self.listeners.add(listener)
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, token: ListenerToken) -> bool {
        self.listeners.remove(token)
    }

    /// Receiver for the async mirror of this document's events.
    pub fn event_receiver(&self) -> broadcast::Receiver<DocumentNotification> {
        self.bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    fn emit(&mut self, event: DocumentEvent) {
        let mut listeners = self.listeners.take();
        let document = &*self;
        let dispatched = panic::catch_unwind(AssertUnwindSafe(|| {
            for (_, listener) in listeners.iter_mut() {
                listener(document, &event);
            }
        }));
        self.listeners.restore(listeners);
        if let Err(payload) = dispatched {
            self.in_change = false;
            panic::resume_unwind(payload);
        }
        self.bus.emit(DocumentNotification {
            document: self.id,
            event,
        });
    }
}

/// Re-raises a panic caught around undo playback.
fn resume<T>(result: std::thread::Result<T>) -> T {
    result.unwrap_or_else(|payload| panic::resume_unwind(payload))
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("strategy", &self.storage.strategy())
            .field("text_length", &self.text_length())
            .field("line_count", &self.line_count())
            .field("version", &self.version)
            .field("anchors", &self.anchors.live_count())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// The search helpers in `textdoc_buffer::search` work on documents directly.
impl TextSource for Document {
    fn len_chars(&self) -> usize {
        self.storage.len_chars()
    }

    fn char_at(&self, offset: usize) -> BufferResult<char> {
        self.storage.char_at(offset)
    }

    fn slice(&self, offset: usize, length: usize) -> BufferResult<String> {
        self.storage.slice(offset, length)
    }

    fn chars_from(&self, offset: usize) -> Box<dyn Iterator<Item = char> + '_> {
        self.storage.chars_from(offset)
    }

    fn chars_before(&self, offset: usize) -> Box<dyn Iterator<Item = char> + '_> {
        self.storage.chars_before(offset)
    }

    fn text(&self) -> String {
        self.storage.text()
    }
}

/// Scoped update group returned by [`Document::open_undo_group`].
///
/// Derefs to the document; the group is closed when the guard goes out of
/// scope, including during unwinding.
pub struct UndoGroup<'a> {
    document: &'a mut Document,
}

impl UndoGroup<'_> {
    /// Closes the group now, reporting any error.
    pub fn close(self) -> CoreResult<()> {
        let mut this = std::mem::ManuallyDrop::new(self);
        this.document.end_update()
    }
}

impl Deref for UndoGroup<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        &*self.document
    }
}

impl DerefMut for UndoGroup<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        &mut *self.document
    }
}

impl Drop for UndoGroup<'_> {
    fn drop(&mut self) {
        let unwinding = std::thread::panicking();
        if unwinding {
            self.document.in_change = false;
        }
        if let Err(err) = self.document.close_update(!unwinding) {
            tracing::warn!(document = %self.document.id, %err, "failed to close undo group");
        }
    }
}
