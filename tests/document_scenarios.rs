//! End-to-end scenarios across both crates.

mod common;

use std::sync::{Arc, Mutex};

use common::{init_tracing, line_shape};
use textdoc::search::{find_any_char, find_any_char_reverse};
use textdoc::{
    AnchorMovementType, BufferStrategy, Document, DocumentEvent, DocumentOptions, EventHandler,
    LineBreakMode, Segment, TextLocation,
};

const MIXED: &str = "a\r\nb\nc1\rc2\n\rd";
const LINK: &str = "[Test](http://test.com)";

fn options(buffer: BufferStrategy, line_breaks: LineBreakMode) -> DocumentOptions {
    DocumentOptions {
        buffer,
        line_breaks,
        ..DocumentOptions::default()
    }
}

#[test]
fn test_mixed_delimiters_crlf_or_lf() {
    init_tracing();
    for buffer in [BufferStrategy::Rope, BufferStrategy::Gap] {
        let doc = Document::from_text_with_options(MIXED, options(buffer, LineBreakMode::CrLfOrLf));
        assert_eq!(doc.text_length(), 13);
        assert_eq!(
            line_shape(&doc),
            vec![(0, 1, 2), (3, 1, 1), (5, 5, 1), (11, 2, 0)]
        );
        assert_eq!(doc.line_text(3).unwrap(), "c1\rc2");
        assert_eq!(doc.line_text(4).unwrap(), "\rd");
    }
}

#[test]
fn test_mixed_delimiters_standard() {
    let doc = Document::from(MIXED);
    assert_eq!(
        line_shape(&doc),
        vec![(0, 1, 2), (3, 1, 1), (5, 2, 1), (8, 2, 1), (11, 0, 1), (12, 1, 0)]
    );
}

#[test]
fn test_lines_stay_contiguous_through_edits() {
    let mut doc = Document::from(MIXED);
    // Split the CR LF pair, then join it back.
    doc.insert(2, "x").unwrap();
    assert_eq!(doc.line_count(), 7);
    doc.remove(2, 1).unwrap();
    assert_eq!(doc.line_count(), 6);

    let mut expected = 0;
    for line in doc.lines() {
        assert_eq!(line.offset, expected);
        expected = line.offset + line.length + line.delimiter_length;
    }
    assert_eq!(expected, doc.text_length());
}

#[test]
fn test_editing_a_file_with_trailing_newline() {
    let mut doc = Document::from("fn main() {}\n");
    doc.insert(0, "// header\n").unwrap();
    doc.insert(0, "#").unwrap();
    doc.remove(0, 1).unwrap();
    assert_eq!(doc.line_count(), 3);
    assert_eq!(line_shape(&doc), vec![(0, 9, 1), (10, 12, 1), (23, 0, 0)]);
    assert_eq!(doc.line_text(3).unwrap(), "");

    doc.undo().unwrap();
    doc.undo().unwrap();
    doc.undo().unwrap();
    assert_eq!(line_shape(&doc), vec![(0, 12, 1), (13, 0, 0)]);
}

#[test]
fn test_find_any_char_scenarios() {
    let doc = Document::from(LINK);
    assert_eq!(find_any_char(&doc, 0, 2, &['[']), Some(0));
    assert_eq!(find_any_char(&doc, 0, 2, &['T']), Some(1));
    assert_eq!(find_any_char(&doc, 7, 11, &['p']), Some(10));
    assert_eq!(find_any_char(&doc, 0, 100, &['Z']), None);
    assert_eq!(find_any_char(&doc, 0, 100, &[')']), Some(22));
}

#[test]
fn test_find_any_char_reverse_scenarios() {
    let doc = Document::from(LINK);
    assert_eq!(find_any_char_reverse(&doc, 0, 2, &['[']), Some(0));
    assert_eq!(find_any_char_reverse(&doc, -2, 2, &['e']), Some(2));
    assert_eq!(find_any_char_reverse(&doc, 0, 100, &['t']), Some(17));
}

#[test]
fn test_undo_group_reverts_three_inserts() {
    init_tracing();
    let mut doc = Document::from("hello world");
    let before_world = doc.create_anchor(6).unwrap();
    let end = doc
        .create_anchor_with(11, AnchorMovementType::AfterInsertion, false)
        .unwrap();
    let shape = line_shape(&doc);

    doc.begin_update().unwrap();
    doc.insert(0, ">> ").unwrap();
    doc.insert(9, "big\n").unwrap();
    let length = doc.text_length();
    doc.insert(length, "!").unwrap();
    doc.end_update().unwrap();

    assert_eq!(doc.text(), ">> hello big\nworld!");
    assert_eq!(doc.anchor_offset(before_world).unwrap(), 13);
    assert_eq!(doc.anchor_offset(end).unwrap(), 19);
    assert_eq!(doc.undo_stack().undo_count(), 1);

    assert!(doc.undo().unwrap());
    assert_eq!(doc.text(), "hello world");
    assert_eq!(doc.anchor_offset(before_world).unwrap(), 6);
    assert_eq!(doc.anchor_offset(end).unwrap(), 11);
    assert_eq!(line_shape(&doc), shape);
    assert!(!doc.can_undo());

    assert!(doc.redo().unwrap());
    assert_eq!(doc.text(), ">> hello big\nworld!");
}

#[test]
fn test_event_bracketing_for_group() {
    let mut doc = Document::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    doc.subscribe(move |_, event| sink.lock().unwrap().push(event.clone()));

    doc.run_update(|doc| {
        doc.insert(0, "a\n")?;
        doc.insert(2, "b")?;
        doc.insert(3, "c")
    })
    .unwrap();

    let events = events.lock().unwrap();
    let count = |f: fn(&DocumentEvent) -> bool| events.iter().filter(|e| f(e)).count();
    assert_eq!(count(|e| matches!(e, DocumentEvent::UpdateStarted)), 1);
    assert_eq!(count(|e| matches!(e, DocumentEvent::Changing(_))), 3);
    assert_eq!(count(|e| matches!(e, DocumentEvent::Changed(_))), 3);
    assert_eq!(count(|e| matches!(e, DocumentEvent::UpdateFinished)), 1);
    assert_eq!(count(|e| matches!(e, DocumentEvent::ChangeCompleted)), 1);
    assert!(events.contains(&DocumentEvent::LineCountChanged { old: 1, new: 2 }));

    // Every Changing is immediately followed by its Changed.
    for pair in events.windows(2) {
        if let DocumentEvent::Changing(change) = &pair[0] {
            assert_eq!(pair[1], DocumentEvent::Changed(Arc::clone(change)));
        }
    }
    assert_eq!(events.first(), Some(&DocumentEvent::UpdateStarted));
    assert_eq!(events.last(), Some(&DocumentEvent::ChangeCompleted));
}

#[test]
fn test_completion_replaces_and_clamps_caret() {
    let mut doc = Document::from("let v = vec.le");
    let caret = doc.create_anchor(14).unwrap();

    doc.replace(12, 2, "len()").unwrap();
    let caret_offset = doc.anchor_offset(caret).unwrap();
    assert_eq!(caret_offset, 17);

    let moved = (caret_offset as isize - 1).clamp(0, doc.text_length() as isize) as usize;
    assert_eq!(doc.get_text(moved, 1).unwrap(), ")");
    assert_eq!(doc.location(moved).unwrap(), TextLocation::new(1, 17));
}

#[test]
fn test_load_and_save_round_trip() {
    let mut doc = Document::new();
    doc.set_text("first\r\nsecond\r\n").unwrap();
    assert_eq!(doc.line_count(), 3);
    assert!(!doc.is_modified());
    assert!(!doc.can_undo());

    doc.insert(5, " line").unwrap();
    assert!(doc.is_modified());

    let saved = doc.get_text(0, doc.text_length()).unwrap();
    assert_eq!(saved, "first line\r\nsecond\r\n");
    doc.undo_stack_mut().mark_as_original_file();
    assert!(!doc.is_modified());

    doc.undo().unwrap();
    assert!(doc.is_modified());
}

#[test]
fn test_anchor_segments_track_a_selection() {
    let mut doc = Document::from("alpha beta gamma");
    let selection = doc.create_anchor_segment(6, 4).unwrap();

    doc.insert(6, "very ").unwrap();
    doc.insert(15, "-max").unwrap();
    assert_eq!(doc.anchor_segment(&selection).unwrap(), Segment::new(6, 13));
    assert_eq!(doc.get_segment_text(Segment::new(6, 13)).unwrap(), "very beta-max");

    doc.undo().unwrap();
    doc.undo().unwrap();
    assert_eq!(doc.anchor_segment(&selection).unwrap(), Segment::new(6, 4));
}

#[test]
fn test_document_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("textdoc.toml");
    std::fs::write(&path, "buffer = \"gap\"\nline_breaks = \"cr-lf-or-lf\"\nundo_limit = 2\n")
        .unwrap();

    let options = DocumentOptions::load_from(&path).unwrap();
    let mut doc = Document::with_options(options);
    for c in ["a", "b", "c"] {
        let end = doc.text_length();
        doc.insert(end, c).unwrap();
    }
    assert_eq!(doc.undo_stack().undo_count(), 2);
    assert!(doc.undo().unwrap());
    assert!(doc.undo().unwrap());
    assert!(!doc.undo().unwrap());
    assert_eq!(doc.text(), "a");
}

#[tokio::test]
async fn test_async_consumer_sees_every_edit() {
    let mut doc = Document::new();
    let mut handler = EventHandler::new(doc.event_receiver());
    let id = doc.id();

    let consumer = tokio::spawn(async move {
        let mut inserted = String::new();
        while let Some(notification) = handler.next().await {
            assert_eq!(notification.document, id);
            match notification.event {
                DocumentEvent::Changed(change) => inserted.push_str(change.inserted_text()),
                DocumentEvent::TextReplaced => break,
                _ => {}
            }
        }
        inserted
    });

    doc.insert(0, "abc").unwrap();
    doc.insert(3, "def").unwrap();
    doc.set_text("").unwrap();

    assert_eq!(consumer.await.unwrap(), "abcdef");
}
