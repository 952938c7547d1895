use tracing_subscriber::EnvFilter;

use textdoc::{Document, Line};

/// Routes `tracing` output to the test harness (`RUST_LOG=textdoc_core=trace`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `(offset, length, delimiter_length)` of every line.
pub fn line_shape(doc: &Document) -> Vec<(usize, usize, usize)> {
    doc.lines()
        .map(|Line { offset, length, delimiter_length, .. }| (offset, length, delimiter_length))
        .collect()
}
