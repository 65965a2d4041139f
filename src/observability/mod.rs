//! Structured logging and span export.
//!
//! ```text
//! tracing macros → EnvFilter ─┬→ fmt layer → stderr
//!                             └→ tracing-opentelemetry → JsonLinesExporter → <data_dir>/arcanvas-spans.jsonl
//! ```
//!
//! Each exported line is one finished span: ids, name, start time, duration,
//! recorded fields, events and status. The file is rotated by size.

mod exporter;
mod init;

pub use init::{init_tracing, SPAN_FILE};
