//! File-backed span exporter.
//!
//! Finished spans are written one JSON object per line to a file under the
//! data directory. The file is shifted to `<name>.1`, `<name>.2`, … once it
//! grows past the size limit, keeping a bounded number of backups.

use futures_util::future::BoxFuture;
use opentelemetry::trace::{SpanId, Status, TraceError};
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::trace::TracerProvider;
use serde_json::{json, Map, Value as JsonValue};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;
const BACKUPS: usize = 2;

/// Appends lines to a file, shifting it into numbered backups when full.
pub(crate) struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: Option<File>,
}

impl RotatingFile {
    pub(crate) const fn new(path: PathBuf, max_bytes: u64, backups: usize) -> Self {
        Self {
            path,
            max_bytes,
            backups,
            file: None,
        }
    }

    pub(crate) fn append(&mut self, line: &str) -> std::io::Result<()> {
        if fs::metadata(&self.path).is_ok_and(|m| m.len() >= self.max_bytes) {
            self.file = None;
            self.shift()?;
        }

        let file = match &mut self.file {
            Some(file) => file,
            slot => slot.insert(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            ),
        };
        writeln!(file, "{line}")?;
        file.flush()
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    fn shift(&self) -> std::io::Result<()> {
        if self.backups == 0 {
            return fs::remove_file(&self.path);
        }
        let oldest = self.backup_path(self.backups);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.backups).rev() {
            let from = self.backup_path(n);
            if from.exists() {
                fs::rename(&from, self.backup_path(n + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))
    }
}

/// Span exporter that writes JSON lines through a [`RotatingFile`].
pub(crate) struct JsonLinesExporter {
    out: RotatingFile,
    service: String,
    shut_down: bool,
}

impl JsonLinesExporter {
    pub(crate) fn new(path: PathBuf, service: impl Into<String>) -> Self {
        Self {
            out: RotatingFile::new(path, MAX_FILE_BYTES, BACKUPS),
            service: service.into(),
            shut_down: false,
        }
    }

    fn record(&self, span: &SpanData) -> JsonValue {
        let events: Vec<JsonValue> = span
            .events
            .iter()
            .map(|event| {
                json!({
                    "name": event.name,
                    "at_unix_ns": unix_nanos(event.timestamp),
                    "fields": attributes(&event.attributes),
                })
            })
            .collect();

        let (status, message) = match &span.status {
            Status::Unset => ("unset", String::new()),
            Status::Ok => ("ok", String::new()),
            Status::Error { description } => ("error", description.to_string()),
        };

        let elapsed = span
            .end_time
            .duration_since(span.start_time)
            .unwrap_or_default();

        json!({
            "service": self.service,
            "trace_id": span.span_context.trace_id().to_string(),
            "span_id": span.span_context.span_id().to_string(),
            "parent_id": (span.parent_span_id != SpanId::INVALID)
                .then(|| span.parent_span_id.to_string()),
            "name": span.name,
            "start_unix_ns": unix_nanos(span.start_time),
            "duration_us": u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            "fields": attributes(&span.attributes),
            "events": events,
            "status": status,
            "status_message": message,
        })
    }
}

fn unix_nanos(at: SystemTime) -> String {
    at.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .to_string()
}

pub(crate) fn attributes(pairs: &[KeyValue]) -> JsonValue {
    let mut map = Map::new();
    for kv in pairs {
        map.insert(kv.key.to_string(), attribute_value(&kv.value));
    }
    JsonValue::Object(map)
}

fn attribute_value(value: &Value) -> JsonValue {
    match value {
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::I64(i) => json!(i),
        Value::F64(f) => json!(f),
        Value::String(s) => JsonValue::String(s.to_string()),
        Value::Array(_) => JsonValue::String(value.as_str().into_owned()),
    }
}

impl SpanExporter for JsonLinesExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        if self.shut_down {
            return Box::pin(std::future::ready(Err(TraceError::from(
                "span exporter is shut down",
            ))));
        }

        let mut result = Ok(());
        for span in &batch {
            let line = self.record(span).to_string();
            if let Err(e) = self.out.append(&line) {
                result = Err(TraceError::from(e.to_string()));
                break;
            }
        }
        Box::pin(std::future::ready(result))
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
        self.out.file = None;
    }
}

impl std::fmt::Debug for JsonLinesExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesExporter")
            .field("path", &self.out.path)
            .field("service", &self.service)
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

/// Builds a tracer provider that exports every finished span to `path`.
pub(crate) fn tracer_provider(path: &Path, service: &str) -> TracerProvider {
    let resource = Resource::new(vec![KeyValue::new("service.name", service.to_string())]);
    let exporter = JsonLinesExporter::new(path.to_path_buf(), service);

    TracerProvider::builder()
        .with_config(opentelemetry_sdk::trace::Config::default().with_resource(resource))
        .with_simple_exporter(exporter)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spans.jsonl");
        let mut out = RotatingFile::new(path.clone(), 1024, 2);

        out.append(r#"{"a":1}"#).unwrap();
        out.append(r#"{"a":2}"#).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), [r#"{"a":1}"#, r#"{"a":2}"#]);
    }

    #[test]
    fn full_file_is_shifted_into_bounded_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spans.jsonl");
        let mut out = RotatingFile::new(path.clone(), 8, 2);

        for line in ["first-line", "second-line", "third-line", "fourth-line"] {
            out.append(line).unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "fourth-line\n");
        assert_eq!(fs::read_to_string(out.backup_path(1)).unwrap(), "third-line\n");
        assert_eq!(fs::read_to_string(out.backup_path(2)).unwrap(), "second-line\n");
        assert!(!out.backup_path(3).exists());
    }

    #[test]
    fn attribute_values_keep_their_json_type() {
        let fields = attributes(&[
            KeyValue::new("mode", "drawing/placing"),
            KeyValue::new("sightings", 3_i64),
            KeyValue::new("ready", true),
        ]);
        assert_eq!(
            fields,
            json!({ "mode": "drawing/placing", "sightings": 3, "ready": true })
        );
    }

    #[test]
    fn export_after_shutdown_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = JsonLinesExporter::new(dir.path().join("spans.jsonl"), "arcanvas");
        exporter.shutdown();

        let result = futures_util::FutureExt::now_or_never(exporter.export(vec![]));
        assert!(matches!(result, Some(Err(_))));
    }
}
