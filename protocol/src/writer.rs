//! Trace sinks: where intercepted calls are recorded.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use log::warn;
use thiserror::Error;

use crate::record::TraceRecord;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to open trace output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode trace record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for trace records.
///
/// Implementations are append-only and thread-safe; `trace_call` is invoked
/// from arbitrary JVM threads inside interception handlers and must never
/// block for longer than a buffered write, and must never panic.
pub trait TraceSink: Send + Sync {
    /// Record one intercepted call.
    fn trace_call(&self, record: TraceRecord);

    /// Flush buffered records to durable storage.
    fn flush(&self);
}

/// JSON-lines trace writer over a buffered file.
///
/// Encoding errors are logged and the record is dropped; handlers have no
/// way to surface errors into the traced application.
pub struct TraceWriter {
    out: Mutex<BufWriter<File>>,
}

impl TraceWriter {
    pub fn create(path: &Path) -> Result<Self, TraceError> {
        let file = File::create(path)?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl TraceSink for TraceWriter {
    fn trace_call(&self, record: TraceRecord) {
        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!("dropping trace record for {}: {}", record.function, e);
                return;
            }
        };
        line.push(b'\n');
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = out.write_all(&line) {
            warn!("failed to write trace record: {}", e);
        }
    }

    fn flush(&self) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = out.flush() {
            warn!("failed to flush trace output: {}", e);
        }
    }
}

/// In-memory sink for tests and embedders that post-process records.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<TraceRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<TraceRecord> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *records)
    }
}

impl TraceSink for MemorySink {
    fn trace_call(&self, record: TraceRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{TraceRecord, TraceValue};

    #[test]
    fn test_writer_emits_one_line_per_record() {
        let dir = std::env::temp_dir().join("aotrace-writer-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("trace-{}.json", std::process::id()));

        let writer = TraceWriter::create(&path).expect("create");
        writer.trace_call(TraceRecord::reflect("getField").clazz("C").result(true));
        writer.trace_call(TraceRecord::reflect("getMethod").clazz("C").result(false));
        writer.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["function"], "getField");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_memory_sink_drains_in_order() {
        let sink = MemorySink::new();
        sink.trace_call(TraceRecord::reflect("a"));
        sink.trace_call(TraceRecord::reflect("b"));

        let records = sink.drain();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].function, "a");
        assert_eq!(records[1].function, "b");
        assert_eq!(records[0].result, TraceValue::Null);
        assert!(sink.drain().is_empty());
    }
}
