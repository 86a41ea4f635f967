use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSON-lines event log for one engine. Cloning shares the file.
#[derive(Clone)]
pub struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    // Per document, so parallel composes never fold into each other.
    counters: BTreeMap<Option<usize>, BTreeMap<String, u64>>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: BTreeMap::new(),
            })),
        })
    }

    /// Writes `{"type": kind, ...fields}`. Non-object `fields` land under
    /// `"value"`.
    pub fn event(&self, kind: &str, fields: Value) {
        let mut record = Map::new();
        record.insert("type".to_string(), Value::String(kind.to_string()));
        match fields {
            Value::Object(map) => record.extend(map),
            Value::Null => {}
            other => {
                record.insert("value".to_string(), other);
            }
        }
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{}", Value::Object(record));
        }
    }

    pub fn increment(&self, doc_id: Option<usize>, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state
                .counters
                .entry(doc_id)
                .or_default()
                .entry(key.to_string())
                .or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    /// Writes the counters accumulated for `doc_id` as one `debug.summary`
    /// line and drops them. Other documents' counters are untouched.
    pub fn emit_summary(&self, context: &str, doc_id: Option<usize>) {
        if let Ok(mut state) = self.inner.lock() {
            let counts = state.counters.remove(&doc_id).unwrap_or_default();
            let line = json!({
                "type": "debug.summary",
                "context": context,
                "doc_id": doc_id,
                "counts": counts,
            });
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_and_summaries_are_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let logger = DebugLogger::new(&path).unwrap();
        logger.event("compose.slot", json!({"slot": "qr.center.owner_token", "kind": "qr"}));
        logger.event("render.output", json!(3));
        logger.increment(None, "slots.qr", 2);
        logger.increment(None, "slots.qr", 1);
        logger.emit_summary("compose", None);
        logger.flush();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "compose.slot");
        assert_eq!(lines[0]["slot"], "qr.center.owner_token");
        assert_eq!(lines[1]["value"], 3);
        assert_eq!(lines[2]["counts"]["slots.qr"], 3);
    }

    #[test]
    fn summaries_only_carry_their_own_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let logger = DebugLogger::new(&path).unwrap();
        logger.increment(Some(0), "slots.qr", 16);
        logger.increment(Some(1), "slots.qr", 16);
        logger.increment(Some(1), "cutlines", 5);
        logger.emit_summary("compose", Some(0));
        logger.increment(Some(0), "slots.qr", 16);
        logger.emit_summary("compose", Some(1));
        logger.emit_summary("compose", Some(0));
        logger.flush();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["doc_id"], 0);
        assert_eq!(lines[0]["counts"], json!({"slots.qr": 16}));
        assert_eq!(lines[1]["doc_id"], 1);
        assert_eq!(lines[1]["counts"], json!({"cutlines": 5, "slots.qr": 16}));
        assert_eq!(lines[2]["doc_id"], 0);
        assert_eq!(lines[2]["counts"]["slots.qr"], 16);
    }
}
