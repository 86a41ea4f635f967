use serde_json::json;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Timing log. Each span and count is written as it happens; when the last
/// clone is dropped a `<stem>_hot.log` ranking the totals is written next to
/// the log.
#[derive(Clone)]
pub struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: HashMap<String, (f64, u64)>,
    count_totals: HashMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: HashMap::new(),
                count_totals: HashMap::new(),
            })),
        })
    }

    pub fn log_span_ms(&self, name: &str, doc_id: Option<usize>, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "doc_id": doc_id,
            "unit": "ms",
            "ms": (ms * 1000.0).round() / 1000.0,
        });
        if let Ok(mut state) = self.inner.lock() {
            let total = state.span_totals.entry(name.to_string()).or_insert((0.0, 0));
            total.0 += ms;
            total.1 = total.1.saturating_add(1);
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn log_counts(&self, name: &str, doc_id: Option<usize>, counts: &[(&str, u64)]) {
        let map: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect();
        let line = json!({
            "type": "perf.counts",
            "name": name,
            "doc_id": doc_id,
            "counts": map,
        });
        if let Ok(mut state) = self.inner.lock() {
            for (key, value) in counts {
                let entry = state.count_totals.entry(format!("{name}.{key}")).or_insert(0);
                *entry = entry.saturating_add(*value);
            }
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let Ok(file) = File::create(hot_path_for(&self.path)) else {
            return;
        };
        let mut writer = BufWriter::new(file);

        let mut spans: Vec<(&String, &(f64, u64))> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| b.1.0.total_cmp(&a.1.0).then_with(|| a.0.cmp(b.0)));
        for (rank, (name, (ms, count))) in spans.into_iter().enumerate() {
            let avg = if *count == 0 { 0.0 } else { ms / *count as f64 };
            let line = json!({
                "type": "perf.hot.span",
                "rank": rank + 1,
                "name": name,
                "ms": (ms * 1000.0).round() / 1000.0,
                "count": count,
                "avg_ms": (avg * 1000.0).round() / 1000.0,
            });
            let _ = writeln!(writer, "{line}");
        }

        let mut counts: Vec<(&String, &u64)> = self.count_totals.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (rank, (name, value)) in counts.into_iter().enumerate() {
            let line = json!({
                "type": "perf.hot.count",
                "rank": rank + 1,
                "name": name,
                "value": value,
            });
            let _ = writeln!(writer, "{line}");
        }
        let _ = writer.flush();
    }
}

fn hot_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|name| name.to_str())
        .unwrap_or("chirograph_perf");
    path.with_file_name(format!("{stem}_hot.log"))
}
