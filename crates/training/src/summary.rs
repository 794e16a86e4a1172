//! Structured scalar sink.
//!
//! Scalars land in an append-only JSONL file under a per-run directory, one
//! event per `write_scalars` call. Downstream dashboards tail the file; the
//! trainer never reads it back.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct SummaryWriter {
    file: File,
    dir: PathBuf,
}

impl SummaryWriter {
    /// Create `<log_dir>/<millis>_<exp_name>/scalars.jsonl`.
    pub fn create(log_dir: &Path, exp_name: &str) -> io::Result<Self> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let dir = log_dir.join(format!("{stamp}_{exp_name}"));
        fs::create_dir_all(&dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("scalars.jsonl"))?;
        Ok(Self { file, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one event. `step` is the run-global iteration counter for
    /// training events and the epoch index for validation events.
    pub fn write_scalars(
        &mut self,
        scalars: &[(&str, f32)],
        tag: &str,
        step: usize,
    ) -> io::Result<()> {
        let mut map = serde_json::Map::new();
        for (name, value) in scalars {
            map.insert(name.to_string(), serde_json::json!(value));
        }
        let event = serde_json::json!({
            "tag": tag,
            "step": step,
            "scalars": map,
        });
        writeln!(self.file, "{event}")
    }
}
