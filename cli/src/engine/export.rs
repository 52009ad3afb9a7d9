//! Optional per-tick CSV sink for offline diagnostics.
//!
//! The engine appends one row per tick when a log path is configured.
//! Attribution never depends on this sink; a write failure is logged and the
//! session continues.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use super::TickSummary;

pub struct CsvSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl CsvSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "timestamp,package_mw,system_mw,total_cpu_percent,records_touched,degraded"
        )?;

        info!(path = %path.display(), "CSV sample log enabled");
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn record(&mut self, summary: &TickSummary) {
        let row = format!(
            "{},{},{},{:.2},{},{}",
            Utc::now().to_rfc3339(),
            format_opt(summary.package_power_mw),
            format_opt(summary.system_power_mw),
            summary.total_cpu_percent,
            summary.records_touched,
            summary.degraded
        );

        if let Err(e) = writeln!(self.writer, "{row}") {
            warn!(path = %self.path.display(), error = %e, "CSV write failed");
        }
    }

    /// Flush buffered rows; called once during graceful shutdown.
    pub fn finish(mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(path = %self.path.display(), error = %e, "CSV flush failed");
        }
    }
}

/// Absent readings export as empty cells, not zeros.
fn format_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}")).unwrap_or_default()
}
