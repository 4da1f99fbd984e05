//! Append-only CSV report of sampled requests.
//!
//! Each write opens the file in append mode, writes one complete line with a
//! single `write_all`, and closes it again. Nothing is held open across
//! requests, so restarts and multiple writers keep the file row-consistent.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const HEADER: [&str; 8] = [
    "Date",
    "Path",
    "Duration",
    "Memory before (Kb)",
    "Memory after (Kb)",
    "Load before (%)",
    "Load after(%)",
    "Longest time up to now",
];

const REPORT_SUFFIX: &str = "_requests_performance.csv";

/// Row timestamp layout (local time, microsecond precision).
pub const ROW_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.6f";

/// `<performance_dir>/<activation_timestamp>_requests_performance.csv`
pub fn report_path(performance_dir: &Path, activation_timestamp: &str) -> PathBuf {
    performance_dir.join(format!("{activation_timestamp}{REPORT_SUFFIX}"))
}

/// One sampled request.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub timestamp: String,
    pub path: String,
    pub duration_secs: f64,
    pub memory_before_bytes: u64,
    pub memory_after_bytes: u64,
    pub load_before_percent: f32,
    pub load_after_percent: f32,
    pub is_slowest_so_far: bool,
}

impl MetricsRow {
    fn fields(&self) -> [String; 8] {
        [
            self.timestamp.clone(),
            self.path.clone(),
            self.duration_secs.to_string(),
            self.memory_before_bytes.to_string(),
            self.memory_after_bytes.to_string(),
            self.load_before_percent.to_string(),
            self.load_after_percent.to_string(),
            if self.is_slowest_so_far { "True" } else { "False" }.to_string(),
        ]
    }

    pub fn to_csv_line(&self) -> String {
        join_record(self.fields().iter().map(String::as_str))
    }
}

/// Quote only when the field would otherwise break the record.
fn escape_field(v: &str) -> String {
    if v.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", v.replace('"', "\"\""))
    } else {
        v.to_string()
    }
}

fn join_record<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    let mut line = fields.map(escape_field).collect::<Vec<_>>().join(",");
    line.push_str("\r\n");
    line
}

/// Handle on one report file.
#[derive(Debug, Clone)]
pub struct CsvReport {
    path: PathBuf,
}

impl CsvReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the directory and file when missing.
    pub fn write_header(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.append_line(&join_record(HEADER.iter().copied()))
    }

    pub fn append(&self, row: &MetricsRow) -> Result<()> {
        self.append_line(&row.to_csv_line())
    }

    fn append_line(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new().create(true).append(true).open(&self.path)?;
        f.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn row(path: &str) -> MetricsRow {
        MetricsRow {
            timestamp: "2024/01/01 00:00:00.000000".into(),
            path: path.into(),
            duration_secs: 0.25,
            memory_before_bytes: 1024,
            memory_after_bytes: 2048,
            load_before_percent: 1.5,
            load_after_percent: 3.0,
            is_slowest_so_far: true,
        }
    }

    #[test]
    fn path_embeds_activation_timestamp() {
        let p = report_path(Path::new("/data/performance"), "20240101_000000");
        assert_eq!(p, Path::new("/data/performance/20240101_000000_requests_performance.csv"));
    }

    #[test]
    fn plain_row_is_unquoted() {
        assert_eq!(
            row("/api/x").to_csv_line(),
            "2024/01/01 00:00:00.000000,/api/x,0.25,1024,2048,1.5,3,True\r\n"
        );
    }

    #[test]
    fn separators_in_path_are_quoted() {
        let line = row("/search?q=a,\"b\"").to_csv_line();
        assert!(line.contains(",\"/search?q=a,\"\"b\"\"\","));
    }

    #[test]
    fn header_then_rows_append() {
        let dir = tempfile::tempdir().unwrap();
        let report = CsvReport::new(dir.path().join("performance").join("x.csv"));
        report.write_header().unwrap();
        report.append(&row("/a")).unwrap();
        report.append(&row("/b")).unwrap();

        let body = fs::read_to_string(report.path()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Date,Path,Duration,Memory before (Kb),Memory after (Kb),Load before (%),Load after(%),Longest time up to now"
        );
        assert!(lines[2].contains(",/b,"));
    }
}
