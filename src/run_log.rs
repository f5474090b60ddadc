//! Append-only record of move outcomes.
//!
//! Every record is one line, `<timestamp> - <LEVEL> - <message>`, written
//! while holding the sink's lock so concurrent workers never interleave
//! partial lines. Each record is also emitted as a debug-level `tracing`
//! event.

use chrono::{DateTime, Local};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Default run log name, resolved against the working directory.
pub const DEFAULT_LOG_FILE: &str = "file_sorting.log";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Severity of a run log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => f.write_str("INFO"),
            Level::Error => f.write_str("ERROR"),
        }
    }
}

/// Shared, serialized writer for the run log.
pub struct RunLog {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl RunLog {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if the file cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(file))
    }

    /// Wraps any writer, e.g. an in-memory buffer.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Mutex::new(Box::new(writer)),
        }
    }

    /// A log that discards every record.
    pub fn discard() -> Self {
        Self::from_writer(io::sink())
    }

    pub fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    pub fn error(&self, message: &str) {
        self.record(Level::Error, message);
    }

    fn record(&self, level: Level, message: &str) {
        tracing::debug!(%level, "{}", message);
        let line = format_line(Local::now(), level, message);

        // A worker that panicked mid-write leaves at most one bad line behind.
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let written = sink
            .write_all(line.as_bytes())
            .and_then(|()| sink.flush());

        if let Err(e) = written {
            tracing::warn!(error = %e, "could not write to run log");
        }
    }
}

/// Formats one run log line, newline included.
pub fn format_line(timestamp: DateTime<Local>, level: Level, message: &str) -> String {
    format!(
        "{} - {} - {}\n",
        timestamp.format(TIMESTAMP_FORMAT),
        level,
        message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_format_line() {
        let timestamp = Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .unwrap();

        assert_eq!(
            format_line(timestamp, Level::Info, "Moved: a.jpg → Images"),
            "2024-03-09 14:05:07,000 - INFO - Moved: a.jpg → Images\n"
        );
        assert_eq!(
            format_line(timestamp, Level::Error, "boom"),
            "2024-03-09 14:05:07,000 - ERROR - boom\n"
        );
    }

    #[test]
    fn test_open_appends_to_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sorting.log");
        fs::write(&path, "earlier line\n").unwrap();

        let log = RunLog::open(&path).unwrap();
        log.info("first");
        log.error("second");

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "earlier line");
        assert!(lines[1].ends_with(" - INFO - first"));
        assert!(lines[2].ends_with(" - ERROR - second"));
    }

    #[test]
    fn test_concurrent_writers_keep_lines_whole() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sorting.log");
        let log = RunLog::open(&path).unwrap();

        thread::scope(|scope| {
            for worker in 0..8 {
                let log = &log;
                scope.spawn(move || {
                    for i in 0..50 {
                        log.info(&format!("worker {} line {}", worker, i));
                    }
                });
            }
        });

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 400);
        for line in lines {
            let (_, rest) = line.split_once(" - INFO - worker ").unwrap();
            assert!(rest.contains(" line "), "mangled line: {}", line);
        }
    }
}
