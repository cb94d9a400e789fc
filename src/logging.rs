//! Tracing setup: console output plus an optional dated log file.
//!
//! The file layer writes to `<dir>/weather-update-YYYY-MM-DD.log`, named
//! after the local date of each write, so a long-running daily process gets
//! one file per day.

use chrono::NaiveDate;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::helpers::local_today;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "climate_collector=info,tower_http=info";

/// Log file name for a given local date.
pub fn log_file_name(date: NaiveDate) -> String {
    format!("weather-update-{}.log", date.format("%Y-%m-%d"))
}

/// Append-only writer that switches files when the local date changes.
pub struct DailyLogFile {
    dir: PathBuf,
    current: Option<(NaiveDate, File)>,
}

impl DailyLogFile {
    /// Create `dir` if needed. Files are opened lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, current: None })
    }

    /// Write `buf` to the file for `date`, opening it if it isn't current.
    fn write_dated(&mut self, date: NaiveDate, buf: &[u8]) -> io::Result<usize> {
        let stale = self.current.as_ref().map_or(true, |(d, _)| *d != date);
        if stale {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.dir.join(log_file_name(date)))?;
            self.current = Some((date, file));
        }

        match self.current.as_mut() {
            Some((_, file)) => file.write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "log file not open")),
        }
    }
}

impl Write for DailyLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_dated(local_today(), buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Install the global subscriber. Console only when `log_dir` is `None`; if
/// the directory can't be created, file logging is skipped with a warning.
pub fn init_tracing(log_dir: Option<&str>) {
    let (file, file_error) = match log_dir.map(DailyLogFile::new) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!("File logging disabled: {}", e);
    }
}
