//! Rolling File Logger
//!
//! Writes `tracing` (and bridged `log`) output to a size-rolled set of files
//! and keeps the most recent lines in memory for diagnostics screens.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

/// Roll the current file once it grows past this size
const MAX_FILE_BYTES: u64 = 1024 * 1024;
/// Number of files kept, current one included
const MAX_FILES: usize = 5;
/// Recent lines kept in memory
const RING_CAPACITY: usize = 500;

static WRITER: OnceLock<RollingWriter> = OnceLock::new();

/// A log file that rolls over by size.
///
/// Layout: `{app}.log` is the live file, `{app}.1.log` the previous one and
/// so on up to `max_files - 1`.
struct RollingFile {
    dir: PathBuf,
    app_name: String,
    max_bytes: u64,
    max_files: usize,
    file: File,
    written: u64,
    recent: VecDeque<String>,
    ring_capacity: usize,
}

impl RollingFile {
    fn open(dir: &Path, app_name: &str, max_bytes: u64, max_files: usize) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.log", app_name));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            dir: dir.to_path_buf(),
            app_name: app_name.to_string(),
            max_bytes,
            max_files: max_files.max(1),
            file,
            written,
            recent: VecDeque::new(),
            ring_capacity: RING_CAPACITY,
        })
    }

    fn file_path(&self, index: usize) -> PathBuf {
        if index == 0 {
            self.dir.join(format!("{}.log", self.app_name))
        } else {
            self.dir.join(format!("{}.{}.log", self.app_name, index))
        }
    }

    fn write_record(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        self.written += buf.len() as u64;

        for line in String::from_utf8_lossy(buf).lines() {
            if line.is_empty() {
                continue;
            }
            if self.recent.len() == self.ring_capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(line.to_string());
        }

        if self.written >= self.max_bytes {
            self.roll()?;
        }
        Ok(buf.len())
    }

    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_files == 1 {
            self.file = File::create(self.file_path(0))?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.file_path(self.max_files - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (0..self.max_files - 1).rev() {
            let from = self.file_path(index);
            if from.exists() {
                fs::rename(&from, self.file_path(index + 1))?;
            }
        }

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path(0))?;
        self.written = 0;
        Ok(())
    }
}

/// Shared handle handed to the fmt layer
#[derive(Clone)]
struct RollingWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl RollingWriter {
    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, RollingFile>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write_record(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Initialize the global logger.
///
/// Installs a `tracing` subscriber writing to `log_dir` and stderr. Records
/// emitted through the `log` crate are forwarded as well. Can only succeed
/// once per process.
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), String> {
    let file = RollingFile::open(log_dir.as_ref(), app_name, MAX_FILE_BYTES, MAX_FILES)
        .map_err(|e| format!("Failed to open log file: {}", e))?;
    let writer = RollingWriter {
        inner: Arc::new(Mutex::new(file)),
    };

    WRITER
        .set(writer.clone())
        .map_err(|_| "Logger already initialized".to_string())?;

    let header = format!(
        "==== {} session started {} ====\n",
        app_name,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
    );
    writer
        .clone()
        .write_all(header.as_bytes())
        .map_err(|e| format!("Failed to write log header: {}", e))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| format!("Failed to install subscriber: {}", e))?;

    // HTTP client internals log through `log`; keep them at the same level
    log::set_max_level(log::LevelFilter::Info);
    Ok(())
}

/// Log an info line through the installed logger
pub fn info(msg: &str) -> Result<(), String> {
    ensure_initialized()?;
    tracing::info!(target: "app", "{}", msg);
    Ok(())
}

/// Log an error line through the installed logger
pub fn error(msg: &str) -> Result<(), String> {
    ensure_initialized()?;
    tracing::error!(target: "app", "{}", msg);
    Ok(())
}

/// Most recent log lines, oldest first
pub fn recent_lines() -> Vec<String> {
    match WRITER.get() {
        Some(writer) => match writer.lock() {
            Ok(file) => file.recent.iter().cloned().collect(),
            Err(_) => Vec::new(),
        },
        None => Vec::new(),
    }
}

fn ensure_initialized() -> Result<(), String> {
    if WRITER.get().is_some() {
        Ok(())
    } else {
        Err("Logger not initialized".to_string())
    }
}
