use anyhow::Result;
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::settings::RuntimeSettings;

/// One log file per process run, written on exit or streamed line by line.
pub struct SessionLogger {
    log_buffer: Mutex<Vec<String>>,
    log_path: PathBuf,
    log_dir: PathBuf,
    retention_count: usize,
    app_name: String,
    stream_to_stdout: bool,
}

impl SessionLogger {
    pub fn new(log_dir: PathBuf, app_name: &str, retention_count: usize, stream_to_stdout: bool) -> Result<Self> {
        fs::create_dir_all(&log_dir)?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("{}_{}.log", app_name, timestamp));

        let logger = Self {
            log_buffer: Mutex::new(Vec::new()),
            log_path,
            log_dir,
            retention_count,
            app_name: app_name.to_string(),
            stream_to_stdout,
        };

        logger.clean_old_logs();
        logger.write_line(&format!("=== {} Session Started ===", app_name));

        Ok(logger)
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Records one already formatted line, prefixed with the local time.
    pub fn write_line(&self, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let log_line = format!("[{}] {}", timestamp, message.trim_end());

        if self.stream_to_stdout {
            println!("{}", log_line);
            let _ = self.append_lines(std::slice::from_ref(&log_line));
        } else {
            self.log_buffer.lock().push(log_line);
        }
    }

    fn append_lines(&self, lines: &[String]) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        for line in lines {
            writeln!(file, "{}", line)?;
        }
        file.flush()
    }

    /// Keeps the newest `retention_count - 1` sessions so the current one fits the budget.
    fn clean_old_logs(&self) {
        let prefix = format!("{}_", self.app_name);
        let Ok(entries) = fs::read_dir(&self.log_dir) else {
            return;
        };

        let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = entries
            .flatten()
            .filter(|entry| {
                let path = entry.path();
                path.extension().and_then(|s| s.to_str()) == Some("log")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|name| name.starts_with(&prefix))
            })
            .filter_map(|entry| {
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((entry.path(), modified))
            })
            .collect();

        log_files.sort_by(|a, b| b.1.cmp(&a.1));

        for (path, _) in log_files.iter().skip(self.retention_count.saturating_sub(1)) {
            let _ = fs::remove_file(path);
        }
    }

    pub fn flush_to_disk(&self) -> Result<()> {
        let mut buffer = self.log_buffer.lock();
        if buffer.is_empty() {
            return Ok(());
        }
        self.append_lines(&buffer)?;
        buffer.clear();
        Ok(())
    }

    pub fn finalize(&self) -> Result<()> {
        self.write_line(&format!("=== {} Session Ended ===", self.app_name));
        self.flush_to_disk()
    }
}

static LOGGER: once_cell::sync::OnceCell<SessionLogger> = once_cell::sync::OnceCell::new();

/// `tracing` writer feeding formatted events into the session logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionWriter;

/// Buffer for one formatted event.
pub struct SessionLine(Vec<u8>);

impl Write for SessionLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SessionLine {
    fn drop(&mut self) {
        if self.0.is_empty() {
            return;
        }
        if let Some(logger) = LOGGER.get() {
            logger.write_line(&String::from_utf8_lossy(&self.0));
        }
    }
}

impl<'a> MakeWriter<'a> for SessionWriter {
    type Writer = SessionLine;

    fn make_writer(&'a self) -> Self::Writer {
        SessionLine(Vec::new())
    }
}

/// Starts the session log and routes `tracing` events into it.
pub fn init_logging(settings: &RuntimeSettings, app_name: &str) -> Result<()> {
    let logger = SessionLogger::new(
        settings.log_dir(),
        app_name,
        settings.log_retention_count,
        settings.stream_logs,
    )?;
    LOGGER
        .set(logger)
        .map_err(|_| anyhow::anyhow!("Logger already initialized"))?;

    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(SessionWriter)
        .with_ansi(false)
        .without_time()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    tracing::info!("Log file: {}", get_log_path().unwrap_or_default().display());
    if settings.stream_logs {
        tracing::info!("Streaming mode enabled");
    } else {
        tracing::info!("Buffered mode - logs will be written to file on exit");
    }
    Ok(())
}

/// Diagnostics of the command-line tool go to stderr only.
pub fn init_cli_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(crate::settings::LOG_FILTER_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

pub fn finalize_logs() -> Result<()> {
    if let Some(logger) = LOGGER.get() {
        logger.finalize()?;
    }
    Ok(())
}

pub fn get_log_path() -> Option<PathBuf> {
    LOGGER.get().map(|logger| logger.log_path.clone())
}
