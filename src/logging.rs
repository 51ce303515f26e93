use anyhow::{Context, Result, anyhow};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Daemon logger: every record goes to stderr, and to a rolling file if configured
struct RingLogger {
    file_writer: Option<Mutex<RollingFileAppender>>,
    level: LevelFilter,
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!(
            "{} [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        );

        eprintln!("{}", line);

        if let Some(writer) = &self.file_writer
            && let Ok(mut writer) = writer.lock()
        {
            let _ = writeln!(writer, "{}", line);
        }
    }

    fn flush(&self) {
        // RollingFileAppender handles flushing automatically
    }
}

/// Parse log level string to LevelFilter
pub fn parse_level(level_str: &str) -> LevelFilter {
    match level_str.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info, // Default to info
    }
}

/// Daily-rotating appender that keeps the last 3 files
fn build_appender(log_file_path: &Path) -> Result<RollingFileAppender> {
    let parent = log_file_path
        .parent()
        .ok_or_else(|| anyhow!("Invalid log file path {:?}", log_file_path))?;

    fs::create_dir_all(parent).context("Failed to create log directory")?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(3)
        .filename_prefix(
            log_file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("xclipring"),
        )
        .filename_suffix(
            log_file_path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or("log"),
        )
        .build(parent)
        .context("Failed to create rotating file appender")
}

/// Initialize the daemon logger
pub fn init_logger(log_file_path: Option<PathBuf>, level: &str) -> Result<()> {
    let file_writer = match log_file_path {
        Some(path) => Some(Mutex::new(build_appender(&path)?)),
        None => None,
    };

    let level = parse_level(level);
    let logger = RingLogger { file_writer, level };

    log::set_boxed_logger(Box::new(logger)).context("Failed to set global logger")?;
    log::set_max_level(level);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("verbose"), LevelFilter::Info);
    }

    #[test]
    fn test_appender_creates_log_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("xclipring.log");

        build_appender(&path).unwrap();
        assert!(temp_dir.path().join("logs").is_dir());
    }
}
