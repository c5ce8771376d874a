//! Logging initialization built on flexi_logger
//!
//! Log lines always go to a file under the scanner's `logs/` directory so the
//! finalize phase can publish them as artifacts; they are duplicated to stderr
//! for interactive runs. Two line formats are supported: a compact text format
//! and a JSON format for collector-friendly output.

use std::path::Path;

// Keep the logger handle alive for the process lifetime; dropping it would
// stop the background flusher.
static LOGGER_HANDLE: std::sync::OnceLock<std::sync::Mutex<flexi_logger::LoggerHandle>> =
    std::sync::OnceLock::new();

/// Initialize logging with the given level, format ("text" or "json") and
/// destination directory for the log file.
pub fn init_logging(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_directory: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    use flexi_logger::{Duplicate, FileSpec, Logger};

    let level = log_level.unwrap_or("info");

    let mut logger = Logger::try_with_str(level)?;
    logger = match log_format.unwrap_or("text") {
        "json" => logger.format(json_format),
        _ => logger.format(text_format),
    };

    std::fs::create_dir_all(log_directory)?;
    let file_spec = FileSpec::default()
        .directory(log_directory)
        .basename("secretscan")
        .suppress_timestamp();

    let handle = logger
        .log_to_file(file_spec)
        .duplicate_to_stderr(Duplicate::All)
        .start()?;
    let _ = LOGGER_HANDLE.set(std::sync::Mutex::new(handle));

    Ok(())
}

fn level_abbr(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

// "YYYY-MM-DD HH:mm:ss.fff INF message"
fn text_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr(record.level()),
        record.args()
    )
}

// One JSON object per line: {"time", "level", "context", "message"}
fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let line = serde_json::json!({
        "time": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_abbr(record.level()),
        "context": record.target(),
        "message": record.args().to_string(),
    });
    write!(w, "{}", line)
}
