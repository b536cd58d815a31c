/// Structured logging for the radon pipeline
///
/// Provides context-rich logging tagged with the pipeline stage and an
/// optional key (window, file, group), timestamps, and severity levels.
/// Supports both console output and file-based logging for batch runs.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Census,
    Lookup,
    Spreadsheet,
    Aggregate,
    Analysis,
    Plot,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "FETCH"),
            Stage::Census => write!(f, "CENSUS"),
            Stage::Lookup => write!(f, "LOOKUP"),
            Stage::Spreadsheet => write!(f, "XLSX"),
            Stage::Aggregate => write!(f, "AGG"),
            Stage::Analysis => write!(f, "STATS"),
            Stage::Plot => write!(f, "PLOT"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the window lies past the end of the object-id range
    Expected,
    /// Unexpected failure - service degradation or a changed response format
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, stage: Stage, key: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let key_part = key.map(|k| format!(" [{}]", k)).unwrap_or_default();
        let log_entry = format!("{} {} {}{}: {}", timestamp, level, stage, key_part, message);

        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, key_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, key_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, stage: Stage, key: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, key, message);
        }
    }
}

/// Log a general informational message
pub fn info(stage: Stage, key: Option<&str>, message: &str) {
    emit(LogLevel::Info, stage, key, message);
}

/// Log a warning message
pub fn warn(stage: Stage, key: Option<&str>, message: &str) {
    emit(LogLevel::Warning, stage, key, message);
}

/// Log an error message
pub fn error(stage: Stage, key: Option<&str>, message: &str) {
    emit(LogLevel::Error, stage, key, message);
}

/// Log a debug message
pub fn debug(stage: Stage, key: Option<&str>, message: &str) {
    emit(LogLevel::Debug, stage, key, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a failed fetch window based on the error text
pub fn classify_window_failure(error_message: &str) -> FailureType {
    // ArcGIS answers 400 for a malformed `where` clause; that is a bug on our side.
    if error_message.contains("HTTP error: 400") || error_message.contains("Parse error") {
        FailureType::Unexpected
    } else if error_message.contains("HTTP error: 5") || error_message.contains("Transport") {
        // Server-side or network trouble; the service is known to be flaky.
        FailureType::Unknown
    } else if error_message.contains("HTTP error: 404") {
        FailureType::Expected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a skipped fetch window with automatic classification
pub fn log_window_failure(window: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_window_failure(&error_msg);

    let message = format!("window skipped [{}]: {}", failure_type, error_msg);

    emit(window_failure_level(&failure_type), Stage::Fetch, Some(window), &message);
}

/// Severity of a skipped window. Every class is visible at the default level.
pub fn window_failure_level(failure_type: &FailureType) -> LogLevel {
    match failure_type {
        FailureType::Expected => LogLevel::Info,
        FailureType::Unexpected => LogLevel::Error,
        FailureType::Unknown => LogLevel::Warning,
    }
}

// ---------------------------------------------------------------------------
// Stage Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a stage that processes several independent units
pub fn log_stage_summary(stage: Stage, what: &str, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "{} complete: {}/{} successful, {} failed",
        what, successful, total, failed
    );

    if failed == 0 {
        info(stage, None, &message);
    } else if successful == 0 {
        error(stage, None, &message);
    } else {
        warn(stage, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_window_failure_classification() {
        assert_eq!(classify_window_failure("HTTP error: 400"), FailureType::Unexpected);
        assert_eq!(
            classify_window_failure("Parse error: missing field `features`"),
            FailureType::Unexpected
        );
        assert_eq!(classify_window_failure("HTTP error: 503"), FailureType::Unknown);
        assert_eq!(classify_window_failure("HTTP error: 404"), FailureType::Expected);
        assert_eq!(
            classify_window_failure("Transport error: timed out"),
            FailureType::Unknown
        );
    }

    #[test]
    fn test_skipped_windows_log_at_info_or_above() {
        assert_eq!(window_failure_level(&FailureType::Expected), LogLevel::Info);
        assert_eq!(window_failure_level(&FailureType::Unknown), LogLevel::Warning);
        assert_eq!(window_failure_level(&FailureType::Unexpected), LogLevel::Error);
        for failure in [FailureType::Expected, FailureType::Unknown, FailureType::Unexpected] {
            assert!(window_failure_level(&failure) >= LogLevel::Info);
        }
    }

    #[test]
    fn test_log_level_deserializes_from_config_text() {
        #[derive(Deserialize)]
        struct Holder {
            level: LogLevel,
        }
        let h: Holder = toml::from_str("level = \"warn\"").unwrap();
        assert_eq!(h.level, LogLevel::Warning);
        let h: Holder = toml::from_str("level = \"debug\"").unwrap();
        assert_eq!(h.level, LogLevel::Debug);
    }
}
