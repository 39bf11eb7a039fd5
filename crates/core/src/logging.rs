//! Category/level logging shared by every crate in the workspace.
//!
//! # Architecture
//!
//! - **LogConfig**: global configuration held in atomics, safe to poke from any thread
//! - **LogLevel**: Off < Error < Warn < Info < Debug < Trace
//! - **LogCategory**: Bus, Cartridge, Interrupts, Loader
//! - **log()**: the one entry point; the message closure only runs when enabled
//!
//! Bus dispatch runs once per emulated cycle, so a disabled category must
//! cost no more than an atomic load. File output goes through a background
//! writer thread fed by a channel.
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Cartridge, LogLevel::Debug, || {
//!     format!("FC3: bank -> {}", 2)
//! });
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

const CATEGORY_COUNT: usize = 4;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0:?}")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    /// Case-insensitive; numeric levels 0-5 are accepted too
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Ok(LogLevel::Off),
            "error" | "err" | "1" => Ok(LogLevel::Error),
            "warn" | "warning" | "2" => Ok(LogLevel::Warn),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            "trace" | "5" => Ok(LogLevel::Trace),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

impl LogLevel {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Log category for the parts of the expansion-port model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    /// Per-cycle bus dispatch through the slot
    Bus,
    /// Cartridge register writes, bank and mode changes
    Cartridge,
    /// NMI assertion and release, freeze button
    Interrupts,
    /// Image parsing and validation
    Loader,
}

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::Bus,
        LogCategory::Cartridge,
        LogCategory::Interrupts,
        LogCategory::Loader,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::Bus => 0,
            LogCategory::Cartridge => 1,
            LogCategory::Interrupts => 2,
            LogCategory::Loader => 3,
        }
    }
}

/// Sliding one-second window limiting output per category
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    timestamps: Mutex<[VecDeque<Instant>; CATEGORY_COUNT]>,
    dropped_counts: Mutex<[usize; CATEGORY_COUNT]>,
    last_drop_report: Mutex<[Option<Instant>; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            timestamps: Mutex::new(std::array::from_fn(|_| VecDeque::new())),
            dropped_counts: Mutex::new([0; CATEGORY_COUNT]),
            last_drop_report: Mutex::new([None; CATEGORY_COUNT]),
        }
    }

    /// Returns (allowed, dropped) where dropped is Some(n) when a drop summary is due
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let idx = category.index();

        // A poisoned lock only means another thread panicked mid-log; the counters are still usable
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        let mut dropped_counts = self.dropped_counts.lock().unwrap_or_else(|e| e.into_inner());
        let mut last_drop_report = self
            .last_drop_report
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let window = &mut timestamps[idx];
        while let Some(&front) = window.front() {
            if now.duration_since(front) > self.window_duration {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < self.max_logs_per_second.load(Ordering::Relaxed) {
            window.push_back(now);

            let dropped = dropped_counts[idx];
            if dropped > 0 {
                dropped_counts[idx] = 0;
                last_drop_report[idx] = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        dropped_counts[idx] += 1;
        let report_due = match last_drop_report[idx] {
            None => true,
            Some(last) => now.duration_since(last) >= self.window_duration,
        };
        if report_due {
            let dropped = dropped_counts[idx];
            dropped_counts[idx] = 0;
            last_drop_report[idx] = Some(now);
            (false, Some(dropped))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    /// Per-category override; Off means "use the global level"
    category_levels: [AtomicU8; CATEGORY_COUNT],
    log_sender: Mutex<Option<Sender<String>>>,
    file_logging_enabled: AtomicBool,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// All logging disabled, 60 messages per second per category
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: std::array::from_fn(|_| AtomicU8::new(LogLevel::Off as u8)),
            log_sender: Mutex::new(None),
            file_logging_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(60),
        }
    }

    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category-specific level wins when set; otherwise the global level applies
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .max_logs_per_second
            .store(max_logs_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Send output to `path` (appending) through a background writer thread.
    ///
    /// Replaces any previous log file; the old writer exits once its sender is dropped.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
            })?;

        *self.log_sender.lock().unwrap_or_else(|e| e.into_inner()) = Some(sender);
        self.file_logging_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stop logging to file and fall back to stderr
    pub fn clear_log_file(&self) {
        *self.log_sender.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.file_logging_enabled.store(false, Ordering::Relaxed);
    }

    fn write_message(&self, message: String) {
        if self.file_logging_enabled.load(Ordering::Relaxed) {
            let log_sender = self.log_sender.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(sender) = log_sender.as_ref() {
                if let Err(failed) = sender.send(message) {
                    eprintln!("{}", failed.0);
                }
                return;
            }
        }
        eprintln!("{}", message);
    }
}

/// Log a lazily-built message under `category` at `level`.
///
/// Messages beyond the per-category rate limit are dropped and summarised
/// once per second.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped) = config.rate_limiter.should_allow(category);
    if let Some(count) = dropped.filter(|&n| n > 0) {
        config.write_message(format!(
            "[{:?}] WARNING: Rate limit exceeded, {} log message(s) dropped in the last second",
            category, count
        ));
    }
    if allowed {
        config.write_message(message_fn());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("off".parse::<LogLevel>(), Ok(LogLevel::Off));
        assert_eq!("0".parse::<LogLevel>(), Ok(LogLevel::Off));
        assert_eq!("ERR".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert_eq!("Warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("3".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("trace".parse::<LogLevel>(), Ok(LogLevel::Trace));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_log_level_serde_lowercase() {
        let json = serde_json::to_string(&LogLevel::Debug).expect("serialize");
        assert_eq!(json, "\"debug\"");
        let level: LogLevel = serde_json::from_str("\"warn\"").expect("deserialize");
        assert_eq!(level, LogLevel::Warn);
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::Cartridge, LogLevel::Debug);

        assert!(config.should_log(LogCategory::Cartridge, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Cartridge, LogLevel::Trace));

        assert!(config.should_log(LogCategory::Bus, LogLevel::Error));
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Warn));
    }

    #[test]
    fn test_disabled_by_default() {
        let config = LogConfig::new();
        for category in LogCategory::ALL {
            assert!(!config.should_log(category, LogLevel::Error));
        }
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Interrupts, LogLevel::Info);

        config.reset();

        assert_eq!(config.get_global_level(), LogLevel::Off);
        assert_eq!(config.get_level(LogCategory::Interrupts), LogLevel::Off);
    }

    #[test]
    fn test_rate_limiter_per_category() {
        let limiter = RateLimiter::new(5);
        for _ in 0..5 {
            assert!(limiter.should_allow(LogCategory::Bus).0);
        }

        let (allowed, dropped) = limiter.should_allow(LogCategory::Bus);
        assert!(!allowed);
        assert_eq!(dropped, Some(1));

        // Other categories have their own window
        assert!(limiter.should_allow(LogCategory::Loader).0);
    }

    #[test]
    fn test_rate_limit_setting() {
        let config = LogConfig::new();
        assert_eq!(config.get_rate_limit(), 60);
        config.set_rate_limit(1000);
        assert_eq!(config.get_rate_limit(), 1000);
    }
}
