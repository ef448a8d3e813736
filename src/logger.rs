//! Session logger for the engine.
//!
//! Output goes to one file that is **truncated at each `init`**, so it only
//! holds the most recent session.  Lines below the configured level are
//! dropped; with `echo` set they are also mirrored to stderr.
//!
//! Default location:
//!   Windows:  `%APPDATA%\PaintFE-Engine\engine.log`
//!   Linux:    `~/.local/share/PaintFE-Engine/engine.log`
//!   macOS:    `~/Library/Application Support/PaintFE-Engine/engine.log`
//!
//! Before `init` (and in unit tests) every macro is a cheap no-op.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static ECHO: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    pub fn from_name(name: &str) -> Option<Level> {
        match name.trim().to_lowercase().as_str() {
            "debug" | "trace" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" | "err" => Some(Level::Error),
            _ => None,
        }
    }

    fn from_u8(v: u8) -> Level {
        match v {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            _ => Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        })
    }
}

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

pub fn set_level(level: Level) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn level() -> Level {
    Level::from_u8(MIN_LEVEL.load(Ordering::Relaxed))
}

/// Mirror accepted lines to stderr.
pub fn set_echo(echo: bool) {
    ECHO.store(echo, Ordering::Relaxed);
}

/// Whether a line at `level` would be written anywhere.
pub fn enabled(level: Level) -> bool {
    level >= self::level() && (LOG_FILE.get().is_some() || ECHO.load(Ordering::Relaxed))
}

/// Write a raw line.  I/O errors are ignored so logging never takes the
/// engine down.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
    if ECHO.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
}

/// Write a timestamped, level-tagged line.
pub fn write(level: Level, msg: &str) {
    if !enabled(level) {
        return;
    }
    write_line(&format!("[{}] [{}] {}", timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        if $crate::logger::enabled($crate::logger::Level::Debug) {
            $crate::logger::write($crate::logger::Level::Debug, &format!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {{
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*));
    }};
}

/// Initialise the session logger.  Call once, before any logging.
///
/// * `path` overrides the default per-user location.
/// * Creates (or truncates) the log file.
/// * Installs a panic hook that writes the panic message to the log before
///   handing over to the previous hook.
pub fn init(path: Option<PathBuf>, level: Level) {
    set_level(level);
    let path = path.unwrap_or_else(log_file_path);

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);

    match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.clone());
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            // not fatal, stderr echo still works
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    }

    write_line(&format!(
        "=== paintfe-engine session started {} ===",
        human_timestamp()
    ));
    write_line(&format!("Log file: {} (level {})", path.display(), level));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
}

fn log_file_path() -> PathBuf {
    data_dir().join("PaintFE-Engine").join("engine.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// HH:MM:SS within the current UTC day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            let h = (secs % 86400) / 3600;
            let m = (secs % 3600) / 60;
            let s = secs % 60;
            format!("{:02}:{:02}:{:02}.{:03}", h, m, s, d.subsec_millis())
        }
        Err(_) => "??:??:??".to_string(),
    }
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_parse() {
        assert_eq!(Level::from_name("Debug"), Some(Level::Debug));
        assert_eq!(Level::from_name(" warning "), Some(Level::Warn));
        assert_eq!(Level::from_name("verbose"), None);
        assert!(Level::Debug < Level::Error);
        assert_eq!(Level::Warn.to_string(), "WARN");
    }

    #[test]
    fn macros_work_as_match_arms() {
        let units = [0u8; 2];
        for i in 0..3 {
            match units.get(i) {
                Some(_) => crate::log_debug!("unit {}", i),
                None if i > 5 => crate::log_info!("unit {} far out", i),
                None if i > 4 => crate::log_warn!("unit {} out", i),
                None => crate::log_err!("unit {} missing", i),
            }
        }
    }
}
