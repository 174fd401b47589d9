//! Logging backend which writes to a file.

use chrono::Local;
use eyre::{format_err, Result, WrapErr};
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::OnceCell;
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError, TryLockError},
};

pub struct Logger {
    file: OnceCell<Mutex<File>>,
}

static LOGGER: Logger = Logger {
    file: OnceCell::new(),
};

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "error",
        Level::Warn => "warning",
        Level::Info => "info",
        Level::Debug | Level::Trace => "debug",
    }
}

/// Formats a single line of the log file.
fn format_line(time: &str, module_path: &str, level: Level, text: &str) -> String {
    // This is a direct copy of the format used by VSCode (adapted for Rust).
    //      [date time] [module] [level] Text
    format!(
        "[{}] [{}] [{}] {}\n",
        time,
        module_path.split("::").last().unwrap_or("unknown"),
        level_name(level),
        text
    )
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

impl Logger {
    /// Appends `line` to the log file. If `wait` is false and the file is in use, the line is
    /// dropped. Returns `true` if the line was written.
    fn write_line(&self, line: &str, wait: bool) -> bool {
        let file = match self.file.get() {
            Some(file) => file,
            None => return false,
        };

        let mut file = if wait {
            file.lock().unwrap_or_else(PoisonError::into_inner)
        } else {
            match file.try_lock() {
                Ok(file) => file,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return false,
            }
        };

        file.write_all(line.as_bytes()).is_ok()
    }

    pub fn commit(&self, record: &Record) {
        let line = format_line(
            &timestamp(),
            record.module_path().unwrap_or("unknown"),
            record.level(),
            &record.args().to_string(),
        );

        // A panicking thread may already hold the file.
        self.write_line(&line, !std::thread::panicking());
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.commit(record);
        }
    }

    fn flush(&self) {
        if let Some(file) = self.file.get() {
            let _ = file.lock().unwrap_or_else(PoisonError::into_inner).flush();
        }
    }
}

fn install_panic_hook(dump_path: PathBuf) {
    let previous = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "no message, sorry :/".to_string());

        let location = info
            .location()
            .map(|location| location.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let time = Local::now();
        let backtrace = std::backtrace::Backtrace::force_capture();

        let info_dump = format!(
            "The mod loader panicked.

Message: {message}
Location: {location}
Time: {time}
Backtrace: see below

{backtrace}"
        );

        LOGGER.write_line(
            &format_line(&timestamp(), module_path!(), Level::Error, &info_dump),
            false,
        );

        let _ = std::fs::write(&dump_path, info_dump);

        previous(info);
    }));
}

/// Starts logging to the file at `path`, and installs a panic hook that writes `PANIC.txt` next
/// to it.
pub fn init(path: &Path, level: LevelFilter) -> Result<()> {
    let file = File::create(path).wrap_err_with(|| format!("can't create log file {:?}", path))?;

    log::set_logger(&LOGGER).map_err(|_| format_err!("a logger has already been installed"))?;
    log::set_max_level(level);

    LOGGER
        .file
        .set(Mutex::new(file))
        .map_err(|_| format_err!("log file was already set"))?;

    install_panic_hook(path.with_file_name("PANIC.txt"));

    Ok(())
}
