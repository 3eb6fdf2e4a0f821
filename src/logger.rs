use crate::env;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::OnceCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
struct Logger {
    level: LevelFilter,
    file_level: LevelFilter,
    file: Option<Mutex<File>>,
}

static LOGGER: OnceCell<Logger> = OnceCell::new();

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level()
    }

    fn log(&self, record: &Record) {
        if !record.target().starts_with("portkeeper") {
            return;
        }
        if record.level() <= self.file_level
            && let Some(file) = &self.file
        {
            let mut file = file.lock().unwrap_or_else(|p| p.into_inner());
            let _ = writeln!(
                file,
                "{} {} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                level_name(record.level()),
                record.args()
            );
        }
        if record.level() <= self.level {
            eprintln!("{} {}", styled_level(record.level()), record.args());
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().unwrap_or_else(|p| p.into_inner()).flush();
        }
    }
}

impl Logger {
    fn max_level(&self) -> LevelFilter {
        if self.file.is_some() {
            self.level.max(self.file_level)
        } else {
            self.level
        }
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

fn styled_level(level: Level) -> console::StyledObject<&'static str> {
    let style = console::style(level_name(level)).for_stderr();
    match level {
        Level::Error => style.red().bold(),
        Level::Warn => style.yellow(),
        Level::Info => style.cyan(),
        Level::Debug => style.blue(),
        Level::Trace => style.dim(),
    }
}

/// Size at which a log file is moved aside before it is reopened.
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Moves `path` to `<path>.1`, replacing an older copy, once it has reached
/// `max_bytes`. Returns whether it was moved.
pub(crate) fn rotate_if_large(path: &Path, max_bytes: u64) -> io::Result<bool> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() >= max_bytes => {
            let mut rotated = path.as_os_str().to_owned();
            rotated.push(".1");
            std::fs::rename(path, PathBuf::from(rotated))?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Console logging, plus a timestamped copy in `log_file` when given. Only the first
/// call takes effect.
pub fn init_with_file(log_file: Option<&Path>) {
    let file = log_file.and_then(|path| {
        let opened = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| rotate_if_large(path, MAX_LOG_BYTES))
            .and_then(|_| OpenOptions::new().create(true).append(true).open(path));
        match opened {
            Ok(file) => Some(Mutex::new(file)),
            Err(e) => {
                eprintln!("Warning: could not open log file {}: {e}", path.display());
                None
            }
        }
    });
    let logger = LOGGER.get_or_init(|| Logger {
        level: *env::PORTKEEPER_LOG,
        file_level: *env::PORTKEEPER_LOG_FILE_LEVEL,
        file,
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(logger.max_level());
    }
}
