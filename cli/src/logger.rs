use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use vroverlay_core::paths;

/// Colors that stay readable when dimmed
const TARGET_PALETTE: &[fn(&str) -> ColoredString] = &[
    |s| s.green(),
    |s| s.yellow(),
    |s| s.blue(),
    |s| s.magenta(),
    |s| s.cyan(),
    |s| s.purple(),
];

pub struct VrOverlayLogger {
    max_level: Level,
    log_file: Mutex<Option<File>>,
    target_colors: Mutex<HashMap<String, usize>>,
}

impl VrOverlayLogger {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        let max_level = if quiet {
            Level::Info
        } else if verbose {
            Level::Trace
        } else {
            Level::Debug
        };

        Self {
            max_level,
            log_file: Mutex::new(open_log_file()),
            target_colors: Mutex::new(HashMap::new()),
        }
    }

    fn color_for_target(&self, target: &str) -> ColoredString {
        let mut target_colors = self
            .target_colors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let next = target_colors.len() % TARGET_PALETTE.len();
        let index = *target_colors.entry(target.to_owned()).or_insert(next);
        TARGET_PALETTE[index](target)
    }

    fn format_colored(&self, record: &Record) -> String {
        let tag = level_tag(record.level());
        let target = short_target(record.target());
        let target = if target.is_empty() {
            String::new()
        } else {
            format!("[{}] ", self.color_for_target(target).dimmed())
        };

        match record.level() {
            Level::Error => format!("{tag} {target}{}", record.args()).red().bold().to_string(),
            Level::Warn => format!("{tag} {target}{}", record.args())
                .yellow()
                .bold()
                .to_string(),
            level => {
                let tag = match level {
                    Level::Info => tag.green().bold(),
                    Level::Debug => tag.blue().bold(),
                    _ => tag.white().bold(),
                };
                format!("{tag} {target}{}", record.args())
            }
        }
    }
}

impl Log for VrOverlayLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        println!("{}", self.format_colored(record));

        let mut log_file = self.log_file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = log_file.as_mut() {
            let _ = writeln!(file, "{}", format_plain(record));
            let _ = file.flush();
        }
    }

    fn flush(&self) {}
}

fn open_log_file() -> Option<File> {
    paths::ensure_data_dir()?;
    let path = paths::log_file_path()?;
    match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file at {}: {e}", path.display());
            None
        }
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "[E]",
        Level::Warn => "[W]",
        Level::Info => "[I]",
        Level::Debug => "[D]",
        Level::Trace => "[T]",
    }
}

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn format_plain(record: &Record) -> String {
    let target = short_target(record.target());
    if target.is_empty() {
        format!("{} {}", level_tag(record.level()), record.args())
    } else {
        format!("{} [{target}] {}", level_tag(record.level()), record.args())
    }
}

pub fn init_logger(quiet: bool, verbose: bool) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(VrOverlayLogger::new(quiet, verbose)))?;
    log::set_max_level(LevelFilter::Trace);
    Ok(())
}
