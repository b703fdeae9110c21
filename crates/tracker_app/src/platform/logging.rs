//! Platform logging initialization for the tracker binary.
//!
//! File output goes to `./tracker.log` in the current working directory.

use std::fs::File;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILE: &str = "./tracker.log";

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Write to ./tracker.log in current directory.
    File,
    /// Write to the terminal (stderr for warnings and errors).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

impl LogDestination {
    pub fn from_flags(to_file: bool, to_terminal: bool) -> Self {
        match (to_file, to_terminal) {
            (true, true) => LogDestination::Both,
            (true, false) => LogDestination::File,
            _ => LogDestination::Terminal,
        }
    }
}

/// Initialize the global logger. Falls back to terminal-only output when the
/// log file cannot be created.
pub fn initialize(destination: LogDestination, level: LevelFilter) {
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if matches!(destination, LogDestination::Terminal | LogDestination::Both) {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }
    if matches!(destination, LogDestination::File | LogDestination::Both) {
        match create_file_logger(level, config.clone()) {
            Some(file_logger) => loggers.push(file_logger),
            None if loggers.is_empty() => loggers.push(TermLogger::new(
                level,
                config,
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )),
            None => {}
        }
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<WriteLogger<File>>> {
    let log_path = PathBuf::from(LOG_FILE);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_follows_flags() {
        assert_eq!(LogDestination::from_flags(false, true), LogDestination::Terminal);
        assert_eq!(LogDestination::from_flags(true, false), LogDestination::File);
        assert_eq!(LogDestination::from_flags(true, true), LogDestination::Both);
        assert_eq!(LogDestination::from_flags(false, false), LogDestination::Terminal);
    }
}
