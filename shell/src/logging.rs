use std::fs::OpenOptions;
use std::path::Path;

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

use crate::errors::ShellError;

pub const LOG_FILE: &str = "watch-shell.log";

pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Terminal output at `level`, plus a debug log file in `log_dir` when given.
pub fn init(level: LevelFilter, log_dir: Option<&Path>) -> Result<(), ShellError> {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .add_filter_allow_str("playback")
        .add_filter_allow_str("watch_shell")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))?;
        loggers.push(WriteLogger::new(LevelFilter::Debug, config, file));
    }

    CombinedLogger::init(loggers).map_err(|e| ShellError::LoggerFailed { err: e.to_string() })
}
