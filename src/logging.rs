use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::Dispatch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE: &str = "kenshi_scraper.log";
const FILE_DIRECTIVE: &str = "kenshi_scraper=debug,warn";

/// Console verbosity picked on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DebugLevel {
    /// Errors only.
    #[value(alias = "false")]
    Off,
    /// Progress and per-record information.
    #[value(alias = "true")]
    On,
    /// Everything, including the raw markup of each variant.
    Verbose,
}

impl DebugLevel {
    fn console_directive(self) -> &'static str {
        match self {
            DebugLevel::Off => "error",
            DebugLevel::On => "kenshi_scraper=info,warn",
            DebugLevel::Verbose => "kenshi_scraper=trace,info",
        }
    }
}

/// Build the run's subscriber: a console layer at the chosen level and a
/// full debug log in `<log_dir>/kenshi_scraper.log`, rewritten every run.
///
/// `RUST_LOG` replaces the console level when set.
pub fn build(level: DebugLevel, log_dir: &Path) -> Result<Dispatch> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let path = log_dir.join(LOG_FILE);
    let file = File::create(&path).with_context(|| format!("Failed to open {}", path.display()))?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.console_directive()));
    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);
    let logfile = fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(EnvFilter::new(FILE_DIRECTIVE));

    Ok(tracing_subscriber::registry().with(console).with(logfile).into())
}

/// Install `dispatch` for the whole process. Called once from `main`.
pub fn install(dispatch: Dispatch) -> Result<()> {
    tracing::dispatcher::set_global_default(dispatch).context("Logging already initialised")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_values() {
        assert_eq!(DebugLevel::from_str("off", true).unwrap(), DebugLevel::Off);
        assert_eq!(DebugLevel::from_str("false", true).unwrap(), DebugLevel::Off);
        assert_eq!(DebugLevel::from_str("on", true).unwrap(), DebugLevel::On);
        assert_eq!(DebugLevel::from_str("true", true).unwrap(), DebugLevel::On);
        assert_eq!(DebugLevel::from_str("verbose", true).unwrap(), DebugLevel::Verbose);
        assert!(DebugLevel::from_str("loud", true).is_err());
    }

    #[test]
    fn log_file_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        let dispatch = build(DebugLevel::On, &dir).unwrap();
        tracing::dispatcher::with_default(&dispatch, || tracing::info!("hello"));
        assert!(dir.join(LOG_FILE).exists());
    }
}
