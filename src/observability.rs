//! This module provides logging and diagnostics for the ebe pipeline.
//!
//! The crate logs through the `log` facade only. `init_logging` installs an
//! `env_logger` backend once per process for callers that do not bring their
//! own; `log_metric!` emits structured key-value lines at debug level and
//! costs nothing when debug logging is disabled.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Once;

use log::LevelFilter;

use crate::error::EbeError;

#[doc(hidden)]
pub use log as __log;

/// Logs a structured key-value metric line at debug level.
///
/// # Example
/// ```
/// use ebe_flow::log_metric;
/// let bins = 4;
/// log_metric!("event" = "flush", "bins" = bins);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if $crate::observability::__log::log_enabled!($crate::observability::__log::Level::Debug) {
            // "key": "value" fragments
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            $crate::observability::__log::debug!("EBE_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` backend at `level`, writing `[LEVEL] message`
/// lines to stderr or, if given, appending to `log_file`.
///
/// Only the first call has any effect; later calls do not touch `log_file`.
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), EbeError> {
    let mut result = Ok(());

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(level);

        // no timestamp or target
        builder.format(|buf, record| {
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(path) = log_file {
            match open_log_file(path) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => {
                    result = Err(e);
                    return;
                }
            }
        }

        let _ = builder.try_init();
    });
    result
}

fn open_log_file(path: &Path) -> Result<File, EbeError> {
    Ok(OpenOptions::new().append(true).create(true).open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(LevelFilter::Debug, None).unwrap();
        log_metric!("event" = "test", "value" = 1);

        // Already initialised: the file must not even be created
        let path = std::env::temp_dir().join(format!("ebe-unused-{}.log", std::process::id()));
        init_logging(LevelFilter::Info, Some(&path)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_log_file_is_io_error() {
        let result = open_log_file(Path::new("/nonexistent/dir/ebe.log"));
        assert!(matches!(result, Err(EbeError::Io(_))));
    }
}
