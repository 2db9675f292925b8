//! Observability for the export engine.
//!
//! The engine logs through the `log` facade only; installing a backend is the
//! embedding application's choice. `init_logging` installs the default `env_logger`
//! backend once per process. The `log_metric!` macro emits structured key-value
//! metric lines at debug level.

use std::fs::OpenOptions;
use std::sync::Once;

use log::LevelFilter;

use crate::error::TambakError;

/// Logs a structured key-value metric line at debug level.
///
/// # Example
/// ```
/// use tambak_export::log_metric;
/// let rows = 4;
/// log_metric!("event"="stream_encoded", "stream"="positions", "rows"=&rows);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if ::log::log_enabled!(::log::Level::Debug) {
            // Collect each pair as a JSON string fragment
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            ::log::debug!("TAMBAK_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` backend printing `[LEVEL] message`, optionally
/// appending to `log_file`. Only the first call in a process has any effect.
///
/// A log file that cannot be opened is reported as an error and leaves the
/// process without a logger, so a later call may retry.
pub fn init_logging(level: LevelFilter, log_file: Option<&str>) -> Result<(), TambakError> {
    let file = match log_file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    INIT_LOGGER.call_once(move || {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(level);

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        // Another logger may already be installed by the host application.
        let _ = builder.try_init();
    });
    Ok(())
}
