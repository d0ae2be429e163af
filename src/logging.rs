use std::env;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "occurrence-sweep.log";

/// Where and how much to log, read from `TRACING_LEVEL`, `LOG_FILE_PATH`
/// and `LOG_ROTATION` (`never`, `hourly` or `daily`).
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub filter: String,
    pub directory: PathBuf,
    pub file_name: String,
    pub rotation: Rotation,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_values(
            env::var("TRACING_LEVEL").ok(),
            env::var("LOG_FILE_PATH").ok(),
            env::var("LOG_ROTATION").ok(),
        )
    }

    fn from_values(level: Option<String>, path: Option<String>, rotation: Option<String>) -> Self {
        let path = path.unwrap_or_else(|| format!("./logs/{}", DEFAULT_LOG_FILE));
        let path = Path::new(&path);

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let rotation = match rotation.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("hourly") => Rotation::HOURLY,
            Some("daily") => Rotation::DAILY,
            _ => Rotation::NEVER,
        };

        LogSettings {
            filter: level.unwrap_or_else(|| "info".to_string()),
            directory,
            file_name,
            rotation,
        }
    }
}

/// Pretty output on stdout plus a plain file log that names the emitting
/// thread, so purge workers and the scheduler can be told apart.
pub fn init_logger(settings: &LogSettings) -> impl Drop {
    let file_appender = RollingFileAppender::new(
        settings.rotation.clone(),
        &settings.directory,
        &settings.file_name,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_thread_names(true)
                .with_ansi(false),
        )
        .with(EnvFilter::new(&settings.filter))
        .init();

    info!(
        "Logging to stdout and {}",
        settings.directory.join(&settings.file_name).display()
    );

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = LogSettings::from_values(None, None, None);
        assert_eq!(settings.filter, "info");
        assert_eq!(settings.directory, PathBuf::from("./logs"));
        assert_eq!(settings.file_name, "occurrence-sweep.log");
        assert_eq!(settings.rotation, Rotation::NEVER);
    }

    #[test]
    fn test_path_is_split_into_directory_and_file() {
        let settings = LogSettings::from_values(
            Some("occurrence_sweep=debug".to_string()),
            Some("/var/log/sweep/run.log".to_string()),
            Some("Daily".to_string()),
        );
        assert_eq!(settings.filter, "occurrence_sweep=debug");
        assert_eq!(settings.directory, PathBuf::from("/var/log/sweep"));
        assert_eq!(settings.file_name, "run.log");
        assert_eq!(settings.rotation, Rotation::DAILY);
    }

    #[test]
    fn test_bare_file_name_logs_to_current_directory() {
        let settings = LogSettings::from_values(None, Some("sweep.log".to_string()), Some("weekly".to_string()));
        assert_eq!(settings.directory, PathBuf::from("."));
        assert_eq!(settings.file_name, "sweep.log");
        assert_eq!(settings.rotation, Rotation::NEVER);
    }
}
