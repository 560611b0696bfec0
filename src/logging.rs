use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::domain::DocError;

pub const LOG_ENV: &str = "DOCTV_LOG";

fn env_filter() -> EnvFilter {
    let env = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());
    EnvFilter::from_str(&env).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(path: &Path) -> Result<PathBuf, DocError> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw).map_err(|e| DocError::LoggingFailed(e.to_string()))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// The terminal belongs to the UI, so the client logs into a file.
pub fn init_file_logging(path: &Path) -> Result<(), DocError> {
    let path = expand_path(path)?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| DocError::LoggingFailed(e.to_string()))
}

pub fn init_stdout_logging() -> Result<(), DocError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| DocError::LoggingFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_env_vars() {
        let home = std::env::var("HOME").unwrap();
        let path = expand_path(Path::new("$HOME/.cache/doctv.log")).unwrap();
        assert_eq!(path, PathBuf::from(home).join(".cache/doctv.log"));
    }

    #[test]
    fn plain_paths_are_untouched() {
        let path = expand_path(Path::new("/var/log/doctv.log")).unwrap();
        assert_eq!(path, PathBuf::from("/var/log/doctv.log"));
    }
}
