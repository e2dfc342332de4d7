//! Locating the configuration file.

use std::path::PathBuf;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "PORLA_CONFIG";

pub const DEFAULT_PATHS: [&str; 2] = ["./porla.toml", "/etc/porla/porla.toml"];

/// Find the configuration file using the following precedence:
/// 1. `PORLA_CONFIG` environment variable
/// 2. ./porla.toml (current working directory)
/// 3. /etc/porla/porla.toml (system-wide config)
///
/// # Errors
///
/// Returns an error if `PORLA_CONFIG` names a missing file or no default
/// location holds a configuration file.
pub fn find_config_file() -> anyhow::Result<PathBuf> {
    let defaults: Vec<PathBuf> = DEFAULT_PATHS.iter().map(PathBuf::from).collect();
    locate(std::env::var(CONFIG_ENV).ok(), &defaults)
}

/// Precedence logic behind [`find_config_file`], with the environment and
/// search paths passed in.
///
/// # Errors
///
/// See [`find_config_file`].
pub fn locate(explicit: Option<String>, defaults: &[PathBuf]) -> anyhow::Result<PathBuf> {
    if let Some(env_path) = explicit {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("{CONFIG_ENV} points to non-existent file: {}", path.display());
    }

    if let Some(path) = defaults.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = defaults
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}
