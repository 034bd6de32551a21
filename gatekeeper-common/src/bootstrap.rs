//! Process bootstrap configuration.
//!
//! Resolution priority, highest first: command-line argument → environment
//! variable → TOML config file → compiled default. Each field is resolved
//! independently, so an operator can override a single value (say,
//! `GATEKEEPER_LISTEN_PORT`) without maintaining a full config file.

use crate::{Error, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line flags. All optional: anything unset falls through to the
/// next resolution tier.
#[derive(Debug, Parser, Default)]
#[command(name = "gatekeeper", about = "Media ingestion gatekeeper")]
pub struct Cli {
    /// Path to the TOML config file (skips the platform-default search).
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub listen_host: Option<String>,

    #[arg(long)]
    pub listen_port: Option<u16>,

    #[arg(long)]
    pub scan_path: Option<PathBuf>,

    #[arg(long)]
    pub rclone_remote: Option<String>,

    #[arg(long)]
    pub api_token: Option<String>,
}

/// Shape of the on-disk TOML file. Every field optional for the same reason
/// as [`Cli`].
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    db_path: Option<PathBuf>,
    listen_host: Option<String>,
    listen_port: Option<u16>,
    scan_path: Option<PathBuf>,
    rclone_remote: Option<String>,
    api_token: Option<String>,
    probe_tool: Option<String>,
    upload_tool: Option<String>,
}

/// Fully resolved process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub listen_host: String,
    pub listen_port: u16,
    pub scan_path: PathBuf,
    pub rclone_remote: String,
    pub api_token: String,
    /// Name (or absolute path) of the probe/mux tool, e.g. `ffprobe`/`ffmpeg`.
    pub probe_tool: String,
    /// Name (or absolute path) of the upload tool, e.g. `rclone`.
    pub upload_tool: String,
}

impl Config {
    /// Resolve the full configuration from CLI args plus the environment
    /// and TOML tiers.
    pub fn resolve(cli: Cli) -> Result<Config> {
        let file = load_file_config(cli.config.as_deref())?;

        Ok(Config {
            db_path: resolve_path(
                cli.db_path,
                "GATEKEEPER_DB_PATH",
                file.db_path.clone(),
                default_data_dir().join("gatekeeper.db"),
            ),
            listen_host: resolve_string(
                cli.listen_host,
                "GATEKEEPER_LISTEN_HOST",
                file.listen_host.clone(),
                "0.0.0.0".to_string(),
            ),
            listen_port: resolve_port(
                cli.listen_port,
                "GATEKEEPER_LISTEN_PORT",
                file.listen_port,
                8765,
            ),
            scan_path: resolve_path(
                cli.scan_path,
                "GATEKEEPER_SCAN_PATH",
                file.scan_path.clone(),
                default_data_dir().join("incoming"),
            ),
            rclone_remote: resolve_string(
                cli.rclone_remote,
                "GATEKEEPER_RCLONE_REMOTE",
                file.rclone_remote.clone(),
                "default".to_string(),
            ),
            api_token: resolve_string(
                cli.api_token,
                "GATEKEEPER_API_TOKEN",
                file.api_token.clone(),
                String::new(),
            ),
            probe_tool: resolve_string(None, "GATEKEEPER_PROBE_TOOL", file.probe_tool, "ffmpeg".to_string()),
            upload_tool: resolve_string(
                None,
                "GATEKEEPER_UPLOAD_TOOL",
                file.upload_tool,
                "rclone".to_string(),
            ),
        })
    }
}

fn resolve_string(
    cli_value: Option<String>,
    env_var: &str,
    file_value: Option<String>,
    default: String,
) -> String {
    cli_value
        .or_else(|| std::env::var(env_var).ok())
        .or(file_value)
        .unwrap_or(default)
}

fn resolve_path(
    cli_value: Option<PathBuf>,
    env_var: &str,
    file_value: Option<PathBuf>,
    default: PathBuf,
) -> PathBuf {
    cli_value
        .or_else(|| std::env::var(env_var).ok().map(PathBuf::from))
        .or(file_value)
        .unwrap_or(default)
}

fn resolve_port(cli_value: Option<u16>, env_var: &str, file_value: Option<u16>, default: u16) -> u16 {
    cli_value
        .or_else(|| std::env::var(env_var).ok().and_then(|s| s.parse().ok()))
        .or(file_value)
        .unwrap_or(default)
}

fn load_file_config(explicit_path: Option<&std::path::Path>) -> Result<FileConfig> {
    let path = match explicit_path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let contents = std::fs::read_to_string(&path)?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))
}

/// Platform config-dir search: `$XDG_CONFIG_HOME`/`~/.config` on Linux,
/// `~/Library/Application Support` on macOS, `%APPDATA%` on Windows, under
/// this project's own directory name.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gatekeeper").join("config.toml"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("gatekeeper"))
        .unwrap_or_else(|| PathBuf::from("./gatekeeper_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_value_wins_over_everything() {
        std::env::set_var("GATEKEEPER_LISTEN_HOST", "1.2.3.4");
        let resolved = resolve_string(
            Some("9.9.9.9".to_string()),
            "GATEKEEPER_LISTEN_HOST",
            Some("file-value".to_string()),
            "default".to_string(),
        );
        assert_eq!(resolved, "9.9.9.9");
        std::env::remove_var("GATEKEEPER_LISTEN_HOST");
    }

    #[test]
    fn env_wins_over_file_and_default() {
        std::env::set_var("GATEKEEPER_LISTEN_PORT_TEST", "4321");
        let resolved = resolve_port(None, "GATEKEEPER_LISTEN_PORT_TEST", Some(1111), 8765);
        assert_eq!(resolved, 4321);
        std::env::remove_var("GATEKEEPER_LISTEN_PORT_TEST");
    }

    #[test]
    fn file_wins_over_default() {
        let resolved = resolve_string(None, "GATEKEEPER_UNSET_TEST_VAR", Some("from-file".to_string()), "default".to_string());
        assert_eq!(resolved, "from-file");
    }

    #[test]
    fn default_used_when_nothing_set() {
        let resolved = resolve_string(None, "GATEKEEPER_TRULY_UNSET_VAR", None, "default".to_string());
        assert_eq!(resolved, "default");
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let file = load_file_config(Some(std::path::Path::new("/nonexistent/gatekeeper-test.toml"))).unwrap();
        assert!(file.db_path.is_none());
    }
}
