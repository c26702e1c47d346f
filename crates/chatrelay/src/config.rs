//! Layered configuration: defaults, then the TOML file, then
//! `CHATRELAY__SECTION__KEY` environment variables.

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use log::info;
use serde::{Deserialize, Serialize};

use crate::relay::ProtocolMode;

pub const APP_NAME: &str = "chatrelay";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub profile: String,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub relay: RelayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Directory and file name of the log file, if one is configured.
    /// A bare file name resolves against the working directory.
    pub fn file_target(&self) -> Option<(PathBuf, OsString)> {
        let path = Path::new(self.file.as_deref()?.trim());
        let name = path.file_name()?.to_os_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Some((dir, name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Chat backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the chat backend (e.g., "http://localhost:8000").
    /// Requests to `/chat*` fail with 500 while this is unset.
    pub url: Option<String>,
    /// Seconds to wait for the TCP connection. Stream reads are never timed out.
    pub connect_timeout_secs: Option<u64>,
    /// Sent as `include_processing_info` when a request does not specify it.
    pub include_processing_info: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_secs: Some(10),
            include_processing_info: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Upstream stream format: "auto", "named_events" or "bare_sentinel".
    pub protocol: ProtocolMode,
    /// Frames buffered between the upstream reader and the response body.
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolMode::Auto,
            channel_capacity: 32,
        }
    }
}

/// Where the configuration lives on disk.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_file: PathBuf,
}

impl AppPaths {
    pub fn discover(override_path: Option<PathBuf>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(path)?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => default_config_dir()?.join("config.toml"),
        };

        if config_file.parent().is_none() {
            return Err(anyhow!("invalid config file path: {config_file:?}"));
        }

        Ok(Self { config_file })
    }
}

impl fmt::Display for AppPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config: {}", self.config_file.display())
    }
}

/// Load the effective configuration, writing a default file first when
/// none exists and `dry_run` is off.
pub fn load_or_init_config(paths: &AppPaths, dry_run: bool) -> Result<AppConfig> {
    if !paths.config_file.exists() {
        if dry_run {
            info!(
                "dry-run: would create default config at {}",
                paths.config_file.display()
            );
        } else {
            write_default_config(&paths.config_file)?;
        }
    }
    load_config(&paths.config_file)
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let env_prefix = env_prefix();
    let built = Config::builder()
        .set_default("profile", "default")?
        .set_default("logging.level", "info")?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3000_i64)?
        .add_source(File::from(path).format(FileFormat::Toml).required(false))
        .add_source(Environment::with_prefix(env_prefix.as_str()).separator("__"))
        .build()?;

    let mut config: AppConfig = built.try_deserialize()?;

    if let Some(ref file) = config.logging.file {
        let expanded = expand_str_path(file)?;
        config.logging.file = Some(expanded.display().to_string());
    }
    if let Some(ref url) = config.backend.url {
        let trimmed = url.trim().trim_end_matches('/');
        config.backend.url = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    Ok(config)
}

pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = default_config_header(path);
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn default_config_header(path: &Path) -> String {
    let mut buffer = String::new();
    buffer.push_str("# Configuration for ");
    buffer.push_str(APP_NAME);
    buffer.push('\n');
    buffer.push_str("# File: ");
    buffer.push_str(&path.display().to_string());
    buffer.push('\n');
    buffer.push_str("# Set backend.url (or BACKEND_URL) to the chat backend.\n");
    buffer.push('\n');
    buffer
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix(), "CHATRELAY");
    }

    #[test]
    fn test_default_config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_default_config(&path).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# Configuration for chatrelay"));

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.relay.protocol, ProtocolMode::Auto);
        assert!(config.backend.include_processing_info);
        assert!(config.backend.url.is_none());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[server]
port = 8088

[backend]
url = "http://backend.internal:9000/"

[relay]
protocol = "bare_sentinel"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(
            config.backend.url.as_deref(),
            Some("http://backend.internal:9000")
        );
        assert_eq!(config.relay.protocol, ProtocolMode::BareSentinel);
        assert_eq!(config.relay.channel_capacity, 32);
    }

    #[test]
    fn test_blank_backend_url_is_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[backend]\nurl = \"  \"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.backend.url.is_none());
    }

    #[test]
    fn test_log_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let log_path = dir.path().join("logs").join("relay.log");
        fs::write(
            &path,
            format!("[logging]\nfile = {:?}\n", log_path.display().to_string()),
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        let (log_dir, name) = config.logging.file_target().unwrap();
        assert_eq!(log_dir, dir.path().join("logs"));
        assert_eq!(name, "relay.log");
    }

    #[test]
    fn test_log_file_target_bare_name_and_unset() {
        let logging = LoggingConfig {
            file: Some("relay.log".to_string()),
            ..Default::default()
        };
        assert_eq!(
            logging.file_target(),
            Some((PathBuf::from("."), OsString::from("relay.log")))
        );
        assert!(LoggingConfig::default().file_target().is_none());
    }

    #[test]
    fn test_discover_directory_override() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::discover(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(paths.config_file, dir.path().join("config.toml"));
    }
}
