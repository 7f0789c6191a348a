use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::axis::Axis;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found at {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read configuration file: {source}")]
    ReadError { source: std::io::Error },

    #[error("Failed to parse configuration: {source}")]
    ParseError { source: toml::de::Error },

    #[error("Failed to serialize configuration: {source}")]
    SerializeError { source: toml::ser::Error },

    #[error("Failed to write configuration file: {source}")]
    WriteError { source: std::io::Error },

    #[error("Configuration validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub client_name: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5007,
            password: "EMC".to_string(),
            client_name: "xytable".to_string(),
            connect_timeout_ms: 1000,
            read_timeout_ms: 2000,
            write_timeout_ms: 1000,
            max_retries: 2,
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Travel and speed limits of one axis, in inches and inches per second.
///
/// Only the position bounds and `max_speed` are enforced. `max_travel` and
/// `default_speed` describe the machine for operators and are validated but not
/// used by the coordinator; omitted speeds come from `movement.default_speed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    /// Informational.
    pub max_travel: f64,
    pub min_position: f64,
    pub max_position: f64,
    /// Informational.
    pub default_speed: f64,
    pub max_speed: f64,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            max_travel: 12.0,
            min_position: 0.0,
            max_position: 12.0,
            default_speed: 1.0,
            max_speed: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub x_axis: AxisConfig,
    pub y_axis: AxisConfig,
}

impl TableConfig {
    pub fn axis(&self, axis: Axis) -> &AxisConfig {
        match axis {
            Axis::X => &self.x_axis,
            Axis::Y => &self.y_axis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub default_speed: f64,
    pub homing_speed: f64,
    pub position_tolerance: f64,
    pub command_timeout_ms: u64,
    pub status_poll_ms: u64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            default_speed: 1.0,
            homing_speed: 0.5,
            position_tolerance: 0.001,
            command_timeout_ms: 5000,
            status_poll_ms: 200,
        }
    }
}

impl MovementConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/xytable.sock"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub table: TableConfig,
    pub movement: MovementConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |message: String| -> Result<(), ConfigError> { Err(ConfigError::ValidationError { message }) };

        for axis in Axis::ALL {
            let axis_config = self.table.axis(axis);

            if axis_config.min_position >= axis_config.max_position {
                return invalid(format!(
                    "{} axis min_position {} must be below max_position {}",
                    axis, axis_config.min_position, axis_config.max_position
                ));
            }
            if axis_config.max_speed <= 0.0 {
                return invalid(format!("{} axis max_speed must be positive", axis));
            }
            if axis_config.default_speed <= 0.0 {
                return invalid(format!("{} axis default_speed must be positive", axis));
            }
            if axis_config.max_travel <= 0.0 {
                return invalid(format!("{} axis max_travel must be positive", axis));
            }
        }

        // A default above an axis ceiling is allowed here and rejected per move.
        if self.movement.default_speed <= 0.0 {
            return invalid("movement.default_speed must be positive".to_string());
        }
        if self.movement.position_tolerance < 0.0 {
            return invalid("movement.position_tolerance must not be negative".to_string());
        }
        if self.movement.command_timeout_ms == 0 {
            return invalid("movement.command_timeout_ms must be positive".to_string());
        }
        if self.movement.status_poll_ms == 0 {
            return invalid("movement.status_poll_ms must be positive".to_string());
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct ConfigOptions {
    pub config_path: PathBuf,
    pub create_if_missing: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            create_if_missing: false,
        }
    }
}

impl ConfigOptions {
    pub fn default_config_path() -> PathBuf {
        std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("xytable.toml"))
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    options: ConfigOptions,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            options: ConfigOptions::default(),
        }
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        Self { options }
    }

    pub fn path(&self) -> &Path {
        &self.options.config_path
    }

    pub fn load(&self) -> anyhow::Result<Config> {
        let config_path = self.options.config_path.clone();

        if !config_path.exists() {
            if self.options.create_if_missing {
                let default_config = Config::default();
                self.save(&default_config)
                    .context("Failed to save default config")?;
                return Ok(default_config);
            } else {
                return Err(ConfigError::FileNotFound { path: config_path }.into());
            }
        }

        let content =
            fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError { source: e })?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError { source: e })?;

        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, config: &Config) -> anyhow::Result<()> {
        let config_path = &self.options.config_path;

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError { source: e })?;
            }
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(config_path, content).map_err(|e| ConfigError::WriteError { source: e })?;

        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn init_config_with_options(options: ConfigOptions) -> anyhow::Result<(ConfigManager, Config)> {
    let manager = ConfigManager::with_options(options);
    let config = manager.load()?;
    Ok((manager, config))
}

pub fn create_default_config<P: AsRef<Path>>(path: Option<P>) -> anyhow::Result<PathBuf> {
    let config_path = path
        .map(|p| p.as_ref().to_path_buf())
        .unwrap_or_else(ConfigOptions::default_config_path);

    let options = ConfigOptions {
        config_path: config_path.clone(),
        create_if_missing: true,
    };

    ConfigManager::with_options(options).save(&Config::default())?;

    Ok(config_path)
}
