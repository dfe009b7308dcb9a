//! Configuration for the Setu daemon
//!
//! Loads configuration from a TOML file. Every field has a default, so an
//! empty file (or no file at all) yields a working local setup.

use crate::error::{Error, Result};
use crate::protocol::SaveDecision;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub mock: MockConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// TCP listener settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Bind address (default: 127.0.0.1)
    #[serde(default = "default_address")]
    pub address: String,

    /// Bind port, 0 picks an ephemeral port (default: 1050)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on a single blocking response write (default: 2000)
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

/// Disconnect detection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LivenessConfig {
    /// Minimum time between two socket probes (default: 100)
    #[serde(default = "default_liveness_interval_ms")]
    pub interval_ms: u64,
}

/// Snapshot and video output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Directory receiving snapshots and the video stream
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Snapshot file prefix; files are `<prefix><n>.png`
    #[serde(default = "default_snapshot_prefix")]
    pub snapshot_prefix: String,

    /// Raw video file name inside `output_dir`
    #[serde(default = "default_video_file")]
    pub video_file: String,
}

/// Host render loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Ticks per second of the host loop (default: 60)
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    /// Answer save prompts automatically (keep, discard, quit); unset leaves
    /// them pending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_answer: Option<SaveDecision>,
}

/// Model dimensions of the bundled mock engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockConfig {
    /// Number of generalized coordinates
    #[serde(default = "default_mock_nqpos")]
    pub nqpos: usize,

    /// Number of mocap bodies
    #[serde(default = "default_mock_nmocap")]
    pub nmocap: usize,

    /// Number of fixed cameras (the free camera is extra)
    #[serde(default = "default_mock_ncamera")]
    pub ncamera: usize,

    /// Offscreen width in pixels
    #[serde(default = "default_mock_width")]
    pub width: u32,

    /// Offscreen height in pixels
    #[serde(default = "default_mock_height")]
    pub height: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    1050
}
fn default_write_timeout_ms() -> u64 {
    2000
}
fn default_liveness_interval_ms() -> u64 {
    100
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_snapshot_prefix() -> String {
    "img_".to_string()
}
fn default_video_file() -> String {
    "video.raw".to_string()
}
fn default_tick_rate_hz() -> u32 {
    60
}
fn default_mock_nqpos() -> usize {
    7
}
fn default_mock_nmocap() -> usize {
    1
}
fn default_mock_ncamera() -> usize {
    2
}
fn default_mock_width() -> u32 {
    640
}
fn default_mock_height() -> u32 {
    480
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_liveness_interval_ms(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            snapshot_prefix: default_snapshot_prefix(),
            video_file: default_video_file(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            save_answer: None,
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            nqpos: default_mock_nqpos(),
            nmocap: default_mock_nmocap(),
            ncamera: default_mock_ncamera(),
            width: default_mock_width(),
            height: default_mock_height(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl NetworkConfig {
    /// `address:port` as used for binding and error messages
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl LivenessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl CaptureConfig {
    /// Full path of the raw video stream
    pub fn video_path(&self) -> PathBuf {
        self.output_dir.join(&self.video_file)
    }
}

impl HostConfig {
    /// Duration of one host tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("setu.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.network.write_timeout_ms == 0 {
            return Err(Error::Config(
                "network.write_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.liveness.interval_ms == 0 {
            return Err(Error::Config(
                "liveness.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.host.tick_rate_hz == 0 {
            return Err(Error::Config(
                "host.tick_rate_hz must be greater than 0".to_string(),
            ));
        }
        if self.mock.width == 0 || self.mock.height == 0 {
            return Err(Error::Config(format!(
                "mock resolution must be non-zero, got {}x{}",
                self.mock.width, self.mock.height
            )));
        }
        if self.capture.video_file.is_empty() {
            return Err(Error::Config("capture.video_file is empty".to_string()));
        }
        Ok(())
    }
}
