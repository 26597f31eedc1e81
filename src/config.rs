use std::env;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Application configuration. Loaded from `config.toml` when present,
/// with environment overrides for the server address.

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub net: NetConfig,
    pub buffer: BufferConfig,
    pub plot: PlotConfig,
    pub recording: RecordingConfig,
    pub channels: ChannelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub title: String,
    pub resizable: bool,
    pub vsync: bool,
}

/// Wire framing of the sample server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Fixed 20-byte little-endian records.
    Binary,
    /// Newline-delimited JSON batches.
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    pub host: String,
    pub port: u16,
    pub framing: Framing,
    pub connect_retry_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Requested per-stream window in samples; rounded up to a power of
    /// two by the ring buffer.
    pub window_samples: usize,
    /// Snapshot publish cadence of the ingest loop.
    pub publish_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Trailing display window, clamped into [1000, 10000] ms.
    pub trailing_window_ms: u64,
    pub plot_height: f32,
    pub colors: PlotColors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotColors {
    pub x_axis: [u8; 3],
    pub y_axis: [u8; 3],
    pub z_axis: [u8; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub render_queue: usize,
    pub recorder_queue: usize,
    pub control_queue: usize,
    pub status_queue: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            title: "AccelScope - Live Telemetry".to_string(),
            resizable: true,
            vsync: true,
        }
    }
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 14389,
            framing: Framing::Binary,
            connect_retry_ms: 100,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            window_samples: 2000,
            publish_interval_ms: 100,
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            trailing_window_ms: 1000,
            plot_height: 160.0,
            colors: PlotColors::default(),
        }
    }
}

impl Default for PlotColors {
    fn default() -> Self {
        Self {
            x_axis: [255, 0, 0],
            y_axis: [0, 150, 0],
            z_axis: [0, 0, 255],
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: "data".to_string(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            render_queue: 4,
            recorder_queue: 16,
            control_queue: 8,
            status_queue: 32,
        }
    }
}

const TRAILING_WINDOW_MIN_MS: u64 = 1000;
const TRAILING_WINDOW_MAX_MS: u64 = 10000;

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overrides the server address from `.env` / process environment, so
    /// one build can be pointed at different hosts without editing the
    /// config file.
    pub fn apply_env_overrides(&mut self) {
        dotenv::dotenv().ok();
        if let Ok(host) = env::var("ACCELSCOPE_HOST") {
            info!("Using host override from environment: {host}");
            self.net.host = host;
        }
        if let Ok(port) = env::var("ACCELSCOPE_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    info!("Using port override from environment: {port}");
                    self.net.port = port;
                }
                Err(e) => warn!("Ignoring invalid ACCELSCOPE_PORT {port:?}: {e}"),
            }
        }
    }

    /// Checks the hard requirements and clamps the trailing display window
    /// into its supported range.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.window.width <= 0.0 || self.window.height <= 0.0 {
            return Err(ConfigError::Validation(
                "Window dimensions must be positive".to_string(),
            ));
        }
        if self.buffer.window_samples == 0 {
            return Err(ConfigError::Validation(
                "Buffer window must hold at least one sample".to_string(),
            ));
        }
        if self.buffer.publish_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "Publish interval must be positive".to_string(),
            ));
        }
        if self.channels.render_queue == 0
            || self.channels.recorder_queue == 0
            || self.channels.control_queue == 0
            || self.channels.status_queue == 0
        {
            return Err(ConfigError::Validation(
                "Channel capacities must be positive".to_string(),
            ));
        }

        let requested = self.plot.trailing_window_ms;
        let clamped = requested.clamp(TRAILING_WINDOW_MIN_MS, TRAILING_WINDOW_MAX_MS);
        if clamped != requested {
            warn!("Trailing window {requested} ms out of range, clamped to {clamped} ms");
            self.plot.trailing_window_ms = clamped;
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}
