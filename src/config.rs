use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::client::websocket_client::ReconnectPolicy;

// Client defaults; every one can be overridden from the command line.

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_FPS: u32 = 60;
pub const MAX_FPS: u32 = 1000;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
pub const DEFAULT_CANVAS_WIDTH: f64 = 800.0;
pub const DEFAULT_CANVAS_HEIGHT: f64 = 600.0;
pub const DEFAULT_KEY_RELEASE_TIMEOUT_MS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Logs are discarded when unset; the terminal belongs to the canvas.
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub fps: u32,
    pub reconnect: ReconnectPolicy,
    /// Logical canvas size the renderer draws in.
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub asset_dir: Option<PathBuf>,
    pub key_release_timeout: Duration,
    pub log: LogConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            fps: DEFAULT_FPS,
            reconnect: ReconnectPolicy {
                enabled: true,
                delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            },
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            asset_dir: None,
            key_release_timeout: Duration::from_millis(DEFAULT_KEY_RELEASE_TIMEOUT_MS),
            log: LogConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Never zero, whatever `fps` holds.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.clamp(1, MAX_FPS)))
    }
}
