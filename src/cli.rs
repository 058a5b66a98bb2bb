use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::client::websocket_client::ReconnectPolicy;
use crate::config::{
    ClientConfig, LogConfig, LogFormat, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_FPS,
    DEFAULT_KEY_RELEASE_TIMEOUT_MS, DEFAULT_RECONNECT_DELAY_MS, DEFAULT_SERVER_URL, MAX_FPS,
};

#[derive(Parser, Debug)]
#[command(name = "beach-rally")]
#[command(about = "🏖️ Terminal client for the Beach Rally arcade racer")]
#[command(version)]
pub struct Cli {
    /// Socket.IO server URL (`http://host:port`, optionally with a path)
    #[arg(short, long, env = "RALLY_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub server_url: String,

    /// Display frames per second
    #[arg(
        long,
        env = "RALLY_FPS",
        default_value_t = DEFAULT_FPS,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_FPS))
    )]
    pub fps: u32,

    /// Pause between reconnect attempts
    #[arg(long, env = "RALLY_RECONNECT_DELAY_MS", default_value_t = DEFAULT_RECONNECT_DELAY_MS)]
    pub reconnect_delay_ms: u64,

    /// Give up after the first lost connection
    #[arg(long)]
    pub no_reconnect: bool,

    #[arg(long, default_value_t = DEFAULT_CANVAS_WIDTH)]
    pub canvas_width: f64,

    #[arg(long, default_value_t = DEFAULT_CANVAS_HEIGHT)]
    pub canvas_height: f64,

    /// Directory with `*.sprite` files overriding the built-in ones
    #[arg(long, env = "RALLY_ASSET_DIR")]
    pub asset_dir: Option<PathBuf>,

    /// Synthetic key release delay for terminals without release events
    #[arg(long, default_value_t = DEFAULT_KEY_RELEASE_TIMEOUT_MS)]
    pub key_release_timeout_ms: u64,

    /// Write logs here (logs are dropped otherwise)
    #[arg(long, env = "RALLY_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl From<Cli> for ClientConfig {
    fn from(cli: Cli) -> Self {
        Self {
            server_url: cli.server_url,
            fps: cli.fps,
            reconnect: ReconnectPolicy {
                enabled: !cli.no_reconnect,
                delay: Duration::from_millis(cli.reconnect_delay_ms),
            },
            canvas_width: cli.canvas_width,
            canvas_height: cli.canvas_height,
            asset_dir: cli.asset_dir,
            key_release_timeout: Duration::from_millis(cli.key_release_timeout_ms),
            log: LogConfig {
                file: cli.log_file,
                format: cli.log_format,
            },
        }
    }
}
