/// Authoritative game state as pushed by the server.
///
/// Decoding is lenient: missing numbers take the defaults the page script
/// assumed, extra fields are ignored, unknown type tags decode to `Unknown`.
use serde::{Deserialize, Serialize};

use crate::core::geometry::Point;

pub const DEFAULT_ENTITY_SIZE: f64 = 20.0;
pub const DEFAULT_PLAYER_WIDTH: f64 = 30.0;
pub const DEFAULT_PLAYER_HEIGHT: f64 = 20.0;
/// Used when a powerup arrives without `original_duration`.
pub const DEFAULT_POWERUP_DURATION: f64 = 5.0;

fn default_level() -> u32 {
    1
}

fn default_entity_size() -> f64 {
    DEFAULT_ENTITY_SIZE
}

fn default_player_width() -> f64 {
    DEFAULT_PLAYER_WIDTH
}

fn default_player_height() -> f64 {
    DEFAULT_PLAYER_HEIGHT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub player: Option<Player>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub collectibles: Vec<Collectible>,
    #[serde(default)]
    pub score: i64,
    #[serde(rename = "timeLeft", default)]
    pub time_left: f64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub active_powerup: Option<ActivePowerup>,
    #[serde(default)]
    pub game_over: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            player: None,
            entities: Vec::new(),
            collectibles: Vec::new(),
            score: 0,
            time_left: 0.0,
            level: default_level(),
            active_powerup: None,
            game_over: false,
        }
    }
}

/// World position plus the optional server-projected screen position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_y: Option<f64>,
}

impl Position {
    pub fn world(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn with_screen(self, x: f64, y: f64) -> Self {
        Self {
            screen_x: Some(x),
            screen_y: Some(y),
            ..self
        }
    }

    /// Screen coordinates win, axis by axis, over world coordinates.
    pub fn resolve(&self) -> Point {
        Point::new(self.screen_x.unwrap_or(self.x), self.screen_y.unwrap_or(self.y))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(flatten)]
    pub position: Position,
    /// Degrees.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_player_width")]
    pub width: f64,
    #[serde(default = "default_player_height")]
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Rock,
    Palmtree,
    Wave,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(flatten)]
    pub position: Position,
    #[serde(default = "default_entity_size")]
    pub width: f64,
    #[serde(default = "default_entity_size")]
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectibleKind {
    Coin,
    Powerup,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collectible {
    #[serde(rename = "type")]
    pub kind: CollectibleKind,
    #[serde(flatten)]
    pub position: Position,
    #[serde(default)]
    pub collected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PowerupKind {
    Speed,
    Shield,
    Magnet,
    Time,
    Other(String),
}

impl PowerupKind {
    pub fn name(&self) -> &str {
        match self {
            PowerupKind::Speed => "speed",
            PowerupKind::Shield => "shield",
            PowerupKind::Magnet => "magnet",
            PowerupKind::Time => "time",
            PowerupKind::Other(name) => name,
        }
    }
}

impl From<String> for PowerupKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "speed" => PowerupKind::Speed,
            "shield" => PowerupKind::Shield,
            "magnet" => PowerupKind::Magnet,
            "time" => PowerupKind::Time,
            _ => PowerupKind::Other(name),
        }
    }
}

impl From<PowerupKind> for String {
    fn from(kind: PowerupKind) -> Self {
        match kind {
            PowerupKind::Other(name) => name,
            known => known.name().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePowerup {
    #[serde(rename = "type")]
    pub kind: PowerupKind,
    /// Seconds remaining.
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_duration: Option<f64>,
}

impl ActivePowerup {
    /// Remaining share of the powerup, not clamped. A missing, zero or NaN
    /// original duration counts as the default duration.
    pub fn remaining_fraction(&self) -> f64 {
        let total = match self.original_duration {
            Some(d) if d != 0.0 && !d.is_nan() => d,
            _ => DEFAULT_POWERUP_DURATION,
        };
        self.duration / total
    }
}
