//! Tunable gameplay configuration.
//!
//! Every field has a default matching the shipped game, so a JSON override only
//! needs the keys it changes:
//!
//! ```text
//! { "maxForce": 800, "updateRate": 100 }
//! ```

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Car palette, indexed by a client's `colorIndex` (modulo length).
pub const DEFAULT_CAR_COLORS: [u32; 7] = [
    0xff0000, // red
    0x0000ff, // blue
    0x00ff00, // green
    0xffff00, // yellow
    0xff00ff, // purple
    0x00ffff, // cyan
    0xffa500, // orange
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    /// RGB colors, `0xRRGGBB`.
    pub car_colors: Vec<u32>,
    /// Front axle steer angle at full lock (radians).
    pub max_steer_val: f32,
    /// Engine force per wheel at an acceleration modifier of 1.
    pub max_force: f32,
    /// Tile edge length (meters).
    pub tile_size: f32,
    /// Tiles farther than this from the car are evicted (meters).
    pub max_tiles_distance: f32,
    /// Minimum interval between regular presence publishes (milliseconds).
    #[serde(rename = "updateRate")]
    pub update_rate_ms: u64,
    /// Ride height above which the car counts as airborne (meters).
    pub ground_threshold: f32,
    /// Shorter jumps are not recorded (seconds).
    pub min_air_time_to_record: f32,
    /// Half-width, in tiles, of the square kept around the car.
    pub tile_range: i32,
    /// Road segments kept on either side of the car's segment.
    pub road_range: i32,
    /// Road segment length (meters).
    pub road_length: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            car_colors: DEFAULT_CAR_COLORS.to_vec(),
            max_steer_val: 0.5,
            max_force: 500.0,
            tile_size: 500.0,
            max_tiles_distance: 2000.0,
            update_rate_ms: 50,
            ground_threshold: 0.5,
            min_air_time_to_record: 0.1,
            tile_range: 2,
            road_range: 5,
            road_length: 1000.0,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(err) => write!(f, "config is not valid JSON: {err}"),
            ConfigError::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl GameConfig {
    /// Parse a (possibly partial) JSON override on top of the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.car_colors.is_empty() {
            return Err(ConfigError::Invalid("carColors must not be empty"));
        }
        if !(self.tile_size.is_finite() && self.tile_size > 0.0) {
            return Err(ConfigError::Invalid("tileSize must be positive"));
        }
        if !(self.road_length.is_finite() && self.road_length > 0.0) {
            return Err(ConfigError::Invalid("roadLength must be positive"));
        }
        if !(self.max_tiles_distance.is_finite() && self.max_tiles_distance > 0.0) {
            return Err(ConfigError::Invalid("maxTilesDistance must be positive"));
        }
        if self.update_rate_ms == 0 {
            return Err(ConfigError::Invalid("updateRate must be at least 1ms"));
        }
        if self.tile_range < 0 || self.road_range < 0 {
            return Err(ConfigError::Invalid("tileRange/roadRange must not be negative"));
        }
        if !(self.max_force.is_finite() && self.max_steer_val.is_finite()) {
            return Err(ConfigError::Invalid("maxForce/maxSteerVal must be finite"));
        }
        Ok(())
    }

    pub fn update_rate(&self) -> Duration {
        Duration::from_millis(self.update_rate_ms)
    }

    /// Palette color for a color index, wrapping out-of-range indices.
    pub fn car_color(&self, color_index: u32) -> u32 {
        // An empty palette falls back to the first default color.
        let len = self.car_colors.len().max(1);
        self.car_colors
            .get(color_index as usize % len)
            .copied()
            .unwrap_or(DEFAULT_CAR_COLORS[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_tuning() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.car_colors.len(), 7);
        assert_eq!(cfg.max_steer_val, 0.5);
        assert_eq!(cfg.max_force, 500.0);
        assert_eq!(cfg.tile_size, 500.0);
        assert_eq!(cfg.max_tiles_distance, 2000.0);
        assert_eq!(cfg.update_rate(), Duration::from_millis(50));
        assert_eq!(cfg.ground_threshold, 0.5);
        assert_eq!(cfg.min_air_time_to_record, 0.1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg = GameConfig::from_json_str(r#"{ "maxForce": 800, "updateRate": 100 }"#).unwrap();
        assert_eq!(cfg.max_force, 800.0);
        assert_eq!(cfg.update_rate_ms, 100);
        assert_eq!(cfg.tile_size, 500.0);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            GameConfig::from_json_str(r#"{ "tileSize": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GameConfig::from_json_str(r#"{ "carColors": [] }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GameConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn car_color_wraps() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.car_color(0), 0xff0000);
        assert_eq!(cfg.car_color(7), 0xff0000);
        assert_eq!(cfg.car_color(8), 0x0000ff);
    }

    #[test]
    fn empty_palette_uses_the_first_default_color() {
        let cfg = GameConfig {
            car_colors: Vec::new(),
            ..Default::default()
        };
        assert_eq!(cfg.car_color(3), DEFAULT_CAR_COLORS[0]);
    }
}
