//! Derived per-car statistics: distance, airborne state and personal records.

use crate::config::GameConfig;
use crate::constants::MPS_TO_KMH;

/// Which personal records were broken by the last observation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordBreak {
    pub height: bool,
    pub air_time: bool,
    pub top_speed: bool,
}

impl RecordBreak {
    pub fn any(&self) -> bool {
        self.height || self.air_time || self.top_speed
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Telemetry {
    /// Multiplier on engine force, grown by boost pickups. Unbounded.
    pub acceleration_modifier: f32,
    pub distance_traveled: f32,
    pub current_height: f32,
    pub max_height: f32,
    pub current_air_time: f32,
    pub max_air_time: f32,
    pub top_speed_kmh: f32,
    /// Session time (seconds) at which the car left the ground, while airborne.
    airborne_since: Option<f64>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            acceleration_modifier: 1.0,
            distance_traveled: 0.0,
            current_height: 0.0,
            max_height: 0.0,
            current_air_time: 0.0,
            max_air_time: 0.0,
            top_speed_kmh: 0.0,
            airborne_since: None,
        }
    }
}

impl Telemetry {
    pub fn is_airborne(&self) -> bool {
        self.airborne_since.is_some()
    }

    /// Fold one frame into the running statistics.
    ///
    /// `height` is the chassis height above y = 0, `speed` the world-frame speed (m/s),
    /// `now` the session clock (seconds).
    pub fn observe(
        &mut self,
        height: f32,
        speed: f32,
        wall_dt: f32,
        now: f64,
        cfg: &GameConfig,
    ) -> RecordBreak {
        let mut broke = RecordBreak::default();

        self.distance_traveled += speed * wall_dt;
        self.current_height = height;

        if height > cfg.ground_threshold {
            if self.airborne_since.is_none() {
                self.airborne_since = Some(now);
            }
            if height > self.max_height {
                self.max_height = height;
                broke.height = true;
            }
        } else if let Some(since) = self.airborne_since.take() {
            let air_time = (now - since) as f32;
            if air_time > cfg.min_air_time_to_record {
                self.current_air_time = air_time;
                if air_time > self.max_air_time {
                    self.max_air_time = air_time;
                    broke.air_time = true;
                }
            }
        }

        let kmh = speed * MPS_TO_KMH;
        if kmh > self.top_speed_kmh {
            self.top_speed_kmh = kmh;
            broke.top_speed = true;
        }

        broke
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hop_is_not_recorded() {
        let cfg = GameConfig::default();
        let mut t = Telemetry::default();
        t.observe(0.6, 0.0, 0.05, 1.0, &cfg);
        assert!(t.is_airborne());
        let broke = t.observe(0.2, 0.0, 0.05, 1.05, &cfg);
        assert!(!broke.air_time);
        assert_eq!(t.max_air_time, 0.0);
        assert!(!t.is_airborne());
    }

    #[test]
    fn jump_longer_than_minimum_sets_record() {
        let cfg = GameConfig::default();
        let mut t = Telemetry::default();
        t.observe(0.6, 0.0, 0.1, 1.0, &cfg);
        t.observe(0.6, 0.0, 0.1, 1.1, &cfg);
        let broke = t.observe(0.2, 0.0, 0.1, 1.2, &cfg);
        assert!(broke.air_time);
        assert!((t.max_air_time - 0.2).abs() < 1e-4);

        // A shorter jump afterwards does not lower the record.
        t.observe(0.6, 0.0, 0.1, 5.0, &cfg);
        let broke = t.observe(0.2, 0.0, 0.1, 5.15, &cfg);
        assert!(!broke.air_time);
        assert!((t.current_air_time - 0.15).abs() < 1e-4);
        assert!((t.max_air_time - 0.2).abs() < 1e-4);
    }

    #[test]
    fn height_record_only_counts_while_airborne() {
        let cfg = GameConfig::default();
        let mut t = Telemetry::default();
        assert!(!t.observe(0.4, 0.0, 0.1, 0.0, &cfg).height);
        assert_eq!(t.max_height, 0.0);

        assert!(t.observe(3.0, 0.0, 0.1, 0.1, &cfg).height);
        assert!(!t.observe(2.0, 0.0, 0.1, 0.2, &cfg).height);
        assert_eq!(t.max_height, 3.0);
    }

    #[test]
    fn distance_and_top_speed() {
        let cfg = GameConfig::default();
        let mut t = Telemetry::default();
        let broke = t.observe(0.3, 10.0, 0.5, 0.0, &cfg);
        assert!(broke.top_speed);
        assert!((t.distance_traveled - 5.0).abs() < 1e-5);
        assert!((t.top_speed_kmh - 36.0).abs() < 1e-4);

        let broke = t.observe(0.3, 5.0, 0.5, 0.5, &cfg);
        assert!(!broke.top_speed);
        assert!((t.distance_traveled - 7.5).abs() < 1e-5);
    }
}
