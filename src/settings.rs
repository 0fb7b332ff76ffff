//! Gameplay tunables
//!
//! A flat set of named numbers supplied when a session starts. Loaded from
//! JSON; any field missing from the file keeps its default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::ObstacleShape;

/// Errors raised while loading or validating settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Gameplay settings (distances in meters, angles in degrees, times in seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Ball ===
    /// Ball diameter
    pub ball_diameter: f32,
    /// Distance in front of the viewer where the ball is placed
    pub ball_spawn_distance: f32,
    /// Height above the placement the ball is dropped from
    pub ball_spawn_height: f32,
    /// Shot force accumulated per second of charging
    pub force_per_second: f32,

    // === Hole ===
    pub hole_radius: f32,
    /// Extra clearance around the hole that facades must respect
    pub hole_spawn_padding: f32,
    pub hole_spawn_distance_min: f32,
    pub hole_spawn_distance_max: f32,
    /// Half-width of the hole search fan
    pub hole_spawn_angle_max: f32,
    pub hole_angle_increment: f32,

    // === Ground ===
    /// Half-length of the downward ground snapping ray
    pub ground_ray_length: f32,
    /// Terrain meshes are lowered by this much when registered
    pub floor_offset: f32,

    // === Obstacle ===
    pub obstacle_ball_margin: f32,
    pub obstacle_hole_margin: f32,
    pub obstacle_angle_increment: f32,
    pub obstacle_ray_max_distance: f32,
    /// Casts the bounce search may issue per tick before yielding
    pub raycasts_per_tick: u32,
    /// Obstacle shapes to pick from
    pub obstacle_shapes: Vec<ObstacleShape>,

    // === Shot ===
    /// Linear extrapolation window for shot prediction
    pub shot_prediction_time: f32,
    /// Grace period after launch with no prediction
    pub shot_min_duration: f32,
    /// Hard timeout for a shot
    pub shot_max_duration: f32,

    // === Session pacing ===
    /// Delay between a hit and the next challenge
    pub message_read_time: f32,
    /// Wait after the first surface arrives before the first course
    pub geometry_settle_time: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ball_diameter: 0.08,
            ball_spawn_distance: 1.2,
            ball_spawn_height: 0.2,
            force_per_second: 2.5,

            hole_radius: 0.15,
            hole_spawn_padding: 0.3,
            hole_spawn_distance_min: 2.0,
            hole_spawn_distance_max: 8.0,
            hole_spawn_angle_max: 60.0,
            hole_angle_increment: 5.0,

            ground_ray_length: 3.0,
            floor_offset: 0.0,

            obstacle_ball_margin: 1.0,
            obstacle_hole_margin: 1.0,
            obstacle_angle_increment: 1.0,
            obstacle_ray_max_distance: 30.0,
            raycasts_per_tick: 20,
            obstacle_shapes: vec![
                ObstacleShape::Column {
                    radius: 0.25,
                    height: 0.6,
                },
                ObstacleShape::Block {
                    half_extents: glam::Vec3::new(0.3, 0.3, 0.3),
                },
            ],

            shot_prediction_time: 1.0,
            shot_min_duration: 0.5,
            shot_max_duration: 15.0,

            message_read_time: 2.0,
            geometry_settle_time: 1.0,
        }
    }
}

impl Settings {
    /// Ball radius (half the diameter)
    #[inline]
    pub fn ball_radius(&self) -> f32 {
        self.ball_diameter * 0.5
    }

    /// Parse settings from JSON and validate them
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Check the relationships between tunables that the searches rely on
    pub fn validate(&self) -> Result<(), SettingsError> {
        fn invalid(field: &'static str, reason: &'static str) -> SettingsError {
            SettingsError::Invalid { field, reason }
        }

        if !(self.ball_diameter > 0.0) {
            return Err(invalid("ball_diameter", "must be positive"));
        }
        if !(self.hole_radius > 0.0) {
            return Err(invalid("hole_radius", "must be positive"));
        }
        if self.hole_spawn_distance_min < 0.0 {
            return Err(invalid("hole_spawn_distance_min", "must not be negative"));
        }
        if self.hole_spawn_distance_max < self.hole_spawn_distance_min {
            return Err(invalid(
                "hole_spawn_distance_max",
                "must be at least hole_spawn_distance_min",
            ));
        }
        if self.hole_spawn_angle_max < 0.0 {
            return Err(invalid("hole_spawn_angle_max", "must not be negative"));
        }
        if !(self.hole_angle_increment > 0.0) {
            return Err(invalid("hole_angle_increment", "must be positive"));
        }
        if !(self.obstacle_angle_increment > 0.0) {
            return Err(invalid("obstacle_angle_increment", "must be positive"));
        }
        if !(self.ground_ray_length > 0.0) {
            return Err(invalid("ground_ray_length", "must be positive"));
        }
        if self.raycasts_per_tick == 0 {
            return Err(invalid("raycasts_per_tick", "must be at least 1"));
        }
        if self.obstacle_shapes.is_empty() {
            return Err(invalid("obstacle_shapes", "needs at least one shape"));
        }
        if self.shot_max_duration < self.shot_min_duration {
            return Err(invalid(
                "shot_max_duration",
                "must be at least shot_min_duration",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{ "hole_radius": 0.2, "raycasts_per_tick": 5 }"#)
            .expect("partial settings should parse");
        assert_eq!(settings.raycasts_per_tick, 5);
        assert!((settings.hole_radius - 0.2).abs() < 1e-6);
        assert!((settings.hole_spawn_distance_max - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_inverted_distance_bounds_rejected() {
        let result = Settings::from_json(
            r#"{ "hole_spawn_distance_min": 9.0, "hole_spawn_distance_max": 3.0 }"#,
        );
        assert!(matches!(
            result,
            Err(SettingsError::Invalid {
                field: "hole_spawn_distance_max",
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Settings::from_json("{ not json"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_obstacle_shapes_roundtrip_from_json() {
        let settings = Settings::from_json(
            r#"{ "obstacle_shapes": [ { "Column": { "radius": 0.5, "height": 1.0 } } ] }"#,
        )
        .expect("shape list should parse");
        assert_eq!(
            settings.obstacle_shapes,
            vec![ObstacleShape::Column {
                radius: 0.5,
                height: 1.0
            }]
        );
    }
}
