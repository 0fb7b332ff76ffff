//! Facade Golf - mini golf courses on live scanned street geometry
//!
//! Core modules:
//! - `sim`: Deterministic course logic (placement search, bounce-path search,
//!   shot prediction, session orchestration)
//! - `settings`: Data-driven gameplay tunables

pub mod settings;
pub mod sim;

pub use settings::{Settings, SettingsError};

use glam::{Quat, Vec3};

/// Engine-wide constants
pub mod consts {
    /// Fixed simulation timestep used by the native driver (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Sphere tracing: maximum march iterations per shape
    pub const MARCH_MAX_STEPS: usize = 512;
    /// Sphere tracing: distance below which a march counts as contact
    pub const MARCH_HIT_EPSILON: f32 = 1.0e-4;
    /// Sphere tracing: hard cap on query length (unbounded casts stop here)
    pub const FAR_CLIP: f32 = 10_000.0;
    /// Finite-difference step for SDF normals
    pub const NORMAL_EPSILON: f32 = 1.0e-3;

    /// Bounce search sweeps this half-angle either side of the hole direction
    pub const BOUNCE_HALF_ANGLE_DEG: f32 = 90.0;
}

/// Drop the vertical component of a vector
#[inline]
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Rotate a vector around the world up axis by `degrees`
#[inline]
pub fn rotate_about_up(v: Vec3, degrees: f32) -> Vec3 {
    Quat::from_rotation_y(degrees.to_radians()) * v
}

/// Reflect a direction off a surface with the given unit normal
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect(v: Vec3, normal: Vec3) -> Vec3 {
    v - 2.0 * v.dot(normal) * normal
}

/// Yaw-only rotation whose +Z axis points from `from` toward `to` in the
/// horizontal plane. Identity when the two points are vertically aligned.
pub fn facing_horizontal(from: Vec3, to: Vec3) -> Quat {
    let dir = horizontal(to - from);
    if dir.length_squared() < 1.0e-8 {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_y(dir.x.atan2(dir.z))
}

/// Angles (degrees) of a symmetric fan `-max..=max` stepped by `increment`
///
/// Steps are computed from an index rather than accumulated so the last
/// angle lands on `max` without float drift.
pub fn angle_fan(max: f32, increment: f32) -> impl Iterator<Item = f32> + Clone {
    let increment = increment.max(0.0);
    (0..fan_len(max, increment)).map(move |i| -max + i as f32 * increment)
}

/// Number of angles in [`angle_fan`]. A non-positive increment collapses the
/// fan to its first angle.
pub fn fan_len(max: f32, increment: f32) -> u32 {
    if increment > 0.0 && max >= 0.0 {
        ((2.0 * max) / increment + 1.0e-4).floor() as u32
    } else {
        0
    }
    .saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_fan_endpoints() {
        let angles: Vec<f32> = angle_fan(90.0, 1.0).collect();
        assert_eq!(angles.len(), 181);
        assert!((angles[0] + 90.0).abs() < 1e-5);
        assert!((angles[180] - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_angle_fan_zero_width() {
        let angles: Vec<f32> = angle_fan(0.0, 5.0).collect();
        assert_eq!(angles, vec![0.0]);
    }

    #[test]
    fn test_angle_fan_bad_increment() {
        for increment in [0.0, -5.0, f32::NAN] {
            assert_eq!(fan_len(90.0, increment), 1);
            let angles: Vec<f32> = angle_fan(90.0, increment).collect();
            assert_eq!(angles, vec![-90.0]);
        }
        assert_eq!(fan_len(90.0, f32::MIN_POSITIVE), u32::MAX);
    }

    #[test]
    fn test_rotate_about_up() {
        let v = rotate_about_up(Vec3::Z, 90.0);
        assert!((v - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_reflect() {
        // Moving +Z into a wall facing -Z
        let r = reflect(Vec3::new(1.0, 0.0, 1.0), Vec3::NEG_Z);
        assert!((r - Vec3::new(1.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn test_facing_horizontal() {
        let q = facing_horizontal(Vec3::new(0.0, -1.5, 5.0), Vec3::ZERO);
        let forward = q * Vec3::Z;
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
        assert_eq!(facing_horizontal(Vec3::ZERO, Vec3::Y), Quat::IDENTITY);
    }
}
