//! SDF-based collision shapes
//!
//! Every collider is a signed distance field in its local frame plus a pose.
//! Ray and swept-sphere casts are answered by sphere tracing that field.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::consts::{FAR_CLIP, MARCH_HIT_EPSILON, MARCH_MAX_STEPS, NORMAL_EPSILON};

/// Position and orientation of a collider in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    #[serde(default = "identity")]
    pub rotation: Quat,
}

fn identity() -> Quat {
    Quat::IDENTITY
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(Vec3::ZERO)
    }
}

impl Pose {
    /// Unrotated pose at `position`
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    #[inline]
    pub fn to_local(&self, p: Vec3) -> Vec3 {
        self.rotation.inverse() * (p - self.position)
    }

    #[inline]
    pub fn dir_to_local(&self, d: Vec3) -> Vec3 {
        self.rotation.inverse() * d
    }

    #[inline]
    pub fn dir_to_world(&self, d: Vec3) -> Vec3 {
        self.rotation * d
    }
}

/// Collider geometry in its local frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Sphere { radius: f32 },
    /// Box centered on the origin
    Cuboid { half_extents: Vec3 },
    /// Capped cylinder along local Y, centered on the origin
    Cylinder { radius: f32, half_height: f32 },
    /// Solid half-space below the local XZ plane (terrain stand-in)
    HalfSpace,
}

/// Signed distance to a sphere at the origin
#[inline]
pub fn sd_sphere(p: Vec3, radius: f32) -> f32 {
    p.length() - radius
}

/// Signed distance to a box centered on the origin
pub fn sd_cuboid(p: Vec3, half_extents: Vec3) -> f32 {
    let q = p.abs() - half_extents;
    q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
}

/// Signed distance to a Y-aligned capped cylinder
pub fn sd_cylinder(p: Vec3, radius: f32, half_height: f32) -> f32 {
    let radial = (p.x * p.x + p.z * p.z).sqrt() - radius;
    let axial = p.y.abs() - half_height;
    let outside = glam::Vec2::new(radial.max(0.0), axial.max(0.0)).length();
    outside + radial.max(axial).min(0.0)
}

/// Signed distance to the half-space y <= 0
#[inline]
pub fn sd_half_space(p: Vec3) -> f32 {
    p.y
}

impl Shape {
    /// Signed distance from a local-space point
    pub fn distance_local(&self, p: Vec3) -> f32 {
        match *self {
            Shape::Sphere { radius } => sd_sphere(p, radius),
            Shape::Cuboid { half_extents } => sd_cuboid(p, half_extents),
            Shape::Cylinder {
                radius,
                half_height,
            } => sd_cylinder(p, radius, half_height),
            Shape::HalfSpace => sd_half_space(p),
        }
    }

    /// Signed distance from a world-space point
    pub fn distance(&self, pose: &Pose, p: Vec3) -> f32 {
        self.distance_local(pose.to_local(p))
    }

    /// Sweep a sphere of `radius` from `origin` along unit `direction`
    ///
    /// Returns the travel distance at contact and the world-space surface
    /// normal. A sphere that already overlaps the shape at `origin` does not
    /// report that shape.
    pub fn sphere_cast(
        &self,
        pose: &Pose,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
    ) -> Option<(f32, Vec3)> {
        let local_origin = pose.to_local(origin);
        let local_dir = pose.dir_to_local(direction);
        let (t, normal) = sphere_march(
            local_origin,
            local_dir,
            radius,
            max_distance,
            |p| self.distance_local(p),
        )?;
        Some((t, pose.dir_to_world(normal)))
    }
}

/// Compute SDF gradient (surface normal) using central differences
pub fn sdf_gradient<F>(p: Vec3, sdf: F) -> Vec3
where
    F: Fn(Vec3) -> f32,
{
    let e = NORMAL_EPSILON;
    let dx = sdf(p + Vec3::new(e, 0.0, 0.0)) - sdf(p - Vec3::new(e, 0.0, 0.0));
    let dy = sdf(p + Vec3::new(0.0, e, 0.0)) - sdf(p - Vec3::new(0.0, e, 0.0));
    let dz = sdf(p + Vec3::new(0.0, 0.0, e)) - sdf(p - Vec3::new(0.0, 0.0, e));
    Vec3::new(dx, dy, dz).normalize_or_zero()
}

/// Sphere-trace a swept sphere against an SDF
///
/// Returns `(t, normal)` where `t` is the distance travelled along the unit
/// `direction` when the sphere first touches the surface.
pub fn sphere_march<F>(
    origin: Vec3,
    direction: Vec3,
    radius: f32,
    max_distance: f32,
    sdf: F,
) -> Option<(f32, Vec3)>
where
    F: Fn(Vec3) -> f32,
{
    let limit = max_distance.min(FAR_CLIP);
    if sdf(origin) <= radius {
        return None;
    }

    let mut t = 0.0;
    for _ in 0..MARCH_MAX_STEPS {
        let p = origin + direction * t;
        let d = sdf(p) - radius;

        if d < MARCH_HIT_EPSILON {
            return Some((t, sdf_gradient(p, &sdf)));
        }

        // Step by distance to surface (sphere tracing)
        t += d;
        if t > limit {
            break;
        }
    }

    None
}
