//! Geometry query interface
//!
//! The course logic never owns scene geometry. It asks ray and swept-sphere
//! questions through [`GeometryQuery`], filtered by surface classification.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::shape::{Pose, Shape};

/// Surface classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Ground,
    Facade,
    Obstacle,
    Hole,
    Ball,
}

impl Layer {
    pub const ALL: [Layer; 5] = [
        Layer::Ground,
        Layer::Facade,
        Layer::Obstacle,
        Layer::Hole,
        Layer::Ball,
    ];

    #[inline]
    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Set of layers a query considers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerMask(u8);

impl LayerMask {
    pub const EMPTY: LayerMask = LayerMask(0);

    /// Mask holding exactly one layer
    pub const fn only(layer: Layer) -> Self {
        LayerMask(layer.bit())
    }

    /// Mask extended with `layer`
    pub const fn with(self, layer: Layer) -> Self {
        LayerMask(self.0 | layer.bit())
    }

    #[inline]
    pub const fn contains(self, layer: Layer) -> bool {
        self.0 & layer.bit() != 0
    }
}

/// Result of a successful cast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Distance travelled along the cast direction
    pub distance: f32,
    /// Contact point on the struck surface
    pub point: Vec3,
    /// Surface normal at the contact
    pub normal: Vec3,
    pub layer: Layer,
    /// Scene surface that was struck; `None` for course-owned colliders
    pub surface: Option<SurfaceId>,
}

/// Identity of a scene surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

/// Read-only ray and swept-sphere queries against a layered scene
pub trait GeometryQuery {
    /// Sweep a sphere of `radius` from `origin` along `direction`
    ///
    /// `direction` need not be normalized; a zero direction never hits.
    /// Returns the nearest hit among surfaces in `mask`.
    fn spherecast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<Hit>;

    /// Infinitely thin ray cast
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<Hit> {
        self.spherecast(origin, 0.0, direction, max_distance, mask)
    }
}

impl<Q: GeometryQuery + ?Sized> GeometryQuery for &Q {
    fn spherecast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<Hit> {
        (**self).spherecast(origin, radius, direction, max_distance, mask)
    }
}

/// A classified shape that is not part of the scanned scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub layer: Layer,
    pub pose: Pose,
    pub shape: Shape,
}

impl Collider {
    /// Cast against this single collider, honoring the layer mask
    pub fn cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
        surface: Option<SurfaceId>,
    ) -> Option<Hit> {
        if !mask.contains(self.layer) {
            return None;
        }
        let (distance, normal) =
            self.shape
                .sphere_cast(&self.pose, origin, direction, radius, max_distance)?;
        Some(Hit {
            distance,
            point: origin + direction * distance - normal * radius,
            normal,
            layer: self.layer,
            surface,
        })
    }
}

/// Pick the nearer of two optional hits
pub fn nearest(a: Option<Hit>, b: Option<Hit>) -> Option<Hit> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.distance < a.distance { b } else { a }),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Course-owned colliders layered over a base query
///
/// The hole trigger and obstacles belong to the course, not the scan, so
/// they are answered here and merged with whatever the base query reports.
pub struct Overlay<'a, Q: ?Sized> {
    base: &'a Q,
    colliders: &'a [Collider],
}

impl<'a, Q: GeometryQuery + ?Sized> Overlay<'a, Q> {
    pub fn new(base: &'a Q, colliders: &'a [Collider]) -> Self {
        Self { base, colliders }
    }
}

impl<Q: GeometryQuery + ?Sized> GeometryQuery for Overlay<'_, Q> {
    fn spherecast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<Hit> {
        let dir = direction.try_normalize()?;
        let base = self
            .base
            .spherecast(origin, radius, dir, max_distance, mask);
        self.colliders.iter().fold(base, |best, collider| {
            nearest(
                best,
                collider.cast(origin, radius, dir, max_distance, mask, None),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;

    impl GeometryQuery for Empty {
        fn spherecast(&self, _: Vec3, _: f32, _: Vec3, _: f32, _: LayerMask) -> Option<Hit> {
            None
        }
    }

    #[test]
    fn test_layer_mask() {
        let mask = LayerMask::only(Layer::Facade).with(Layer::Obstacle);
        assert!(mask.contains(Layer::Facade));
        assert!(mask.contains(Layer::Obstacle));
        assert!(!mask.contains(Layer::Hole));
        assert!(!LayerMask::EMPTY.contains(Layer::Ground));
        for layer in Layer::ALL {
            assert!(LayerMask::only(layer).contains(layer));
        }
    }

    #[test]
    fn test_overlay_reports_collider_layer() {
        let hole = Collider {
            layer: Layer::Hole,
            pose: Pose::at(Vec3::new(0.0, 0.0, 5.0)),
            shape: Shape::Sphere { radius: 0.5 },
        };
        let colliders = [hole];
        let overlay = Overlay::new(&Empty, &colliders);

        let hit = overlay
            .spherecast(Vec3::ZERO, 0.1, Vec3::Z * 3.0, 10.0, LayerMask::only(Layer::Hole))
            .expect("should hit the hole trigger");
        assert_eq!(hit.layer, Layer::Hole);
        assert!(hit.surface.is_none());
        assert!((hit.distance - 4.4).abs() < 1e-3);
        assert!((hit.point - Vec3::new(0.0, 0.0, 4.5)).length() < 1e-3);

        // Masked out
        assert!(overlay
            .spherecast(Vec3::ZERO, 0.1, Vec3::Z, 10.0, LayerMask::only(Layer::Facade))
            .is_none());
    }

    #[test]
    fn test_overlay_zero_direction_never_hits() {
        let overlay = Overlay::new(&Empty, &[]);
        assert!(overlay
            .spherecast(Vec3::ZERO, 0.1, Vec3::ZERO, 10.0, LayerMask::only(Layer::Hole))
            .is_none());
    }

    #[test]
    fn test_nearest() {
        let make = |d: f32| Hit {
            distance: d,
            point: Vec3::ZERO,
            normal: Vec3::Y,
            layer: Layer::Facade,
            surface: None,
        };
        assert_eq!(nearest(Some(make(2.0)), Some(make(1.0))).map(|h| h.distance), Some(1.0));
        assert_eq!(nearest(None, Some(make(3.0))).map(|h| h.distance), Some(3.0));
        assert!(nearest(None, None).is_none());
    }
}
