//! Hole and ball placement search
//!
//! Both searches run synchronously: the hole search is a fixed angular fan of
//! facade sphere casts, the ball search a single projection. Each result is
//! snapped onto ground with a bounded downward ray.

use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::query::{GeometryQuery, Layer, LayerMask, SurfaceId};
use crate::settings::Settings;
use crate::{angle_fan, facing_horizontal, horizontal, rotate_about_up};

const FACADE: LayerMask = LayerMask::only(Layer::Facade);
const GROUND: LayerMask = LayerMask::only(Layer::Ground);

/// The player's device pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewer {
    pub position: Vec3,
    pub forward: Vec3,
    /// Height of the device above the ground it stands on
    pub height: f32,
}

impl Viewer {
    /// Horizontal unit forward (falls back to +Z when looking straight down)
    pub fn horizontal_forward(&self) -> Vec3 {
        horizontal(self.forward).normalize_or(Vec3::Z)
    }
}

/// Where the hole sits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HolePlacement {
    pub position: Vec3,
    /// Yaw facing the viewer at placement time
    pub rotation: Quat,
    pub radius: f32,
    /// Ground surface the hole rests on
    pub ground: Option<SurfaceId>,
}

/// Where the ball is (re)spawned from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallPlacement {
    pub position: Vec3,
    pub ground: Option<SurfaceId>,
}

impl BallPlacement {
    /// Drop point: the placement lifted by the spawn height
    pub fn spawn_point(&self, settings: &Settings) -> Vec3 {
        self.position + Vec3::Y * settings.ball_spawn_height
    }
}

/// Result of snapping a point onto ground
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundSnap {
    pub position: Vec3,
    pub ground: Option<SurfaceId>,
}

/// A surviving direction of the hole fan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoleCandidate {
    /// Degrees from the viewer's horizontal forward
    pub angle: f32,
    /// Free distance before a facade (infinite when open)
    pub available: f32,
}

/// Cast straight down onto ground
///
/// The ray starts `ray_length` above `position` and travels
/// `2 * ray_length + extra_length`. A miss keeps `position` unchanged with no
/// ground.
pub fn snap_to_ground<Q: GeometryQuery + ?Sized>(
    query: &Q,
    position: Vec3,
    ray_length: f32,
    extra_length: f32,
) -> GroundSnap {
    let start = position + Vec3::Y * ray_length;
    match query.raycast(start, Vec3::NEG_Y, ray_length * 2.0 + extra_length, GROUND) {
        Some(hit) => GroundSnap {
            position: hit.point,
            ground: hit.surface,
        },
        None => GroundSnap {
            position,
            ground: None,
        },
    }
}

/// Scan the hole fan and keep directions with room beyond the minimum distance
pub fn hole_candidates<Q: GeometryQuery + ?Sized>(
    query: &Q,
    viewer: &Viewer,
    settings: &Settings,
) -> Vec<HoleCandidate> {
    let forward = viewer.horizontal_forward();
    let clearance = settings.hole_radius + settings.hole_spawn_padding;

    angle_fan(settings.hole_spawn_angle_max, settings.hole_angle_increment)
        .filter_map(|angle| {
            let direction = rotate_about_up(forward, angle);
            let available = query
                .spherecast(viewer.position, clearance, direction, f32::INFINITY, FACADE)
                .map_or(f32::INFINITY, |hit| hit.distance);
            (available > settings.hole_spawn_distance_min)
                .then_some(HoleCandidate { angle, available })
        })
        .collect()
}

/// Find a spot for the hole, or `None` when every direction is blocked
pub fn find_hole<Q, R>(
    query: &Q,
    viewer: &Viewer,
    settings: &Settings,
    rng: &mut R,
) -> Option<HolePlacement>
where
    Q: GeometryQuery + ?Sized,
    R: Rng,
{
    let candidates = hole_candidates(query, viewer, settings);
    if candidates.is_empty() {
        log::warn!("No room for a hole in any direction");
        return None;
    }

    let pick = candidates[rng.random_range(0..candidates.len())];
    let max = pick.available.min(settings.hole_spawn_distance_max);
    let distance = if max > settings.hole_spawn_distance_min {
        rng.random_range(settings.hole_spawn_distance_min..=max)
    } else {
        settings.hole_spawn_distance_min
    };

    let direction = rotate_about_up(viewer.horizontal_forward(), pick.angle);
    let projected = viewer.position + direction * distance - Vec3::Y * viewer.height;
    let snap = snap_to_ground(query, projected, settings.ground_ray_length, 0.0);

    log::info!(
        "Hole at {:?} (angle {:.1}, distance {:.2}, grounded: {})",
        snap.position,
        pick.angle,
        distance,
        snap.ground.is_some()
    );

    Some(HolePlacement {
        position: snap.position,
        rotation: facing_horizontal(snap.position, viewer.position),
        radius: settings.hole_radius,
        ground: snap.ground,
    })
}

/// Find the ball spot
///
/// Once a shot has been fired at the current hole the previous spot is kept
/// so respawns are comparable.
pub fn find_ball<Q: GeometryQuery + ?Sized>(
    query: &Q,
    hole_is_fresh: bool,
    previous: Option<BallPlacement>,
    viewer: &Viewer,
    settings: &Settings,
) -> BallPlacement {
    if let (false, Some(previous)) = (hole_is_fresh, previous) {
        return previous;
    }

    let projected = viewer.position + viewer.horizontal_forward() * settings.ball_spawn_distance;
    let snap = snap_to_ground(query, projected, settings.ground_ray_length, viewer.height);
    log::debug!(
        "Ball spot at {:?} (grounded: {})",
        snap.position,
        snap.ground.is_some()
    );
    BallPlacement {
        position: snap.position,
        ground: snap.ground,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scene::{Scene, Surface, SurfaceEvent};
    use crate::sim::shape::{Pose, Shape};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const VIEWER_HEIGHT: f32 = 1.5;

    fn viewer() -> Viewer {
        Viewer {
            position: Vec3::ZERO,
            forward: Vec3::Z,
            height: VIEWER_HEIGHT,
        }
    }

    fn street(walls: &[(Vec3, Vec3)]) -> Scene {
        let mut scene = Scene::new(0.0);
        scene.apply(SurfaceEvent::Added(Surface {
            id: SurfaceId(1),
            layer: Layer::Ground,
            pose: Pose::at(Vec3::new(0.0, -VIEWER_HEIGHT, 0.0)),
            shape: Shape::HalfSpace,
        }));
        for (i, &(center, half_extents)) in walls.iter().enumerate() {
            scene.apply(SurfaceEvent::Added(Surface {
                id: SurfaceId(100 + i as u64),
                layer: Layer::Facade,
                pose: Pose::at(center),
                shape: Shape::Cuboid { half_extents },
            }));
        }
        scene
    }

    /// Wall whose near face sits at z = 10 and spans the whole fan
    fn wall_at_ten() -> (Vec3, Vec3) {
        (Vec3::new(0.0, 0.0, 10.5), Vec3::new(100.0, 20.0, 0.5))
    }

    #[test]
    fn test_hole_in_front_of_wall() {
        let scene = street(&[wall_at_ten()]);
        let settings = Settings {
            hole_spawn_angle_max: 0.0,
            hole_spawn_distance_min: 2.0,
            hole_spawn_distance_max: 8.0,
            ..Default::default()
        };
        let mut rng = Pcg32::seed_from_u64(7);

        let hole = find_hole(&scene, &viewer(), &settings, &mut rng).expect("room for a hole");
        assert!(hole.position.z >= 2.0 && hole.position.z <= 8.0);
        assert!(hole.position.x.abs() < 1e-4);
        assert!((hole.position.y + VIEWER_HEIGHT).abs() < 1e-3);
        assert_eq!(hole.ground, Some(SurfaceId(1)));
        assert!((hole.radius - settings.hole_radius).abs() < 1e-6);

        // Faces back toward the viewer
        let facing = hole.rotation * Vec3::Z;
        assert!((facing - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn test_no_room_returns_none() {
        // Wall right in front of the viewer, closer than the minimum distance
        let scene = street(&[(Vec3::new(0.0, 0.0, 1.5), Vec3::new(100.0, 20.0, 0.5))]);
        let settings = Settings {
            hole_spawn_angle_max: 45.0,
            ..Default::default()
        };
        let mut rng = Pcg32::seed_from_u64(1);
        assert!(hole_candidates(&scene, &viewer(), &settings).is_empty());
        assert!(find_hole(&scene, &viewer(), &settings, &mut rng).is_none());
    }

    #[test]
    fn test_open_directions_have_infinite_room() {
        let scene = street(&[]);
        let settings = Settings::default();
        let candidates = hole_candidates(&scene, &viewer(), &settings);
        assert_eq!(
            candidates.len(),
            angle_fan(settings.hole_spawn_angle_max, settings.hole_angle_increment).count()
        );
        assert!(candidates.iter().all(|c| c.available.is_infinite()));
    }

    #[test]
    fn test_hole_without_ground_is_ungrounded() {
        let scene = Scene::new(0.0);
        let mut rng = Pcg32::seed_from_u64(3);
        let hole = find_hole(&scene, &viewer(), &Settings::default(), &mut rng)
            .expect("open space still yields a position");
        assert!(hole.ground.is_none());
        assert!((hole.position.y + VIEWER_HEIGHT).abs() < 1e-5);
    }

    #[test]
    fn test_ball_projected_and_grounded() {
        let scene = street(&[]);
        let settings = Settings::default();
        let ball = find_ball(&scene, true, None, &viewer(), &settings);
        assert_eq!(ball.ground, Some(SurfaceId(1)));
        assert!((ball.position.z - settings.ball_spawn_distance).abs() < 1e-4);
        assert!((ball.position.y + VIEWER_HEIGHT).abs() < 1e-3);
        let spawn = ball.spawn_point(&settings);
        assert!((spawn.y - ball.position.y - settings.ball_spawn_height).abs() < 1e-5);
    }

    #[test]
    fn test_ball_reused_when_hole_not_fresh() {
        let scene = street(&[]);
        let previous = BallPlacement {
            position: Vec3::new(4.0, -1.5, 2.0),
            ground: None,
        };
        let ball = find_ball(&scene, false, Some(previous), &viewer(), &Settings::default());
        assert_eq!(ball, previous);

        // Fresh hole recomputes
        let ball = find_ball(&scene, true, Some(previous), &viewer(), &Settings::default());
        assert_ne!(ball, previous);
    }

    #[test]
    fn test_ball_without_ground_keeps_projection() {
        let scene = Scene::new(0.0);
        let ball = find_ball(&scene, true, None, &viewer(), &Settings::default());
        assert!(ball.ground.is_none());
        assert!((ball.position - Vec3::new(0.0, 0.0, 1.2)).length() < 1e-5);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_hole_respects_constraints(
            seed in any::<u64>(),
            wall_z in 1.0f32..12.0,
            wall_x in -6.0f32..6.0,
            wall_width in 0.5f32..8.0,
        ) {
            let scene = street(&[
                wall_at_ten(),
                (Vec3::new(wall_x, 0.0, wall_z + 0.5), Vec3::new(wall_width, 20.0, 0.5)),
            ]);
            let settings = Settings::default();
            let mut rng = Pcg32::seed_from_u64(seed);
            let clearance = settings.hole_radius + settings.hole_spawn_padding;

            if let Some(hole) = find_hole(&scene, &viewer(), &settings, &mut rng) {
                let offset = horizontal(hole.position);
                let distance = offset.length();
                prop_assert!(distance >= settings.hole_spawn_distance_min - 1e-3);
                prop_assert!(distance <= settings.hole_spawn_distance_max + 1e-3);

                // No facade within the clearance sphere before the hole
                let blocked = scene.spherecast(
                    Vec3::ZERO,
                    clearance,
                    offset,
                    settings.hole_spawn_distance_min,
                    FACADE,
                );
                prop_assert!(blocked.is_none());
            } else {
                prop_assert!(hole_candidates(&scene, &viewer(), &settings).is_empty());
            }
        }
    }
}
