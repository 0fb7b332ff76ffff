//! Obstacle placement with one-bounce path validation
//!
//! An obstacle is dropped on the ball→hole line, then a fan of directions
//! around the hole direction is swept looking for a path that bounces once
//! off a facade and reaches the hole without touching the obstacle.
//!
//! The sweep is resumable: each [`BouncePathSearch::step`] issues at most a
//! budget of casts and then yields, continuing from the next unscanned angle
//! on the following call.

use glam::Vec3;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::placement::{BallPlacement, HolePlacement, snap_to_ground};
use super::query::{Collider, GeometryQuery, Layer, LayerMask, Overlay, SurfaceId};
use super::shape::{Pose, Shape};
use crate::consts::BOUNCE_HALF_ANGLE_DEG;
use crate::settings::Settings;
use crate::{fan_len, horizontal, reflect, rotate_about_up};

const FIRST_LEG: LayerMask = LayerMask::only(Layer::Facade).with(Layer::Obstacle);
const SECOND_LEG: LayerMask = LayerMask::only(Layer::Hole).with(Layer::Obstacle);

/// Obstacle geometry variants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ObstacleShape {
    /// Upright cylinder standing on the ground
    Column { radius: f32, height: f32 },
    /// Box resting on the ground
    Block { half_extents: Vec3 },
}

impl Default for ObstacleShape {
    fn default() -> Self {
        ObstacleShape::Column {
            radius: 0.25,
            height: 0.6,
        }
    }
}

impl ObstacleShape {
    /// Collider for this shape standing on `base`
    pub fn collider(&self, base: Vec3) -> Collider {
        let (shape, half_height) = match *self {
            ObstacleShape::Column { radius, height } => (
                Shape::Cylinder {
                    radius,
                    half_height: height * 0.5,
                },
                height * 0.5,
            ),
            ObstacleShape::Block { half_extents } => {
                (Shape::Cuboid { half_extents }, half_extents.y)
            }
        };
        Collider {
            layer: Layer::Obstacle,
            pose: Pose::at(base + Vec3::Y * half_height),
            shape,
        }
    }
}

/// Collider standing in for the hole trigger volume
pub fn hole_collider(hole: &HolePlacement) -> Collider {
    Collider {
        layer: Layer::Hole,
        pose: Pose::at(hole.position),
        shape: Shape::Sphere {
            radius: hole.radius,
        },
    }
}

/// The two legs of a validated bounce
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BouncePath {
    /// Fan angle (degrees) the path was found at
    pub angle: f32,
    /// Ball centre where the first leg starts
    pub start: Vec3,
    /// Unit direction of the first leg
    pub direction: Vec3,
    /// Ball centre at the moment of contact with the facade
    pub bounce: Vec3,
    /// Unit direction after reflection
    pub reflected: Vec3,
    /// Facade surface bounced off
    pub facade: Option<SurfaceId>,
}

/// A committed obstacle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstaclePlacement {
    /// Ground point the obstacle stands on
    pub position: Vec3,
    pub ground: Option<SurfaceId>,
    pub shape: ObstacleShape,
    pub path: BouncePath,
}

impl ObstaclePlacement {
    pub fn collider(&self) -> Collider {
        self.shape.collider(self.position)
    }
}

/// Outcome of one search step
#[derive(Debug, Clone, PartialEq)]
pub enum SearchStep {
    /// Budget spent; call again next tick
    Continue,
    Success(ObstaclePlacement),
    Failure,
}

/// Resumable bounce-path search for one provisional obstacle
#[derive(Debug, Clone)]
pub struct BouncePathSearch {
    base: Vec3,
    ground: Option<SurfaceId>,
    shape: ObstacleShape,
    /// Provisional obstacle + hole trigger, seen only by this search
    colliders: [Collider; 2],
    ball_center: Vec3,
    ball_radius: f32,
    forward: Vec3,
    max_distance: f32,
    increment: f32,
    angle_count: u32,
    next_angle: u32,
    casts_issued: u32,
    finished: bool,
    found: Option<ObstaclePlacement>,
}

impl BouncePathSearch {
    /// Drop a provisional obstacle between ball and hole
    ///
    /// Returns `None` when the hole is too close to fit an obstacle within
    /// the configured margins.
    pub fn new<Q, R>(
        query: &Q,
        ball: &BallPlacement,
        hole: &HolePlacement,
        settings: &Settings,
        rng: &mut R,
    ) -> Option<Self>
    where
        Q: GeometryQuery + ?Sized,
        R: Rng,
    {
        let to_hole = hole.position - ball.position;
        let hole_distance = to_hole.length();
        let lo = settings.obstacle_ball_margin;
        let hi = hole_distance - settings.obstacle_hole_margin;
        if hole_distance <= f32::EPSILON || hi < lo {
            log::warn!(
                "Hole too close for an obstacle ({:.2} m, margins {:.2}/{:.2})",
                hole_distance,
                lo,
                settings.obstacle_hole_margin
            );
            return None;
        }

        let offset = if hi > lo { rng.random_range(lo..=hi) } else { lo };
        let candidate = ball.position + to_hole / hole_distance * offset;
        let snap = snap_to_ground(query, candidate, settings.ground_ray_length, 0.0);
        let shape = settings
            .obstacle_shapes
            .choose(rng)
            .copied()
            .unwrap_or_default();

        log::debug!(
            "Provisional obstacle {:?} at {:?} ({:.2} of {:.2} m)",
            shape,
            snap.position,
            offset,
            hole_distance
        );

        let ball_radius = settings.ball_radius();
        let increment = settings.obstacle_angle_increment.max(0.0);
        let angle_count = fan_len(BOUNCE_HALF_ANGLE_DEG, increment);

        Some(Self {
            base: snap.position,
            ground: snap.ground,
            shape,
            colliders: [shape.collider(snap.position), hole_collider(hole)],
            ball_center: ball.position + Vec3::Y * ball_radius,
            ball_radius,
            forward: horizontal(to_hole).normalize_or(Vec3::Z),
            max_distance: settings.obstacle_ray_max_distance,
            increment,
            angle_count,
            next_angle: 0,
            casts_issued: 0,
            finished: false,
            found: None,
        })
    }

    /// Inert collider of the obstacle under test
    pub fn provisional(&self) -> &Collider {
        &self.colliders[0]
    }

    /// Angles not yet examined
    pub fn remaining_angles(&self) -> u32 {
        self.angle_count - self.next_angle
    }

    /// Total casts issued so far
    pub fn casts_issued(&self) -> u32 {
        self.casts_issued
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Scan angles until a path is found, the sweep ends, or `budget` casts
    /// have been issued
    ///
    /// Once finished, further calls repeat the verdict without casting.
    pub fn step<Q: GeometryQuery + ?Sized>(&mut self, query: &Q, budget: u32) -> SearchStep {
        if self.finished {
            return self.found.map_or(SearchStep::Failure, SearchStep::Success);
        }

        let overlay = Overlay::new(query, &self.colliders);
        let budget = budget.max(1);
        let mut used = 0;

        while self.next_angle < self.angle_count {
            let angle = -BOUNCE_HALF_ANGLE_DEG + self.next_angle as f32 * self.increment;
            self.next_angle += 1;

            let (casts, path) = self.try_angle(&overlay, angle);
            used += casts;
            self.casts_issued += casts;

            if let Some(path) = path {
                self.finished = true;
                log::info!(
                    "Bounce path found at {:.1} deg after {} casts",
                    angle,
                    self.casts_issued
                );
                let placement = ObstaclePlacement {
                    position: self.base,
                    ground: self.ground,
                    shape: self.shape,
                    path,
                };
                self.found = Some(placement);
                return SearchStep::Success(placement);
            }

            if used >= budget && self.next_angle < self.angle_count {
                return SearchStep::Continue;
            }
        }

        self.finished = true;
        log::info!("No bounce path after {} casts", self.casts_issued);
        SearchStep::Failure
    }

    /// Drive the search to completion without yielding
    pub fn run<Q: GeometryQuery + ?Sized>(&mut self, query: &Q) -> Option<ObstaclePlacement> {
        loop {
            match self.step(query, u32::MAX) {
                SearchStep::Continue => continue,
                SearchStep::Success(placement) => return Some(placement),
                SearchStep::Failure => return None,
            }
        }
    }

    /// Examine one fan angle. Returns the casts issued and any valid path.
    fn try_angle<Q: GeometryQuery + ?Sized>(&self, query: &Q, angle: f32) -> (u32, Option<BouncePath>) {
        let direction = rotate_about_up(self.forward, angle);
        let Some(first) = query.spherecast(
            self.ball_center,
            self.ball_radius,
            direction,
            self.max_distance,
            FIRST_LEG,
        ) else {
            return (1, None);
        };
        if first.layer == Layer::Obstacle {
            return (1, None);
        }

        let bounce = self.ball_center + direction * first.distance;
        let reflected = reflect(direction, first.normal).normalize_or_zero();
        let second = query.spherecast(
            bounce,
            self.ball_radius,
            reflected,
            self.max_distance,
            SECOND_LEG,
        );

        let path = second.filter(|hit| hit.layer == Layer::Hole).map(|_| BouncePath {
            angle,
            start: self.ball_center,
            direction,
            bounce,
            reflected,
            facade: first.surface,
        });
        (2, path)
    }
}

/// Replay the two casts of a bounce path against a scene with the obstacle
/// and hole in place. True when the path still holds.
pub fn verify_path<Q: GeometryQuery + ?Sized>(
    query: &Q,
    placement: &ObstaclePlacement,
    hole: &HolePlacement,
    settings: &Settings,
) -> bool {
    let colliders = [placement.collider(), hole_collider(hole)];
    let overlay = Overlay::new(query, &colliders);
    let path = &placement.path;
    let radius = settings.ball_radius();
    let max = settings.obstacle_ray_max_distance;

    let Some(first) = overlay.spherecast(path.start, radius, path.direction, max, FIRST_LEG) else {
        return false;
    };
    if first.layer != Layer::Facade {
        return false;
    }
    let bounce = path.start + path.direction * first.distance;
    let reflected = reflect(path.direction, first.normal).normalize_or_zero();
    overlay
        .spherecast(bounce, radius, reflected, max, SECOND_LEG)
        .is_some_and(|hit| hit.layer == Layer::Hole)
}
