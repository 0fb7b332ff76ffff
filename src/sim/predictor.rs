//! Shot outcome prediction
//!
//! Tracks a single ball's shot from charge to resolution and, once the grace
//! period has passed, decides every tick whether the shot can still drop.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::query::{GeometryQuery, Layer, LayerMask};
use crate::settings::Settings;

const BOUNCE_TARGETS: LayerMask = LayerMask::only(Layer::Facade)
    .with(Layer::Ball)
    .with(Layer::Obstacle)
    .with(Layer::Hole);

/// How a shot ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShotOutcome {
    Hit,
    Miss,
}

/// Shot lifecycle for the active ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShotState {
    /// Ball placed, waiting for touch
    Idle,
    /// Touch held, force building up
    Charging { force: f32 },
    /// Ball launched at `launched_at` (session clock, seconds)
    InFlight { launched_at: f32 },
    /// Terminal until a new ball is spawned
    Resolved(ShotOutcome),
}

/// Kinematic state of the active ball as reported by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
    /// Resting on the hole lip (trigger signal)
    pub on_rim: bool,
}

/// Where the shot should end up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoleTarget {
    pub origin: Vec3,
    pub radius: f32,
}

/// Linear reachability test for a moving ball
///
/// Assumes the ball only slows down from here, so if it can't reach the hole
/// rim (or something to bounce off) at its current speed within `horizon`
/// seconds, it never will. The bounce branch accepts any hit without
/// checking that the rebound heads toward the hole.
pub fn can_reach_hole<Q: GeometryQuery + ?Sized>(
    query: &Q,
    ball: &BallSnapshot,
    hole: &HoleTarget,
    horizon: f32,
) -> bool {
    if ball.on_rim {
        return true;
    }

    let to_hole = hole.origin - ball.position;
    let speed = ball.velocity.length();
    let reach = speed * horizon;
    let within_reach = to_hole.length() - hole.radius < reach;

    if ball.velocity.dot(to_hole) > 0.0 {
        // Heading toward the hole
        within_reach
    } else {
        // Heading away: needs something to bounce off first
        let bounce = query.spherecast(
            ball.position,
            ball.radius,
            ball.velocity,
            reach,
            BOUNCE_TARGETS,
        );
        bounce.is_some() && within_reach
    }
}

/// Shot state machine with its prediction timing
#[derive(Debug, Clone)]
pub struct ShotPredictor {
    state: ShotState,
    prediction_horizon: f32,
    min_duration: f32,
    max_duration: f32,
}

impl ShotPredictor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            state: ShotState::Idle,
            prediction_horizon: settings.shot_prediction_time,
            min_duration: settings.shot_min_duration,
            max_duration: settings.shot_max_duration,
        }
    }

    pub fn state(&self) -> ShotState {
        self.state
    }

    /// A new ball was spawned: arm for the next shot
    pub fn arm(&mut self) {
        self.state = ShotState::Idle;
    }

    /// Whether a touch can start charging
    pub fn is_idle(&self) -> bool {
        self.state == ShotState::Idle
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, ShotState::InFlight { .. })
    }

    /// Touch down: start charging if no shot is outstanding
    pub fn touch_down(&mut self) -> bool {
        if self.state != ShotState::Idle {
            return false;
        }
        self.state = ShotState::Charging { force: 0.0 };
        true
    }

    /// Accumulate force while the touch is held
    pub fn charge(&mut self, dt: f32, force_per_second: f32) {
        if let ShotState::Charging { force } = &mut self.state {
            *force += dt * force_per_second;
        }
    }

    /// Touch up: launch. Returns the accumulated force.
    pub fn touch_up(&mut self, now: f32) -> Option<f32> {
        let ShotState::Charging { force } = self.state else {
            return None;
        };
        self.state = ShotState::InFlight { launched_at: now };
        Some(force)
    }

    /// Ball entered the hole. Applies whatever the prediction says.
    pub fn ball_entered_hole(&mut self) -> bool {
        if matches!(self.state, ShotState::Resolved(_)) {
            return false;
        }
        self.state = ShotState::Resolved(ShotOutcome::Hit);
        true
    }

    /// Seconds since launch, if in flight
    pub fn flight_time(&self, now: f32) -> Option<f32> {
        match self.state {
            ShotState::InFlight { launched_at } => Some(now - launched_at),
            _ => None,
        }
    }

    /// Viability of the shot after the grace period
    ///
    /// Must not be called before `min_duration` has elapsed; the hard
    /// timeout makes this false regardless of the ball's motion.
    pub fn can_still_hit<Q: GeometryQuery + ?Sized>(
        &self,
        query: &Q,
        elapsed: f32,
        ball: &BallSnapshot,
        hole: &HoleTarget,
    ) -> bool {
        debug_assert!(
            elapsed >= self.min_duration,
            "shot evaluated during its grace period ({elapsed:.3}s)"
        );
        elapsed < self.max_duration && can_reach_hole(query, ball, hole, self.prediction_horizon)
    }

    /// Advance one tick while in flight. Returns the outcome when the shot
    /// is declared missed.
    pub fn tick<Q: GeometryQuery + ?Sized>(
        &mut self,
        query: &Q,
        now: f32,
        ball: &BallSnapshot,
        hole: &HoleTarget,
    ) -> Option<ShotOutcome> {
        let elapsed = self.flight_time(now)?;
        if elapsed < self.min_duration {
            return None;
        }
        if self.can_still_hit(query, elapsed, ball, hole) {
            return None;
        }

        log::debug!(
            "Shot missed after {:.2}s (ball at {:?}, speed {:.2})",
            elapsed,
            ball.position,
            ball.velocity.length()
        );
        self.state = ShotState::Resolved(ShotOutcome::Miss);
        Some(ShotOutcome::Miss)
    }

    /// Enforce the hard timeout when no ball motion is available
    pub fn expire(&mut self, now: f32) -> Option<ShotOutcome> {
        let elapsed = self.flight_time(now)?;
        if elapsed < self.max_duration {
            return None;
        }
        log::debug!("Shot timed out after {:.2}s without motion updates", elapsed);
        self.state = ShotState::Resolved(ShotOutcome::Miss);
        Some(ShotOutcome::Miss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::query::Hit;
    use crate::sim::scene::{Scene, Surface, SurfaceEvent};
    use crate::sim::shape::{Pose, Shape};
    use crate::sim::SurfaceId;
    use proptest::prelude::*;

    fn predictor() -> ShotPredictor {
        ShotPredictor::new(&Settings {
            shot_prediction_time: 1.0,
            shot_min_duration: 0.5,
            shot_max_duration: 10.0,
            ..Default::default()
        })
    }

    fn ball(position: Vec3, velocity: Vec3) -> BallSnapshot {
        BallSnapshot {
            position,
            velocity,
            radius: 0.04,
            on_rim: false,
        }
    }

    fn hole() -> HoleTarget {
        HoleTarget {
            origin: Vec3::new(0.0, 0.0, 5.0),
            radius: 0.1,
        }
    }

    #[test]
    fn test_state_machine_path() {
        let mut shot = predictor();
        assert!(shot.is_idle());
        assert!(shot.touch_up(0.0).is_none());

        assert!(shot.touch_down());
        assert!(!shot.touch_down());
        shot.charge(0.5, 4.0);
        shot.charge(0.25, 4.0);
        assert_eq!(shot.state(), ShotState::Charging { force: 3.0 });

        assert_eq!(shot.touch_up(2.0), Some(3.0));
        assert_eq!(shot.state(), ShotState::InFlight { launched_at: 2.0 });
        assert!(!shot.touch_down());

        assert!(shot.ball_entered_hole());
        assert_eq!(shot.state(), ShotState::Resolved(ShotOutcome::Hit));
        assert!(!shot.ball_entered_hole());

        shot.arm();
        assert!(shot.is_idle());
    }

    #[test]
    fn test_moving_away_with_nothing_to_bounce_off() {
        // Hole 5 m ahead, ball rolling backwards at 3 m/s with a 1 s horizon
        let scene = Scene::new(0.0);
        let b = ball(Vec3::ZERO, Vec3::new(0.0, 0.0, -3.0));
        assert!(!can_reach_hole(&scene, &b, &hole(), 1.0));
    }

    #[test]
    fn test_moving_toward_with_enough_speed() {
        let scene = Scene::new(0.0);
        assert!(can_reach_hole(
            &scene,
            &ball(Vec3::ZERO, Vec3::new(0.0, 0.0, 6.0)),
            &hole(),
            1.0
        ));
        // Too slow: 4.9 m to the rim, 3 m of reach
        assert!(!can_reach_hole(
            &scene,
            &ball(Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0)),
            &hole(),
            1.0
        ));
    }

    #[test]
    fn test_moving_away_toward_a_wall() {
        let mut scene = Scene::new(0.0);
        scene.apply(SurfaceEvent::Added(Surface {
            id: SurfaceId(1),
            layer: Layer::Facade,
            pose: Pose::at(Vec3::new(0.0, 0.0, -2.5)),
            shape: Shape::Cuboid {
                half_extents: Vec3::new(10.0, 2.0, 0.5),
            },
        }));
        // Wall 2 m behind; 6 m of reach covers the 4.9 m to the rim
        let b = ball(Vec3::ZERO, Vec3::new(0.0, 0.0, -6.0));
        assert!(can_reach_hole(&scene, &b, &hole(), 1.0));

        // Wall in reach but the hole is not
        let slow = ball(Vec3::ZERO, Vec3::new(0.0, 0.0, -3.0));
        assert!(!can_reach_hole(&scene, &slow, &hole(), 1.0));
    }

    #[test]
    fn test_rim_always_viable() {
        let scene = Scene::new(0.0);
        let mut b = ball(Vec3::ZERO, Vec3::ZERO);
        assert!(!can_reach_hole(&scene, &b, &hole(), 1.0));
        b.on_rim = true;
        assert!(can_reach_hole(&scene, &b, &hole(), 1.0));
    }

    #[test]
    fn test_grace_period_skips_prediction() {
        let scene = Scene::new(0.0);
        let mut shot = predictor();
        shot.touch_down();
        shot.touch_up(1.0);

        let stopped = ball(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(shot.tick(&scene, 1.2, &stopped, &hole()), None);
        assert!(shot.is_in_flight());
        assert_eq!(shot.tick(&scene, 1.6, &stopped, &hole()), Some(ShotOutcome::Miss));
        assert_eq!(shot.state(), ShotState::Resolved(ShotOutcome::Miss));
        // Resolved shots are not evaluated again
        assert_eq!(shot.tick(&scene, 1.7, &stopped, &hole()), None);
    }

    #[test]
    fn test_timeout_ends_viable_shot() {
        let scene = Scene::new(0.0);
        let mut shot = predictor();
        shot.touch_down();
        shot.touch_up(0.0);

        let rolling = ball(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(shot.tick(&scene, 5.0, &rolling, &hole()), None);
        assert_eq!(shot.tick(&scene, 10.0, &rolling, &hole()), Some(ShotOutcome::Miss));
    }

    #[test]
    fn test_expire_needs_no_motion() {
        let mut shot = predictor();
        assert_eq!(shot.expire(100.0), None);

        shot.touch_down();
        shot.touch_up(1.0);
        assert_eq!(shot.expire(10.5), None);
        assert!(shot.is_in_flight());
        assert_eq!(shot.expire(11.0), Some(ShotOutcome::Miss));
        assert_eq!(shot.state(), ShotState::Resolved(ShotOutcome::Miss));
        assert_eq!(shot.expire(20.0), None);
    }

    /// Reports a wall everywhere, so every bounce branch finds a hit
    struct WallsEverywhere;

    impl GeometryQuery for WallsEverywhere {
        fn spherecast(&self, origin: Vec3, _: f32, _: Vec3, _: f32, _: LayerMask) -> Option<Hit> {
            Some(Hit {
                distance: 0.1,
                point: origin,
                normal: Vec3::Y,
                layer: Layer::Facade,
                surface: None,
            })
        }
    }

    proptest! {
        #[test]
        fn prop_timeout_is_final(
            extra in 0.0f32..100.0,
            px in -20.0f32..20.0, pz in -20.0f32..20.0,
            vx in -50.0f32..50.0, vz in -50.0f32..50.0,
            on_rim in any::<bool>(),
        ) {
            let shot = predictor();
            let mut b = ball(Vec3::new(px, 0.0, pz), Vec3::new(vx, 0.0, vz));
            b.on_rim = on_rim;
            prop_assert!(!shot.can_still_hit(&WallsEverywhere, 10.0 + extra, &b, &hole()));
        }
    }
}
