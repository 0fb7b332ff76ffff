//! Course session
//!
//! Owns the current placements and the shot state machine, and sequences the
//! course lifecycle: new course → shot → hit/miss → next challenge. The host
//! drives it with [`CourseSession::tick`] plus discrete input and trigger
//! calls, and drains the resulting [`CourseEvent`]s.

use std::collections::HashSet;

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::bounce::{BouncePathSearch, ObstaclePlacement, SearchStep, hole_collider};
use super::placement::{BallPlacement, HolePlacement, Viewer, find_ball, find_hole};
use super::predictor::{BallSnapshot, HoleTarget, ShotOutcome, ShotPredictor, ShotState};
use super::query::{Collider, GeometryQuery, Overlay};
use crate::horizontal;
use crate::settings::{Settings, SettingsError};

/// Identity of a spawned ball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BallId(pub u32);

/// Where the session is in the course lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoursePhase {
    /// No course yet; waiting for scanned geometry
    AwaitingGeometry,
    /// Last hole search failed; the caller decides when to retry
    NoHole,
    /// Hole and ball placed, shots allowed
    Playing,
    /// Ball dropped; next challenge pending
    HoleCompleted,
    /// Waiting for the player to ask for an obstacle
    ObstacleOffered,
    /// Bounce-path search running
    PlacingObstacle,
}

/// Notifications for UI, audio and physics collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum CourseEvent {
    HolePlacementFailed,
    CourseReady {
        hole: HolePlacement,
        ball: BallPlacement,
    },
    /// Create a ball body with this id, dropped from `position`
    BallSpawned { id: BallId, position: Vec3 },
    /// Remove every ball body from the previous course
    BallsCleared,
    /// Apply `impulse` to the ball body
    ShotFired { id: BallId, impulse: Vec3 },
    ShotResolved { id: BallId, outcome: ShotOutcome },
    ObstacleOffered,
    ObstaclePlaced(ObstaclePlacement),
    ObstaclePlacementFailed,
    /// A ball other than the active one fell in
    StrayBallInHole { id: BallId },
}

/// Motion of a ball body as simulated by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallMotion {
    pub id: BallId,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Per-tick input from the host
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Latest device pose
    pub viewer: Option<Viewer>,
    /// Latest motion of the active ball
    pub ball: Option<BallMotion>,
}

/// One course: hole, ball spot, optional obstacle, and the active shot
#[derive(Debug, Clone)]
pub struct CourseSession {
    settings: Settings,
    rng: Pcg32,
    /// Seconds since the session started
    clock: f32,
    phase: CoursePhase,
    viewer: Option<Viewer>,
    hole: Option<HolePlacement>,
    ball: Option<BallPlacement>,
    /// No shot fired at the current hole yet
    hole_is_fresh: bool,
    obstacle: Option<ObstaclePlacement>,
    search: Option<BouncePathSearch>,
    shot: ShotPredictor,
    active_ball: Option<BallId>,
    last_ball_position: Option<Vec3>,
    balls: Vec<BallId>,
    on_rim: HashSet<BallId>,
    next_ball_id: u32,
    settle_at: Option<f32>,
    next_challenge_at: Option<f32>,
    events: Vec<CourseEvent>,
}

impl CourseSession {
    /// Create a session with a seeded random source
    ///
    /// Rejects settings the searches cannot run with.
    pub fn new(settings: Settings, seed: u64) -> Result<Self, SettingsError> {
        settings.validate()?;
        log::info!("Course session starting (seed {})", seed);
        Ok(Self {
            shot: ShotPredictor::new(&settings),
            settings,
            rng: Pcg32::seed_from_u64(seed),
            clock: 0.0,
            phase: CoursePhase::AwaitingGeometry,
            viewer: None,
            hole: None,
            ball: None,
            hole_is_fresh: false,
            obstacle: None,
            search: None,
            active_ball: None,
            last_ball_position: None,
            balls: Vec::new(),
            on_rim: HashSet::new(),
            next_ball_id: 1,
            settle_at: None,
            next_challenge_at: None,
            events: Vec::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn phase(&self) -> CoursePhase {
        self.phase
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn hole(&self) -> Option<&HolePlacement> {
        self.hole.as_ref()
    }

    pub fn ball(&self) -> Option<&BallPlacement> {
        self.ball.as_ref()
    }

    pub fn obstacle(&self) -> Option<&ObstaclePlacement> {
        self.obstacle.as_ref()
    }

    pub fn active_ball(&self) -> Option<BallId> {
        self.active_ball
    }

    pub fn shot_state(&self) -> ShotState {
        self.shot.state()
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_some()
    }

    /// Take every event queued since the last call
    pub fn drain_events(&mut self) -> Vec<CourseEvent> {
        std::mem::take(&mut self.events)
    }

    /// Colliders owned by the course (hole trigger, committed obstacle)
    pub fn colliders(&self) -> Vec<Collider> {
        self.hole
            .iter()
            .map(hole_collider)
            .chain(self.obstacle.iter().map(ObstaclePlacement::collider))
            .collect()
    }

    /// A scanned surface arrived. The first one starts the settle timer
    /// before the opening course is laid out.
    pub fn notify_surface_added(&mut self) {
        if self.phase == CoursePhase::AwaitingGeometry && self.settle_at.is_none() {
            log::info!("First geometry arrived, settling");
            self.settle_at = Some(self.clock + self.settings.geometry_settle_time);
        }
    }

    /// Tear down the current course and lay out a new one
    ///
    /// Returns false when no hole position exists; the session then waits in
    /// [`CoursePhase::NoHole`] until the caller retries.
    pub fn new_course<Q: GeometryQuery + ?Sized>(&mut self, query: &Q, viewer: Viewer) -> bool {
        self.viewer = Some(viewer);
        self.settle_at = None;
        self.next_challenge_at = None;
        if self.search.take().is_some() {
            log::debug!("Dropping in-progress obstacle search");
        }
        if !self.balls.is_empty() {
            self.balls.clear();
            self.events.push(CourseEvent::BallsCleared);
        }
        self.active_ball = None;
        self.last_ball_position = None;
        self.on_rim.clear();
        self.obstacle = None;
        self.hole = None;
        self.ball = None;
        self.shot.arm();

        let Some(hole) = find_hole(query, &viewer, &self.settings, &mut self.rng) else {
            log::warn!("Can't place the hole");
            self.phase = CoursePhase::NoHole;
            self.events.push(CourseEvent::HolePlacementFailed);
            return false;
        };
        self.hole = Some(hole);
        self.hole_is_fresh = true;

        let ball = self.spawn_ball(query, &viewer);
        self.phase = CoursePhase::Playing;
        self.events.push(CourseEvent::CourseReady { hole, ball });
        true
    }

    fn spawn_ball<Q: GeometryQuery + ?Sized>(&mut self, query: &Q, viewer: &Viewer) -> BallPlacement {
        let ball = find_ball(query, self.hole_is_fresh, self.ball, viewer, &self.settings);
        self.ball = Some(ball);

        let id = BallId(self.next_ball_id);
        self.next_ball_id += 1;
        self.balls.push(id);
        self.active_ball = Some(id);
        self.last_ball_position = None;
        self.shot.arm();

        let position = ball.spawn_point(&self.settings);
        log::debug!("Ball {:?} spawned at {:?}", id, position);
        self.events.push(CourseEvent::BallSpawned { id, position });
        ball
    }

    fn respawn_ball<Q: GeometryQuery + ?Sized>(&mut self, query: &Q) {
        match self.viewer {
            Some(viewer) => {
                self.spawn_ball(query, &viewer);
            }
            None => log::warn!("No viewer pose; cannot respawn the ball"),
        }
    }

    /// Touch down: start charging a shot
    pub fn touch_down(&mut self) -> bool {
        if self.phase != CoursePhase::Playing || self.active_ball.is_none() {
            return false;
        }
        self.shot.touch_down()
    }

    /// Touch up: fire the charged shot. Returns the impulse for the host to
    /// apply, pushed horizontally away from the viewer.
    pub fn touch_up(&mut self) -> Option<Vec3> {
        let id = self.active_ball?;
        let force = self.shot.touch_up(self.clock)?;

        let ball_position = self
            .last_ball_position
            .or_else(|| self.ball.map(|b| b.spawn_point(&self.settings)))
            .unwrap_or(Vec3::ZERO);
        let viewer_position = self.viewer.map_or(Vec3::ZERO, |v| v.position);
        let direction = horizontal(ball_position - viewer_position).normalize_or_zero();
        let impulse = direction * force;

        self.hole_is_fresh = false;
        log::info!("Shot fired, force {:.2}", force);
        self.events.push(CourseEvent::ShotFired { id, impulse });
        Some(impulse)
    }

    /// Trigger: a ball entered the hole
    pub fn ball_entered_hole(&mut self, id: BallId) {
        if Some(id) != self.active_ball {
            log::info!("Ball {:?} fell in out of turn", id);
            self.events.push(CourseEvent::StrayBallInHole { id });
            return;
        }
        // Re-entry of a ball that already scored
        if self.phase != CoursePhase::Playing || !self.shot.ball_entered_hole() {
            return;
        }

        log::info!("Hole hit by ball {:?}", id);
        self.events.push(CourseEvent::ShotResolved {
            id,
            outcome: ShotOutcome::Hit,
        });
        self.phase = CoursePhase::HoleCompleted;
        self.next_challenge_at = Some(self.clock + self.settings.message_read_time);
    }

    /// Trigger: a ball started or stopped resting on the hole rim
    pub fn set_ball_on_rim(&mut self, id: BallId, on_rim: bool) {
        if on_rim {
            self.on_rim.insert(id);
        } else {
            self.on_rim.remove(&id);
        }
    }

    /// Player asked for an obstacle. Starts the bounce-path search.
    pub fn request_obstacle<Q: GeometryQuery + ?Sized>(&mut self, query: &Q) -> bool {
        if self.phase != CoursePhase::ObstacleOffered {
            return false;
        }
        let (Some(ball), Some(hole)) = (self.ball, self.hole) else {
            return false;
        };

        match BouncePathSearch::new(query, &ball, &hole, &self.settings, &mut self.rng) {
            Some(search) => {
                self.search = Some(search);
                self.phase = CoursePhase::PlacingObstacle;
                true
            }
            None => {
                self.events.push(CourseEvent::ObstaclePlacementFailed);
                false
            }
        }
    }

    /// Advance the session by `dt` seconds
    pub fn tick<Q: GeometryQuery + ?Sized>(&mut self, query: &Q, dt: f32, input: &TickInput) {
        self.clock += dt;
        if let Some(viewer) = input.viewer {
            self.viewer = Some(viewer);
        }
        self.shot.charge(dt, self.settings.force_per_second);

        // Opening course once geometry has settled
        if let (Some(at), Some(viewer)) = (self.settle_at, self.viewer) {
            if self.clock >= at && self.phase == CoursePhase::AwaitingGeometry {
                self.new_course(query, viewer);
            }
        }

        self.step_search(query);
        self.monitor_shot(query, input.ball);

        if let Some(at) = self.next_challenge_at {
            if self.clock >= at {
                self.next_challenge_at = None;
                self.next_challenge(query);
            }
        }
    }

    fn step_search<Q: GeometryQuery + ?Sized>(&mut self, query: &Q) {
        let Some(mut search) = self.search.take() else {
            return;
        };
        match search.step(query, self.settings.raycasts_per_tick) {
            SearchStep::Continue => self.search = Some(search),
            SearchStep::Success(placement) => {
                self.obstacle = Some(placement);
                self.events.push(CourseEvent::ObstaclePlaced(placement));
                self.phase = CoursePhase::Playing;
                self.respawn_ball(query);
            }
            SearchStep::Failure => {
                log::info!("Couldn't place obstacle");
                self.events.push(CourseEvent::ObstaclePlacementFailed);
                self.phase = CoursePhase::ObstacleOffered;
            }
        }
    }

    fn monitor_shot<Q: GeometryQuery + ?Sized>(&mut self, query: &Q, motion: Option<BallMotion>) {
        let (Some(id), Some(hole)) = (self.active_ball, self.hole) else {
            return;
        };
        let motion = motion.filter(|m| m.id == id);
        if let Some(motion) = motion {
            self.last_ball_position = Some(motion.position);
        }
        if !self.shot.is_in_flight() {
            return;
        }

        // The timeout holds even when the host stops reporting the ball
        let outcome = match motion {
            Some(motion) => {
                let snapshot = BallSnapshot {
                    position: motion.position,
                    velocity: motion.velocity,
                    radius: self.settings.ball_radius(),
                    on_rim: self.on_rim.contains(&id),
                };
                let target = HoleTarget {
                    origin: hole.position,
                    radius: hole.radius,
                };
                let colliders = self.colliders();
                let overlay = Overlay::new(query, &colliders);
                self.shot.tick(&overlay, self.clock, &snapshot, &target)
            }
            None => self.shot.expire(self.clock),
        };

        if let Some(outcome) = outcome {
            log::info!("Shot by ball {:?} can no longer drop", id);
            self.events.push(CourseEvent::ShotResolved { id, outcome });
            self.respawn_ball(query);
        }
    }

    fn next_challenge<Q: GeometryQuery + ?Sized>(&mut self, query: &Q) {
        if self.phase != CoursePhase::HoleCompleted {
            return;
        }
        if self.obstacle.is_none() {
            self.phase = CoursePhase::ObstacleOffered;
            self.events.push(CourseEvent::ObstacleOffered);
        } else if let Some(viewer) = self.viewer {
            self.new_course(query, viewer);
        }
    }
}
