//! Course simulation
//!
//! All gameplay logic lives here. This module must stay deterministic:
//! - Seeded RNG only
//! - Stable iteration order (surfaces by id)
//! - Time passed in by the host, never read from a clock
//! - No rendering, physics engine or platform dependencies
//!
//! Scanned geometry is reached only through [`GeometryQuery`]; the host's
//! physics engine owns the ball bodies and reports their motion back.

pub mod bounce;
pub mod placement;
pub mod predictor;
pub mod query;
pub mod scene;
pub mod session;
pub mod shape;

pub use bounce::{
    BouncePath, BouncePathSearch, ObstaclePlacement, ObstacleShape, SearchStep, hole_collider,
    verify_path,
};
pub use placement::{
    BallPlacement, GroundSnap, HoleCandidate, HolePlacement, Viewer, find_ball, find_hole,
    hole_candidates, snap_to_ground,
};
pub use predictor::{
    BallSnapshot, HoleTarget, ShotOutcome, ShotPredictor, ShotState, can_reach_hole,
};
pub use query::{Collider, GeometryQuery, Hit, Layer, LayerMask, Overlay, SurfaceId};
pub use scene::{Scene, SceneError, Surface, SurfaceEvent};
pub use session::{BallId, BallMotion, CourseEvent, CoursePhase, CourseSession, TickInput};
pub use shape::{Pose, Shape};
