//! Facade Golf native driver
//!
//! Plays a scripted session against a synthetic street (or a scene file) with
//! a toy rolling-ball integrator standing in for the physics engine, and logs
//! every course event.
//!
//! Usage: `facade-golf [settings.json] [scene.json]`

#[cfg(not(target_arch = "wasm32"))]
mod driver {
    use facade_golf::consts::SIM_DT;
    use facade_golf::sim::{
        BallId, BallMotion, CourseEvent, CoursePhase, CourseSession, GeometryQuery, Layer,
        LayerMask, Overlay, Pose, Scene, Shape, ShotOutcome, ShotState, Surface, SurfaceEvent,
        SurfaceId, TickInput, Viewer,
    };
    use facade_golf::{Settings, horizontal, reflect, rotate_about_up};
    use glam::Vec3;

    /// Rolling deceleration of the toy ball (m/s²)
    const FRICTION: f32 = 1.5;
    /// Speed kept after bouncing off a wall
    const RESTITUTION: f32 = 0.8;
    const VIEWER_HEIGHT: f32 = 1.5;
    /// How far behind the ball the scripted player stands
    const STANCE: f32 = 1.0;
    const DEMO_SECONDS: f32 = 180.0;
    const RETRY_SECONDS: f32 = 2.0;

    const SOLID: LayerMask = LayerMask::only(Layer::Facade).with(Layer::Obstacle);

    struct ToyBall {
        id: BallId,
        position: Vec3,
        velocity: Vec3,
        on_rim: bool,
    }

    impl ToyBall {
        fn is_resting(&self) -> bool {
            self.velocity == Vec3::ZERO
        }

        fn motion(&self) -> BallMotion {
            BallMotion {
                id: self.id,
                position: self.position,
                velocity: self.velocity,
            }
        }

        /// Roll for one step, bouncing off walls and obstacles
        fn step<Q: GeometryQuery + ?Sized>(&mut self, query: &Q, radius: f32, dt: f32) {
            let speed = self.velocity.length();
            if speed <= 0.0 {
                return;
            }

            let travel = speed * dt;
            match query.spherecast(self.position, radius, self.velocity, travel, SOLID) {
                Some(hit) => {
                    self.position += self.velocity / speed * hit.distance;
                    let normal = horizontal(hit.normal).normalize_or_zero();
                    self.velocity = reflect(self.velocity, normal) * RESTITUTION;
                }
                None => self.position += self.velocity * dt,
            }

            let slowed = (self.velocity.length() - FRICTION * dt).max(0.0);
            self.velocity = self.velocity.normalize_or_zero() * slowed;
        }
    }

    /// Ground, two rows of facades and a wall closing the street
    fn street() -> Vec<Surface> {
        let facade = |id, x: f32, z: f32, half: Vec3| Surface {
            id: SurfaceId(id),
            layer: Layer::Facade,
            pose: Pose::at(Vec3::new(x, half.y, z)),
            shape: Shape::Cuboid { half_extents: half },
        };
        vec![
            Surface {
                id: SurfaceId(1),
                layer: Layer::Ground,
                pose: Pose::at(Vec3::ZERO),
                shape: Shape::HalfSpace,
            },
            facade(2, -4.5, 8.0, Vec3::new(0.5, 6.0, 12.0)),
            facade(3, 4.5, 4.0, Vec3::new(0.5, 6.0, 6.0)),
            facade(4, 5.0, 15.0, Vec3::new(1.0, 9.0, 4.0)),
            facade(5, 0.0, 21.0, Vec3::new(6.0, 8.0, 0.5)),
        ]
    }

    fn load_settings(path: Option<&String>) -> Settings {
        let Some(path) = path else {
            return Settings::default();
        };
        match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Using default settings: {}", e);
                Settings::default()
            }
        }
    }

    fn load_scene(path: Option<&String>, floor_offset: f32, session: &mut CourseSession) -> Scene {
        if let Some(path) = path {
            match Scene::load(path, floor_offset) {
                Ok(scene) => {
                    for _ in scene.surfaces() {
                        session.notify_surface_added();
                    }
                    return scene;
                }
                Err(e) => log::warn!("Using the built-in street: {}", e),
            }
        }

        let mut scene = Scene::new(floor_offset);
        for surface in street() {
            if scene.apply(SurfaceEvent::Added(surface)) {
                session.notify_surface_added();
            }
        }
        scene
    }

    /// Point the player down the line of the next shot and return the speed
    /// it needs to cover `distance`
    fn aim(session: &CourseSession, ball: &ToyBall) -> Option<(Viewer, f32)> {
        let hole = session.hole()?;
        let (direction, distance) = match session.obstacle() {
            Some(obstacle) => {
                let path = obstacle.path;
                let legs = path.bounce.distance(path.start) + hole.position.distance(path.bounce);
                (path.direction, legs)
            }
            None => {
                let to_hole = horizontal(hole.position - ball.position);
                (to_hole.normalize_or_zero(), to_hole.length())
            }
        };
        let direction = horizontal(direction).normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }

        let viewer = Viewer {
            position: ball.position - direction * STANCE + Vec3::Y * VIEWER_HEIGHT,
            forward: direction,
            height: VIEWER_HEIGHT,
        };
        let speed = (2.0 * FRICTION * distance).sqrt() * 1.05;
        Some((viewer, speed))
    }

    pub fn run() {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let settings = load_settings(args.first());
        let seed = 0x601f_u64;
        let radius = settings.ball_radius();
        let force_per_second = settings.force_per_second;

        let mut session = match CourseSession::new(settings.clone(), seed) {
            Ok(session) => session,
            Err(e) => {
                log::error!("Cannot start a session: {}", e);
                return;
            }
        };
        let scene = load_scene(args.get(1), settings.floor_offset, &mut session);
        log::info!("Scene holds {} surfaces", scene.len());

        let mut viewer = Viewer {
            position: Vec3::Y * VIEWER_HEIGHT,
            forward: Vec3::Z,
            height: VIEWER_HEIGHT,
        };
        let mut ball: Option<ToyBall> = None;
        let mut charge_left: Option<f32> = None;
        let mut retry_at = 0.0;
        let mut skip_obstacle = false;
        let mut holes_sunk = 0u32;
        let mut shots = 0u32;

        let mut time = 0.0;
        while time < DEMO_SECONDS {
            time += SIM_DT;

            // Physics
            if let Some(b) = ball.as_mut() {
                let colliders = session.colliders();
                let world = Overlay::new(&scene, &colliders);
                b.step(&world, radius, SIM_DT);

                if let Some(hole) = session.hole().copied() {
                    let gap = horizontal(b.position - hole.position).length();
                    if gap < hole.radius {
                        session.ball_entered_hole(b.id);
                    } else {
                        let on_rim = gap < hole.radius + radius && b.velocity.length() < 0.2;
                        if on_rim != b.on_rim {
                            b.on_rim = on_rim;
                            session.set_ball_on_rim(b.id, on_rim);
                        }
                    }
                }
            }

            let input = TickInput {
                viewer: Some(viewer),
                ball: ball.as_ref().map(ToyBall::motion),
            };
            session.tick(&scene, SIM_DT, &input);

            for event in session.drain_events() {
                match event {
                    CourseEvent::BallSpawned { id, .. } => {
                        let rest = session.ball().map_or(Vec3::ZERO, |b| b.position);
                        ball = Some(ToyBall {
                            id,
                            position: rest + Vec3::Y * radius,
                            velocity: Vec3::ZERO,
                            on_rim: false,
                        });
                    }
                    CourseEvent::BallsCleared => ball = None,
                    CourseEvent::ShotFired { id, impulse } => {
                        shots += 1;
                        if let Some(b) = ball.as_mut().filter(|b| b.id == id) {
                            b.velocity = impulse;
                        }
                    }
                    CourseEvent::ShotResolved { outcome, .. } => {
                        log::info!("Shot {} resolved: {:?}", shots, outcome);
                        if outcome == ShotOutcome::Hit {
                            holes_sunk += 1;
                            ball = None;
                        }
                    }
                    CourseEvent::ObstaclePlacementFailed => {
                        log::info!("No obstacle fits here, moving on");
                        skip_obstacle = true;
                    }
                    other => log::info!("{:?}", other),
                }
            }

            // Scripted player
            match session.phase() {
                CoursePhase::Playing => match charge_left {
                    Some(left) if left <= 0.0 => {
                        charge_left = None;
                        session.touch_up();
                    }
                    Some(left) => charge_left = Some(left - SIM_DT),
                    None => {
                        let ready = session.shot_state() == ShotState::Idle;
                        let aimed = ball
                            .as_ref()
                            .filter(|b| ready && b.is_resting())
                            .and_then(|b| aim(&session, b));
                        if let Some((stance, speed)) = aimed {
                            viewer = stance;
                            if session.touch_down() {
                                charge_left = Some(speed / force_per_second);
                            }
                        }
                    }
                },
                CoursePhase::ObstacleOffered if skip_obstacle => {
                    skip_obstacle = false;
                    session.new_course(&scene, viewer);
                }
                CoursePhase::ObstacleOffered => {
                    session.request_obstacle(&scene);
                }
                CoursePhase::NoHole if time >= retry_at => {
                    retry_at = time + RETRY_SECONDS;
                    viewer.forward = rotate_about_up(viewer.forward, 90.0);
                    session.new_course(&scene, viewer);
                }
                _ => {}
            }
        }

        log::info!(
            "Demo finished: {} holes sunk in {} shots over {:.0}s",
            holes_sunk,
            shots,
            time
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Facade Golf (native) starting...");
    driver::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is embedded by the host application on this target
}
