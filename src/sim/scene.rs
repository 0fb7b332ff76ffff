//! In-memory scanned scene
//!
//! Holds the classified surfaces delivered by the perception feed and answers
//! geometry queries against them. Every mutation bumps the scene version.

use std::collections::BTreeMap;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::query::{Collider, GeometryQuery, Hit, Layer, LayerMask, SurfaceId, nearest};
use super::shape::{Pose, Shape};

/// Errors raised while loading a scene description
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scene: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A classified scanned surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub id: SurfaceId,
    pub layer: Layer,
    pub pose: Pose,
    pub shape: Shape,
}

impl Surface {
    fn collider(&self) -> Collider {
        Collider {
            layer: self.layer,
            pose: self.pose,
            shape: self.shape,
        }
    }
}

/// Surface lifecycle event from the perception system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    Added(Surface),
    Updated { id: SurfaceId, pose: Pose },
    Removed(SurfaceId),
}

/// Collection of scanned surfaces
#[derive(Debug, Clone, Default)]
pub struct Scene {
    surfaces: BTreeMap<SurfaceId, Surface>,
    /// Ground surfaces are lowered by this much on add/update
    floor_offset: f32,
    version: u64,
}

impl Scene {
    pub fn new(floor_offset: f32) -> Self {
        Self {
            surfaces: BTreeMap::new(),
            floor_offset,
            version: 0,
        }
    }

    /// Build a scene from a JSON list of surfaces
    pub fn from_json(json: &str, floor_offset: f32) -> Result<Self, SceneError> {
        let surfaces: Vec<Surface> = serde_json::from_str(json)?;
        let mut scene = Self::new(floor_offset);
        for surface in surfaces {
            scene.apply(SurfaceEvent::Added(surface));
        }
        Ok(scene)
    }

    /// Load a scene description file
    pub fn load(path: impl AsRef<Path>, floor_offset: f32) -> Result<Self, SceneError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let scene = Self::from_json(&json, floor_offset)?;
        log::info!(
            "Loaded {} surfaces from {}",
            scene.len(),
            path.as_ref().display()
        );
        Ok(scene)
    }

    /// Monotonic counter bumped on every applied change
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    /// Surfaces in stable id order
    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.values()
    }

    fn adjusted_pose(&self, layer: Layer, mut pose: Pose) -> Pose {
        if layer == Layer::Ground {
            pose.position -= Vec3::Y * self.floor_offset;
        }
        pose
    }

    /// Apply a lifecycle event. Returns whether the scene changed.
    pub fn apply(&mut self, event: SurfaceEvent) -> bool {
        match event {
            SurfaceEvent::Added(mut surface) => {
                if self.surfaces.contains_key(&surface.id) {
                    log::warn!("Ignoring duplicate surface {:?}", surface.id);
                    return false;
                }
                log::debug!("Adding surface {:?} ({:?})", surface.id, surface.layer);
                surface.pose = self.adjusted_pose(surface.layer, surface.pose);
                self.surfaces.insert(surface.id, surface);
            }
            SurfaceEvent::Updated { id, pose } => {
                let Some(layer) = self.surfaces.get(&id).map(|s| s.layer) else {
                    log::warn!("Ignoring update for unknown surface {:?}", id);
                    return false;
                };
                let pose = self.adjusted_pose(layer, pose);
                if let Some(surface) = self.surfaces.get_mut(&id) {
                    surface.pose = pose;
                }
            }
            SurfaceEvent::Removed(id) => {
                if self.surfaces.remove(&id).is_none() {
                    log::warn!("Ignoring removal of unknown surface {:?}", id);
                    return false;
                }
                log::debug!("Removed surface {:?}", id);
            }
        }
        self.version += 1;
        true
    }
}

impl GeometryQuery for Scene {
    fn spherecast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<Hit> {
        let dir = direction.try_normalize()?;
        self.surfaces
            .values()
            .filter(|s| mask.contains(s.layer))
            .fold(None, |best, surface| {
                let hit = surface.collider().cast(
                    origin,
                    radius,
                    dir,
                    max_distance,
                    mask,
                    Some(surface.id),
                );
                nearest(best, hit)
            })
    }
}
