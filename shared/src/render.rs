//! Scene commands handed to the rendering front-end.
//!
//! The simulation never touches meshes directly. It allocates a [`VisualId`] per visual
//! object and records spawn/despawn/pose/label commands into a [`SceneBuffer`], which the
//! renderer drains once per frame and applies in order.

use rapier3d::na::{Isometry3, Vector3};

/// Opaque handle of a visual object, unique within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualId(pub u64);

/// A single sphere of a cloud, relative to the cloud origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CloudPuff {
    pub offset: Vector3<f32>,
    pub radius: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VisualKind {
    /// Grass slab, `size` meters on a side, top face at the pose.
    Ground { size: f32 },
    /// Asphalt strip along X.
    Road { length: f32, width: f32 },
    Tree,
    Ramp { half_extents: Vector3<f32> },
    Boost,
    Cloud { puffs: Vec<CloudPuff> },
    /// Car body, `0xRRGGBB`.
    Car { color: u32 },
    Wheel,
    TireMark,
    /// Floating label above a remote car.
    NameTag { text: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneCommand {
    Spawn {
        id: VisualId,
        kind: VisualKind,
        pose: Isometry3<f32>,
    },
    Despawn {
        id: VisualId,
    },
    SetPose {
        id: VisualId,
        pose: Isometry3<f32>,
    },
    SetLabel {
        id: VisualId,
        text: String,
    },
}

#[derive(Debug, Default)]
pub struct SceneBuffer {
    next_id: u64,
    commands: Vec<SceneCommand>,
    live: usize,
}

impl SceneBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, kind: VisualKind, pose: Isometry3<f32>) -> VisualId {
        self.next_id += 1;
        let id = VisualId(self.next_id);
        self.commands.push(SceneCommand::Spawn { id, kind, pose });
        self.live += 1;
        id
    }

    pub fn despawn(&mut self, id: VisualId) {
        self.commands.push(SceneCommand::Despawn { id });
        self.live = self.live.saturating_sub(1);
    }

    pub fn set_pose(&mut self, id: VisualId, pose: Isometry3<f32>) {
        self.commands.push(SceneCommand::SetPose { id, pose });
    }

    pub fn set_label(&mut self, id: VisualId, text: impl Into<String>) {
        self.commands.push(SceneCommand::SetLabel {
            id,
            text: text.into(),
        });
    }

    /// Number of visuals spawned and not yet despawned.
    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn pending(&self) -> &[SceneCommand] {
        &self.commands
    }

    /// Take every command recorded since the last drain.
    pub fn drain(&mut self) -> Vec<SceneCommand> {
        std::mem::take(&mut self.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_live_count_tracks_spawns() {
        let mut scene = SceneBuffer::new();
        let a = scene.spawn(VisualKind::Tree, Isometry3::identity());
        let b = scene.spawn(VisualKind::Boost, Isometry3::identity());
        assert_ne!(a, b);
        assert_eq!(scene.live_count(), 2);

        scene.despawn(a);
        assert_eq!(scene.live_count(), 1);

        let cmds = scene.drain();
        assert_eq!(cmds.len(), 3);
        assert!(matches!(cmds[2], SceneCommand::Despawn { id } if id == a));
        assert!(scene.drain().is_empty());
    }
}
