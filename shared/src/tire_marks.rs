//! Skid marks left on the ground behind the local car.

use std::collections::VecDeque;

use rapier3d::na::{Isometry3, Translation3, UnitQuaternion, Vector3};

use crate::constants::{MAX_TIRE_MARKS, TIRE_MARK_INTERVAL};
use crate::render::{SceneBuffer, VisualId, VisualKind};

/// Marks sit just above the ground plane.
const TIRE_MARK_HEIGHT: f32 = 0.01;

/// Bounded trail of skid marks left by the local car.
#[derive(Debug, Default)]
pub struct TireMarks {
    timer: f32,
    marks: VecDeque<VisualId>,
}

impl TireMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Advance the drop timer; once it passes the interval, mark under every grounded wheel.
    ///
    /// `heading` orients the marks. Returns the number of marks dropped this call.
    pub fn update(
        &mut self,
        wall_dt: f32,
        grounded_wheels: impl IntoIterator<Item = Vector3<f32>>,
        heading: UnitQuaternion<f32>,
        scene: &mut SceneBuffer,
    ) -> usize {
        self.timer += wall_dt;
        if self.timer <= TIRE_MARK_INTERVAL {
            return 0;
        }
        self.timer = 0.0;

        let mut dropped = 0;
        for hub in grounded_wheels {
            let pose = Isometry3::from_parts(
                Translation3::new(hub.x, TIRE_MARK_HEIGHT, hub.z),
                heading,
            );
            self.marks.push_back(scene.spawn(VisualKind::TireMark, pose));
            dropped += 1;

            if self.marks.len() > MAX_TIRE_MARKS {
                if let Some(oldest) = self.marks.pop_front() {
                    scene.despawn(oldest);
                }
            }
        }
        dropped
    }

    pub fn clear(&mut self, scene: &mut SceneBuffer) {
        for mark in self.marks.drain(..) {
            scene.despawn(mark);
        }
        self.timer = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_wheels() -> Vec<Vector3<f32>> {
        vec![Vector3::new(1.0, 0.4, 2.0); 4]
    }

    #[test]
    fn marks_drop_on_interval() {
        let mut marks = TireMarks::new();
        let mut scene = SceneBuffer::new();
        assert_eq!(marks.update(0.03, four_wheels(), UnitQuaternion::identity(), &mut scene), 0);
        assert_eq!(marks.update(0.03, four_wheels(), UnitQuaternion::identity(), &mut scene), 4);
        assert_eq!(marks.len(), 4);
        assert_eq!(marks.update(0.01, four_wheels(), UnitQuaternion::identity(), &mut scene), 0);
    }

    #[test]
    fn airborne_wheels_leave_nothing() {
        let mut marks = TireMarks::new();
        let mut scene = SceneBuffer::new();
        assert_eq!(marks.update(0.1, Vec::new(), UnitQuaternion::identity(), &mut scene), 0);
        assert!(marks.is_empty());
    }

    #[test]
    fn trail_is_bounded_and_drops_oldest_first() {
        let mut marks = TireMarks::new();
        let mut scene = SceneBuffer::new();
        marks.update(0.1, four_wheels(), UnitQuaternion::identity(), &mut scene);
        let first = scene.drain();
        for _ in 0..200 {
            marks.update(0.1, four_wheels(), UnitQuaternion::identity(), &mut scene);
        }
        assert_eq!(marks.len(), MAX_TIRE_MARKS);
        assert_eq!(scene.live_count(), MAX_TIRE_MARKS);

        let despawned: Vec<_> = scene
            .drain()
            .into_iter()
            .filter_map(|c| match c {
                crate::render::SceneCommand::Despawn { id } => Some(id),
                _ => None,
            })
            .collect();
        let oldest = match &first[0] {
            crate::render::SceneCommand::Spawn { id, .. } => *id,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(despawned.first(), Some(&oldest));
    }

    #[test]
    fn marks_sit_on_the_ground() {
        let mut marks = TireMarks::new();
        let mut scene = SceneBuffer::new();
        marks.update(0.1, four_wheels(), UnitQuaternion::identity(), &mut scene);
        for cmd in scene.drain() {
            if let crate::render::SceneCommand::Spawn { pose, .. } = cmd {
                assert_eq!(pose.translation.y, TIRE_MARK_HEIGHT);
            }
        }
    }
}
