//! Rapier-backed rigid-body world for the driving simulation.
//!
//! One `PhysicsWorld` lives per session and holds every body the client knows about:
//! streamed static geometry (ground slabs, road strips, tree trunks, ramps), the local
//! dynamic chassis and one kinematic mirror per remote car.
//!
//! Stepping
//! - `step` accumulates wall-clock time and advances the integrator in fixed increments,
//!   at most `max_substeps` per call. Backlog beyond that budget is dropped, so a long
//!   stall never triggers a catch-up spiral.
//! - A `pre_step` callback runs before every fixed increment. The raycast vehicle applies
//!   its suspension, tire and engine impulses there.
//!
//! Contacts
//! - Collision-start events are buffered while stepping and drained afterwards as
//!   [`ContactBegin`] pairs of rigid-body handles.

// Re-export Rapier so downstream crates (server/client) can use Rapier types
// without needing to depend on `rapier3d` directly.
pub use rapier3d;

use std::sync::Mutex;

use rapier3d::na::{Isometry3, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use crate::constants::{
    CHASSIS_ANGULAR_DAMPING, CHASSIS_HALF_EXTENTS, CHASSIS_LINEAR_DAMPING, CHASSIS_MASS,
    GRAVITY_MPS2,
};
use crate::rapier::{StaticBodyDef, collider_from_def};

/// Two bodies started touching during the last `step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactBegin {
    pub body_a: RigidBodyHandle,
    pub body_b: RigidBodyHandle,
}

impl ContactBegin {
    /// If `body` is one side of the pair, returns the other side.
    pub fn other(&self, body: RigidBodyHandle) -> Option<RigidBodyHandle> {
        if self.body_a == body {
            Some(self.body_b)
        } else if self.body_b == body {
            Some(self.body_a)
        } else {
            None
        }
    }
}

/// Buffers collision-start events raised by the physics pipeline.
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<ContactBegin>>,
}

impl ContactCollector {
    fn drain(&self) -> Vec<ContactBegin> {
        match self.started.lock() {
            Ok(mut started) => std::mem::take(&mut *started),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        let CollisionEvent::Started(c1, c2, _) = event else {
            return;
        };
        let parent = |h: ColliderHandle| colliders.get(h).and_then(|c| c.parent());
        let (Some(body_a), Some(body_b)) = (parent(c1), parent(c2)) else {
            return;
        };

        match self.started.lock() {
            Ok(mut started) => started.push(ContactBegin { body_a, body_b }),
            Err(poisoned) => poisoned.into_inner().push(ContactBegin { body_a, body_b }),
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

pub struct PhysicsWorld {
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    gravity: Vector<f32>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    contacts: ContactCollector,
    accumulator: f32,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            gravity: vector![0.0, -GRAVITY_MPS2, 0.0],
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            contacts: ContactCollector::default(),
            accumulator: 0.0,
        }
    }

    /// Insert a fixed body with a single collider.
    pub fn add_static(&mut self, def: &StaticBodyDef) -> RigidBodyHandle {
        let rb = RigidBodyBuilder::fixed().pose(def.pose()).build();
        let handle = self.bodies.insert(rb);
        self.colliders
            .insert_with_parent(collider_from_def(def), handle, &mut self.bodies);
        handle
    }

    /// Insert the local, fully simulated car body.
    pub fn add_chassis(&mut self, pose: Isometry3<f32>) -> RigidBodyHandle {
        let rb = RigidBodyBuilder::dynamic()
            .pose(pose)
            .angular_damping(CHASSIS_ANGULAR_DAMPING)
            .linear_damping(CHASSIS_LINEAR_DAMPING)
            .can_sleep(false)
            .build();
        let handle = self.bodies.insert(rb);
        let [hx, hy, hz] = CHASSIS_HALF_EXTENTS;
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .mass(CHASSIS_MASS)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Insert a pose-driven body with the chassis shape, standing in for a remote car.
    pub fn add_mirror(&mut self, pose: Isometry3<f32>) -> RigidBodyHandle {
        let rb = RigidBodyBuilder::kinematic_position_based().pose(pose).build();
        let handle = self.bodies.insert(rb);
        let [hx, hy, hz] = CHASSIS_HALF_EXTENTS;
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Drive a kinematic mirror to `pose` on the next step.
    pub fn move_mirror(&mut self, handle: RigidBodyHandle, pose: Isometry3<f32>) -> bool {
        let Some(body) = self.bodies.get_mut(handle) else {
            return false;
        };
        body.set_next_kinematic_translation(pose.translation.vector);
        body.set_next_kinematic_rotation(pose.rotation);
        true
    }

    /// Remove a body and every collider attached to it. Absent handles are a no-op.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        self.bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<Isometry3<f32>> {
        self.bodies.get(handle).map(pose_of)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Advance by wall-clock `wall_dt` in `fixed_dt` increments, at most `max_substeps` of them.
    ///
    /// Returns the number of fixed steps taken.
    pub fn step<F>(
        &mut self,
        fixed_dt: f32,
        wall_dt: f32,
        max_substeps: u32,
        mut pre_step: F,
    ) -> u32
    where
        F: FnMut(&mut PhysicsWorld, f32),
    {
        if !(wall_dt.is_finite() && wall_dt > 0.0) {
            return 0;
        }

        self.accumulator += wall_dt;
        let mut substeps = 0;
        while self.accumulator >= fixed_dt && substeps < max_substeps {
            pre_step(self, fixed_dt);
            self.step_once(fixed_dt);
            self.accumulator -= fixed_dt;
            substeps += 1;
        }

        if self.accumulator >= fixed_dt {
            // Out of budget: drop the backlog.
            self.accumulator %= fixed_dt;
        }

        substeps
    }

    /// Run exactly one integrator step of `dt` seconds.
    pub fn step_once(&mut self, dt: f32) {
        self.params.dt = dt;
        let hooks = ();
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &hooks,
            &self.contacts,
        );
    }

    /// Contact-begin pairs raised since the last drain.
    pub fn drain_contacts(&mut self) -> Vec<ContactBegin> {
        self.contacts.drain()
    }

    /// Create a borrowed `QueryPipeline` view for ray casts.
    ///
    /// The broad phase is refreshed by every `step_once`, so bodies inserted since the last
    /// step are not visible to queries until the next one.
    pub fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }
}

/// World pose of a rigid body.
pub fn pose_of(body: &RigidBody) -> Isometry3<f32> {
    Isometry3::from_parts(Translation3::from(*body.translation()), *body.rotation())
}

/// Yaw-only version of `rotation` (rotation about +Y, pitch and roll removed).
pub fn upright(rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let q = rotation.quaternion();
    // Keep only the y/w components, as a flip-to-wheels reset does.
    let norm = (q.j * q.j + q.w * q.w).sqrt();
    if norm <= f32::EPSILON {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::from_quaternion(rapier3d::na::Quaternion::new(q.w / norm, 0.0, q.j / norm, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FIXED_TIME_STEP;
    use crate::rapier::ColliderShapeDef;

    fn ground() -> StaticBodyDef {
        StaticBodyDef::new(
            vector![0.0, -0.5, 0.0],
            UnitQuaternion::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: vector![50.0, 0.5, 50.0],
            },
        )
    }

    #[test]
    fn step_respects_substep_budget_and_drops_backlog() {
        let mut world = PhysicsWorld::new();
        let mut calls = 0;
        let taken = world.step(FIXED_TIME_STEP, 1.0, 3, |_, _| calls += 1);
        assert_eq!(taken, 3);
        assert_eq!(calls, 3);
        assert!(world.accumulator < FIXED_TIME_STEP);

        // Less than one fixed step of wall time: nothing happens yet.
        let taken = world.step(FIXED_TIME_STEP, FIXED_TIME_STEP * 0.25, 3, |_, _| {});
        assert!(taken <= 1);
    }

    #[test]
    fn step_ignores_non_positive_wall_time() {
        let mut world = PhysicsWorld::new();
        assert_eq!(world.step(FIXED_TIME_STEP, 0.0, 3, |_, _| {}), 0);
        assert_eq!(world.step(FIXED_TIME_STEP, f32::NAN, 3, |_, _| {}), 0);
    }

    #[test]
    fn remove_body_releases_colliders_and_is_idempotent() {
        let mut world = PhysicsWorld::new();
        let h = world.add_static(&ground());
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.collider_count(), 1);

        assert!(world.remove_body(h));
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.collider_count(), 0);
        assert!(!world.remove_body(h));
    }

    #[test]
    fn chassis_falls_onto_ground_and_reports_contact() {
        let mut world = PhysicsWorld::new();
        let ground = world.add_static(&ground());
        let chassis = world.add_chassis(Isometry3::translation(0.0, 2.0, 0.0));

        let mut seen = false;
        for _ in 0..120 {
            world.step_once(FIXED_TIME_STEP);
            for c in world.drain_contacts() {
                if c.other(chassis) == Some(ground) {
                    seen = true;
                }
            }
        }
        assert!(seen, "chassis never touched the ground");

        let y = world.body_pose(chassis).map(|p| p.translation.y).unwrap_or(f32::NAN);
        assert!(y > 0.0 && y < 1.0, "chassis should rest on the slab, got y = {y}");
    }

    #[test]
    fn upright_keeps_only_yaw() {
        let tilted = UnitQuaternion::from_euler_angles(0.7, 1.2, -0.4);
        let up = upright(&tilted);
        assert!(up.quaternion().i.abs() < 1e-6);
        assert!(up.quaternion().k.abs() < 1e-6);
        assert!((up * Vector::y()).y > 0.9999);

        let yawed = UnitQuaternion::from_axis_angle(&Vector::y_axis(), 0.8);
        assert!(upright(&yawed).angle_to(&yawed) < 1e-5);
    }
}
