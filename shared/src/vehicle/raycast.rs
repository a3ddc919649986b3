//! Raycast vehicle on top of a Rapier rigid body.
//!
//! The chassis is an ordinary dynamic body. Wheels are not bodies: each one casts a ray
//! along the chassis down axis, and the resulting suspension and tire impulses are applied
//! to the chassis directly.
//!
//! Behavior
//! - Suspension is a spring/damper scaled by chassis mass, clamped to `[0, max_suspension_force]`.
//! - Longitudinal impulse is `engine_force * dt`; with no engine force, a rolling-friction
//!   impulse bounded by `brake` opposes forward motion at the contact.
//! - Lateral impulse cancels sideways slip at the contact.
//! - Forward and lateral impulses together are clamped to `friction_slip * suspension_force * dt`.
//! - Lateral impulses are applied at a point pulled toward the centre of mass along the up
//!   axis by `roll_influence`, which keeps the car from rolling over in corners.
//!
//! Conventions
//! - Chassis space: +Y up, +Z forward, +X left.
//! - Positive steering turns left, positive engine force drives forward.

use rapier3d::na::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};
use rapier3d::prelude::*;

use crate::constants::{
    DAMPING_COMPRESSION, DAMPING_RELAXATION, FRICTION_SLIP, ROLL_INFLUENCE,
    SUSPENSION_MAX_FORCE, SUSPENSION_MAX_TRAVEL, SUSPENSION_REST_LENGTH, SUSPENSION_STIFFNESS,
    WHEEL_RADIUS,
};
use crate::rapier_world::{PhysicsWorld, pose_of};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelConfig {
    /// Attachment point in chassis space.
    pub connection_point: Point3<f32>,
    /// Suspension direction in chassis space (unit, pointing down).
    pub direction: Vector3<f32>,
    /// Axle direction in chassis space (unit).
    pub axle: Vector3<f32>,
    pub radius: f32,
    pub suspension_rest_length: f32,
    pub suspension_stiffness: f32,
    pub max_suspension_travel: f32,
    pub max_suspension_force: f32,
    pub damping_relaxation: f32,
    pub damping_compression: f32,
    pub friction_slip: f32,
    pub roll_influence: f32,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            connection_point: Point3::origin(),
            direction: -Vector3::y(),
            axle: Vector3::x(),
            radius: WHEEL_RADIUS,
            suspension_rest_length: SUSPENSION_REST_LENGTH,
            suspension_stiffness: SUSPENSION_STIFFNESS,
            max_suspension_travel: SUSPENSION_MAX_TRAVEL,
            max_suspension_force: SUSPENSION_MAX_FORCE,
            damping_relaxation: DAMPING_RELAXATION,
            damping_compression: DAMPING_COMPRESSION,
            friction_slip: FRICTION_SLIP,
            roll_influence: ROLL_INFLUENCE,
        }
    }
}

impl WheelConfig {
    /// Default tuning, attached at `[x, y, z]` in chassis space.
    pub fn at(connection_point: [f32; 3]) -> Self {
        Self {
            connection_point: Point3::from(connection_point),
            ..Self::default()
        }
    }

    fn max_ray_length(&self) -> f32 {
        self.suspension_rest_length + self.max_suspension_travel + self.radius
    }
}

#[derive(Clone, Debug)]
pub struct WheelState {
    pub config: WheelConfig,
    pub steering: f32,
    pub engine_force: f32,
    pub brake: f32,
    pub suspension_length: f32,
    pub suspension_force: f32,
    pub in_contact: bool,
    /// Spin angle about the axle (radians).
    pub rotation: f32,
    delta_rotation: f32,
}

impl WheelState {
    fn new(config: WheelConfig) -> Self {
        Self {
            config,
            steering: 0.0,
            engine_force: 0.0,
            brake: 0.0,
            suspension_length: config.suspension_rest_length,
            suspension_force: 0.0,
            in_contact: false,
            rotation: 0.0,
            delta_rotation: 0.0,
        }
    }
}

/// Result of one wheel's suspension ray cast.
struct WheelContact {
    point: Point3<f32>,
    normal: Vector3<f32>,
    suspension_length: f32,
}

pub struct RaycastVehicle {
    chassis: RigidBodyHandle,
    wheels: Vec<WheelState>,
}

impl RaycastVehicle {
    pub fn new(chassis: RigidBodyHandle) -> Self {
        Self {
            chassis,
            wheels: Vec::new(),
        }
    }

    pub fn chassis(&self) -> RigidBodyHandle {
        self.chassis
    }

    /// Returns the index of the new wheel.
    pub fn add_wheel(&mut self, config: WheelConfig) -> usize {
        self.wheels.push(WheelState::new(config));
        self.wheels.len() - 1
    }

    pub fn wheel_count(&self) -> usize {
        self.wheels.len()
    }

    pub fn wheel(&self, index: usize) -> Option<&WheelState> {
        self.wheels.get(index)
    }

    pub fn wheels(&self) -> &[WheelState] {
        &self.wheels
    }

    pub fn set_steering_value(&mut self, value: f32, wheel: usize) {
        if let Some(w) = self.wheels.get_mut(wheel) {
            w.steering = value;
        }
    }

    pub fn apply_engine_force(&mut self, force: f32, wheel: usize) {
        if let Some(w) = self.wheels.get_mut(wheel) {
            w.engine_force = force;
        }
    }

    pub fn set_brake(&mut self, brake: f32, wheel: usize) {
        if let Some(w) = self.wheels.get_mut(wheel) {
            w.brake = brake;
        }
    }

    pub fn wheel_in_contact(&self, wheel: usize) -> bool {
        self.wheels.get(wheel).is_some_and(|w| w.in_contact)
    }

    /// World pose of a wheel hub: suspension-offset, steered and spun.
    pub fn wheel_world_transform(
        &self,
        world: &PhysicsWorld,
        wheel: usize,
    ) -> Option<Isometry3<f32>> {
        let w = self.wheels.get(wheel)?;
        let chassis = world.body_pose(self.chassis)?;

        let hub_local = w.config.connection_point + w.config.direction * w.suspension_length;
        let up = -w.config.direction;
        let steer = UnitQuaternion::from_axis_angle(&Unit::new_normalize(up), w.steering);
        let spin = UnitQuaternion::from_axis_angle(&Unit::new_normalize(w.config.axle), w.rotation);

        let hub = chassis * hub_local;
        Some(Isometry3::from_parts(
            Translation3::from(hub.coords),
            chassis.rotation * steer * spin,
        ))
    }

    /// Velocity of the chassis along its own forward axis (m/s).
    pub fn forward_speed(&self, world: &PhysicsWorld) -> f32 {
        world
            .body(self.chassis)
            .map(|b| (b.rotation().inverse() * b.linvel()).z)
            .unwrap_or(0.0)
    }

    /// Probe the ground under every wheel and apply suspension and tire impulses for `dt`.
    pub fn update(&mut self, world: &mut PhysicsWorld, dt: f32) {
        let contacts = self.cast_suspension_rays(world);

        let Some(body) = world.body_mut(self.chassis) else {
            return;
        };
        let pose = pose_of(body);
        let mass = body.mass();
        let com = *body.center_of_mass();
        let chassis_up = pose.rotation * Vector3::y();
        let chassis_forward = pose.rotation * Vector3::z();
        let grounded = contacts.iter().filter(|c| c.is_some()).count().max(1) as f32;
        // Share of the chassis mass each grounded wheel resolves against.
        let wheel_mass = mass / grounded;

        for (wheel, contact) in self.wheels.iter_mut().zip(contacts) {
            let cfg = wheel.config;
            let Some(contact) = contact else {
                wheel.in_contact = false;
                wheel.suspension_length = cfg.suspension_rest_length + cfg.max_suspension_travel;
                wheel.suspension_force = 0.0;
                wheel.rotation += wheel.delta_rotation;
                wheel.delta_rotation *= 0.99;
                continue;
            };
            wheel.in_contact = true;
            wheel.suspension_length = contact.suspension_length;

            // Suspension
            let down = pose.rotation * cfg.direction;
            let denominator = contact.normal.dot(&down);
            let point_vel = body.velocity_at_point(&contact.point);
            let proj_vel = contact.normal.dot(&point_vel);
            let (rel_vel, clipped_inv) = if denominator >= -0.1 {
                (0.0, 1.0 / 0.1)
            } else {
                let inv = -1.0 / denominator;
                (proj_vel * inv, inv)
            };

            let compression = cfg.suspension_rest_length - wheel.suspension_length;
            let mut force = cfg.suspension_stiffness * compression * clipped_inv;
            let damping = if rel_vel < 0.0 {
                cfg.damping_compression
            } else {
                cfg.damping_relaxation
            };
            force -= damping * rel_vel;
            wheel.suspension_force = (force * mass).clamp(0.0, cfg.max_suspension_force);

            body.apply_impulse_at_point(
                contact.normal * (wheel.suspension_force * dt),
                contact.point,
                true,
            );

            // Tire basis on the contact plane.
            let steer =
                UnitQuaternion::from_axis_angle(&Unit::new_normalize(chassis_up), wheel.steering);
            let heading = steer * chassis_forward;
            let forward = heading - contact.normal * contact.normal.dot(&heading);
            if forward.norm_squared() < 1.0e-8 {
                continue;
            }
            let forward = forward.normalize();
            let side = contact.normal.cross(&forward).normalize();

            let point_vel = body.velocity_at_point(&contact.point);
            let v_forward = point_vel.dot(&forward);
            let v_side = point_vel.dot(&side);

            let mut forward_impulse = if wheel.engine_force != 0.0 {
                wheel.engine_force * dt
            } else {
                (-v_forward * wheel_mass).clamp(-wheel.brake, wheel.brake)
            };
            let mut side_impulse = -v_side * wheel_mass;

            let max_impulse = cfg.friction_slip * wheel.suspension_force * dt;
            let total = forward_impulse.hypot(side_impulse);
            if total > max_impulse && total > 0.0 {
                let scale = max_impulse / total;
                forward_impulse *= scale;
                side_impulse *= scale;
            }

            if forward_impulse != 0.0 {
                body.apply_impulse_at_point(forward * forward_impulse, contact.point, true);
            }
            if side_impulse != 0.0 {
                let rel = contact.point - com;
                let up_part = chassis_up * rel.dot(&chassis_up);
                let lever = rel - up_part * (1.0 - cfg.roll_influence);
                body.apply_impulse_at_point(side * side_impulse, com + lever, true);
            }

            // Spin
            wheel.delta_rotation = v_forward * dt / cfg.radius;
            wheel.rotation += wheel.delta_rotation;
        }
    }

    /// Cast each wheel's suspension ray against everything but the chassis itself.
    fn cast_suspension_rays(&self, world: &PhysicsWorld) -> Vec<Option<WheelContact>> {
        let Some(pose) = world.body_pose(self.chassis) else {
            return self.wheels.iter().map(|_| None).collect();
        };
        let filter = QueryFilter::default()
            .exclude_rigid_body(self.chassis)
            .exclude_sensors();
        let query = world.query_pipeline(filter);

        self.wheels
            .iter()
            .map(|w| {
                let cfg = &w.config;
                let origin = pose * cfg.connection_point;
                let dir = pose.rotation * cfg.direction;
                let ray = Ray::new(origin, dir);
                let (_, hit) = query.cast_ray_and_get_normal(&ray, cfg.max_ray_length(), true)?;

                let min_len = (cfg.suspension_rest_length - cfg.max_suspension_travel).max(0.0);
                let max_len = cfg.suspension_rest_length + cfg.max_suspension_travel;
                Some(WheelContact {
                    point: ray.point_at(hit.time_of_impact),
                    normal: hit.normal,
                    suspension_length: (hit.time_of_impact - cfg.radius).clamp(min_len, max_len),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{FIXED_TIME_STEP, WHEEL_CONNECTION_POINTS};
    use crate::rapier::{ColliderShapeDef, StaticBodyDef};

    fn world_with_car() -> (PhysicsWorld, RaycastVehicle) {
        let mut world = PhysicsWorld::new();
        world.add_static(&StaticBodyDef::new(
            vector![0.0, -0.5, 0.0],
            UnitQuaternion::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: vector![200.0, 0.5, 200.0],
            },
        ));
        let chassis = world.add_chassis(Isometry3::translation(0.0, 1.0, 0.0));
        let mut vehicle = RaycastVehicle::new(chassis);
        for p in WHEEL_CONNECTION_POINTS {
            vehicle.add_wheel(WheelConfig::at(p));
        }
        // Let the broad phase see the ground before the first ray cast.
        world.step_once(FIXED_TIME_STEP);
        (world, vehicle)
    }

    fn run(world: &mut PhysicsWorld, vehicle: &mut RaycastVehicle, steps: usize) {
        for _ in 0..steps {
            vehicle.update(world, FIXED_TIME_STEP);
            world.step_once(FIXED_TIME_STEP);
        }
    }

    #[test]
    fn car_settles_on_its_suspension() {
        let (mut world, mut vehicle) = world_with_car();
        run(&mut world, &mut vehicle, 180);

        assert!((0..4).all(|i| vehicle.wheel_in_contact(i)));
        let y = world.body_pose(vehicle.chassis()).map(|p| p.translation.y).unwrap_or(0.0);
        // Wheels hold the chassis clear of the slab.
        assert!(y > 0.5, "chassis sank to y = {y}");

        let up = world
            .body_pose(vehicle.chassis())
            .map(|p| p.rotation * Vector3::y())
            .unwrap_or(Vector3::zeros());
        assert!(up.y > 0.99);
    }

    #[test]
    fn engine_force_drives_forward() {
        let (mut world, mut vehicle) = world_with_car();
        run(&mut world, &mut vehicle, 60);
        for i in 0..4 {
            vehicle.apply_engine_force(500.0, i);
        }
        run(&mut world, &mut vehicle, 120);

        assert!(vehicle.forward_speed(&world) > 1.0);
        let z = world.body_pose(vehicle.chassis()).map(|p| p.translation.z).unwrap_or(0.0);
        assert!(z > 0.5);
    }

    #[test]
    fn brake_slows_the_car() {
        let (mut world, mut vehicle) = world_with_car();
        run(&mut world, &mut vehicle, 60);
        for i in 0..4 {
            vehicle.apply_engine_force(500.0, i);
        }
        run(&mut world, &mut vehicle, 120);
        let cruising = vehicle.forward_speed(&world);

        for i in 0..4 {
            vehicle.apply_engine_force(0.0, i);
            vehicle.set_brake(20.0, i);
        }
        run(&mut world, &mut vehicle, 60);
        assert!(vehicle.forward_speed(&world) < cruising * 0.5);
    }

    #[test]
    fn wheels_lose_contact_in_the_air() {
        let mut world = PhysicsWorld::new();
        let chassis = world.add_chassis(Isometry3::translation(0.0, 50.0, 0.0));
        let mut vehicle = RaycastVehicle::new(chassis);
        vehicle.add_wheel(WheelConfig::at(WHEEL_CONNECTION_POINTS[0]));
        run(&mut world, &mut vehicle, 2);
        assert!(!vehicle.wheel_in_contact(0));
        assert!(!vehicle.wheel_in_contact(7));
    }

    #[test]
    fn wheel_transform_follows_steering() {
        let (world, mut vehicle) = world_with_car();
        vehicle.set_steering_value(0.5, 0);
        let steered = vehicle.wheel_world_transform(&world, 0);
        let straight = vehicle.wheel_world_transform(&world, 2);
        let (Some(steered), Some(straight)) = (steered, straight) else {
            panic!("missing wheel transform");
        };
        let fwd_steered = steered.rotation * Vector3::z();
        let fwd_straight = straight.rotation * Vector3::z();
        assert!(fwd_steered.x > 0.4, "positive steering turns toward +X");
        assert!(fwd_straight.x.abs() < 1.0e-4);
        assert!(vehicle.wheel_world_transform(&world, 9).is_none());
    }
}
