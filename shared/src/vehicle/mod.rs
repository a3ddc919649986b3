//! Local car: input intent to wheel commands, plus derived telemetry.
//!
//! Behavior
//! - Steering only acts on the front axle: `+max_steer_val` for left, `-max_steer_val` for
//!   right, `0` otherwise.
//! - Drive decisions use the chassis-frame forward speed, not the world-frame speed.
//! - "mode-2" (modifier above 5 while riding low) pushes the chassis directly with a
//!   chassis-local force instead of driving the wheels, so huge modifiers cannot flip the car.
//! - With no drive input a light brake is held on every wheel.

mod raycast;
mod telemetry;

pub use raycast::{RaycastVehicle, WheelConfig, WheelState};
pub use telemetry::{RecordBreak, Telemetry};

use log::debug;
use rapier3d::na::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rapier3d::prelude::RigidBodyHandle;

use crate::config::GameConfig;
use crate::constants::{
    BOOST_MULTIPLIER, BRAKE_PER_MODIFIER, CHASSIS_SPAWN, CHASSIS_SPAWN_YAW, COAST_BRAKE,
    MODE2_FORCE_PER_MODIFIER, MODE2_MAX_RIDE_HEIGHT, MODE2_MIN_MODIFIER, WHEEL_CONNECTION_POINTS,
    WHEEL_COUNT,
};
use crate::input::InputIntent;
use crate::rapier_world::{PhysicsWorld, upright};

/// Indices of the steered wheels.
pub const FRONT_WHEELS: [usize; 2] = [0, 1];

/// Per-step drive outputs, identical for every wheel except steering (front axle only).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveCommand {
    pub steering: f32,
    pub engine_force: f32,
    pub brake: f32,
    /// Chassis-local force along +Z, set only in mode-2.
    pub chassis_force: Option<f32>,
}

pub fn is_mode2(acceleration_modifier: f32, ride_height: f32) -> bool {
    acceleration_modifier > MODE2_MIN_MODIFIER && ride_height < MODE2_MAX_RIDE_HEIGHT
}

/// Decide steering, engine force and brake for one step.
pub fn plan_drive(
    intent: InputIntent,
    forward_speed: f32,
    ride_height: f32,
    acceleration_modifier: f32,
    cfg: &GameConfig,
) -> DriveCommand {
    let intent = intent.normalized();
    let mut cmd = DriveCommand::default();

    if intent.left {
        cmd.steering = cfg.max_steer_val;
    }
    if intent.right {
        cmd.steering = -cfg.max_steer_val;
    }

    let mode2 = is_mode2(acceleration_modifier, ride_height);
    let push = MODE2_FORCE_PER_MODIFIER * acceleration_modifier;

    if intent.accelerate {
        if mode2 {
            cmd.chassis_force = Some(push);
        } else {
            cmd.engine_force = cfg.max_force * acceleration_modifier;
        }
    } else if intent.brake {
        if mode2 {
            cmd.chassis_force = Some(-push);
        } else if forward_speed > 0.0 {
            cmd.brake = BRAKE_PER_MODIFIER * acceleration_modifier;
        } else {
            cmd.engine_force = -cfg.max_force * acceleration_modifier;
        }
    } else {
        cmd.brake = COAST_BRAKE;
    }

    cmd
}

/// Pose and velocity of the local car, as published to peers.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleSnapshot {
    pub pose: Isometry3<f32>,
    pub linvel: Vector3<f32>,
    pub angvel: Vector3<f32>,
    pub wheels: [Isometry3<f32>; WHEEL_COUNT],
}

pub struct VehicleController {
    vehicle: RaycastVehicle,
    pub telemetry: Telemetry,
    command: DriveCommand,
}

impl VehicleController {
    /// Insert the chassis at the spawn point, facing down the road, and attach the wheels.
    pub fn spawn(world: &mut PhysicsWorld) -> Self {
        let pose = Isometry3::from_parts(
            Translation3::from(Vector3::from(CHASSIS_SPAWN)),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), CHASSIS_SPAWN_YAW),
        );
        let chassis = world.add_chassis(pose);
        let mut vehicle = RaycastVehicle::new(chassis);
        for point in WHEEL_CONNECTION_POINTS {
            vehicle.add_wheel(WheelConfig::at(point));
        }

        Self {
            vehicle,
            telemetry: Telemetry::default(),
            command: DriveCommand::default(),
        }
    }

    pub fn chassis(&self) -> RigidBodyHandle {
        self.vehicle.chassis()
    }

    pub fn vehicle(&self) -> &RaycastVehicle {
        &self.vehicle
    }

    pub fn command(&self) -> DriveCommand {
        self.command
    }

    pub fn acceleration_modifier(&self) -> f32 {
        self.telemetry.acceleration_modifier
    }

    /// Translate an intent into wheel commands for the coming substeps.
    pub fn apply_intent(
        &mut self,
        intent: InputIntent,
        world: &PhysicsWorld,
        cfg: &GameConfig,
    ) -> DriveCommand {
        let forward_speed = self.vehicle.forward_speed(world);
        let ride_height = world
            .body_pose(self.chassis())
            .map(|p| p.translation.y)
            .unwrap_or(0.0);

        let cmd = plan_drive(
            intent,
            forward_speed,
            ride_height,
            self.telemetry.acceleration_modifier,
            cfg,
        );

        for wheel in 0..self.vehicle.wheel_count() {
            let steer = if FRONT_WHEELS.contains(&wheel) {
                cmd.steering
            } else {
                0.0
            };
            self.vehicle.set_steering_value(steer, wheel);
            self.vehicle.apply_engine_force(cmd.engine_force, wheel);
            self.vehicle.set_brake(cmd.brake, wheel);
        }

        self.command = cmd;
        cmd
    }

    /// Runs before every fixed physics step.
    pub fn pre_step(&mut self, world: &mut PhysicsWorld, dt: f32) {
        if let Some(force) = self.command.chassis_force {
            if let Some(body) = world.body_mut(self.chassis()) {
                let impulse = body.rotation() * Vector3::new(0.0, 0.0, force * dt);
                body.apply_impulse(impulse, true);
            }
        }
        self.vehicle.update(world, dt);
    }

    /// One boost collected: the modifier grows by a fixed factor, without cap.
    pub fn collect_boost(&mut self) -> f32 {
        self.telemetry.acceleration_modifier *= BOOST_MULTIPLIER;
        debug!(
            "boost collected, acceleration modifier now {:.2}",
            self.telemetry.acceleration_modifier
        );
        self.telemetry.acceleration_modifier
    }

    /// Put the car back on its wheels: keep yaw only, stop it, lift it by a meter.
    pub fn flip(&mut self, world: &mut PhysicsWorld) -> bool {
        let Some(body) = world.body_mut(self.chassis()) else {
            return false;
        };
        let rotation = upright(body.rotation());
        let mut translation = *body.translation();
        translation.y += 1.0;

        body.set_rotation(rotation, true);
        body.set_translation(translation, true);
        body.set_linvel(Vector3::zeros(), true);
        body.set_angvel(Vector3::zeros(), true);
        true
    }

    pub fn snapshot(&self, world: &PhysicsWorld) -> Option<VehicleSnapshot> {
        let body = world.body(self.chassis())?;
        let pose = crate::rapier_world::pose_of(body);
        let mut wheels = [Isometry3::identity(); WHEEL_COUNT];
        for (i, slot) in wheels.iter_mut().enumerate() {
            *slot = self.vehicle.wheel_world_transform(world, i)?;
        }
        Some(VehicleSnapshot {
            pose,
            linvel: *body.linvel(),
            angvel: *body.angvel(),
            wheels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FIXED_TIME_STEP;

    fn accelerate() -> InputIntent {
        InputIntent {
            accelerate: true,
            ..Default::default()
        }
    }

    fn brake() -> InputIntent {
        InputIntent {
            brake: true,
            ..Default::default()
        }
    }

    #[test]
    fn accelerate_drives_all_wheels_and_releases_brakes() {
        let cfg = GameConfig::default();
        for modifier in [1.0, 1.1, 3.7] {
            let cmd = plan_drive(accelerate(), 4.0, 0.7, modifier, &cfg);
            assert_eq!(cmd.engine_force, cfg.max_force * modifier);
            assert_eq!(cmd.brake, 0.0);
            assert_eq!(cmd.chassis_force, None);
        }
    }

    #[test]
    fn idle_holds_light_brake() {
        let cfg = GameConfig::default();
        let cmd = plan_drive(InputIntent::default(), 12.0, 0.7, 2.0, &cfg);
        assert_eq!(cmd.brake, 0.5);
        assert_eq!(cmd.engine_force, 0.0);
        assert_eq!(cmd.steering, 0.0);
    }

    #[test]
    fn brake_depends_on_travel_direction() {
        let cfg = GameConfig::default();
        let moving = plan_drive(brake(), 3.0, 0.7, 2.0, &cfg);
        assert_eq!(moving.brake, 40.0);
        assert_eq!(moving.engine_force, 0.0);

        let stopped = plan_drive(brake(), 0.0, 0.7, 2.0, &cfg);
        assert_eq!(stopped.brake, 0.0);
        assert_eq!(stopped.engine_force, -1000.0);
    }

    #[test]
    fn steering_is_signed_by_side() {
        let cfg = GameConfig::default();
        let left = InputIntent {
            left: true,
            ..Default::default()
        };
        let right = InputIntent {
            right: true,
            ..Default::default()
        };
        assert_eq!(plan_drive(left, 0.0, 0.7, 1.0, &cfg).steering, 0.5);
        assert_eq!(plan_drive(right, 0.0, 0.7, 1.0, &cfg).steering, -0.5);
    }

    #[test]
    fn mode2_pushes_the_chassis_instead_of_the_wheels() {
        let cfg = GameConfig::default();
        let cmd = plan_drive(accelerate(), 30.0, 0.7, 6.0, &cfg);
        assert_eq!(cmd.engine_force, 0.0);
        assert_eq!(cmd.chassis_force, Some(3000.0));

        let cmd = plan_drive(brake(), 30.0, 0.7, 6.0, &cfg);
        assert_eq!(cmd.brake, 0.0);
        assert_eq!(cmd.chassis_force, Some(-3000.0));

        // Too high off the ground for mode-2.
        let cmd = plan_drive(accelerate(), 30.0, 1.5, 6.0, &cfg);
        assert_eq!(cmd.engine_force, cfg.max_force * 6.0);
    }

    #[test]
    fn boost_multiplies_modifier() {
        let mut world = PhysicsWorld::new();
        let mut car = VehicleController::spawn(&mut world);
        assert_eq!(car.acceleration_modifier(), 1.0);
        car.collect_boost();
        assert!((car.acceleration_modifier() - 1.1).abs() < 1e-6);
        car.collect_boost();
        assert!((car.acceleration_modifier() - 1.21).abs() < 1e-5);
    }

    #[test]
    fn apply_intent_only_steers_front_axle() {
        let cfg = GameConfig::default();
        let mut world = PhysicsWorld::new();
        let mut car = VehicleController::spawn(&mut world);
        car.apply_intent(
            InputIntent {
                accelerate: true,
                left: true,
                ..Default::default()
            },
            &world,
            &cfg,
        );
        let wheels = car.vehicle().wheels();
        assert_eq!(wheels[0].steering, 0.5);
        assert_eq!(wheels[1].steering, 0.5);
        assert_eq!(wheels[2].steering, 0.0);
        assert_eq!(wheels[3].steering, 0.0);
        assert!(wheels.iter().all(|w| w.engine_force == 500.0 && w.brake == 0.0));
    }

    #[test]
    fn spawned_car_faces_down_the_road() {
        let mut world = PhysicsWorld::new();
        let car = VehicleController::spawn(&mut world);
        let snap = car.snapshot(&world).expect("snapshot");
        let forward = snap.pose.rotation * Vector3::z();
        assert!(forward.x > 0.999);
        assert_eq!(snap.pose.translation.y, 1.0);
    }

    #[test]
    fn flip_rights_the_car_and_lifts_it() {
        let mut world = PhysicsWorld::new();
        let mut car = VehicleController::spawn(&mut world);
        if let Some(body) = world.body_mut(car.chassis()) {
            body.set_rotation(UnitQuaternion::from_euler_angles(3.0, 0.3, 0.0), true);
            body.set_linvel(Vector3::new(4.0, 2.0, 0.0), true);
        }
        world.step_once(FIXED_TIME_STEP);
        let before = world.body_pose(car.chassis()).expect("pose").translation.y;

        assert!(car.flip(&mut world));
        let body = world.body(car.chassis()).expect("chassis");
        assert!((body.rotation() * Vector3::y()).y > 0.999);
        assert_eq!(*body.linvel(), Vector3::zeros());
        assert!((body.translation().y - (before + 1.0)).abs() < 1e-5);
    }
}
