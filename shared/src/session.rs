//! The per-frame driver tying the car, the streamed world and the room together.
//!
//! Frame order
//! 1. flip request, then input intent to drive commands
//! 2. physics substeps (wheel forces applied before each one)
//! 3. contact-begin dispatch to collision reporting
//! 4. chassis and wheel poses handed to the scene
//! 5. telemetry, with immediate publish of broken records
//! 6. world streaming around the car, then boost pickup
//! 7. rate-limited presence publish
//! 8. tire marks

use log::{info, warn};
use rapier3d::na::Vector3;

use crate::config::GameConfig;
use crate::constants::{BOOST_PICKUP_RADIUS, FIXED_TIME_STEP, MAX_SUBSTEPS, WHEEL_COUNT};
use crate::input::InputIntent;
use crate::leaderboard::{LeaderboardEntry, leaderboard};
use crate::presence::{
    ClientId, CollisionImpact, PresenceError, PresenceMap, PresenceRoom, PresenceSync,
    ReconcileReport,
};
use crate::rapier_world::{PhysicsWorld, upright};
use crate::render::{SceneBuffer, SceneCommand, VisualId, VisualKind};
use crate::streamer::{BoostId, CoverageReport, EvictionReport, WorldStreamer};
use crate::tire_marks::TireMarks;
use crate::vehicle::{RecordBreak, Telemetry, VehicleController, VehicleSnapshot};

/// What the host samples once per rendered frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameInput {
    pub intent: InputIntent,
    pub flip: bool,
    /// Wall-clock time since the previous frame (seconds).
    pub wall_dt: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub substeps: u32,
    pub speed_kmh: f32,
    pub records: RecordBreak,
    pub published: bool,
    pub impacts: Vec<CollisionImpact>,
    pub collected: Vec<BoostId>,
    pub coverage: CoverageReport,
    pub eviction: EvictionReport,
    pub boosts_culled: usize,
    pub tire_marks: usize,
}

pub struct SessionLoop {
    cfg: GameConfig,
    world: PhysicsWorld,
    scene: SceneBuffer,
    streamer: WorldStreamer,
    car: VehicleController,
    sync: PresenceSync,
    tire_marks: TireMarks,
    car_visual: VisualId,
    wheel_visuals: [VisualId; WHEEL_COUNT],
    presence: PresenceMap,
    /// Session time in seconds, accumulated from frame deltas.
    clock: f64,
}

impl SessionLoop {
    /// Build the world around the spawn point and place the local car on it.
    pub fn new(cfg: GameConfig, seed: u64, local: ClientId, color_index: u32) -> Self {
        let mut world = PhysicsWorld::new();
        let mut scene = SceneBuffer::new();
        let mut streamer = WorldStreamer::new(seed);

        let car = VehicleController::spawn(&mut world);
        let spawn = world
            .body_pose(car.chassis())
            .unwrap_or_else(rapier3d::na::Isometry3::identity);
        let car_visual = scene.spawn(
            VisualKind::Car {
                color: cfg.car_color(color_index),
            },
            spawn,
        );
        let wheel_visuals = [(); WHEEL_COUNT].map(|_| scene.spawn(VisualKind::Wheel, spawn));
        streamer.ensure_coverage(&spawn.translation.vector, &cfg, &mut world, &mut scene);

        Self {
            cfg,
            world,
            scene,
            streamer,
            car,
            sync: PresenceSync::new(local, color_index),
            tire_marks: TireMarks::new(),
            car_visual,
            wheel_visuals,
            presence: PresenceMap::new(),
            clock: 0.0,
        }
    }

    /// Announce the local car to the room.
    pub fn start(&mut self, room: &mut dyn PresenceRoom) -> Result<(), PresenceError> {
        info!(
            "session started as {} ({} tiles, {} road segments)",
            self.sync.local_client(),
            self.streamer.tile_count(),
            self.streamer.road_count()
        );
        match self.car.snapshot(&self.world) {
            Some(snapshot) => self.sync.publish_initial(room, &snapshot, &self.car.telemetry),
            None => Ok(()),
        }
    }

    /// Advance the session by one rendered frame.
    pub fn frame(&mut self, input: FrameInput, room: &mut dyn PresenceRoom) -> FrameReport {
        let mut report = FrameReport::default();
        let wall_dt = if input.wall_dt.is_finite() {
            input.wall_dt.max(0.0)
        } else {
            0.0
        };
        self.clock += f64::from(wall_dt);

        if input.flip && self.car.flip(&mut self.world) {
            info!("car flipped back onto its wheels");
        }
        self.car.apply_intent(input.intent, &self.world, &self.cfg);

        let car = &mut self.car;
        report.substeps = self
            .world
            .step(FIXED_TIME_STEP, wall_dt, MAX_SUBSTEPS, |world, dt| {
                car.pre_step(world, dt)
            });

        let Some(snapshot) = self.car.snapshot(&self.world) else {
            warn!("local chassis is missing from the physics world");
            return report;
        };

        report.impacts = self.dispatch_contacts(&snapshot, room);
        self.show_car(&snapshot);

        let position = snapshot.pose.translation.vector;
        let speed = snapshot.linvel.norm();
        report.records = self.car.telemetry.observe(
            position.y,
            speed,
            wall_dt,
            self.clock,
            &self.cfg,
        );
        report.speed_kmh = speed * crate::constants::MPS_TO_KMH;
        if let Err(err) = self
            .sync
            .publish_records(room, &self.car.telemetry, report.records)
        {
            warn!("record publish rejected: {err}");
        }

        report.coverage =
            self.streamer
                .ensure_coverage(&position, &self.cfg, &mut self.world, &mut self.scene);
        report.eviction =
            self.streamer
                .evict_stale(&position, &self.cfg, &mut self.world, &mut self.scene);
        report.boosts_culled = self
            .streamer
            .cull_boosts(&position, &self.cfg, &mut self.scene);

        report.collected =
            self.streamer
                .take_boosts_within(&position, BOOST_PICKUP_RADIUS, &mut self.scene);
        for _ in &report.collected {
            self.car.collect_boost();
        }
        self.sync.report_pickup(room, &report.collected);

        match self.sync.publish_local(
            self.clock,
            &self.cfg,
            room,
            &snapshot,
            &self.car.telemetry,
        ) {
            Ok(sent) => report.published = sent,
            Err(err) => warn!("presence publish rejected: {err}"),
        }

        let grounded: Vec<Vector3<f32>> = snapshot
            .wheels
            .iter()
            .enumerate()
            .filter(|(i, _)| self.car.vehicle().wheel_in_contact(*i))
            .map(|(_, w)| w.translation.vector)
            .collect();
        report.tire_marks = self.tire_marks.update(
            wall_dt,
            grounded,
            upright(&snapshot.pose.rotation),
            &mut self.scene,
        );

        report
    }

    fn dispatch_contacts(
        &mut self,
        snapshot: &VehicleSnapshot,
        room: &mut dyn PresenceRoom,
    ) -> Vec<CollisionImpact> {
        let chassis = self.car.chassis();
        let timestamp_ms = (self.clock * 1000.0) as u64;
        let mut impacts = Vec::new();
        for contact in self.world.drain_contacts() {
            // Rejected notices are logged where they are rejected.
            if let Ok(Some(impact)) =
                self.sync
                    .on_contact_begin(&contact, chassis, &snapshot.linvel, timestamp_ms, room)
            {
                impacts.push(impact);
            }
        }
        impacts
    }

    fn show_car(&mut self, snapshot: &VehicleSnapshot) {
        self.scene.set_pose(self.car_visual, snapshot.pose);
        for (visual, pose) in self.wheel_visuals.iter().zip(snapshot.wheels.iter()) {
            self.scene.set_pose(*visual, *pose);
        }
    }

    /// Apply a full presence mapping delivered by the room.
    pub fn on_presence_change(
        &mut self,
        presence: PresenceMap,
        room: &dyn PresenceRoom,
    ) -> ReconcileReport {
        let report = self.sync.reconcile(
            &presence,
            room,
            self.clock,
            &self.cfg,
            &mut self.world,
            &mut self.scene,
        );
        self.presence = presence;
        report
    }

    /// Poll the room and reconcile if presence changed since the last poll.
    pub fn pump(&mut self, room: &mut dyn PresenceRoom) -> Option<ReconcileReport> {
        let presence = room.poll_presence_change()?;
        Some(self.on_presence_change(presence, &*room))
    }

    /// Highest jumps among every client last seen in the room.
    pub fn leaderboard(&self, room: &dyn PresenceRoom) -> Vec<LeaderboardEntry> {
        leaderboard(&self.presence, room)
    }

    /// Scene commands accumulated since the last drain, in emission order.
    pub fn drain_scene(&mut self) -> Vec<SceneCommand> {
        self.scene.drain()
    }

    /// Release every streamed object, proxy and mark.
    pub fn shutdown(&mut self) {
        self.sync.clear(&mut self.world, &mut self.scene);
        self.streamer.clear(&mut self.world, &mut self.scene);
        self.tire_marks.clear(&mut self.scene);
        info!("session for {} shut down", self.sync.local_client());
    }

    pub fn config(&self) -> &GameConfig {
        &self.cfg
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn streamer(&self) -> &WorldStreamer {
        &self.streamer
    }

    pub fn car(&self) -> &VehicleController {
        &self.car
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.car.telemetry
    }

    pub fn sync(&self) -> &PresenceSync {
        &self.sync
    }

    pub fn presence(&self) -> &PresenceMap {
        &self.presence
    }

    pub fn car_visual(&self) -> VisualId {
        self.car_visual
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn snapshot(&self) -> Option<VehicleSnapshot> {
        self.car.snapshot(&self.world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::{MemoryHub, MemoryRoom};

    const DT: f32 = 1.0 / 60.0;

    fn session(id: &str) -> SessionLoop {
        SessionLoop::new(GameConfig::default(), 7, ClientId::new(id), 3)
    }

    fn idle() -> FrameInput {
        FrameInput {
            wall_dt: DT,
            ..Default::default()
        }
    }

    #[test]
    fn new_session_streams_the_spawn_area() {
        let s = session("me");
        assert_eq!(s.streamer().tile_count(), 25);
        assert_eq!(s.streamer().road_count(), 11);
        assert!(s.streamer().boost_count() > 0);
    }

    #[test]
    fn start_publishes_pose_and_color() {
        let hub = MemoryHub::shared();
        let mut room = MemoryRoom::join(&hub, ClientId::new("me"), None);
        let mut s = session("me");
        s.start(&mut room).unwrap();

        let presence = room.presence_snapshot();
        let me = presence.get(&ClientId::new("me")).expect("record");
        assert!(me.position.is_some());
        assert_eq!(me.color_index, Some(3));
        assert_eq!(me.acceleration_modifier, Some(1.0));
        assert_eq!(me.top_speed, Some(0.0));
    }

    #[test]
    fn frames_step_physics_and_publish_at_the_update_rate() {
        let hub = MemoryHub::shared();
        let mut room = MemoryRoom::join(&hub, ClientId::new("me"), None);
        let mut s = session("me");
        s.start(&mut room).unwrap();

        let mut published = 0;
        for _ in 0..60 {
            let report = s.frame(idle(), &mut room);
            assert_eq!(report.substeps, 1);
            if report.published {
                published += 1;
            }
        }
        // One second of frames at a 50 ms rate.
        assert!((15..=20).contains(&published), "published {published}");
        assert!((s.clock() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn car_settles_on_the_road_and_drives_forward() {
        let hub = MemoryHub::shared();
        let mut room = MemoryRoom::join(&hub, ClientId::new("me"), None);
        let mut s = session("me");
        s.start(&mut room).unwrap();

        for _ in 0..60 {
            s.frame(idle(), &mut room);
        }
        let start_x = s.snapshot().unwrap().pose.translation.x;

        let gas = FrameInput {
            intent: InputIntent {
                accelerate: true,
                ..Default::default()
            },
            flip: false,
            wall_dt: DT,
        };
        for _ in 0..120 {
            s.frame(gas, &mut room);
        }
        let pose = s.snapshot().unwrap().pose;
        assert!(pose.translation.x > start_x + 1.0);
        assert!(pose.translation.y < 2.0);
        assert!(s.telemetry().distance_traveled > 1.0);
    }

    #[test]
    fn driving_over_a_boost_collects_it_once() {
        let hub = MemoryHub::shared();
        let mut room = MemoryRoom::join(&hub, ClientId::new("me"), None);
        let mut s = session("me");
        s.start(&mut room).unwrap();

        let boost = s.streamer().boosts().next().cloned().expect("a boost");
        {
            let chassis = s.car.chassis();
            let body = s.world.body_mut(chassis).unwrap();
            body.set_translation(boost.position, true);
        }

        let report = s.frame(idle(), &mut room);
        assert!(report.collected.contains(&boost.id));
        assert!(s.streamer().boost(boost.id).is_none());
        let expected = crate::constants::BOOST_MULTIPLIER.powi(report.collected.len() as i32);
        assert!((s.car().acceleration_modifier() - expected).abs() < 1e-5);

        let status = room.collectable(boost.id).expect("flagged");
        assert!(status.collected);
        assert_eq!(status.collected_by, ClientId::new("me"));

        let again = s.frame(idle(), &mut room);
        assert!(!again.collected.contains(&boost.id));
    }

    #[test]
    fn flip_request_rights_the_car() {
        let hub = MemoryHub::shared();
        let mut room = MemoryRoom::join(&hub, ClientId::new("me"), None);
        let mut s = session("me");
        {
            let chassis = s.car.chassis();
            let body = s.world.body_mut(chassis).unwrap();
            body.set_rotation(
                rapier3d::na::UnitQuaternion::from_axis_angle(
                    &Vector3::z_axis(),
                    std::f32::consts::PI,
                ),
                true,
            );
        }
        s.frame(
            FrameInput {
                flip: true,
                ..idle()
            },
            &mut room,
        );
        let up = s.snapshot().unwrap().pose.rotation * Vector3::y();
        assert!(up.y > 0.99);
    }

    #[test]
    fn peers_appear_and_disappear_as_proxies() {
        let hub = MemoryHub::shared();
        let mut room_a = MemoryRoom::join(&hub, ClientId::new("a"), Some("Ada".into()));
        let mut room_b = MemoryRoom::join(&hub, ClientId::new("b"), Some("Bo".into()));
        let mut a = session("a");
        let mut b = session("b");
        a.start(&mut room_a).unwrap();
        b.start(&mut room_b).unwrap();

        a.pump(&mut room_a).expect("presence changed");
        let report = b.pump(&mut room_b).expect("presence changed");
        assert_eq!(report.spawned, vec![ClientId::new("a")]);
        assert_eq!(b.sync().proxy_count(), 1);
        assert_eq!(a.sync().proxy_count(), 1);

        let names: Vec<String> = b
            .leaderboard(&room_b)
            .into_iter()
            .map(|e| e.username)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Ada".to_string()));

        room_a.leave();
        let report = b.pump(&mut room_b).expect("presence changed");
        assert_eq!(report.despawned, vec![ClientId::new("a")]);
        assert_eq!(b.sync().proxy_count(), 0);
        assert!(b.pump(&mut room_b).is_none());
    }

    #[test]
    fn shutdown_releases_everything_but_the_car() {
        let hub = MemoryHub::shared();
        let mut room = MemoryRoom::join(&hub, ClientId::new("me"), None);
        let mut s = session("me");
        s.start(&mut room).unwrap();
        for _ in 0..10 {
            s.frame(idle(), &mut room);
        }
        s.shutdown();
        assert_eq!(s.streamer().tile_count(), 0);
        assert_eq!(s.streamer().boost_count(), 0);
        assert_eq!(s.world().body_count(), 1);
    }
}
