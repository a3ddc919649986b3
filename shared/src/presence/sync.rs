//! Publishing the local car and mirroring remote ones.
//!
//! Behavior
//! - Regular publishes are rate limited to one per `update_rate`; the first one always goes out.
//! - Broken personal records are published immediately, outside the rate limit.
//! - `reconcile` takes the complete presence mapping: unseen peers with a position get a proxy,
//!   known peers are snapped to their latest record, and peers missing from the mapping are
//!   torn down. Remote motion is not interpolated.
//! - Contacts between the local chassis and a proxy are reported when the relative speed,
//!   measured against the velocity the peer last published, exceeds the impact threshold.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rapier3d::na::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rapier3d::prelude::RigidBodyHandle;

use super::{
    ClientId, CollectibleStatus, CollisionImpact, PresenceError, PresenceMap, PresencePatch,
    PresenceRecord, PresenceRoom, RoomStatePatch,
};
use crate::config::GameConfig;
use crate::constants::{DEFAULT_USERNAME, IMPACT_SPEED_THRESHOLD, NAME_TAG_HEIGHT, WHEEL_COUNT};
use crate::rapier_world::{ContactBegin, PhysicsWorld};
use crate::render::{SceneBuffer, VisualId, VisualKind};
use crate::streamer::BoostId;
use crate::vehicle::{RecordBreak, Telemetry, VehicleSnapshot};

/// Local stand-in for a peer's car.
#[derive(Clone, Debug)]
pub struct RemoteVehicleProxy {
    pub client: ClientId,
    /// Kinematic mirror so local physics can collide with the peer.
    pub body: RigidBodyHandle,
    pub car: VisualId,
    pub wheels: [VisualId; WHEEL_COUNT],
    pub name_tag: VisualId,
    pub label: String,
    pub linvel: Vector3<f32>,
    pub angvel: Vector3<f32>,
    /// Session time of the last applied record (seconds).
    pub last_update: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub spawned: Vec<ClientId>,
    pub updated: usize,
    pub despawned: Vec<ClientId>,
}

fn record_pose(record: &PresenceRecord) -> Option<Isometry3<f32>> {
    let position = record.position?;
    let rotation = record.rotation.unwrap_or_else(UnitQuaternion::identity);
    Some(Isometry3::from_parts(Translation3::from(position), rotation))
}

fn name_tag_pose(car: &Isometry3<f32>) -> Isometry3<f32> {
    Isometry3::translation(
        car.translation.x,
        car.translation.y + NAME_TAG_HEIGHT,
        car.translation.z,
    )
}

fn display_name(room: &dyn PresenceRoom, client: &ClientId) -> String {
    room.username(client)
        .unwrap_or_else(|| DEFAULT_USERNAME.to_string())
}

pub struct PresenceSync {
    local: ClientId,
    color_index: u32,
    proxies: BTreeMap<ClientId, RemoteVehicleProxy>,
    last_publish: Option<f64>,
}

impl PresenceSync {
    pub fn new(local: ClientId, color_index: u32) -> Self {
        Self {
            local,
            color_index,
            proxies: BTreeMap::new(),
            last_publish: None,
        }
    }

    pub fn local_client(&self) -> &ClientId {
        &self.local
    }

    pub fn color_index(&self) -> u32 {
        self.color_index
    }

    pub fn proxy(&self, client: &ClientId) -> Option<&RemoteVehicleProxy> {
        self.proxies.get(client)
    }

    pub fn proxies(&self) -> impl Iterator<Item = &RemoteVehicleProxy> {
        self.proxies.values()
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    fn pose_patch(snapshot: &VehicleSnapshot) -> PresencePatch {
        PresencePatch {
            position: Some(snapshot.pose.translation.vector),
            rotation: Some(*snapshot.pose.rotation.quaternion()),
            wheel_positions: Some(
                snapshot.wheels.iter().map(|w| w.translation.vector).collect(),
            ),
            wheel_rotations: Some(
                snapshot.wheels.iter().map(|w| *w.rotation.quaternion()).collect(),
            ),
            ..Default::default()
        }
    }

    /// First publish of a session: pose, wheels, modifier and the car color.
    pub fn publish_initial(
        &mut self,
        room: &mut dyn PresenceRoom,
        snapshot: &VehicleSnapshot,
        telemetry: &Telemetry,
    ) -> Result<(), PresenceError> {
        let patch = PresencePatch {
            acceleration_modifier: Some(telemetry.acceleration_modifier),
            color_index: Some(self.color_index),
            top_speed: Some(0.0),
            ..Self::pose_patch(snapshot)
        };
        room.update_presence(patch)
    }

    /// Publish the full local state unless the last publish was less than `update_rate` ago.
    ///
    /// Returns whether anything was sent.
    pub fn publish_local(
        &mut self,
        now: f64,
        cfg: &GameConfig,
        room: &mut dyn PresenceRoom,
        snapshot: &VehicleSnapshot,
        telemetry: &Telemetry,
    ) -> Result<bool, PresenceError> {
        let interval = cfg.update_rate().as_secs_f64();
        if self.last_publish.is_some_and(|last| now - last <= interval) {
            return Ok(false);
        }
        self.last_publish = Some(now);

        let patch = PresencePatch {
            linvel: Some(snapshot.linvel),
            angvel: Some(snapshot.angvel),
            acceleration_modifier: Some(telemetry.acceleration_modifier),
            max_height: Some(telemetry.max_height),
            max_air_time: Some(telemetry.max_air_time),
            current_height: Some(telemetry.current_height),
            ..Self::pose_patch(snapshot)
        };
        room.update_presence(patch)?;
        Ok(true)
    }

    /// Publish newly broken records right away. Returns whether anything was sent.
    pub fn publish_records(
        &mut self,
        room: &mut dyn PresenceRoom,
        telemetry: &Telemetry,
        broke: RecordBreak,
    ) -> Result<bool, PresenceError> {
        if !broke.any() {
            return Ok(false);
        }
        let mut patch = PresencePatch::default();
        if broke.height || broke.air_time {
            patch.max_height = Some(telemetry.max_height);
            patch.max_air_time = Some(telemetry.max_air_time);
        }
        if broke.top_speed {
            patch.top_speed = Some(telemetry.top_speed_kmh);
        }
        room.update_presence(patch)?;
        Ok(true)
    }

    /// Flag collected boosts in room state, claiming them for the local client.
    pub fn report_pickup(&self, room: &mut dyn PresenceRoom, boosts: &[BoostId]) {
        if boosts.is_empty() {
            return;
        }
        let collectables = boosts
            .iter()
            .map(|id| {
                (
                    *id,
                    CollectibleStatus {
                        collected: true,
                        collected_by: self.local.clone(),
                    },
                )
            })
            .collect();
        room.update_room_state(RoomStatePatch { collectables });
    }

    /// Bring proxies in line with the complete presence mapping.
    pub fn reconcile(
        &mut self,
        presence: &PresenceMap,
        room: &dyn PresenceRoom,
        now: f64,
        cfg: &GameConfig,
        world: &mut PhysicsWorld,
        scene: &mut SceneBuffer,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for (client, record) in presence {
            if *client == self.local {
                continue;
            }
            // Peers that have not published a position yet are not ready.
            let Some(pose) = record_pose(record) else {
                continue;
            };

            if !self.proxies.contains_key(client) {
                let proxy = self.spawn_proxy(client, record, &pose, room, cfg, world, scene);
                self.proxies.insert(client.clone(), proxy);
                report.spawned.push(client.clone());
            }

            if let Some(proxy) = self.proxies.get_mut(client) {
                scene.set_pose(proxy.car, pose);
                scene.set_pose(proxy.name_tag, name_tag_pose(&pose));
                world.move_mirror(proxy.body, pose);
                if let Some(v) = record.linvel {
                    proxy.linvel = v;
                }
                if let Some(w) = record.angvel {
                    proxy.angvel = w;
                }
                if let Some(wheels) = record.wheels() {
                    for (visual, wheel) in proxy.wheels.iter().zip(wheels) {
                        let pose = Isometry3::from_parts(
                            Translation3::from(wheel.position),
                            wheel.rotation,
                        );
                        scene.set_pose(*visual, pose);
                    }
                }
                proxy.last_update = now;
                report.updated += 1;
            }
        }

        let gone: Vec<ClientId> = self
            .proxies
            .keys()
            .filter(|id| !presence.contains_key(*id))
            .cloned()
            .collect();
        for client in gone {
            if self.despawn_proxy(&client, world, scene) {
                report.despawned.push(client);
            }
        }

        for proxy in self.proxies.values_mut() {
            let name = display_name(room, &proxy.client);
            if name != proxy.label {
                scene.set_label(proxy.name_tag, name.as_str());
                proxy.label = name;
            }
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_proxy(
        &self,
        client: &ClientId,
        record: &PresenceRecord,
        pose: &Isometry3<f32>,
        room: &dyn PresenceRoom,
        cfg: &GameConfig,
        world: &mut PhysicsWorld,
        scene: &mut SceneBuffer,
    ) -> RemoteVehicleProxy {
        let color = cfg.car_color(record.color_index.unwrap_or(0));
        let label = display_name(room, client);
        let car = scene.spawn(VisualKind::Car { color }, *pose);
        let wheels = [(); WHEEL_COUNT].map(|_| scene.spawn(VisualKind::Wheel, *pose));
        let name_tag = scene.spawn(
            VisualKind::NameTag {
                text: label.clone(),
            },
            name_tag_pose(pose),
        );
        let body = world.add_mirror(*pose);
        info!("{label} ({client}) joined the road");

        RemoteVehicleProxy {
            client: client.clone(),
            body,
            car,
            wheels,
            name_tag,
            label,
            linvel: record.linvel.unwrap_or_else(Vector3::zeros),
            angvel: record.angvel.unwrap_or_else(Vector3::zeros),
            last_update: 0.0,
        }
    }

    fn despawn_proxy(
        &mut self,
        client: &ClientId,
        world: &mut PhysicsWorld,
        scene: &mut SceneBuffer,
    ) -> bool {
        let Some(proxy) = self.proxies.remove(client) else {
            return false;
        };
        scene.despawn(proxy.car);
        for wheel in proxy.wheels {
            scene.despawn(wheel);
        }
        scene.despawn(proxy.name_tag);
        world.remove_body(proxy.body);
        info!("{} ({client}) left the road", proxy.label);
        true
    }

    /// Tear down every proxy.
    pub fn clear(&mut self, world: &mut PhysicsWorld, scene: &mut SceneBuffer) {
        let all: Vec<ClientId> = self.proxies.keys().cloned().collect();
        for client in all {
            self.despawn_proxy(&client, world, scene);
        }
    }

    /// Impact between the local chassis and a proxy, if the contact is one and hard enough.
    pub fn impact_for(
        &self,
        contact: &ContactBegin,
        chassis: RigidBodyHandle,
        local_linvel: &Vector3<f32>,
    ) -> Option<(ClientId, f32)> {
        let other = contact.other(chassis)?;
        let proxy = self.proxies.values().find(|p| p.body == other)?;
        let speed = (local_linvel - proxy.linvel).norm();
        (speed > IMPACT_SPEED_THRESHOLD).then(|| (proxy.client.clone(), speed))
    }

    /// Publish a collision notice for a hard contact with a proxy.
    pub fn on_contact_begin(
        &mut self,
        contact: &ContactBegin,
        chassis: RigidBodyHandle,
        local_linvel: &Vector3<f32>,
        timestamp_ms: u64,
        room: &mut dyn PresenceRoom,
    ) -> Result<Option<CollisionImpact>, PresenceError> {
        let Some((with_client, speed)) = self.impact_for(contact, chassis, local_linvel) else {
            return Ok(None);
        };
        info!(
            "collision with {} at {speed:.2} m/s",
            display_name(&*room, &with_client)
        );
        let impact = CollisionImpact {
            with_client,
            speed,
            timestamp_ms,
        };
        room.update_presence(PresencePatch {
            collision: Some(impact.clone()),
            ..Default::default()
        })
        .inspect_err(|err| warn!("collision notice rejected: {err}"))?;
        debug!("impact published");
        Ok(Some(impact))
    }
}
