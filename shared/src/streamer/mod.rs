//! Infinite-world streaming around a moving reference point.
//!
//! Behavior
//! - `ensure_coverage` creates every missing tile in the `(2 * tile_range + 1)^2` square
//!   around the reference tile and every missing road segment within `road_range` indices.
//!   Existing keys are left alone, so repeated calls at the same point create nothing.
//! - `evict_stale` drops tiles whose ground centre is farther than `max_tiles_distance` from
//!   the reference point, and road segments whose cross-track distance exceeds twice that.
//!   A tile or segment goes away together with its body, its visuals and the boosts it spawned.
//! - Boosts are also kept in one flat map for pickup tests and distance culling.
//!
//! Notes
//! - Evicted tiles are never restored; coming back regenerates them with fresh randomness.
//! - Placement randomness comes from a per-session seed, so a seeded session is reproducible.

mod populate;

use std::collections::HashMap;

use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rapier3d::na::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rapier3d::prelude::RigidBodyHandle;

use crate::cell::{
    RoadIndex, TileKey, road_center, road_index, roads_in_range, tile_center, tile_key,
    tiles_in_range,
};
use crate::config::GameConfig;
use crate::constants::{RAMP_HALF_EXTENTS, ROAD_VISUAL_HEIGHT, ROAD_WIDTH};
use crate::rapier_world::PhysicsWorld;
use crate::render::{SceneBuffer, VisualId, VisualKind};

use populate::Placement;

/// Identifier of a collectible boost, unique within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoostId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoostOwner {
    Tile(TileKey),
    Road(RoadIndex),
}

#[derive(Clone, Debug)]
pub struct Boost {
    pub id: BoostId,
    pub position: Vector3<f32>,
    pub visual: VisualId,
    pub owner: BoostOwner,
}

/// A visual with an optional static body behind it.
#[derive(Clone, Copy, Debug)]
struct WorldObject {
    visual: VisualId,
    body: Option<RigidBodyHandle>,
}

#[derive(Debug)]
struct Tile {
    center: Vector3<f32>,
    ground: WorldObject,
    objects: Vec<WorldObject>,
    boosts: Vec<BoostId>,
}

#[derive(Debug)]
struct RoadSegment {
    center: Vector3<f32>,
    surface: WorldObject,
    boosts: Vec<BoostId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoverageReport {
    pub tiles_created: usize,
    pub roads_created: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub tiles_removed: usize,
    pub roads_removed: usize,
    pub boosts_released: usize,
}

pub struct WorldStreamer {
    rng: ChaCha8Rng,
    tiles: HashMap<TileKey, Tile>,
    roads: HashMap<RoadIndex, RoadSegment>,
    boosts: HashMap<BoostId, Boost>,
}

fn release(object: WorldObject, world: &mut PhysicsWorld, scene: &mut SceneBuffer) {
    scene.despawn(object.visual);
    if let Some(body) = object.body {
        world.remove_body(body);
    }
}

fn at(position: Vector3<f32>) -> Isometry3<f32> {
    Isometry3::from_parts(Translation3::from(position), UnitQuaternion::identity())
}

impl WorldStreamer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            tiles: HashMap::new(),
            roads: HashMap::new(),
            boosts: HashMap::new(),
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    pub fn boost_count(&self) -> usize {
        self.boosts.len()
    }

    pub fn has_tile(&self, key: TileKey) -> bool {
        self.tiles.contains_key(&key)
    }

    pub fn has_road(&self, index: RoadIndex) -> bool {
        self.roads.contains_key(&index)
    }

    pub fn tile_keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.tiles.keys().copied()
    }

    pub fn boosts(&self) -> impl Iterator<Item = &Boost> {
        self.boosts.values()
    }

    pub fn boost(&self, id: BoostId) -> Option<&Boost> {
        self.boosts.get(&id)
    }

    /// Create missing tiles and road segments around `point`.
    pub fn ensure_coverage(
        &mut self,
        point: &Vector3<f32>,
        cfg: &GameConfig,
        world: &mut PhysicsWorld,
        scene: &mut SceneBuffer,
    ) -> CoverageReport {
        let mut report = CoverageReport::default();

        let center = tile_key(point.x, point.z, cfg.tile_size);
        for key in tiles_in_range(center, cfg.tile_range) {
            if !self.tiles.contains_key(&key) {
                self.create_tile(key, cfg, world, scene);
                report.tiles_created += 1;
            }
        }

        let road = road_index(point.x, cfg.road_length);
        for index in roads_in_range(road, cfg.road_range) {
            if !self.roads.contains_key(&index) {
                self.create_road(index, cfg, world, scene);
                report.roads_created += 1;
            }
        }

        if report != CoverageReport::default() {
            debug!(
                "streamed in {} tiles, {} road segments ({} tiles live)",
                report.tiles_created,
                report.roads_created,
                self.tiles.len()
            );
        }
        report
    }

    /// Drop tiles and road segments that are too far from `point`.
    pub fn evict_stale(
        &mut self,
        point: &Vector3<f32>,
        cfg: &GameConfig,
        world: &mut PhysicsWorld,
        scene: &mut SceneBuffer,
    ) -> EvictionReport {
        let mut report = EvictionReport::default();

        let stale_tiles: Vec<TileKey> = self
            .tiles
            .iter()
            .filter(|(_, t)| (t.center - point).norm() > cfg.max_tiles_distance)
            .map(|(k, _)| *k)
            .collect();
        for key in stale_tiles {
            if let Some(released) = self.remove_tile(key, world, scene) {
                report.tiles_removed += 1;
                report.boosts_released += released;
            }
        }

        let max_lateral = cfg.max_tiles_distance * 2.0;
        let stale_roads: Vec<RoadIndex> = self
            .roads
            .iter()
            .filter(|(_, r)| (r.center.z - point.z).abs() > max_lateral)
            .map(|(i, _)| *i)
            .collect();
        for index in stale_roads {
            if let Some(released) = self.remove_road(index, world, scene) {
                report.roads_removed += 1;
                report.boosts_released += released;
            }
        }

        if report != EvictionReport::default() {
            debug!(
                "evicted {} tiles, {} road segments, {} boosts",
                report.tiles_removed, report.roads_removed, report.boosts_released
            );
        }
        report
    }

    /// Remove boosts farther than `max_tiles_distance` from `point`. Returns how many went.
    pub fn cull_boosts(
        &mut self,
        point: &Vector3<f32>,
        cfg: &GameConfig,
        scene: &mut SceneBuffer,
    ) -> usize {
        let far: Vec<BoostId> = self
            .boosts
            .values()
            .filter(|b| (b.position - point).norm() > cfg.max_tiles_distance)
            .map(|b| b.id)
            .collect();
        for id in &far {
            self.remove_boost(*id, scene);
        }
        far.len()
    }

    /// Remove and return every boost strictly closer than `radius` to `point`.
    pub fn take_boosts_within(
        &mut self,
        point: &Vector3<f32>,
        radius: f32,
        scene: &mut SceneBuffer,
    ) -> Vec<BoostId> {
        let mut hit: Vec<BoostId> = self
            .boosts
            .values()
            .filter(|b| (b.position - point).norm() < radius)
            .map(|b| b.id)
            .collect();
        hit.sort();
        hit.retain(|id| self.remove_boost(*id, scene));
        hit
    }

    /// Remove a tile and everything it owns. Returns the number of boosts released with it.
    pub fn remove_tile(
        &mut self,
        key: TileKey,
        world: &mut PhysicsWorld,
        scene: &mut SceneBuffer,
    ) -> Option<usize> {
        let tile = self.tiles.remove(&key)?;
        release(tile.ground, world, scene);
        for object in tile.objects {
            release(object, world, scene);
        }
        Some(
            tile.boosts
                .into_iter()
                .filter(|id| self.remove_boost(*id, scene))
                .count(),
        )
    }

    /// Remove a road segment and its boosts. Returns the number of boosts released with it.
    pub fn remove_road(
        &mut self,
        index: RoadIndex,
        world: &mut PhysicsWorld,
        scene: &mut SceneBuffer,
    ) -> Option<usize> {
        let road = self.roads.remove(&index)?;
        release(road.surface, world, scene);
        Some(
            road.boosts
                .into_iter()
                .filter(|id| self.remove_boost(*id, scene))
                .count(),
        )
    }

    /// Release every tile, road segment and boost.
    pub fn clear(&mut self, world: &mut PhysicsWorld, scene: &mut SceneBuffer) {
        let keys: Vec<TileKey> = self.tiles.keys().copied().collect();
        for key in keys {
            self.remove_tile(key, world, scene);
        }
        let roads: Vec<RoadIndex> = self.roads.keys().copied().collect();
        for index in roads {
            self.remove_road(index, world, scene);
        }
        let boosts: Vec<BoostId> = self.boosts.keys().copied().collect();
        for id in boosts {
            self.remove_boost(id, scene);
        }
    }

    fn remove_boost(&mut self, id: BoostId, scene: &mut SceneBuffer) -> bool {
        match self.boosts.remove(&id) {
            Some(boost) => {
                scene.despawn(boost.visual);
                true
            }
            None => false,
        }
    }

    fn spawn_boost(
        &mut self,
        position: Vector3<f32>,
        owner: BoostOwner,
        scene: &mut SceneBuffer,
    ) -> BoostId {
        let mut id = BoostId(self.rng.r#gen());
        while self.boosts.contains_key(&id) {
            id = BoostId(self.rng.r#gen());
        }
        let visual = scene.spawn(VisualKind::Boost, at(position));
        self.boosts.insert(
            id,
            Boost {
                id,
                position,
                visual,
                owner,
            },
        );
        id
    }

    fn create_tile(
        &mut self,
        key: TileKey,
        cfg: &GameConfig,
        world: &mut PhysicsWorld,
        scene: &mut SceneBuffer,
    ) {
        let center = tile_center(key, cfg.tile_size);

        let ground = WorldObject {
            visual: scene.spawn(VisualKind::Ground { size: cfg.tile_size }, at(center)),
            body: Some(world.add_static(&populate::ground_def(center, cfg.tile_size))),
        };

        let mut objects = Vec::new();
        let mut boosts = Vec::new();
        for placement in populate::plan_tile(&mut self.rng, center, cfg.tile_size) {
            match placement {
                Placement::Tree { base } => objects.push(WorldObject {
                    visual: scene.spawn(VisualKind::Tree, at(base)),
                    body: Some(world.add_static(&populate::tree_def(base))),
                }),
                Placement::Ramp { center, yaw } => {
                    let def = populate::ramp_def(center, yaw);
                    objects.push(WorldObject {
                        visual: scene.spawn(
                            VisualKind::Ramp {
                                half_extents: Vector3::from(RAMP_HALF_EXTENTS),
                            },
                            def.pose(),
                        ),
                        body: Some(world.add_static(&def)),
                    });
                }
                Placement::Boost { position } => {
                    boosts.push(self.spawn_boost(position, BoostOwner::Tile(key), scene));
                }
                Placement::Cloud { position, puffs } => objects.push(WorldObject {
                    visual: scene.spawn(VisualKind::Cloud { puffs }, at(position)),
                    body: None,
                }),
            }
        }

        self.tiles.insert(
            key,
            Tile {
                center,
                ground,
                objects,
                boosts,
            },
        );
    }

    fn create_road(
        &mut self,
        index: RoadIndex,
        cfg: &GameConfig,
        world: &mut PhysicsWorld,
        scene: &mut SceneBuffer,
    ) {
        let center = road_center(index, cfg.road_length);
        let surface = WorldObject {
            visual: scene.spawn(
                VisualKind::Road {
                    length: cfg.road_length,
                    width: ROAD_WIDTH,
                },
                at(center + Vector3::new(0.0, ROAD_VISUAL_HEIGHT, 0.0)),
            ),
            body: Some(world.add_static(&populate::road_def(index, cfg.road_length))),
        };

        let boosts = populate::plan_road_boosts(&mut self.rng, index, cfg.road_length)
            .into_iter()
            .map(|p| self.spawn_boost(p, BoostOwner::Road(index), scene))
            .collect();

        self.roads.insert(
            index,
            RoadSegment {
                center,
                surface,
                boosts,
            },
        );
    }
}
