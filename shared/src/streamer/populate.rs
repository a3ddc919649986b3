//! Random placement of tile and road contents, and the static bodies backing them.

use rand::Rng;
use rapier3d::na::{UnitQuaternion, Vector3};

use crate::cell::{RoadIndex, road_center, road_start_x};
use crate::constants::{
    BOOST_HEIGHT, BOOSTS_PER_ROAD_SEGMENT, BOOSTS_PER_TILE, CLOUD_HEIGHT_SPREAD, CLOUD_MIN_HEIGHT,
    CLOUD_PUFF_LIFT, CLOUD_PUFF_RADIUS, CLOUD_PUFF_SCATTER, CLOUD_PUFFS, CLOUDS_PER_TILE,
    GROUND_THICKNESS, RAMP_HALF_EXTENTS, RAMP_HEIGHT, RAMP_PITCH, RAMPS_PER_TILE,
    ROAD_BOOST_HALF_SPREAD, ROAD_EXCLUSION_HALF_WIDTH, ROAD_HALF_THICKNESS, ROAD_WIDTH,
    TREE_TRUNK_HEIGHT, TREE_TRUNK_RADIUS, TREES_PER_TILE,
};
use crate::rapier::{ColliderShapeDef, StaticBodyDef};
use crate::render::CloudPuff;

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Placement {
    /// Trunk base on the ground.
    Tree { base: Vector3<f32> },
    Ramp { center: Vector3<f32>, yaw: f32 },
    Boost { position: Vector3<f32> },
    Cloud {
        position: Vector3<f32>,
        puffs: Vec<CloudPuff>,
    },
}

/// Placements inside the road strip are dropped, not retried.
#[inline]
pub(super) fn on_road(z: f32) -> bool {
    z.abs() < ROAD_EXCLUSION_HALF_WIDTH
}

fn point_in_tile<R: Rng>(rng: &mut R, center: &Vector3<f32>, tile_size: f32) -> (f32, f32) {
    let half = tile_size * 0.5;
    (
        center.x + rng.gen_range(-half..half),
        center.z + rng.gen_range(-half..half),
    )
}

/// Everything a new tile holds besides its ground slab.
pub(super) fn plan_tile<R: Rng>(
    rng: &mut R,
    center: Vector3<f32>,
    tile_size: f32,
) -> Vec<Placement> {
    let mut out = Vec::with_capacity(
        TREES_PER_TILE + RAMPS_PER_TILE + BOOSTS_PER_TILE + CLOUDS_PER_TILE,
    );

    for _ in 0..TREES_PER_TILE {
        let (x, z) = point_in_tile(rng, &center, tile_size);
        if on_road(z) {
            continue;
        }
        out.push(Placement::Tree {
            base: Vector3::new(x, 0.0, z),
        });
    }

    for _ in 0..RAMPS_PER_TILE {
        let (x, z) = point_in_tile(rng, &center, tile_size);
        let yaw = rng.gen_range(0.0..std::f32::consts::TAU);
        if on_road(z) {
            continue;
        }
        out.push(Placement::Ramp {
            center: Vector3::new(x, RAMP_HEIGHT, z),
            yaw,
        });
    }

    for _ in 0..BOOSTS_PER_TILE {
        let (x, z) = point_in_tile(rng, &center, tile_size);
        if on_road(z) {
            continue;
        }
        out.push(Placement::Boost {
            position: Vector3::new(x, BOOST_HEIGHT, z),
        });
    }

    for _ in 0..CLOUDS_PER_TILE {
        let (x, z) = point_in_tile(rng, &center, tile_size);
        let y = CLOUD_MIN_HEIGHT + rng.gen_range(0.0..CLOUD_HEIGHT_SPREAD);
        out.push(Placement::Cloud {
            position: Vector3::new(x, y, z),
            puffs: plan_cloud_puffs(rng),
        });
    }

    out
}

fn plan_cloud_puffs<R: Rng>(rng: &mut R) -> Vec<CloudPuff> {
    let count = rng.gen_range(CLOUD_PUFFS.0..=CLOUD_PUFFS.1);
    (0..count)
        .map(|_| CloudPuff {
            offset: Vector3::new(
                rng.gen_range(-CLOUD_PUFF_SCATTER..CLOUD_PUFF_SCATTER),
                rng.gen_range(0.0..CLOUD_PUFF_LIFT),
                rng.gen_range(-CLOUD_PUFF_SCATTER..CLOUD_PUFF_SCATTER),
            ),
            radius: rng.gen_range(CLOUD_PUFF_RADIUS.0..CLOUD_PUFF_RADIUS.1),
        })
        .collect()
}

/// Boost positions dropped along a road segment, near the centre line.
pub(super) fn plan_road_boosts<R: Rng>(
    rng: &mut R,
    index: RoadIndex,
    road_length: f32,
) -> Vec<Vector3<f32>> {
    let start = road_start_x(index, road_length);
    (0..BOOSTS_PER_ROAD_SEGMENT)
        .map(|_| {
            Vector3::new(
                start + rng.gen_range(0.0..road_length),
                BOOST_HEIGHT,
                rng.gen_range(-ROAD_BOOST_HALF_SPREAD..ROAD_BOOST_HALF_SPREAD),
            )
        })
        .collect()
}

/// Grass slab whose top face is flush with y = 0.
pub(super) fn ground_def(center: Vector3<f32>, tile_size: f32) -> StaticBodyDef {
    let half = GROUND_THICKNESS * 0.5;
    StaticBodyDef::new(
        Vector3::new(center.x, -half, center.z),
        UnitQuaternion::identity(),
        ColliderShapeDef::Cuboid {
            half_extents: Vector3::new(tile_size * 0.5, half, tile_size * 0.5),
        },
    )
}

pub(super) fn road_def(index: RoadIndex, road_length: f32) -> StaticBodyDef {
    StaticBodyDef::new(
        road_center(index, road_length),
        UnitQuaternion::identity(),
        ColliderShapeDef::Cuboid {
            half_extents: Vector3::new(road_length * 0.5, ROAD_HALF_THICKNESS, ROAD_WIDTH * 0.5),
        },
    )
}

pub(super) fn tree_def(base: Vector3<f32>) -> StaticBodyDef {
    let half_height = TREE_TRUNK_HEIGHT * 0.5;
    StaticBodyDef::new(
        base + Vector3::new(0.0, half_height, 0.0),
        UnitQuaternion::identity(),
        ColliderShapeDef::CylinderY {
            radius: TREE_TRUNK_RADIUS,
            half_height,
        },
    )
}

/// Tilt about the ramp's own X axis after turning it to `yaw`.
pub(super) fn ramp_rotation(yaw: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), RAMP_PITCH)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
}

pub(super) fn ramp_def(center: Vector3<f32>, yaw: f32) -> StaticBodyDef {
    StaticBodyDef::new(
        center,
        ramp_rotation(yaw),
        ColliderShapeDef::Cuboid {
            half_extents: Vector3::from(RAMP_HALF_EXTENTS),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::tile_center;
    use crate::cell::TileKey;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn tile_contents_stay_off_the_road_and_inside_the_tile() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        // Straddles the road: half of the placements should be rejected or land off-road.
        let center = tile_center(TileKey::new(0, -1), 500.0) + Vector3::new(0.0, 0.0, 250.0);
        for _ in 0..20 {
            for p in plan_tile(&mut rng, center, 500.0) {
                match p {
                    Placement::Tree { base } => assert!(!on_road(base.z)),
                    Placement::Ramp { center: c, .. } => {
                        assert!(!on_road(c.z));
                        assert_eq!(c.y, RAMP_HEIGHT);
                    }
                    Placement::Boost { position } => {
                        assert!(!on_road(position.z));
                        assert!((position.x - center.x).abs() <= 250.0);
                    }
                    Placement::Cloud { position, puffs } => {
                        assert!(position.y >= 100.0 && position.y < 150.0);
                        assert!((5..=9).contains(&puffs.len()));
                        assert!(puffs.iter().all(|p| p.radius >= 5.0 && p.radius < 10.0));
                    }
                }
            }
        }
    }

    #[test]
    fn far_tile_keeps_every_placement() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let plan = plan_tile(&mut rng, tile_center(TileKey::new(0, 3), 500.0), 500.0);
        assert_eq!(
            plan.len(),
            TREES_PER_TILE + RAMPS_PER_TILE + BOOSTS_PER_TILE + CLOUDS_PER_TILE
        );
    }

    #[test]
    fn road_boosts_land_on_their_segment() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for index in [-3, 0, 4] {
            for b in plan_road_boosts(&mut rng, index, 1000.0) {
                assert_eq!(crate::cell::road_index(b.x, 1000.0), index);
                assert!(b.z.abs() < ROAD_BOOST_HALF_SPREAD);
            }
        }
    }

    #[test]
    fn bodies_sit_where_their_visuals_are() {
        let tree = tree_def(Vector3::new(5.0, 0.0, 30.0));
        assert_eq!(tree.translation.y, TREE_TRUNK_HEIGHT * 0.5);

        let road = road_def(2, 1000.0);
        assert_eq!(road.translation.x, 2500.0);

        let ground = ground_def(Vector3::new(250.0, 0.0, 250.0), 500.0);
        assert_eq!(ground.translation.y, -GROUND_THICKNESS * 0.5);

        // Pitched ramp: its local +Y leans toward -Z before the yaw is applied.
        let up = ramp_rotation(0.0) * Vector3::y();
        assert!(up.y < 1.0 && up.y > 0.98);
    }
}
