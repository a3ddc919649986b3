//! Tile and road-segment grid helpers.
//!
//! This module centralizes the streaming grid so the keying scheme is easy to reason
//! about and to test.
//!
//! # Model
//! - The world is an unbounded square grid of tiles in the XZ plane, `tile_size` meters on
//!   a side. A tile is keyed by `(floor(x / tile_size), floor(z / tile_size))`.
//! - Roads run along +X, centred on `z = 0`. A road segment is keyed by
//!   `floor(x / road_length)` and covers `[index * road_length, (index + 1) * road_length)`,
//!   so consecutive indices tile the axis with no gap or overlap.
//! - World units are meters.

use nalgebra::Vector3;

/// Integer coordinates of a tile in the XZ grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub x: i32,
    pub z: i32,
}

impl TileKey {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Index of a road segment along the travel axis.
pub type RoadIndex = i32;

/// Tile containing world position `(x, z)`.
#[inline]
pub fn tile_key(x: f32, z: f32, tile_size: f32) -> TileKey {
    TileKey::new(
        (x / tile_size).floor() as i32,
        (z / tile_size).floor() as i32,
    )
}

/// Centre of a tile footprint at ground level.
#[inline]
pub fn tile_center(key: TileKey, tile_size: f32) -> Vector3<f32> {
    Vector3::new(
        (key.x as f32 + 0.5) * tile_size,
        0.0,
        (key.z as f32 + 0.5) * tile_size,
    )
}

/// Road segment containing world position `x`.
#[inline]
pub fn road_index(x: f32, road_length: f32) -> RoadIndex {
    (x / road_length).floor() as RoadIndex
}

/// X coordinate where a road segment starts.
#[inline]
pub fn road_start_x(index: RoadIndex, road_length: f32) -> f32 {
    index as f32 * road_length
}

/// Centre of a road segment at ground level.
#[inline]
pub fn road_center(index: RoadIndex, road_length: f32) -> Vector3<f32> {
    Vector3::new(road_start_x(index, road_length) + road_length * 0.5, 0.0, 0.0)
}

/// Every tile key in the `(2 * range + 1)^2` square centred on `center`, row-major in X.
pub fn tiles_in_range(center: TileKey, range: i32) -> impl Iterator<Item = TileKey> {
    (-range..=range).flat_map(move |dx| {
        (-range..=range).map(move |dz| TileKey::new(center.x + dx, center.z + dz))
    })
}

/// Every road index within `range` segments of `center`.
pub fn roads_in_range(center: RoadIndex, range: i32) -> impl Iterator<Item = RoadIndex> {
    (center - range)..=(center + range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tile_key_floors_negative_coordinates() {
        assert_eq!(tile_key(0.0, 0.0, 500.0), TileKey::new(0, 0));
        assert_eq!(tile_key(499.9, 0.0, 500.0), TileKey::new(0, 0));
        assert_eq!(tile_key(500.0, 0.0, 500.0), TileKey::new(1, 0));
        assert_eq!(tile_key(-0.1, -0.1, 500.0), TileKey::new(-1, -1));
        assert_eq!(tile_key(-500.0, 1200.0, 500.0), TileKey::new(-1, 2));
    }

    #[test]
    fn tile_center_lies_inside_its_own_tile() {
        for key in tiles_in_range(TileKey::new(3, -7), 2) {
            let c = tile_center(key, 500.0);
            assert_eq!(tile_key(c.x, c.z, 500.0), key);
        }
    }

    #[test]
    fn tiles_in_range_is_a_full_square_without_duplicates() {
        let keys: Vec<_> = tiles_in_range(TileKey::new(0, 0), 2).collect();
        assert_eq!(keys.len(), 25);
        let unique: HashSet<_> = keys.iter().copied().collect();
        assert_eq!(unique.len(), 25);
        assert!(unique.contains(&TileKey::new(-2, 2)));
        assert!(unique.contains(&TileKey::new(2, -2)));
    }

    #[test]
    fn road_segments_tile_contiguously() {
        let len = 1000.0;
        for i in -5..5 {
            let end_of_this = road_start_x(i, len) + len;
            assert_eq!(end_of_this, road_start_x(i + 1, len));
            assert_eq!(road_index(road_start_x(i, len), len), i);
            assert_eq!(road_index(road_center(i, len).x, len), i);
        }
        assert_eq!(road_index(-0.5, len), -1);
    }

    #[test]
    fn roads_in_range_spans_both_sides() {
        let idx: Vec<_> = roads_in_range(0, 5).collect();
        assert_eq!(idx.len(), 11);
        assert_eq!(idx.first(), Some(&-5));
        assert_eq!(idx.last(), Some(&5));
    }
}
