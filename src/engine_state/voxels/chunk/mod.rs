//! # Chunks
//!
//! A chunk is a `width × depth` column of world space generated and meshed as one
//! unit. This module holds the grid coordinate type, the per-coordinate streaming
//! record, and the ring order in which coordinates around a center are visited.

pub mod generator;

use serde::{Deserialize, Serialize};

use crate::engine_state::scene::EntityId;

/// Integer position of a chunk on the `(width, depth)` grid.
///
/// Serialized as a two element array `[x, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct ChunkCoordinate {
    /// Grid column along world x.
    pub x: i32,
    /// Grid row along world z.
    pub z: i32,
}

impl ChunkCoordinate {
    /// Creates a coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing a world position, rounding to the nearest grid cell.
    ///
    /// # Arguments
    /// * `x`, `z` - World position
    /// * `width`, `depth` - Chunk size along x and z
    pub fn containing(x: f32, z: f32, width: u32, depth: u32) -> Self {
        Self {
            x: (x / width as f32 + 0.5).floor() as i32,
            z: (z / depth as f32 + 0.5).floor() as i32,
        }
    }

    /// Whether this coordinate lies strictly inside the square window of `radius`
    /// around `center`, i.e. `|dx| < radius` and `|dz| < radius`.
    pub fn within(&self, center: ChunkCoordinate, radius: u32) -> bool {
        let radius = radius as i64;
        (self.x as i64 - center.x as i64).abs() < radius
            && (self.z as i64 - center.z as i64).abs() < radius
    }
}

impl From<[i32; 2]> for ChunkCoordinate {
    fn from([x, z]: [i32; 2]) -> Self {
        Self { x, z }
    }
}

impl From<ChunkCoordinate> for [i32; 2] {
    fn from(coordinate: ChunkCoordinate) -> Self {
        [coordinate.x, coordinate.z]
    }
}

impl std::fmt::Display for ChunkCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Streaming state of one chunk coordinate.
///
/// A coordinate without a record is absent. At most one record exists per
/// coordinate, so no second request is issued while one is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRecord {
    /// A generation request is in flight; `requested_at` is the tick it was sent on.
    Requested {
        /// Tick of the latest dispatch.
        requested_at: u64,
    },
    /// The chunk lives in the scene as this entity.
    Materialized(EntityId),
}

/// Coordinates of ring `ring` around `center`, in streaming order.
///
/// Ring 0 is the center alone. Ring `i` is the border of the `(2i + 1)²` square:
/// the top and bottom rows without corners (interleaved per column), then the left
/// and right columns without corners (interleaved per row), then the four corners.
/// Cells beyond the `i32` grid are left out.
pub fn ring_coordinates(center: ChunkCoordinate, ring: u32) -> Vec<ChunkCoordinate> {
    if ring == 0 {
        return vec![center];
    }

    let i = i64::from(ring);
    let (cx, cz) = (i64::from(center.x), i64::from(center.z));
    let mut cells = Vec::with_capacity(8 * ring as usize);

    for x in cx - i + 1..cx + i {
        cells.push((x, cz - i));
        cells.push((x, cz + i));
    }
    for z in cz - i + 1..cz + i {
        cells.push((cx - i, z));
        cells.push((cx + i, z));
    }
    cells.extend([
        (cx - i, cz - i),
        (cx + i, cz - i),
        (cx - i, cz + i),
        (cx + i, cz + i),
    ]);

    cells
        .into_iter()
        .filter_map(|(x, z)| {
            Some(ChunkCoordinate::new(
                i32::try_from(x).ok()?,
                i32::try_from(z).ok()?,
            ))
        })
        .collect()
}

/// Every coordinate of rings `0..radius`, i.e. the whole streaming window.
pub fn window_coordinates(center: ChunkCoordinate, radius: u32) -> Vec<ChunkCoordinate> {
    (0..radius).flat_map(|ring| ring_coordinates(center, ring)).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn containing_rounds_to_nearest_cell() {
        assert_eq!(ChunkCoordinate::containing(0.0, 0.0, 32, 32), ChunkCoordinate::new(0, 0));
        assert_eq!(ChunkCoordinate::containing(15.9, -15.9, 32, 32), ChunkCoordinate::new(0, 0));
        assert_eq!(ChunkCoordinate::containing(16.0, -16.1, 32, 32), ChunkCoordinate::new(1, -1));
        assert_eq!(ChunkCoordinate::containing(-48.0, 100.0, 32, 16), ChunkCoordinate::new(-1, 6));
    }

    #[test]
    fn window_is_an_open_square() {
        let center = ChunkCoordinate::new(3, -2);
        assert!(ChunkCoordinate::new(4, -1).within(center, 2));
        assert!(!ChunkCoordinate::new(5, -2).within(center, 2));
        assert!(!ChunkCoordinate::new(3, -4).within(center, 2));
        assert!(!center.within(center, 0));
    }

    #[test]
    fn ring_order_matches_streaming_walk() {
        let ring = ring_coordinates(ChunkCoordinate::new(0, 0), 1);
        let expected: Vec<ChunkCoordinate> = [
            [0, -1], [0, 1], [-1, 0], [1, 0],
            [-1, -1], [1, -1], [-1, 1], [1, 1],
        ]
        .into_iter()
        .map(ChunkCoordinate::from)
        .collect();
        assert_eq!(ring, expected);
    }

    #[test]
    fn rings_tile_the_window_without_overlap() {
        let center = ChunkCoordinate::new(-5, 7);
        for radius in 1..6u32 {
            let coordinates = window_coordinates(center, radius);
            let unique: HashSet<_> = coordinates.iter().copied().collect();
            let side = 2 * radius as usize - 1;
            assert_eq!(coordinates.len(), side * side);
            assert_eq!(unique.len(), coordinates.len());
            assert!(coordinates.iter().all(|c| c.within(center, radius)));
        }
    }

    #[test]
    fn window_at_the_grid_edge_stays_on_the_grid() {
        let far = ChunkCoordinate::containing(f32::MAX, f32::MIN, 32, 32);
        assert_eq!(far, ChunkCoordinate::new(i32::MAX, i32::MIN));

        let coordinates = window_coordinates(far, 3);
        assert_eq!(coordinates.len(), 9);
        assert!(coordinates.iter().all(|c| c.within(far, 3)));
        assert!(coordinates.contains(&ChunkCoordinate::new(i32::MAX - 2, i32::MIN + 2)));
    }

    #[test]
    fn serializes_as_pair() {
        let json = serde_json::to_string(&ChunkCoordinate::new(-3, 8)).unwrap();
        assert_eq!(json, "[-3,8]");
        let back: ChunkCoordinate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ChunkCoordinate::new(-3, 8));
    }
}
