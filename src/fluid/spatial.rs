//! Uniform grid for neighbor search.
//!
//! Particles are bucketed by integer cell coordinate into a hash map keyed by
//! the packed cell. The grid only stores indices into the particle store and is
//! rebuilt from scratch every substep, so it can never hold stale entries.

use std::collections::HashMap;

use bevy::math::{DVec2, IVec2};

use super::error::ConfigurationError;

/// Pack a cell coordinate into a single hash key.
#[inline]
pub fn pack_cell(cell: IVec2) -> u64 {
    ((cell.x as u32 as u64) << 32) | (cell.y as u32 as u64)
}

/// Inverse of [`pack_cell`].
#[inline]
pub fn unpack_cell(key: u64) -> IVec2 {
    IVec2::new((key >> 32) as u32 as i32, key as u32 as i32)
}

/// Hash grid mapping cells to particle indices.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    buckets: HashMap<u64, Vec<usize>>,
    len: usize,
}

impl SpatialGrid {
    /// Create an empty grid. The cell size should approximate the smoothing radius.
    pub fn new(cell_size: f64) -> Result<Self, ConfigurationError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ConfigurationError::CellSize(cell_size));
        }
        Ok(Self {
            cell_size,
            buckets: HashMap::new(),
            len: 0,
        })
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of indices inserted since the last clear.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cell containing a position.
    pub fn cell_of(&self, position: DVec2) -> IVec2 {
        IVec2::new(
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    /// Empty all buckets.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    /// Append a particle index to the bucket of its cell.
    pub fn insert(&mut self, index: usize, position: DVec2) {
        let key = pack_cell(self.cell_of(position));
        self.buckets.entry(key).or_default().push(index);
        self.len += 1;
    }

    /// Clear and insert every position, using its enumeration index.
    pub fn rebuild(&mut self, positions: impl IntoIterator<Item = DVec2>) {
        self.clear();
        for (i, pos) in positions.into_iter().enumerate() {
            self.insert(i, pos);
        }
    }

    /// Indices in a single cell, in insertion order.
    pub fn bucket(&self, cell: IVec2) -> &[usize] {
        self.buckets
            .get(&pack_cell(cell))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Broad-phase candidates around `position`.
    ///
    /// Scans the `(2k+1)²` cells around the position's cell with
    /// `k = ceil(radius / cell_size)`, x offset outer and y offset inner, and
    /// returns every index found. Candidates may lie farther than `radius`;
    /// nothing within `radius` is missed.
    pub fn neighbors(&self, position: DVec2, radius: f64) -> Vec<usize> {
        let mut out = Vec::with_capacity(32);
        self.neighbors_into(position, radius, &mut out);
        out
    }

    /// Same as [`SpatialGrid::neighbors`], reusing `out` (cleared first).
    pub fn neighbors_into(&self, position: DVec2, radius: f64, out: &mut Vec<usize>) {
        out.clear();
        let reach = (radius / self.cell_size).ceil().max(0.0) as i32;
        let center = self.cell_of(position);

        for dx in -reach..=reach {
            for dy in -reach..=reach {
                let key = pack_cell(center.wrapping_add(IVec2::new(dx, dy)));
                if let Some(bucket) = self.buckets.get(&key) {
                    out.extend_from_slice(bucket);
                }
            }
        }
    }

    /// Candidates filtered to true distance `<= radius`, paired with the distance.
    pub fn neighbors_within(
        &self,
        position: DVec2,
        positions: &[DVec2],
        radius: f64,
    ) -> Vec<(usize, f64)> {
        let radius_sq = radius * radius;
        self.neighbors(position, radius)
            .into_iter()
            .filter_map(|j| {
                let dist_sq = positions[j].distance_squared(position);
                (dist_sq <= radius_sq).then(|| (j, dist_sq.sqrt()))
            })
            .collect()
    }

    /// Occupied cells with their indices, sorted by cell for a stable visit order.
    pub fn occupied_cells(&self) -> Vec<(IVec2, &[usize])> {
        let mut keys: Vec<u64> = self
            .buckets
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(&key, _)| key)
            .collect();
        keys.sort_unstable_by_key(|&key| {
            let cell = unpack_cell(key);
            (cell.x, cell.y)
        });

        keys.into_iter()
            .map(|key| (unpack_cell(key), self.buckets[&key].as_slice()))
            .collect()
    }
}
