//! Spatial hash grid for food collision lookups
//!
//! Divides the world into square buckets and stores entity indices per bucket.
//! A query walks every bucket touched by the query square, so it stays correct
//! for cells much larger than a bucket.

use hashbrown::HashMap;

use crate::util::vec2::Vec2;

/// Default bucket size in world units
pub const FOOD_GRID_CELL_SIZE: f32 = 64.0;

/// Initial capacity for grid buckets (number of expected non-empty buckets)
const GRID_INITIAL_CAPACITY: usize = 1024;

/// Initial capacity for index vectors within buckets
const BUCKET_INITIAL_CAPACITY: usize = 4;

/// Grid bucket key - (x, y) bucket coordinates
pub type CellKey = (i32, i32);

/// Spatial hash of entity indices
pub struct SpatialGrid {
    cell_size: f32,
    inv_cell_size: f32,
    cells: HashMap<CellKey, Vec<usize>>,
    len: usize,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(GRID_INITIAL_CAPACITY),
            len: 0,
        }
    }

    /// Clear all entries, keeping bucket allocations for reuse
    #[inline]
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.len = 0;
    }

    #[inline]
    fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    #[inline]
    pub fn insert(&mut self, index: usize, position: Vec2) {
        let key = self.position_to_cell(position);
        self.cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(BUCKET_INITIAL_CAPACITY))
            .push(index);
        self.len += 1;
    }

    /// Indices stored in every bucket overlapping the square `center ± reach`.
    ///
    /// Candidates only: callers still run the exact overlap test.
    pub fn query(&self, center: Vec2, reach: f32) -> impl Iterator<Item = usize> + '_ {
        let (x0, y0) = self.position_to_cell(Vec2::new(center.x - reach, center.y - reach));
        let (x1, y1) = self.position_to_cell(Vec2::new(center.x + reach, center.y + reach));

        (x0..=x1)
            .flat_map(move |cx| (y0..=y1).map(move |cy| (cx, cy)))
            .filter_map(move |key| self.cells.get(&key))
            .flat_map(|bucket| bucket.iter().copied())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(FOOD_GRID_CELL_SIZE)
    }
}
