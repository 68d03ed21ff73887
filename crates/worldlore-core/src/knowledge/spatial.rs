//! Uniform spatial hash over world positions.
//!
//! Cells are keyed by `floor(position / cell_size)` per axis. Buckets are dropped as soon as they
//! empty so the map only ever holds occupied cells.

use super::handle::KnowledgeHandle;
use crate::config::MIN_CELL_SIZE;
use crate::shared::Vec3;
use std::collections::HashMap;

pub type CellCoord = (i32, i32, i32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub handle: KnowledgeHandle,
    pub location: Vec3,
}

#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: HashMap<CellCoord, Vec<SpatialEntry>>,
    len: usize,
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size >= MIN_CELL_SIZE {
            cell_size
        } else {
            MIN_CELL_SIZE
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_of(&self, location: Vec3) -> CellCoord {
        (
            axis_cell(location.x, self.cell_size),
            axis_cell(location.y, self.cell_size),
            axis_cell(location.z, self.cell_size),
        )
    }

    pub fn insert(&mut self, handle: KnowledgeHandle, location: Vec3) {
        let cell = self.cell_of(location);
        self.cells
            .entry(cell)
            .or_default()
            .push(SpatialEntry { handle, location });
        self.len += 1;
    }

    /// Removes `handle` from the cell containing `location`. Returns false if it was not there.
    pub fn remove(&mut self, handle: KnowledgeHandle, location: Vec3) -> bool {
        let cell = self.cell_of(location);
        let Some(bucket) = self.cells.get_mut(&cell) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|e| e.handle == handle) else {
            return false;
        };
        bucket.swap_remove(pos);
        if bucket.is_empty() {
            self.cells.remove(&cell);
        }
        self.len -= 1;
        true
    }

    /// Relocates an entry. Same cell: position updated in place. Otherwise remove then insert.
    pub fn move_entry(&mut self, handle: KnowledgeHandle, old: Vec3, new: Vec3) {
        let old_cell = self.cell_of(old);
        if old_cell == self.cell_of(new) {
            if let Some(entry) = self
                .cells
                .get_mut(&old_cell)
                .and_then(|bucket| bucket.iter_mut().find(|e| e.handle == handle))
            {
                entry.location = new;
                return;
            }
        }
        self.remove(handle, old);
        self.insert(handle, new);
    }

    /// Handles within `radius` of `center` (inclusive).
    pub fn query_sphere(&self, center: Vec3, radius: f32) -> Vec<KnowledgeHandle> {
        let mut out = Vec::new();
        self.visit_sphere(center, radius, |entry, _| out.push(entry.handle));
        out
    }

    /// Same traversal as [`query_sphere`](Self::query_sphere), keeping each entry's location and
    /// squared distance to `center`.
    pub fn query_sphere_with_distance(
        &self,
        center: Vec3,
        radius: f32,
    ) -> Vec<(SpatialEntry, f32)> {
        let mut out = Vec::new();
        self.visit_sphere(center, radius, |entry, dist_sq| out.push((*entry, dist_sq)));
        out
    }

    /// The stored entry for `handle` in the cell containing `location`.
    pub fn entry_at(&self, handle: KnowledgeHandle, location: Vec3) -> Option<&SpatialEntry> {
        self.cells
            .get(&self.cell_of(location))
            .and_then(|bucket| bucket.iter().find(|e| e.handle == handle))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpatialEntry> {
        self.cells.values().flatten()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }

    fn visit_sphere<F>(&self, center: Vec3, radius: f32, mut visit: F)
    where
        F: FnMut(&SpatialEntry, f32),
    {
        if !(radius >= 0.0) || self.cells.is_empty() {
            return;
        }
        let r_sq = radius * radius;
        let min = self.cell_of(center - Vec3::splat(radius));
        let max = self.cell_of(center + Vec3::splat(radius));

        let span = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1) as u128;
        let range_cells = span(min.0, max.0) * span(min.1, max.1) * span(min.2, max.2);

        let mut check = |bucket: &Vec<SpatialEntry>| {
            for entry in bucket {
                let d = entry.location.distance_squared(center);
                if d <= r_sq {
                    visit(entry, d);
                }
            }
        };

        // Huge radii: walking occupied cells beats walking the grid range.
        if range_cells > self.cells.len() as u128 {
            for (cell, bucket) in &self.cells {
                if in_range(*cell, min, max) {
                    check(bucket);
                }
            }
            return;
        }

        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                for z in min.2..=max.2 {
                    if let Some(bucket) = self.cells.get(&(x, y, z)) {
                        check(bucket);
                    }
                }
            }
        }
    }
}

fn axis_cell(v: f32, cell_size: f32) -> i32 {
    // `as` saturates, so far-out coordinates land in the edge cells instead of wrapping.
    (v / cell_size).floor() as i32
}

fn in_range(cell: CellCoord, min: CellCoord, max: CellCoord) -> bool {
    (min.0..=max.0).contains(&cell.0)
        && (min.1..=max.1).contains(&cell.1)
        && (min.2..=max.2).contains(&cell.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u32) -> KnowledgeHandle {
        KnowledgeHandle::from_raw(n)
    }

    #[test]
    fn negative_coordinates_floor_into_their_own_cell() {
        let index = SpatialIndex::new(1000.0);
        assert_eq!(index.cell_of(Vec3::new(-1.0, 0.0, 999.0)), (-1, 0, 0));
        assert_eq!(index.cell_of(Vec3::new(1000.0, -1000.0, 0.0)), (1, -1, 0));
    }

    #[test]
    fn boundary_is_inclusive() {
        let mut index = SpatialIndex::new(100.0);
        index.insert(h(1), Vec3::new(500.0, 0.0, 0.0));
        index.insert(h(2), Vec3::new(500.1, 0.0, 0.0));
        assert_eq!(index.query_sphere(Vec3::ZERO, 500.0), vec![h(1)]);
    }

    #[test]
    fn remove_drops_empty_buckets() {
        let mut index = SpatialIndex::new(10.0);
        let p = Vec3::new(5.0, 5.0, 5.0);
        index.insert(h(1), p);
        assert_eq!(index.occupied_cells(), 1);
        assert!(index.remove(h(1), p));
        assert!(!index.remove(h(1), p));
        assert_eq!(index.occupied_cells(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn move_within_cell_updates_position_in_place() {
        let mut index = SpatialIndex::new(100.0);
        index.insert(h(1), Vec3::new(10.0, 0.0, 0.0));
        index.move_entry(h(1), Vec3::new(10.0, 0.0, 0.0), Vec3::new(90.0, 0.0, 0.0));
        assert_eq!(index.occupied_cells(), 1);
        let hits = index.query_sphere_with_distance(Vec3::new(90.0, 0.0, 0.0), 0.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.location, Vec3::new(90.0, 0.0, 0.0));
    }

    #[test]
    fn move_across_cells_relocates() {
        let mut index = SpatialIndex::new(100.0);
        index.insert(h(1), Vec3::ZERO);
        index.move_entry(h(1), Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0));
        assert!(index.query_sphere(Vec3::ZERO, 10.0).is_empty());
        assert_eq!(index.query_sphere(Vec3::new(1000.0, 0.0, 0.0), 1.0), vec![h(1)]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn huge_radius_walks_occupied_cells() {
        let mut index = SpatialIndex::new(1.0);
        index.insert(h(1), Vec3::new(1.0e6, 0.0, 0.0));
        index.insert(h(2), Vec3::new(-1.0e6, 0.0, 0.0));
        let mut hits = index.query_sphere(Vec3::ZERO, 2.0e6);
        hits.sort();
        assert_eq!(hits, vec![h(1), h(2)]);
        assert!(index.query_sphere(Vec3::ZERO, -1.0).is_empty());
    }

    #[test]
    fn cell_size_is_clamped() {
        assert_eq!(SpatialIndex::new(0.0).cell_size(), MIN_CELL_SIZE);
        assert_eq!(SpatialIndex::new(f32::NAN).cell_size(), MIN_CELL_SIZE);
    }
}
