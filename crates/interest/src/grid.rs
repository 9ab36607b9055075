use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use vantage_common::Position;

/// A 2D cell coordinate in the interest grid (x and y world axes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared distance between two cells, in cells.
    ///
    /// The 8 neighbours are at 1 (orthogonal) or 2 (diagonal). Saturates at
    /// `u64::MAX` for cells at opposite ends of the coordinate range.
    pub fn distance_sq(self, other: CellCoord) -> u64 {
        let dx = u64::from(self.x.abs_diff(other.x));
        let dy = u64::from(self.y.abs_diff(other.y));
        (dx * dx).saturating_add(dy * dy)
    }

    /// True if `other` is this cell or one of its 8 neighbours
    /// (squared distance at most 2).
    pub fn is_neighbor(self, other: CellCoord) -> bool {
        self.x.abs_diff(other.x) <= 1 && self.y.abs_diff(other.y) <= 1
    }
}

/// Maps world positions onto grid cells.
///
/// Both grid inserts and grid queries must go through the same projector,
/// otherwise membership tests disagree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridProjector {
    resolution: f32,
}

impl GridProjector {
    /// Create a projector with the given cell side length in world units.
    pub fn new(resolution: f32) -> Self {
        assert!(
            resolution.is_finite() && resolution > 0.0,
            "resolution must be positive"
        );
        Self { resolution }
    }

    /// Cell side length in world units.
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Convert a world position to a cell coordinate.
    ///
    /// Divides x and y by the resolution and rounds to the nearest integer,
    /// halfway values going to the even neighbour. Cells beyond the `i32`
    /// range saturate. A NaN coordinate lands on 0; use
    /// [`GridProjector::try_project`] for positions that may be corrupt.
    pub fn project(&self, pos: Position) -> CellCoord {
        CellCoord {
            x: (pos.x / self.resolution).round_ties_even() as i32,
            y: (pos.y / self.resolution).round_ties_even() as i32,
        }
    }

    /// Like [`GridProjector::project`], but `None` when x or y is not finite.
    pub fn try_project(&self, pos: Position) -> Option<CellCoord> {
        (pos.x.is_finite() && pos.y.is_finite()).then(|| self.project(pos))
    }
}

/// Sparse uniform grid of buckets keyed by cell.
///
/// Buckets are never dropped: [`SpatialGrid::clear`] empties them in place so
/// that clearing and refilling the grid every tick reuses the same storage.
#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    cells: HashMap<CellCoord, HashSet<T>>,
}

impl<T> Default for SpatialGrid<T> {
    fn default() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> SpatialGrid<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty every bucket, keeping their allocations.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
    }

    /// Add `value` to the bucket at `cell`, creating the bucket on first use.
    pub fn insert(&mut self, cell: CellCoord, value: T) {
        self.cells.entry(cell).or_default().insert(value);
    }

    /// Union the contents of `cell` and its 8 neighbours into `into`.
    ///
    /// Unknown cells contribute nothing. `into` is not cleared first.
    pub fn query_with_neighbors(&self, cell: CellCoord, into: &mut HashSet<T>) {
        for dx in -1..=1 {
            for dy in -1..=1 {
                let coord = CellCoord::new(cell.x.saturating_add(dx), cell.y.saturating_add(dy));
                if let Some(bucket) = self.cells.get(&coord) {
                    into.extend(bucket.iter().copied());
                }
            }
        }
    }

    /// Contents of a single cell.
    pub fn get(&self, cell: CellCoord) -> Option<&HashSet<T>> {
        self.cells.get(&cell).filter(|bucket| !bucket.is_empty())
    }

    /// Number of cells currently holding at least one value.
    pub fn occupied_cells(&self) -> usize {
        self.cells.values().filter(|b| !b.is_empty()).count()
    }

    /// Number of buckets allocated so far, empty or not.
    pub fn allocated_cells(&self) -> usize {
        self.cells.len()
    }

    /// Total number of placements across all cells.
    pub fn len(&self) -> usize {
        self.cells.values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|b| b.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn project_rounds_to_nearest() {
        let p = GridProjector::new(10.0);
        assert_eq!(p.project(Vec3::new(4.0, 4.9, 0.0)), CellCoord::new(0, 0));
        assert_eq!(p.project(Vec3::new(9.0, 9.0, 0.0)), CellCoord::new(1, 1));
        assert_eq!(p.project(Vec3::new(-6.0, 16.0, 0.0)), CellCoord::new(-1, 2));
    }

    #[test]
    fn project_halfway_goes_to_even() {
        let p = GridProjector::new(10.0);
        assert_eq!(p.project(Vec3::new(5.0, 15.0, 0.0)), CellCoord::new(0, 2));
        assert_eq!(p.project(Vec3::new(25.0, -5.0, 0.0)), CellCoord::new(2, 0));
    }

    #[test]
    fn project_ignores_z() {
        let p = GridProjector::new(10.0);
        assert_eq!(
            p.project(Vec3::new(30.0, 0.0, 0.0)),
            p.project(Vec3::new(30.0, 0.0, 999.0))
        );
    }

    #[test]
    #[should_panic(expected = "resolution must be positive")]
    fn zero_resolution_rejected() {
        GridProjector::new(0.0);
    }

    #[test]
    fn neighbour_distance() {
        let c = CellCoord::new(0, 0);
        assert_eq!(c.distance_sq(CellCoord::new(1, 0)), 1);
        assert_eq!(c.distance_sq(CellCoord::new(-1, 1)), 2);
        assert!(c.is_neighbor(CellCoord::new(1, -1)));
        assert!(!c.is_neighbor(CellCoord::new(2, 0)));
        assert!(!c.is_neighbor(CellCoord::new(2, 2)));
    }

    #[test]
    fn distance_does_not_overflow() {
        let a = CellCoord::new(i32::MIN, i32::MIN);
        let b = CellCoord::new(i32::MAX, i32::MAX);
        assert!(a.distance_sq(b) > 2);
        assert_eq!(a.distance_sq(b), u64::MAX);
        assert!(!a.is_neighbor(b));
        assert!(!b.is_neighbor(a));

        let one_axis = CellCoord::new(i32::MIN, 0);
        assert_eq!(
            one_axis.distance_sq(CellCoord::new(i32::MAX, 0)),
            u64::from(u32::MAX) * u64::from(u32::MAX)
        );
    }

    #[test]
    fn neighbours_at_the_edge_of_the_range() {
        let edge = CellCoord::new(i32::MAX, i32::MIN);
        assert!(edge.is_neighbor(CellCoord::new(i32::MAX - 1, i32::MIN + 1)));
        assert!(!edge.is_neighbor(CellCoord::new(i32::MAX - 2, i32::MIN)));
    }

    #[test]
    fn far_positions_saturate_without_becoming_neighbours() {
        let p = GridProjector::new(10.0);
        let a = p.project(Vec3::new(3e10, 3e10, 0.0));
        let b = p.project(Vec3::new(-3e10, -3e10, 0.0));
        assert_eq!(a, CellCoord::new(i32::MAX, i32::MAX));
        assert_eq!(b, CellCoord::new(i32::MIN, i32::MIN));
        assert!(!a.is_neighbor(b));
    }

    #[test]
    fn try_project_rejects_non_finite() {
        let p = GridProjector::new(10.0);
        assert_eq!(p.try_project(Vec3::new(f32::NAN, 0.0, 0.0)), None);
        assert_eq!(p.try_project(Vec3::new(0.0, f32::INFINITY, 0.0)), None);
        assert_eq!(
            p.try_project(Vec3::new(12.0, -3.0, f32::NAN)),
            Some(CellCoord::new(1, 0))
        );
    }

    #[test]
    fn query_returns_exactly_the_neighbourhood() {
        let mut grid = SpatialGrid::new();
        let mut id = 0u32;
        // one value per cell in a 5x5 block centred on the origin
        for x in -2..=2 {
            for y in -2..=2 {
                grid.insert(CellCoord::new(x, y), id);
                id += 1;
            }
        }

        let mut found = HashSet::new();
        grid.query_with_neighbors(CellCoord::new(0, 0), &mut found);

        let mut expected = HashSet::new();
        let mut id = 0u32;
        for x in -2..=2 {
            for y in -2..=2 {
                if CellCoord::new(x, y).is_neighbor(CellCoord::new(0, 0)) {
                    expected.insert(id);
                }
                id += 1;
            }
        }
        assert_eq!(found.len(), 9);
        assert_eq!(found, expected);
    }

    #[test]
    fn query_unions_into_existing_set() {
        let mut grid = SpatialGrid::new();
        grid.insert(CellCoord::new(0, 0), 1u32);
        grid.insert(CellCoord::new(1, 1), 1u32);

        let mut found = HashSet::from([7u32]);
        grid.query_with_neighbors(CellCoord::new(0, 0), &mut found);
        assert_eq!(found, HashSet::from([1, 7]));
    }

    #[test]
    fn unknown_cell_yields_nothing() {
        let grid: SpatialGrid<u32> = SpatialGrid::new();
        let mut found = HashSet::new();
        grid.query_with_neighbors(CellCoord::new(99, 99), &mut found);
        assert!(found.is_empty());
        assert!(grid.get(CellCoord::new(99, 99)).is_none());
    }

    #[test]
    fn clear_keeps_buckets() {
        let mut grid = SpatialGrid::new();
        grid.insert(CellCoord::new(0, 0), 1u32);
        grid.insert(CellCoord::new(5, 5), 2u32);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.occupied_cells(), 2);

        grid.clear();
        assert!(grid.is_empty());
        assert_eq!(grid.occupied_cells(), 0);
        assert_eq!(grid.allocated_cells(), 2);

        grid.insert(CellCoord::new(0, 0), 3u32);
        assert_eq!(grid.allocated_cells(), 2);
        assert_eq!(grid.get(CellCoord::new(0, 0)), Some(&HashSet::from([3])));
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let mut grid = SpatialGrid::new();
        grid.insert(CellCoord::new(0, 0), 1u32);
        grid.insert(CellCoord::new(0, 0), 1u32);
        assert_eq!(grid.len(), 1);
    }
}
