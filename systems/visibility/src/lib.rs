#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Line-of-sight field of view over the known wall grid.

use std::collections::{BTreeSet, HashMap};

use gemrunner_core::{Cell, WallGrid};

/// Cells visible from `origin` within a Euclidean `radius`.
///
/// A cell is visible when no cell strictly between it and the origin on the
/// integer Bresenham line blocks sight. Cells outside the grid are never
/// reported and always block. Visibility is not symmetric: `b` being visible
/// from `a` says nothing about `a` being visible from `b`.
#[must_use]
pub fn compute_fov(grid: &WallGrid, origin: Cell, radius: u32) -> BTreeSet<Cell> {
    let dimensions = grid.dimensions();
    let mut visible = BTreeSet::new();
    if !dimensions.contains(origin) {
        return visible;
    }

    let reach = i32::try_from(radius).unwrap_or(i32::MAX);
    let limit = i64::from(reach) * i64::from(reach);
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            if i64::from(dx) * i64::from(dx) + i64::from(dy) * i64::from(dy) > limit {
                continue;
            }
            let target = origin.offset(dx, dy);
            if dimensions.contains(target) && !line_blocked(grid, origin, target) {
                let _ = visible.insert(target);
            }
        }
    }
    visible
}

/// Walks the Bresenham line from `origin` to `target` and reports whether a
/// cell strictly between them blocks sight.
fn line_blocked(grid: &WallGrid, origin: Cell, target: Cell) -> bool {
    let dx = (target.x() - origin.x()).abs();
    let dy = (target.y() - origin.y()).abs();
    let sx = if origin.x() < target.x() { 1 } else { -1 };
    let sy = if origin.y() < target.y() { 1 } else { -1 };
    let (mut x, mut y) = (origin.x(), origin.y());

    if dx > dy {
        let mut error = dx;
        while x != target.x() {
            error -= 2 * dy;
            if error < 0 {
                y += sy;
                error += 2 * dx;
            }
            x += sx;
            let step = Cell::new(x, y);
            if step != target && grid.blocks_sight(step) {
                return true;
            }
        }
    } else {
        let mut error = dy;
        while y != target.y() {
            error -= 2 * dx;
            if error < 0 {
                x += sx;
                error += 2 * dy;
            }
            y += sy;
            let step = Cell::new(x, y);
            if step != target && grid.blocks_sight(step) {
                return true;
            }
        }
    }
    false
}

/// Memoised field-of-view sets keyed by origin and radius.
///
/// The memo is dropped whenever it is queried with a wall grid of a
/// different revision.
#[derive(Clone, Debug, Default)]
pub struct VisibilityIndex {
    revision: Option<u64>,
    memo: HashMap<(Cell, u32), BTreeSet<Cell>>,
}

impl VisibilityIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells visible from `origin`, computed on first use.
    pub fn visible_from(&mut self, grid: &WallGrid, origin: Cell, radius: u32) -> &BTreeSet<Cell> {
        self.sync(grid);
        self.memo
            .entry((origin, radius))
            .or_insert_with(|| compute_fov(grid, origin, radius))
    }

    /// Replaces the memoised set for `origin` with cells the game reported
    /// as visible from there.
    pub fn record_observed(
        &mut self,
        grid: &WallGrid,
        origin: Cell,
        radius: u32,
        cells: impl IntoIterator<Item = Cell>,
    ) {
        self.sync(grid);
        let _ = self.memo.insert((origin, radius), cells.into_iter().collect());
    }

    /// Number of memoised origins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    /// Reports whether nothing is memoised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    fn sync(&mut self, grid: &WallGrid) {
        if self.revision != Some(grid.revision()) {
            if !self.memo.is_empty() {
                tracing::debug!(
                    revision = grid.revision(),
                    dropped = self.memo.len(),
                    "visibility memo invalidated"
                );
            }
            self.memo.clear();
            self.revision = Some(grid.revision());
        }
    }
}
