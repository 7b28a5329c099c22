//! Breadth-first path engine and its memoising cache.

use std::collections::{BTreeSet, HashMap, VecDeque};

use gemrunner_core::{Cell, ForbiddenSet, GridDimensions};

/// Exploration order used when neither axis dominates the remaining delta.
const BASE_ORDER: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const HORIZONTAL_FIRST: [(i32, i32); 4] = BASE_ORDER;
const VERTICAL_FIRST: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// Finds a shortest 4-connected path from `start` to `goal`.
///
/// Cells outside `dimensions` and cells in `forbidden` are never entered,
/// although the cell a search starts from is always expanded. When the
/// forward search fails a single retry searches from `goal` back to `start`
/// and reverses the result, so a forbidden goal can still be reached as long
/// as the start is free. The returned path starts at `start` and ends at
/// `goal`; an empty path means the goal is unreachable.
#[must_use]
pub fn find_path(
    start: Cell,
    goal: Cell,
    forbidden: &ForbiddenSet,
    dimensions: GridDimensions,
) -> Vec<Cell> {
    if !dimensions.contains(start) || !dimensions.contains(goal) {
        return Vec::new();
    }
    if start == goal {
        return vec![start];
    }

    let forward = search(start, goal, forbidden, dimensions);
    if !forward.is_empty() {
        return forward;
    }

    let mut reverse = search(goal, start, forbidden, dimensions);
    reverse.reverse();
    reverse
}

/// Number of moves needed to walk the path, or `None` when it is empty.
#[must_use]
pub fn path_steps(path: &[Cell]) -> Option<u32> {
    let steps = path.len().checked_sub(1)?;
    u32::try_from(steps).ok()
}

/// Cell the agent should step onto next, if the path leaves its origin.
#[must_use]
pub fn first_step(path: &[Cell]) -> Option<Cell> {
    path.get(1).copied()
}

/// Every cell reachable from `start` without entering `forbidden`, `start`
/// included. Like [`find_path`], the start is expanded even when forbidden.
#[must_use]
pub fn flood_fill(
    start: Cell,
    forbidden: &ForbiddenSet,
    dimensions: GridDimensions,
) -> BTreeSet<Cell> {
    let mut reached = BTreeSet::new();
    if !dimensions.contains(start) {
        return reached;
    }
    let _ = reached.insert(start);
    let mut queue = VecDeque::from([start]);
    while let Some(cell) = queue.pop_front() {
        for neighbor in cell.cardinal_neighbors() {
            if dimensions.contains(neighbor)
                && !forbidden.contains(neighbor)
                && reached.insert(neighbor)
            {
                queue.push_back(neighbor);
            }
        }
    }
    reached
}

fn search(
    origin: Cell,
    goal: Cell,
    forbidden: &ForbiddenSet,
    dimensions: GridDimensions,
) -> Vec<Cell> {
    let Some(origin_index) = dimensions.index(origin) else {
        return Vec::new();
    };

    let mut parents: Vec<Option<Cell>> = vec![None; dimensions.cell_count()];
    let mut visited = vec![false; dimensions.cell_count()];
    visited[origin_index] = true;

    let mut queue = VecDeque::new();
    queue.push_back(origin);

    while let Some(cell) = queue.pop_front() {
        if cell == goal {
            return reconstruct(&parents, origin, goal, dimensions);
        }

        for (dx, dy) in exploration_order(cell, goal) {
            let neighbor = cell.offset(dx, dy);
            if forbidden.contains(neighbor) {
                continue;
            }
            let Some(index) = dimensions.index(neighbor) else {
                continue;
            };
            if visited[index] {
                continue;
            }
            visited[index] = true;
            parents[index] = Some(cell);
            queue.push_back(neighbor);
        }
    }

    Vec::new()
}

fn exploration_order(cell: Cell, goal: Cell) -> [(i32, i32); 4] {
    let dx = goal.x().abs_diff(cell.x());
    let dy = goal.y().abs_diff(cell.y());
    if dx > dy {
        HORIZONTAL_FIRST
    } else if dy > dx {
        VERTICAL_FIRST
    } else {
        BASE_ORDER
    }
}

fn reconstruct(
    parents: &[Option<Cell>],
    origin: Cell,
    goal: Cell,
    dimensions: GridDimensions,
) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != origin {
        let Some(parent) = dimensions
            .index(current)
            .and_then(|index| parents.get(index).copied().flatten())
        else {
            return Vec::new();
        };
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PathKey {
    low: Cell,
    high: Cell,
    forbidden: ForbiddenSet,
    dimensions: GridDimensions,
}

/// Memoisation table for [`find_path`] keyed on the unordered endpoint pair.
///
/// Paths are stored oriented from the smaller endpoint to the larger one and
/// reversed on demand, so `A -> B` and `B -> A` share one entry. The table is
/// cleared wholesale once it grows beyond its capacity.
#[derive(Clone, Debug)]
pub struct PathCache {
    entries: HashMap<PathKey, Vec<Cell>>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl PathCache {
    /// Creates an empty cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Memoised equivalent of [`find_path`].
    pub fn find_path(
        &mut self,
        start: Cell,
        goal: Cell,
        forbidden: &ForbiddenSet,
        dimensions: GridDimensions,
    ) -> Vec<Cell> {
        let (low, high) = if start <= goal {
            (start, goal)
        } else {
            (goal, start)
        };
        let key = PathKey {
            low,
            high,
            forbidden: forbidden.clone(),
            dimensions,
        };

        let stored = if let Some(path) = self.entries.get(&key) {
            self.hits = self.hits.saturating_add(1);
            path.clone()
        } else {
            self.misses = self.misses.saturating_add(1);
            let path = find_path(low, high, forbidden, dimensions);
            if self.entries.len() >= self.capacity {
                tracing::debug!(entries = self.entries.len(), "path cache cleared");
                self.entries.clear();
            }
            let _ = self.entries.insert(key, path.clone());
            path
        };

        if start == low {
            stored
        } else {
            let mut reversed = stored;
            reversed.reverse();
            reversed
        }
    }

    /// Number of memoised entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from memory.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that ran a search.
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    /// Drops every memoised entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(4096)
    }
}
