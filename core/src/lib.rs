#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Gemrunner decision engine.
//!
//! This crate defines the vocabulary that connects the protocol adapter, the
//! authoritative world model, and the pure analysis systems. The adapter
//! builds an [`Observation`] every tick, the world folds it into persistent
//! knowledge through its `apply` entry point, and the systems read immutable
//! snapshots ([`FloorGraph`], [`WallGrid`], [`ForbiddenSet`]) to produce a
//! single [`Move`].

use std::{
    collections::{hash_map::DefaultHasher, BTreeSet},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

mod floor_graph;
mod observation;
mod tuning;

pub use floor_graph::FloorGraph;
pub use observation::{Observation, ObservationError, VisibleGem};
pub use tuning::{
    AgentTuning, AntColonyTuning, CoverMode, ExploreTuning, GemPlannerMode, GemTuning, PatrolMode,
    PatrolTuning, PathTuning, RouteMode, StuckTuning,
};

/// Location of a single grid cell expressed as signed column and row coordinates.
///
/// Ordering compares `x` first and `y` second so that every ordered
/// collection of cells iterates deterministically.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Cell {
    x: i32,
    y: i32,
}

impl Cell {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Zero-based row index of the cell. Rows grow southwards.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the cell displaced by the provided delta.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Computes the Manhattan distance between two cells.
    #[must_use]
    pub fn manhattan_distance(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Four orthogonal neighbours in north, east, south, west order.
    ///
    /// Neighbours are not clipped to any grid; callers filter with
    /// [`GridDimensions::contains`].
    #[must_use]
    pub const fn cardinal_neighbors(self) -> [Cell; 4] {
        [
            self.offset(0, -1),
            self.offset(1, 0),
            self.offset(0, 1),
            self.offset(-1, 0),
        ]
    }

    /// Four diagonal neighbours.
    #[must_use]
    pub const fn diagonal_neighbors(self) -> [Cell; 4] {
        [
            self.offset(1, -1),
            self.offset(1, 1),
            self.offset(-1, 1),
            self.offset(-1, -1),
        ]
    }

    /// Reports whether `other` shares an edge with this cell.
    #[must_use]
    pub fn is_orthogonally_adjacent(self, other: Cell) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// Reports whether `other` lies within one king's move of this cell.
    #[must_use]
    pub fn is_within_one_step(self, other: Cell) -> bool {
        self != other && self.x.abs_diff(other.x) <= 1 && self.y.abs_diff(other.y) <= 1
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Size of the playing field measured in whole cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDimensions {
    width: u32,
    height: u32,
}

impl GridDimensions {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the grid in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the grid in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells contained in the grid.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        let width = usize::try_from(self.width).unwrap_or(0);
        let height = usize::try_from(self.height).unwrap_or(0);
        width.saturating_mul(height)
    }

    /// Reports whether the cell lies inside the grid.
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.x() >= 0
            && cell.y() >= 0
            && u32::try_from(cell.x()).map_or(false, |x| x < self.width)
            && u32::try_from(cell.y()).map_or(false, |y| y < self.height)
    }

    /// Row-major index of the cell, if it lies inside the grid.
    #[must_use]
    pub fn index(&self, cell: Cell) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let column = usize::try_from(cell.x()).ok()?;
        let row = usize::try_from(cell.y()).ok()?;
        let width = usize::try_from(self.width).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Iterates every cell of the grid in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        let width = i32::try_from(self.width).unwrap_or(i32::MAX);
        let height = i32::try_from(self.height).unwrap_or(i32::MAX);
        (0..height).flat_map(move |y| (0..width).map(move |x| Cell::new(x, y)))
    }
}

/// The five moves the agent may commit each tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
    /// Remain on the current cell.
    Wait,
}

impl Move {
    /// Derives the move that carries the agent from `from` to `to`.
    ///
    /// Any delta that is not a single orthogonal step maps to [`Move::Wait`].
    #[must_use]
    pub fn between(from: Cell, to: Cell) -> Self {
        match (to.x() - from.x(), to.y() - from.y()) {
            (0, -1) => Self::North,
            (1, 0) => Self::East,
            (0, 1) => Self::South,
            (-1, 0) => Self::West,
            _ => Self::Wait,
        }
    }

    /// Token written to the game protocol for this move.
    #[must_use]
    pub const fn as_protocol_str(self) -> &'static str {
        match self {
            Self::North => "N",
            Self::East => "E",
            Self::South => "S",
            Self::West => "W",
            Self::Wait => "WAIT",
        }
    }

    /// Cell reached by applying this move to `from`.
    #[must_use]
    pub const fn apply(self, from: Cell) -> Cell {
        match self {
            Self::North => from.offset(0, -1),
            Self::East => from.offset(1, 0),
            Self::South => from.offset(0, 1),
            Self::West => from.offset(-1, 0),
            Self::Wait => from,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_protocol_str())
    }
}

/// High-level behaviour selected by the decision state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviourState {
    /// No decision has been taken yet.
    #[default]
    Idle,
    /// Walking towards unexplored cells on the frontier.
    Exploring,
    /// Cycling through coverage viewpoints once the cave is known.
    Patrolling,
    /// Heading for a gem that can still be reached before it expires.
    CollectingGem,
    /// Replaying the previously committed path after repeated stalls.
    Unstucking,
}

impl BehaviourState {
    /// Short lowercase label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Exploring => "exploring",
            Self::Patrolling => "patrolling",
            Self::CollectingGem => "collecting_gem",
            Self::Unstucking => "unstucking",
        }
    }
}

/// Static configuration announced once at the start of a game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Number of columns in the cave.
    pub width: u32,
    /// Number of rows in the cave.
    pub height: u32,
    /// Radius of the agent's field of view.
    #[serde(default = "default_vis_radius")]
    pub vis_radius: u32,
    /// Number of ticks a freshly spawned gem survives.
    #[serde(default = "default_gem_ttl")]
    pub gem_ttl: u32,
    /// Per-tick probability that a gem spawns on a given floor cell.
    #[serde(default)]
    pub gem_spawn_rate: f64,
    /// Seed for every randomised component.
    #[serde(default)]
    pub bot_seed: u64,
}

impl GameConfig {
    /// Creates a configuration for a grid of the provided size using default knobs.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            vis_radius: default_vis_radius(),
            gem_ttl: default_gem_ttl(),
            gem_spawn_rate: 0.0,
            bot_seed: 0,
        }
    }

    /// Grid dimensions described by the configuration.
    #[must_use]
    pub const fn dimensions(&self) -> GridDimensions {
        GridDimensions::new(self.width, self.height)
    }
}

const fn default_vis_radius() -> u32 {
    5
}

const fn default_gem_ttl() -> u32 {
    300
}

/// Immutable snapshot of cells that path searches must avoid.
///
/// Snapshots compare and hash by value, so a snapshot can key a path cache:
/// two snapshots holding the same cells share cache entries, and any change
/// to the set produces a distinct key. Hashing uses a fingerprint computed
/// once at construction.
#[derive(Clone, Debug)]
pub struct ForbiddenSet {
    cells: Arc<BTreeSet<Cell>>,
    fingerprint: u64,
}

impl ForbiddenSet {
    /// Captures a snapshot of the provided cells.
    #[must_use]
    pub fn new(cells: impl IntoIterator<Item = Cell>) -> Self {
        let cells: BTreeSet<Cell> = cells.into_iter().collect();
        let mut hasher = DefaultHasher::new();
        cells.hash(&mut hasher);
        Self {
            fingerprint: hasher.finish(),
            cells: Arc::new(cells),
        }
    }

    /// Snapshot that forbids nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Returns a new snapshot holding these cells plus `extra`.
    #[must_use]
    pub fn with_extra(&self, extra: impl IntoIterator<Item = Cell>) -> Self {
        Self::new(self.cells.iter().copied().chain(extra))
    }

    /// Reports whether the cell is forbidden.
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }

    /// Number of forbidden cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the snapshot forbids nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates the forbidden cells in cell order.
    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }
}

impl Default for ForbiddenSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for ForbiddenSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cells, &other.cells)
            || (self.fingerprint == other.fingerprint && self.cells == other.cells)
    }
}

impl Eq for ForbiddenSet {}

impl Hash for ForbiddenSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint);
    }
}

/// Dense wall occupancy used for line-of-sight tests.
///
/// Cells outside the grid always block sight.
#[derive(Clone, Debug, Default)]
pub struct WallGrid {
    dimensions: GridDimensions,
    walls: Vec<bool>,
    revision: u64,
}

impl WallGrid {
    /// Builds a grid from known wall cells. `revision` identifies the wall
    /// knowledge the grid was built from so consumers can invalidate memos.
    #[must_use]
    pub fn from_walls(
        dimensions: GridDimensions,
        walls: impl IntoIterator<Item = Cell>,
        revision: u64,
    ) -> Self {
        let mut dense = vec![false; dimensions.cell_count()];
        for wall in walls {
            if let Some(index) = dimensions.index(wall) {
                dense[index] = true;
            }
        }
        Self {
            dimensions,
            walls: dense,
            revision,
        }
    }

    /// Dimensions of the underlying grid.
    #[must_use]
    pub const fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    /// Revision of the wall knowledge captured in this grid.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Reports whether the cell is a known wall. Out-of-bounds cells are not walls.
    #[must_use]
    pub fn is_wall(&self, cell: Cell) -> bool {
        self.dimensions
            .index(cell)
            .and_then(|index| self.walls.get(index).copied())
            .unwrap_or(false)
    }

    /// Reports whether the cell stops a line of sight.
    #[must_use]
    pub fn blocks_sight(&self, cell: Cell) -> bool {
        match self.dimensions.index(cell) {
            Some(index) => self.walls.get(index).copied().unwrap_or(true),
            None => true,
        }
    }
}

/// Advisory cell sets collected for debug rendering by the boundary layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Path the agent committed to this tick, starting at its own cell.
    pub path: Vec<Cell>,
    /// Dead-end cells detected in the floor graph.
    pub dead_ends: BTreeSet<Cell>,
    /// Articulation points of the floor graph.
    pub articulation_points: BTreeSet<Cell>,
    /// Patrol viewpoints currently scheduled.
    pub viewpoints: Vec<Cell>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = Cell::new(1, 1);
        let destination = Cell::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    #[test]
    fn cells_order_by_column_then_row() {
        let mut cells = vec![Cell::new(1, 0), Cell::new(0, 5), Cell::new(0, 2)];
        cells.sort();
        assert_eq!(cells, vec![Cell::new(0, 2), Cell::new(0, 5), Cell::new(1, 0)]);
    }

    #[test]
    fn move_between_neighbors() {
        let origin = Cell::new(3, 3);
        assert_eq!(Move::between(origin, Cell::new(3, 2)), Move::North);
        assert_eq!(Move::between(origin, Cell::new(4, 3)), Move::East);
        assert_eq!(Move::between(origin, Cell::new(3, 4)), Move::South);
        assert_eq!(Move::between(origin, Cell::new(2, 3)), Move::West);
        assert_eq!(Move::between(origin, origin), Move::Wait);
        assert_eq!(Move::between(origin, Cell::new(4, 4)), Move::Wait);
    }

    #[test]
    fn move_apply_inverts_between() {
        let origin = Cell::new(2, 2);
        for neighbor in origin.cardinal_neighbors() {
            assert_eq!(Move::between(origin, neighbor).apply(origin), neighbor);
        }
    }

    #[test]
    fn dimensions_reject_negative_and_overflowing_cells() {
        let dimensions = GridDimensions::new(3, 2);
        assert!(dimensions.contains(Cell::new(2, 1)));
        assert!(!dimensions.contains(Cell::new(3, 1)));
        assert!(!dimensions.contains(Cell::new(-1, 0)));
        assert_eq!(dimensions.index(Cell::new(1, 1)), Some(4));
        assert_eq!(dimensions.cells().count(), 6);
    }

    #[test]
    fn within_one_step_covers_diagonals_but_not_self() {
        let origin = Cell::new(5, 5);
        assert!(origin.is_within_one_step(Cell::new(6, 6)));
        assert!(origin.is_within_one_step(Cell::new(5, 4)));
        assert!(!origin.is_within_one_step(origin));
        assert!(!origin.is_within_one_step(Cell::new(7, 5)));
    }

    #[test]
    fn forbidden_sets_compare_by_value() {
        let first = ForbiddenSet::new([Cell::new(1, 0), Cell::new(0, 1)]);
        let second = ForbiddenSet::new([Cell::new(0, 1), Cell::new(1, 0)]);
        let third = first.with_extra([Cell::new(2, 2)]);

        assert_eq!(first, second);
        assert_ne!(first, third);
        assert!(third.contains(Cell::new(2, 2)));
        assert_eq!(third.len(), 3);
    }

    #[test]
    fn wall_grid_blocks_outside_cells() {
        let grid = WallGrid::from_walls(GridDimensions::new(2, 2), [Cell::new(1, 1)], 0);
        assert!(grid.blocks_sight(Cell::new(1, 1)));
        assert!(grid.blocks_sight(Cell::new(2, 0)));
        assert!(!grid.blocks_sight(Cell::new(0, 0)));
        assert!(!grid.is_wall(Cell::new(2, 0)));
    }

    #[test]
    fn game_config_ignores_unknown_keys() {
        let json = r#"{"stage_key":"x","width":30,"height":20,"vis_radius":4,"max_gems":3}"#;
        let config: GameConfig = serde_json::from_str(json).expect("config parses");
        assert_eq!(config.dimensions(), GridDimensions::new(30, 20));
        assert_eq!(config.vis_radius, 4);
        assert_eq!(config.gem_ttl, 300);
    }
}
