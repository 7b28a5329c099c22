#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative spatial knowledge accumulated by a Gemrunner agent.
//!
//! The [`WorldModel`] remembers every wall, floor cell and gem the agent has
//! observed. It is mutated exclusively through [`apply`], once per tick, and
//! read through the free functions of [`query`].

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
};

use gemrunner_core::{
    Cell, FloorGraph, ForbiddenSet, GameConfig, GridDimensions, Observation, ObservationError,
    PathTuning, VisibleGem, WallGrid,
};

pub mod navigation;

use navigation::{path_steps, PathCache};

/// Bookkeeping for a wall cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WallRecord {
    /// Tick in which the wall was first observed.
    pub first_seen: u64,
}

/// Bookkeeping for a floor cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloorRecord {
    /// Most recent tick in which the cell was observed.
    pub last_seen: u64,
}

/// Remembered gem together with its derived reachability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GemRecord {
    /// Ticks left before the gem expires.
    pub lifetime: u32,
    /// Path steps from the agent, when a path exists.
    pub distance_to_agent: Option<u32>,
    /// Path steps from each visible rival, in rival order.
    pub distances_to_rivals: Vec<Option<u32>>,
    /// Whether the agent can arrive before the gem expires.
    pub reachable: bool,
}

impl GemRecord {
    fn observed(gem: &VisibleGem) -> Self {
        Self {
            lifetime: gem.lifetime,
            distance_to_agent: gem.distance_to_agent,
            distances_to_rivals: gem.distances_to_rivals.iter().copied().map(Some).collect(),
            reachable: false,
        }
    }
}

/// Summary of what a single [`apply`] call changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Floor cells learned this tick.
    pub new_floor: usize,
    /// Wall cells learned this tick.
    pub new_walls: usize,
    /// Gems forgotten this tick because they expired or vanished from view.
    pub purged_gems: Vec<Cell>,
    /// Whether the last hidden cell was revealed during this tick.
    pub cave_revealed: bool,
}

/// Everything the agent knows about the cave.
#[derive(Debug)]
pub struct WorldModel {
    config: GameConfig,
    dimensions: GridDimensions,
    last_tick: Option<u64>,
    agent: Cell,
    initiative: bool,
    known_walls: BTreeMap<Cell, WallRecord>,
    known_floor: BTreeMap<Cell, FloorRecord>,
    known_gems: BTreeMap<Cell, GemRecord>,
    hidden: BTreeSet<Cell>,
    cave_revealed: bool,
    visible_floor: BTreeSet<Cell>,
    visible_rivals: Vec<Cell>,
    floor_graph: FloorGraph,
    wall_snapshot: ForbiddenSet,
    wall_grid: WallGrid,
    wall_revision: u64,
    paths: RefCell<PathCache>,
}

impl WorldModel {
    /// Creates an empty model for the announced game.
    #[must_use]
    pub fn new(config: GameConfig, tuning: &PathTuning) -> Self {
        let dimensions = config.dimensions();
        Self {
            hidden: dimensions.cells().collect(),
            wall_grid: WallGrid::from_walls(dimensions, std::iter::empty(), 0),
            dimensions,
            config,
            last_tick: None,
            agent: Cell::default(),
            initiative: false,
            known_walls: BTreeMap::new(),
            known_floor: BTreeMap::new(),
            known_gems: BTreeMap::new(),
            cave_revealed: false,
            visible_floor: BTreeSet::new(),
            visible_rivals: Vec::new(),
            floor_graph: FloorGraph::new(),
            wall_snapshot: ForbiddenSet::empty(),
            wall_revision: 0,
            paths: RefCell::new(PathCache::new(tuning.cache_capacity)),
        }
    }

    fn merge_cells(&mut self, observation: &Observation, report: &mut TickReport) -> Vec<Cell> {
        let mut walls_changed = false;
        for &wall in &observation.walls {
            if self.known_walls.contains_key(&wall) {
                continue;
            }
            let _ = self.known_walls.insert(
                wall,
                WallRecord {
                    first_seen: observation.tick,
                },
            );
            report.new_walls += 1;
            walls_changed = true;

            if self.known_floor.remove(&wall).is_some() {
                tracing::warn!(%wall, "wall observed on a cell previously known as floor");
                let _ = self.floor_graph.remove(wall);
                if self.known_gems.remove(&wall).is_some() {
                    report.purged_gems.push(wall);
                }
            }
        }

        if walls_changed {
            self.wall_revision = self.wall_revision.wrapping_add(1);
            self.wall_snapshot = ForbiddenSet::new(self.known_walls.keys().copied());
            self.wall_grid = WallGrid::from_walls(
                self.dimensions,
                self.known_walls.keys().copied(),
                self.wall_revision,
            );
        }

        self.visible_floor.clear();
        let mut fresh = Vec::new();
        let floor = observation
            .floor
            .iter()
            .copied()
            .chain(std::iter::once(observation.agent));
        for cell in floor {
            if self.known_walls.contains_key(&cell) {
                tracing::warn!(%cell, "ignoring floor reported on a known wall");
                continue;
            }
            let _ = self.visible_floor.insert(cell);
            let record = FloorRecord {
                last_seen: observation.tick,
            };
            if self.known_floor.insert(cell, record).is_none() {
                fresh.push(cell);
            }
        }
        report.new_floor = fresh.len();
        fresh
    }

    fn decay_gems(&mut self, observation: &Observation, report: &mut TickReport) {
        let elapsed = match self.last_tick {
            Some(previous) => observation.tick.saturating_sub(previous),
            None => 0,
        };
        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
        let visible: BTreeSet<Cell> = observation.gems.iter().map(|gem| gem.cell).collect();

        let visible_floor = &self.visible_floor;
        let purged = &mut report.purged_gems;
        self.known_gems.retain(|&cell, gem| {
            let expired = gem.lifetime <= elapsed;
            let vanished = visible_floor.contains(&cell) && !visible.contains(&cell);
            if expired || vanished {
                purged.push(cell);
                return false;
            }
            gem.lifetime -= elapsed;
            true
        });

        for gem in &observation.gems {
            if gem.lifetime == 0 {
                continue;
            }
            if !self.known_floor.contains_key(&gem.cell) {
                tracing::warn!(cell = %gem.cell, "ignoring gem outside known floor");
                continue;
            }
            let _ = self.known_gems.insert(gem.cell, GemRecord::observed(gem));
        }

        if self.known_gems.remove(&observation.agent).is_some() {
            tracing::debug!(cell = %observation.agent, "gem collected");
        }
    }

    fn refresh_gem_distances(&mut self) {
        let agent = self.agent;
        let rivals = self.visible_rivals.clone();
        let cells: Vec<Cell> = self.known_gems.keys().copied().collect();
        for cell in cells {
            let to_agent = path_steps(&self.path(agent, cell));
            let to_rivals: Vec<Option<u32>> = rivals
                .iter()
                .map(|&rival| path_steps(&self.path(rival, cell)))
                .collect();
            if let Some(gem) = self.known_gems.get_mut(&cell) {
                gem.reachable = to_agent.map_or(false, |steps| steps <= gem.lifetime);
                gem.distance_to_agent = to_agent;
                gem.distances_to_rivals = to_rivals;
            }
        }
    }

    fn shrink_hidden(&mut self, observation: &Observation, report: &mut TickReport) {
        for cell in observation.walls.iter().chain(observation.floor.iter()) {
            let _ = self.hidden.remove(cell);
        }
        let _ = self.hidden.remove(&observation.agent);

        if !self.cave_revealed && self.hidden.is_empty() {
            self.cave_revealed = true;
            report.cave_revealed = true;
            tracing::info!(tick = observation.tick, "cave fully revealed");
        }
    }

    fn path(&self, from: Cell, to: Cell) -> Vec<Cell> {
        self.paths
            .borrow_mut()
            .find_path(from, to, &self.wall_snapshot, self.dimensions)
    }
}

/// Folds one observation into the model.
///
/// The observation is validated before anything is mutated, so a rejected
/// observation leaves the model untouched. Replaying the tick that was just
/// processed refreshes knowledge without decaying gems a second time.
pub fn apply(
    world: &mut WorldModel,
    observation: &Observation,
) -> Result<TickReport, ObservationError> {
    observation.validate(world.dimensions)?;
    if let Some(previous) = world.last_tick {
        if observation.tick < previous {
            return Err(ObservationError::TickRegressed {
                previous,
                current: observation.tick,
            });
        }
    }

    let mut report = TickReport::default();

    world.agent = observation.agent;
    world.initiative = observation.initiative;
    world.visible_rivals = observation.rivals.clone();
    let fresh = world.merge_cells(observation, &mut report);

    world.decay_gems(observation, &mut report);
    world.last_tick = Some(observation.tick);

    world.refresh_gem_distances();

    world.shrink_hidden(observation, &mut report);

    for cell in fresh {
        let _ = world.floor_graph.insert(cell);
    }

    tracing::trace!(
        tick = observation.tick,
        new_floor = report.new_floor,
        new_walls = report.new_walls,
        gems = world.known_gems.len(),
        "observation applied"
    );
    Ok(report)
}

/// Query functions that provide read-only access to the world model.
pub mod query {
    use std::collections::{BTreeMap, BTreeSet};

    use gemrunner_core::{Cell, FloorGraph, ForbiddenSet, GameConfig, GridDimensions, WallGrid};

    use super::{navigation::flood_fill, FloorRecord, GemRecord, WallRecord, WorldModel};

    /// Static configuration the model was created with.
    #[must_use]
    pub fn config(world: &WorldModel) -> &GameConfig {
        &world.config
    }

    /// Dimensions of the cave.
    #[must_use]
    pub fn dimensions(world: &WorldModel) -> GridDimensions {
        world.dimensions
    }

    /// Tick of the most recently applied observation.
    #[must_use]
    pub fn tick(world: &WorldModel) -> Option<u64> {
        world.last_tick
    }

    /// Cell occupied by the agent.
    #[must_use]
    pub fn agent(world: &WorldModel) -> Cell {
        world.agent
    }

    /// Whether the agent moves first this tick.
    #[must_use]
    pub fn initiative(world: &WorldModel) -> bool {
        world.initiative
    }

    /// Rivals visible this tick.
    #[must_use]
    pub fn rivals(world: &WorldModel) -> &[Cell] {
        &world.visible_rivals
    }

    /// Every wall observed so far.
    #[must_use]
    pub fn known_walls(world: &WorldModel) -> &BTreeMap<Cell, WallRecord> {
        &world.known_walls
    }

    /// Every floor cell observed so far.
    #[must_use]
    pub fn known_floor(world: &WorldModel) -> &BTreeMap<Cell, FloorRecord> {
        &world.known_floor
    }

    /// Floor cells visible this tick, including the agent's own cell.
    #[must_use]
    pub fn visible_floor(world: &WorldModel) -> &BTreeSet<Cell> {
        &world.visible_floor
    }

    /// Gems that are still believed to be alive.
    #[must_use]
    pub fn known_gems(world: &WorldModel) -> &BTreeMap<Cell, GemRecord> {
        &world.known_gems
    }

    /// Known gems the agent can reach before they expire.
    pub fn reachable_gems(world: &WorldModel) -> impl Iterator<Item = (Cell, &GemRecord)> + '_ {
        world
            .known_gems
            .iter()
            .filter(|(_, gem)| gem.reachable)
            .map(|(&cell, gem)| (cell, gem))
    }

    /// Cells that have never been observed.
    #[must_use]
    pub fn hidden(world: &WorldModel) -> &BTreeSet<Cell> {
        &world.hidden
    }

    /// Whether every cell of the cave has been observed at least once.
    #[must_use]
    pub fn cave_revealed(world: &WorldModel) -> bool {
        world.cave_revealed
    }

    /// Hidden cells that share an edge with known floor.
    #[must_use]
    pub fn frontier(world: &WorldModel) -> BTreeSet<Cell> {
        world
            .known_floor
            .keys()
            .flat_map(|cell| cell.cardinal_neighbors())
            .filter(|neighbor| world.hidden.contains(neighbor))
            .collect()
    }

    /// Cells the agent can walk to without crossing a known wall, hidden
    /// cells included.
    #[must_use]
    pub fn reachable_cells(world: &WorldModel) -> BTreeSet<Cell> {
        flood_fill(world.agent, &world.wall_snapshot, world.dimensions)
    }

    /// Frontier cells the agent can walk to.
    #[must_use]
    pub fn reachable_frontier(world: &WorldModel) -> BTreeSet<Cell> {
        let reachable = reachable_cells(world);
        frontier(world)
            .into_iter()
            .filter(|cell| reachable.contains(cell))
            .collect()
    }

    /// Reachable known floor cell, other than the agent's own, that has gone
    /// unobserved the longest. Ties resolve by cell order.
    #[must_use]
    pub fn oldest_floor(world: &WorldModel) -> Option<Cell> {
        let reachable = reachable_cells(world);
        world
            .known_floor
            .iter()
            .filter(|(cell, _)| **cell != world.agent && reachable.contains(cell))
            .min_by_key(|(&cell, record)| (record.last_seen, cell))
            .map(|(&cell, _)| cell)
    }

    /// Adjacency graph over the known floor.
    #[must_use]
    pub fn floor_graph(world: &WorldModel) -> &FloorGraph {
        &world.floor_graph
    }

    /// Dense wall occupancy for line-of-sight tests.
    #[must_use]
    pub fn wall_grid(world: &WorldModel) -> &WallGrid {
        &world.wall_grid
    }

    /// Snapshot of the known walls for path searches.
    #[must_use]
    pub fn wall_snapshot(world: &WorldModel) -> &ForbiddenSet {
        &world.wall_snapshot
    }

    /// Shortest path that avoids every known wall.
    #[must_use]
    pub fn path(world: &WorldModel, from: Cell, to: Cell) -> Vec<Cell> {
        world.path(from, to)
    }

    /// Shortest path that avoids the provided snapshot, which should already
    /// contain the known walls.
    #[must_use]
    pub fn path_avoiding(
        world: &WorldModel,
        from: Cell,
        to: Cell,
        forbidden: &ForbiddenSet,
    ) -> Vec<Cell> {
        world
            .paths
            .borrow_mut()
            .find_path(from, to, forbidden, world.dimensions)
    }

    /// Number of memoised paths currently held.
    #[must_use]
    pub fn cached_paths(world: &WorldModel) -> usize {
        world.paths.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(width: u32, height: u32) -> WorldModel {
        WorldModel::new(GameConfig::new(width, height), &PathTuning::default())
    }

    fn corridor_observation(tick: u64) -> Observation {
        Observation {
            tick,
            agent: Cell::new(0, 0),
            floor: vec![Cell::new(0, 0), Cell::new(1, 0), Cell::new(2, 0)],
            ..Observation::default()
        }
    }

    #[test]
    fn apply_merges_floor_and_extends_graph() {
        let mut world = world(3, 2);
        let report = apply(&mut world, &corridor_observation(1)).expect("valid observation");

        assert_eq!(report.new_floor, 3);
        assert_eq!(query::known_floor(&world).len(), 3);
        assert_eq!(query::floor_graph(&world).edge_count(), 2);
        assert_eq!(query::hidden(&world).len(), 3);
        assert_eq!(
            query::frontier(&world),
            [Cell::new(0, 1), Cell::new(1, 1), Cell::new(2, 1)]
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn rejected_observation_leaves_model_untouched() {
        let mut world = world(3, 1);
        let _ = apply(&mut world, &corridor_observation(4)).expect("valid observation");

        let error = apply(&mut world, &corridor_observation(2)).expect_err("tick regressed");
        assert_eq!(
            error,
            ObservationError::TickRegressed {
                previous: 4,
                current: 2
            }
        );

        let mut contradictory = corridor_observation(5);
        contradictory.walls.push(Cell::new(1, 0));
        assert!(apply(&mut world, &contradictory).is_err());
        assert!(query::known_walls(&world).is_empty());
        assert_eq!(query::tick(&world), Some(4));
    }

    #[test]
    fn walls_evict_previously_known_floor() {
        let mut world = world(3, 1);
        let _ = apply(&mut world, &corridor_observation(1)).expect("valid observation");

        let observation = Observation {
            tick: 2,
            agent: Cell::new(0, 0),
            walls: vec![Cell::new(2, 0)],
            floor: vec![Cell::new(1, 0)],
            ..Observation::default()
        };
        let report = apply(&mut world, &observation).expect("valid observation");

        assert_eq!(report.new_walls, 1);
        assert!(!query::known_floor(&world).contains_key(&Cell::new(2, 0)));
        assert!(!query::floor_graph(&world).contains(Cell::new(2, 0)));
        assert!(query::wall_grid(&world).is_wall(Cell::new(2, 0)));
    }

    #[test]
    fn gems_decay_by_elapsed_ticks_once_per_tick() {
        let mut world = world(3, 1);
        let mut observation = corridor_observation(10);
        observation.gems.push(VisibleGem::new(Cell::new(2, 0), 5));
        let _ = apply(&mut world, &observation).expect("valid observation");

        let mut unseen = corridor_observation(12);
        unseen.floor = vec![Cell::new(0, 0)];
        let _ = apply(&mut world, &unseen).expect("valid observation");
        let _ = apply(&mut world, &unseen).expect("same tick replays");

        let gem = &query::known_gems(&world)[&Cell::new(2, 0)];
        assert_eq!(gem.lifetime, 3);
        assert_eq!(gem.distance_to_agent, Some(2));
        assert!(gem.reachable);

        let mut later = unseen.clone();
        later.tick = 15;
        let report = apply(&mut world, &later).expect("valid observation");
        assert_eq!(report.purged_gems, vec![Cell::new(2, 0)]);
        assert!(query::known_gems(&world).is_empty());
    }

    #[test]
    fn gem_under_agent_is_collected() {
        let mut world = world(3, 1);
        let mut observation = corridor_observation(1);
        observation.gems.push(VisibleGem::new(Cell::new(0, 0), 5));
        let _ = apply(&mut world, &observation).expect("valid observation");
        assert!(query::known_gems(&world).is_empty());
    }

    #[test]
    fn gem_missing_from_visible_cell_is_purged() {
        let mut world = world(3, 1);
        let mut observation = corridor_observation(1);
        observation.gems.push(VisibleGem::new(Cell::new(2, 0), 50));
        let _ = apply(&mut world, &observation).expect("valid observation");

        let report = apply(&mut world, &corridor_observation(2)).expect("valid observation");
        assert_eq!(report.purged_gems, vec![Cell::new(2, 0)]);
    }

    #[test]
    fn cave_revealed_flips_once() {
        let mut world = world(3, 1);
        let first = apply(&mut world, &corridor_observation(1)).expect("valid observation");
        let second = apply(&mut world, &corridor_observation(2)).expect("valid observation");

        assert!(first.cave_revealed);
        assert!(!second.cave_revealed);
        assert!(query::cave_revealed(&world));
        assert!(query::frontier(&world).is_empty());
    }

    #[test]
    fn oldest_floor_prefers_least_recent_then_cell_order() {
        let mut world = world(3, 1);
        let _ = apply(&mut world, &corridor_observation(1)).expect("valid observation");
        let mut observation = corridor_observation(2);
        observation.floor = vec![Cell::new(0, 0), Cell::new(1, 0)];
        let _ = apply(&mut world, &observation).expect("valid observation");

        assert_eq!(query::oldest_floor(&world), Some(Cell::new(2, 0)));
    }

    #[test]
    fn sealed_floor_is_neither_frontier_target_nor_oldest() {
        // Row 1 is solid wall; the floor at (1, 2) was glimpsed but cannot be
        // walked to.
        let mut world = world(4, 3);
        let first = Observation {
            tick: 0,
            agent: Cell::new(0, 0),
            walls: (0..4).map(|x| Cell::new(x, 1)).collect(),
            floor: vec![Cell::new(0, 0), Cell::new(1, 0), Cell::new(1, 2)],
            ..Observation::default()
        };
        let _ = apply(&mut world, &first).expect("valid observation");
        let mut second = corridor_observation(5);
        second.floor = vec![Cell::new(0, 0), Cell::new(1, 0)];
        let _ = apply(&mut world, &second).expect("valid observation");

        assert!(query::frontier(&world).contains(&Cell::new(0, 2)));
        assert_eq!(
            query::reachable_frontier(&world),
            BTreeSet::from([Cell::new(2, 0)])
        );
        assert_eq!(query::oldest_floor(&world), Some(Cell::new(1, 0)));
    }
}
