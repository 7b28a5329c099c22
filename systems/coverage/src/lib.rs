#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Patrol planning over the explored cave.
//!
//! The scheduler selects a set of viewpoints whose combined field of view
//! covers the known floor, orders them into a route, and hands out the
//! current route target tick by tick.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use gemrunner_core::{AgentTuning, Cell, CoverMode, RouteMode};
use gemrunner_system_topology::TopologySummary;
use gemrunner_system_visibility::VisibilityIndex;
use gemrunner_world::{navigation::path_steps, query, WorldModel};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

mod route;
mod set_cover;

pub use route::{ant_colony_route, cluster_targets, nearest_neighbor_route};
pub use set_cover::{exact_cover, greedy_cover, weighted_greedy_cover, MAX_EXACT_UNIVERSE};

/// Keeps the patrol viewpoints and their route across ticks.
#[derive(Debug)]
pub struct CoverageScheduler {
    viewpoints: BTreeSet<Cell>,
    route: Vec<Cell>,
    index: usize,
    history: VecDeque<Cell>,
    computed_at: Option<u64>,
    recompute_requested: bool,
    reorder_requested: bool,
    visibility: VisibilityIndex,
    rng: ChaCha8Rng,
}

impl CoverageScheduler {
    /// Creates a scheduler whose randomised route search is seeded with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            viewpoints: BTreeSet::new(),
            route: Vec::new(),
            index: 0,
            history: VecDeque::new(),
            computed_at: None,
            recompute_requested: false,
            reorder_requested: false,
            visibility: VisibilityIndex::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Forces the viewpoint set to be rebuilt on the next request.
    pub fn force_recompute(&mut self) {
        self.recompute_requested = true;
    }

    /// Re-orders the existing viewpoints from the agent's position on the
    /// next request.
    pub fn request_reorder(&mut self) {
        self.reorder_requested = true;
    }

    /// Currently selected viewpoints.
    #[must_use]
    pub fn viewpoints(&self) -> &BTreeSet<Cell> {
        &self.viewpoints
    }

    /// Current route over the viewpoints.
    #[must_use]
    pub fn route(&self) -> &[Cell] {
        &self.route
    }

    /// Viewpoints visited most recently, oldest first.
    pub fn history(&self) -> impl Iterator<Item = Cell> + '_ {
        self.history.iter().copied()
    }

    /// Returns the viewpoint the agent should head for.
    ///
    /// Recomputes the viewpoint set when the interval has elapsed or a
    /// recompute was forced, and advances along the route when the agent
    /// stands on the current target. `None` means the viewpoint set could
    /// not be built or no viewpoint is reachable.
    pub fn target(
        &mut self,
        world: &WorldModel,
        topology: &TopologySummary,
        tuning: &AgentTuning,
    ) -> Option<Cell> {
        let tick = query::tick(world).unwrap_or(0);
        let interval_elapsed = self.computed_at.map_or(true, |computed| {
            tick.saturating_sub(computed) >= tuning.patrol.recompute_interval
        });

        if self.recompute_requested || interval_elapsed || self.viewpoints.is_empty() {
            self.recompute_requested = false;
            self.computed_at = Some(tick);
            if !self.select_viewpoints(world, topology, tuning) {
                self.route.clear();
                return None;
            }
            self.order_route(world, tuning);
            tracing::info!(
                tick,
                viewpoints = self.viewpoints.len(),
                route = self.route.len(),
                "patrol viewpoints recomputed"
            );
        } else if self.reorder_requested || self.route.is_empty() {
            self.order_route(world, tuning);
        }
        self.reorder_requested = false;

        let agent = query::agent(world);
        let current = *self.route.get(self.index)?;
        if current != agent {
            return Some(current);
        }

        self.history.push_back(current);
        while self.history.len() > tuning.patrol.history_len {
            let _ = self.history.pop_front();
        }
        self.index = (self.index + 1) % self.route.len();
        self.route.get(self.index).copied()
    }

    fn select_viewpoints(
        &mut self,
        world: &WorldModel,
        topology: &TopologySummary,
        tuning: &AgentTuning,
    ) -> bool {
        let radius = query::config(world).vis_radius;
        let grid = query::wall_grid(world);
        let floor = query::known_floor(world);
        let universe: BTreeSet<Cell> = floor.keys().copied().collect();

        self.visibility.record_observed(
            grid,
            query::agent(world),
            radius,
            query::visible_floor(world).iter().copied(),
        );
        let candidates: BTreeMap<Cell, BTreeSet<Cell>> = universe
            .iter()
            .map(|&cell| {
                let seen = self
                    .visibility
                    .visible_from(grid, cell, radius)
                    .iter()
                    .copied()
                    .filter(|seen| floor.contains_key(seen))
                    .collect();
                (cell, seen)
            })
            .collect();

        let mut selected = BTreeSet::new();
        for &dead_end in &topology.dead_ends {
            let best = candidates
                .iter()
                .filter(|(_, seen)| seen.contains(&dead_end))
                .max_by_key(|(&cell, seen)| {
                    (seen.len(), cell.manhattan_distance(dead_end), std::cmp::Reverse(cell))
                })
                .map(|(&cell, _)| cell);
            if let Some(cell) = best {
                let _ = selected.insert(cell);
            }
        }

        let mut uncovered = universe;
        for cell in &selected {
            if let Some(seen) = candidates.get(cell) {
                for covered in seen {
                    let _ = uncovered.remove(covered);
                }
            }
        }

        let remaining: BTreeMap<Cell, BTreeSet<Cell>> = candidates
            .into_iter()
            .filter(|(cell, _)| !selected.contains(cell))
            .collect();
        let agent = query::agent(world);
        let cover = match tuning.patrol.cover {
            CoverMode::Greedy => greedy_cover(&remaining, &uncovered),
            CoverMode::Weighted => weighted_greedy_cover(&remaining, &uncovered, agent, |a, b| {
                path_steps(&query::path(world, a, b))
            }),
            CoverMode::Exact => {
                exact_cover(&remaining, &uncovered, tuning.patrol.exact_cover_limit)
            }
        };

        if cover.is_empty() && !uncovered.is_empty() {
            tracing::warn!(
                uncovered = uncovered.len(),
                mode = ?tuning.patrol.cover,
                "viewpoint cover failed"
            );
            self.viewpoints.clear();
            return false;
        }

        selected.extend(cover);
        self.viewpoints = selected;
        !self.viewpoints.is_empty()
    }

    fn order_route(&mut self, world: &WorldModel, tuning: &AgentTuning) {
        let agent = query::agent(world);
        let distance = |a: Cell, b: Cell| path_steps(&query::path(world, a, b));
        self.route = match tuning.patrol.route {
            RouteMode::NearestNeighbor => {
                let history: Vec<Cell> = self.history.iter().copied().collect();
                nearest_neighbor_route(
                    agent,
                    &self.viewpoints,
                    &history,
                    tuning.patrol.visited_penalty,
                    distance,
                )
            }
            RouteMode::AntColony => ant_colony_route(
                agent,
                &self.viewpoints,
                &tuning.ant_colony,
                &mut self.rng,
                distance,
            ),
        };
        self.index = 0;
    }
}
