//! Tunable knobs that shape the agent's behaviour.
//!
//! Every struct deserialises with `#[serde(default)]` so a configuration file
//! only needs to list the values it overrides.

use serde::{Deserialize, Serialize};

/// Complete tuning bundle consumed by the decision pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentTuning {
    /// Stall detection and recovery.
    pub stuck: StuckTuning,
    /// Patrol viewpoint scheduling.
    pub patrol: PatrolTuning,
    /// Ant-colony route optimisation.
    pub ant_colony: AntColonyTuning,
    /// Gem collection behaviour.
    pub gems: GemTuning,
    /// Frontier exploration.
    pub explore: ExploreTuning,
    /// Path engine limits.
    pub paths: PathTuning,
}

/// Parameters that control how stalls are detected and resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StuckTuning {
    /// Number of recent positions remembered for stall detection.
    pub window: usize,
    /// Occurrences of the current cell that trigger path following.
    pub follow_threshold: usize,
    /// Occurrences of the current cell that force a full re-plan.
    pub replan_threshold: usize,
    /// Maximum number of consecutive ticks spent following the old path.
    pub follow_limit: u32,
}

impl Default for StuckTuning {
    fn default() -> Self {
        Self {
            window: 12,
            follow_threshold: 3,
            replan_threshold: 6,
            follow_limit: 4,
        }
    }
}

/// Strategy used to select the viewpoint set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverMode {
    /// Pick the viewpoint covering the most uncovered tiles.
    #[default]
    Greedy,
    /// Trade coverage against travel distance from the previous pick.
    Weighted,
    /// Minimum cover through subset dynamic programming.
    Exact,
}

/// Strategy used to order the selected viewpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMode {
    /// Repeatedly walk to the nearest remaining viewpoint.
    #[default]
    NearestNeighbor,
    /// Optimise a closed tour with an ant-colony metaheuristic.
    AntColony,
}

/// Planner used once the cave has been explored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatrolMode {
    /// Follow the coverage viewpoint route.
    #[default]
    Coverage,
    /// Revisit the floor cell that has gone unseen the longest.
    OldestFloor,
    /// Visit the cell where a gem most likely spawned since it was last seen.
    SpawnLikelihood,
}

/// Planner used while collecting gems.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GemPlannerMode {
    /// Consider the nearest reachable gems individually.
    #[default]
    Nearest,
    /// Search collection orders over the nearest reachable gems.
    Route,
}

/// Parameters that drive viewpoint scheduling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatrolTuning {
    /// Planner used while patrolling.
    pub mode: PatrolMode,
    /// Set cover strategy.
    pub cover: CoverMode,
    /// Route ordering strategy.
    pub route: RouteMode,
    /// Ticks between automatic viewpoint recomputations.
    pub recompute_interval: u64,
    /// Number of recently visited viewpoints remembered.
    pub history_len: usize,
    /// Extra distance charged to viewpoints in the visit history.
    pub visited_penalty: u32,
    /// Largest universe handled by the exact cover solver.
    pub exact_cover_limit: usize,
}

impl Default for PatrolTuning {
    fn default() -> Self {
        Self {
            mode: PatrolMode::Coverage,
            cover: CoverMode::Greedy,
            route: RouteMode::NearestNeighbor,
            recompute_interval: 50,
            history_len: 2,
            visited_penalty: 100,
            exact_cover_limit: 16,
        }
    }
}

/// Constants of the ant-colony route optimiser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntColonyTuning {
    /// Ants released per iteration.
    pub ants: usize,
    /// Number of iterations.
    pub iterations: usize,
    /// Pheromone exponent.
    pub alpha: f64,
    /// Inverse-distance exponent.
    pub beta: f64,
    /// Fraction of pheromone that evaporates each iteration.
    pub evaporation: f64,
    /// Pheromone deposited per unit of inverse tour cost.
    pub boost: f64,
    /// Manhattan radius within which targets merge into one cluster.
    pub cluster_radius: u32,
}

impl Default for AntColonyTuning {
    fn default() -> Self {
        Self {
            ants: 10,
            iterations: 50,
            alpha: 1.0,
            beta: 2.0,
            evaporation: 0.5,
            boost: 1.0,
            cluster_radius: 4,
        }
    }
}

/// Parameters for gem collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GemTuning {
    /// Planner used while collecting gems.
    pub planner: GemPlannerMode,
    /// Number of nearest reachable gems offered as candidates.
    pub candidate_limit: usize,
    /// Number of gems considered by the collection order search.
    pub route_limit: usize,
    /// Score bonus applied when blocking a contested gem pays off.
    pub blocking_discount: u32,
}

impl Default for GemTuning {
    fn default() -> Self {
        Self {
            planner: GemPlannerMode::Nearest,
            candidate_limit: 3,
            route_limit: 4,
            blocking_discount: 2,
        }
    }
}

/// Parameters for frontier exploration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExploreTuning {
    /// Number of nearest frontier cells scored each tick.
    pub candidate_limit: usize,
}

impl Default for ExploreTuning {
    fn default() -> Self {
        Self { candidate_limit: 3 }
    }
}

/// Limits applied to the path engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathTuning {
    /// Number of memoised paths kept before the cache is cleared.
    pub cache_capacity: usize,
}

impl Default for PathTuning {
    fn default() -> Self {
        Self {
            cache_capacity: 4096,
        }
    }
}
