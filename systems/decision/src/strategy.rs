//! Candidate generation, scoring and tie-breaking.
//!
//! A [`LocalStrategy`] is a plain value: three tags naming the planner,
//! evaluator and tie-breaker to run. The state machine builds one per tick.

use std::{cmp::Ordering, collections::BTreeSet};

use gemrunner_core::{AgentTuning, Cell, ForbiddenSet};
use gemrunner_system_coverage::CoverageScheduler;
use gemrunner_system_topology::TopologySummary;
use gemrunner_world::{navigation::path_steps, query, WorldModel};

/// Cost of reaching a candidate. Lower is better and every finite score
/// beats [`Score::Unreachable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Score {
    /// Discounted number of steps to the candidate.
    Finite(i64),
    /// No path exists.
    Unreachable,
}

impl Score {
    fn from_path(path: &[Cell]) -> Self {
        path_steps(path).map_or(Self::Unreachable, |steps| Self::Finite(i64::from(steps)))
    }

    fn discounted(self, discount: u32) -> Self {
        match self {
            Self::Finite(steps) => Self::Finite(steps - i64::from(discount)),
            Self::Unreachable => Self::Unreachable,
        }
    }
}

/// Produces the targets a strategy considers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlannerKind {
    /// The nearest reachable gems.
    ReachableGems,
    /// First gem of the best collection order over the nearest gems.
    GemRoute,
    /// Sticky exploration target or the nearest frontier cells.
    Frontier,
    /// Current patrol viewpoint, falling back to the oldest floor cell.
    CoverageRoute,
    /// Known floor cell that has gone unobserved the longest.
    OldestFloor,
    /// Known floor cell most likely to have spawned a gem since the last
    /// capture.
    SpawnLikelihood,
}

/// Scores a single candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvaluatorKind {
    /// Shortest path steps around known walls.
    PathLength,
    /// Path length with adversarial play against an adjacent rival.
    Blocking,
}

/// Reduces scored candidates to the winner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TieBreaker {
    /// Lowest finite score, ties resolved by cell order.
    LowestScore,
}

/// Planner, evaluator and tie-breaker composed into one decision step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalStrategy {
    /// Candidate source.
    pub planner: PlannerKind,
    /// Candidate scoring.
    pub evaluator: EvaluatorKind,
    /// Winner selection.
    pub tie_breaker: TieBreaker,
}

/// Everything a strategy reads, plus the patrol scheduler it may advance.
#[derive(Debug)]
pub struct PlanContext<'a> {
    /// Current world knowledge.
    pub world: &'a WorldModel,
    /// Structural analysis of the known floor.
    pub topology: &'a TopologySummary,
    /// Agent tuning.
    pub tuning: &'a AgentTuning,
    /// Patrol route state.
    pub coverage: &'a mut CoverageScheduler,
    /// Exploration target kept from earlier ticks, if any.
    pub explore_target: Option<Cell>,
    /// Tick of the most recent gem capture.
    pub gem_captured_tick: u64,
}

/// Winning candidate with the path that reaches it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Choice {
    /// Cell the strategy is heading for.
    pub target: Cell,
    /// Path from the agent, starting at its own cell.
    pub path: Vec<Cell>,
    /// Score the evaluator assigned.
    pub score: Score,
}

impl LocalStrategy {
    /// Runs planner, evaluator and tie-breaker. `None` means no candidate
    /// is reachable.
    pub fn run(&self, context: &mut PlanContext<'_>) -> Option<Choice> {
        let candidates = plan(self.planner, context);
        let scored: Vec<Choice> = candidates
            .into_iter()
            .map(|target| {
                let (path, score) = evaluate(self.evaluator, context, target);
                Choice {
                    target,
                    path,
                    score,
                }
            })
            .collect();
        match self.tie_breaker {
            TieBreaker::LowestScore => lowest_score(scored),
        }
    }
}

fn lowest_score(scored: Vec<Choice>) -> Option<Choice> {
    scored
        .into_iter()
        .filter(|choice| choice.score != Score::Unreachable)
        .min_by(|a, b| (a.score, a.target).cmp(&(b.score, b.target)))
}

/// Targets produced by `planner`, in no particular order.
pub fn plan(planner: PlannerKind, context: &mut PlanContext<'_>) -> Vec<Cell> {
    let world = context.world;
    match planner {
        PlannerKind::ReachableGems => {
            nearest_reachable_gems(world, context.tuning.gems.candidate_limit)
        }
        PlannerKind::GemRoute => best_gem_order(world, context.tuning.gems.route_limit)
            .into_iter()
            .take(1)
            .collect(),
        PlannerKind::Frontier => frontier_candidates(
            world,
            context.explore_target,
            context.tuning.explore.candidate_limit,
        ),
        PlannerKind::CoverageRoute => {
            match context
                .coverage
                .target(world, context.topology, context.tuning)
            {
                Some(target) => vec![target],
                None => {
                    tracing::debug!("patrol route unavailable, falling back to oldest floor");
                    query::oldest_floor(world).into_iter().collect()
                }
            }
        }
        PlannerKind::OldestFloor => query::oldest_floor(world).into_iter().collect(),
        PlannerKind::SpawnLikelihood => {
            likeliest_spawn(world, context.gem_captured_tick).into_iter().collect()
        }
    }
}

/// Path and score for `target` under `evaluator`.
pub fn evaluate(
    evaluator: EvaluatorKind,
    context: &PlanContext<'_>,
    target: Cell,
) -> (Vec<Cell>, Score) {
    let world = context.world;
    let agent = query::agent(world);
    match evaluator {
        EvaluatorKind::PathLength => {
            let path = query::path(world, agent, target);
            let score = Score::from_path(&path);
            (path, score)
        }
        EvaluatorKind::Blocking => {
            let close = query::rivals(world)
                .iter()
                .copied()
                .find(|&rival| agent.is_within_one_step(rival));
            match close {
                Some(rival) => {
                    contest(world, rival, target, context.tuning.gems.blocking_discount)
                }
                None => evaluate(EvaluatorKind::PathLength, context, target),
            }
        }
    }
}

/// Plays against a rival one step away that may be racing for `target`.
fn contest(world: &WorldModel, rival: Cell, target: Cell, discount: u32) -> (Vec<Cell>, Score) {
    let agent = query::agent(world);

    if !query::initiative(world) {
        // The rival moves first; stay out of every cell it could step into.
        let forbidden: ForbiddenSet =
            query::wall_snapshot(world).with_extra(rival.cardinal_neighbors());
        let path = query::path_avoiding(world, agent, target, &forbidden);
        let score = Score::from_path(&path);
        return (path, score);
    }

    let own = query::path(world, agent, target);
    let rival_path = query::path(world, rival, target);
    let (Some(own_steps), Some(&block)) = (path_steps(&own), rival_path.get(1)) else {
        return (own, Score::Unreachable);
    };
    if !agent.is_orthogonally_adjacent(block) {
        return (own, Score::Finite(i64::from(own_steps)));
    }

    let from_block = query::path(world, block, target);
    match path_steps(&from_block) {
        Some(block_steps) if block_steps < own_steps => {
            let mut path = Vec::with_capacity(from_block.len() + 1);
            path.push(agent);
            path.extend(from_block);
            let score = Score::from_path(&path).discounted(discount);
            tracing::debug!(%rival, %block, goal = %target, "stepping into the rival's path");
            (path, score)
        }
        _ => (own, Score::Finite(i64::from(own_steps))),
    }
}

fn nearest_reachable_gems(world: &WorldModel, limit: usize) -> Vec<Cell> {
    let mut gems: Vec<(u32, Cell)> = query::reachable_gems(world)
        .filter_map(|(cell, gem)| gem.distance_to_agent.map(|steps| (steps, cell)))
        .collect();
    gems.sort_unstable();
    gems.into_iter().take(limit).map(|(_, cell)| cell).collect()
}

/// Collection order over the nearest `limit` reachable gems.
///
/// Orders that would arrive at a gem after it expires are cut at that gem.
/// The best order collects the most gems, then leaves the most lifetime
/// remaining summed over the collected gems, then compares cells
/// lexicographically.
#[must_use]
pub fn best_gem_order(world: &WorldModel, limit: usize) -> Vec<Cell> {
    let agent = query::agent(world);
    let gems: Vec<(Cell, u32)> = {
        let mut nearest: Vec<(u32, Cell, u32)> = query::reachable_gems(world)
            .filter_map(|(cell, gem)| {
                gem.distance_to_agent
                    .map(|steps| (steps, cell, gem.lifetime))
            })
            .collect();
        nearest.sort_unstable();
        nearest
            .into_iter()
            .take(limit)
            .map(|(_, cell, lifetime)| (cell, lifetime))
            .collect()
    };
    if gems.is_empty() {
        return Vec::new();
    }

    // Row 0 holds distances from the agent, row i + 1 from gem i.
    let stops: Vec<Cell> = std::iter::once(agent)
        .chain(gems.iter().map(|&(cell, _)| cell))
        .collect();
    let legs: Vec<Vec<Option<u32>>> = stops
        .iter()
        .map(|&from| {
            gems.iter()
                .map(|&(to, _)| path_steps(&query::path(world, from, to)))
                .collect()
        })
        .collect();

    let mut search = OrderSearch {
        gems: &gems,
        legs: &legs,
        order: Vec::with_capacity(gems.len()),
        used: vec![false; gems.len()],
        best: Vec::new(),
        best_rank: (0, 0),
    };
    search.extend(0, 0, 0);
    search.best.into_iter().map(|index| gems[index].0).collect()
}

struct OrderSearch<'a> {
    gems: &'a [(Cell, u32)],
    legs: &'a [Vec<Option<u32>>],
    order: Vec<usize>,
    used: Vec<bool>,
    best: Vec<usize>,
    best_rank: (usize, u64),
}

impl OrderSearch<'_> {
    fn extend(&mut self, row: usize, elapsed: u32, remaining: u64) {
        let rank = (self.order.len(), remaining);
        if self.is_better(rank) {
            self.best = self.order.clone();
            self.best_rank = rank;
        }

        for next in 0..self.gems.len() {
            if self.used[next] {
                continue;
            }
            let Some(leg) = self.legs[row][next] else {
                continue;
            };
            let arrival = elapsed.saturating_add(leg);
            let lifetime = self.gems[next].1;
            if arrival > lifetime {
                continue;
            }
            self.used[next] = true;
            self.order.push(next);
            self.extend(next + 1, arrival, remaining + u64::from(lifetime - arrival));
            let _ = self.order.pop();
            self.used[next] = false;
        }
    }

    fn is_better(&self, rank: (usize, u64)) -> bool {
        match rank.cmp(&self.best_rank) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => {
                let cells = |order: &[usize]| -> Vec<Cell> {
                    order.iter().map(|&index| self.gems[index].0).collect()
                };
                !self.order.is_empty() && cells(&self.order) < cells(&self.best)
            }
        }
    }
}

/// Frontier candidates are limited to cells the agent can walk to, so a
/// glimpsed but sealed pocket never crowds out a reachable target.
fn frontier_candidates(world: &WorldModel, sticky: Option<Cell>, limit: usize) -> Vec<Cell> {
    let frontier: BTreeSet<Cell> = query::reachable_frontier(world);
    if let Some(target) = sticky.filter(|target| frontier.contains(target)) {
        return vec![target];
    }
    let agent = query::agent(world);
    let mut nearest: Vec<(u32, Cell)> = frontier
        .into_iter()
        .map(|cell| (agent.manhattan_distance(cell), cell))
        .collect();
    nearest.sort_unstable();
    nearest.into_iter().take(limit).map(|(_, cell)| cell).collect()
}

/// Reachable known floor cell, other than the agent's own, most likely to
/// hold a gem spawned since `captured_tick`.
///
/// Each cell scores `(1 - (1 - rate)^unseen) / (1 + seen)`, where `seen` is
/// how many ticks after the capture the cell was last observed and `unseen`
/// is the number of ticks since the capture it has gone unobserved. Ties
/// resolve towards the smaller cell.
#[must_use]
pub fn likeliest_spawn(world: &WorldModel, captured_tick: u64) -> Option<Cell> {
    let tick = query::tick(world)?;
    let rate = query::config(world).gem_spawn_rate;
    let since_capture = tick.saturating_sub(captured_tick);
    let agent = query::agent(world);
    let reachable = query::reachable_cells(world);

    query::known_floor(world)
        .iter()
        .filter(|(cell, _)| **cell != agent && reachable.contains(cell))
        .map(|(&cell, record)| {
            let seen = record.last_seen.saturating_sub(captured_tick);
            let unseen = since_capture.saturating_sub(seen);
            let probability = if unseen > 0 {
                let exponent = i32::try_from(unseen).unwrap_or(i32::MAX);
                1.0 - (1.0 - rate).powi(exponent)
            } else {
                0.0
            };
            (cell, probability / (1.0 + seen as f64))
        })
        .fold(None, |best: Option<(Cell, f64)>, (cell, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((cell, score)),
        })
        .map(|(cell, _)| cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemrunner_core::{GameConfig, Observation, VisibleGem};
    use gemrunner_system_topology::analyze;
    use gemrunner_world::apply;

    /// Open `width` x 1 corridor with everything visible from the agent.
    fn corridor(width: i32, agent: i32, gems: Vec<VisibleGem>) -> WorldModel {
        let config = GameConfig::new(width as u32, 1);
        let mut world = WorldModel::new(config, &AgentTuning::default().paths);
        let observation = Observation {
            tick: 0,
            agent: Cell::new(agent, 0),
            floor: (0..width).map(|x| Cell::new(x, 0)).collect(),
            gems,
            ..Observation::default()
        };
        let _ = apply(&mut world, &observation).expect("valid observation");
        world
    }

    fn run(strategy: LocalStrategy, world: &WorldModel) -> Option<Choice> {
        let topology = analyze(query::floor_graph(world));
        let tuning = AgentTuning::default();
        let mut coverage = CoverageScheduler::new(0);
        let mut context = PlanContext {
            world,
            topology: &topology,
            tuning: &tuning,
            coverage: &mut coverage,
            explore_target: None,
            gem_captured_tick: 0,
        };
        strategy.run(&mut context)
    }

    #[test]
    fn unreachable_sorts_after_every_finite_score() {
        assert!(Score::Finite(i64::MAX) < Score::Unreachable);
        assert!(Score::Finite(-3) < Score::Finite(0));
    }

    #[test]
    fn nearest_gem_wins_with_path_length() {
        let world = corridor(
            9,
            4,
            vec![VisibleGem::new(Cell::new(0, 0), 20), VisibleGem::new(Cell::new(7, 0), 20)],
        );
        let strategy = LocalStrategy {
            planner: PlannerKind::ReachableGems,
            evaluator: EvaluatorKind::PathLength,
            tie_breaker: TieBreaker::LowestScore,
        };

        let choice = run(strategy, &world).expect("both gems are reachable");
        assert_eq!(choice.target, Cell::new(7, 0));
        assert_eq!(choice.score, Score::Finite(3));
        assert_eq!(choice.path.first(), Some(&Cell::new(4, 0)));
    }

    #[test]
    fn equal_scores_resolve_by_cell_order() {
        let world = corridor(
            9,
            4,
            vec![VisibleGem::new(Cell::new(2, 0), 20), VisibleGem::new(Cell::new(6, 0), 20)],
        );
        let strategy = LocalStrategy {
            planner: PlannerKind::ReachableGems,
            evaluator: EvaluatorKind::PathLength,
            tie_breaker: TieBreaker::LowestScore,
        };
        assert_eq!(run(strategy, &world).map(|choice| choice.target), Some(Cell::new(2, 0)));
    }

    #[test]
    fn gem_order_saves_the_short_lived_gem_first() {
        // The far gem lives long enough to be collected second, the near
        // one would expire if left for later.
        let world = corridor(
            12,
            5,
            vec![VisibleGem::new(Cell::new(3, 0), 20), VisibleGem::new(Cell::new(8, 0), 3)],
        );
        assert_eq!(
            best_gem_order(&world, 4),
            vec![Cell::new(8, 0), Cell::new(3, 0)]
        );
    }

    #[test]
    fn gem_order_drops_gems_that_cannot_all_be_saved() {
        // Both gems expire in two ticks on opposite sides of the agent.
        let world = corridor(
            9,
            4,
            vec![VisibleGem::new(Cell::new(2, 0), 2), VisibleGem::new(Cell::new(6, 0), 2)],
        );
        assert_eq!(best_gem_order(&world, 4), vec![Cell::new(2, 0)]);
    }

    #[test]
    fn spawn_likelihood_prefers_cells_unseen_since_capture() {
        let config = GameConfig {
            gem_spawn_rate: 0.1,
            ..GameConfig::new(6, 1)
        };
        let mut world = WorldModel::new(config, &AgentTuning::default().paths);
        let seen_early = Observation {
            tick: 0,
            agent: Cell::new(0, 0),
            floor: (0..6).map(|x| Cell::new(x, 0)).collect(),
            ..Observation::default()
        };
        let seen_late = Observation {
            tick: 10,
            agent: Cell::new(1, 0),
            floor: (0..3).map(|x| Cell::new(x, 0)).collect(),
            ..Observation::default()
        };
        let _ = apply(&mut world, &seen_early).expect("valid observation");
        let _ = apply(&mut world, &seen_late).expect("valid observation");

        assert_eq!(likeliest_spawn(&world, 0), Some(Cell::new(3, 0)));
    }

    #[test]
    fn spawn_likelihood_ignores_sealed_floor() {
        let config = GameConfig {
            gem_spawn_rate: 0.1,
            ..GameConfig::new(3, 3)
        };
        let mut world = WorldModel::new(config, &AgentTuning::default().paths);
        let revealed = Observation {
            tick: 0,
            agent: Cell::new(0, 0),
            walls: (0..3)
                .map(|x| Cell::new(x, 1))
                .chain([Cell::new(0, 2), Cell::new(2, 2)])
                .collect(),
            floor: vec![Cell::new(0, 0), Cell::new(1, 0), Cell::new(2, 0), Cell::new(1, 2)],
            ..Observation::default()
        };
        let corridor_only = Observation {
            tick: 10,
            agent: Cell::new(0, 0),
            floor: (0..3).map(|x| Cell::new(x, 0)).collect(),
            ..Observation::default()
        };
        let _ = apply(&mut world, &revealed).expect("valid observation");
        let _ = apply(&mut world, &corridor_only).expect("valid observation");

        assert_eq!(likeliest_spawn(&world, 0), Some(Cell::new(1, 0)));
    }
}
