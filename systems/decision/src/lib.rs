#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Behaviour selection and move commitment for a Gemrunner agent.
//!
//! [`DecisionEngine`] picks a behaviour each tick, runs the matching
//! [`LocalStrategy`] and commits a single move. [`Agent`] owns the world
//! model and every analysis system and drives them in order.

use gemrunner_core::{
    AgentTuning, BehaviourState, Cell, Diagnostics, GameConfig, GemPlannerMode, Move,
    Observation, ObservationError, PatrolMode,
};
use gemrunner_system_coverage::CoverageScheduler;
use gemrunner_system_topology::{Topology, TopologySummary};
use gemrunner_world::{apply, query, WorldModel};

mod strategy;
mod stuck;

pub use strategy::{
    best_gem_order, evaluate, likeliest_spawn, plan, Choice, EvaluatorKind, LocalStrategy,
    PlanContext, PlannerKind, Score, TieBreaker,
};

use stuck::{StuckMonitor, Verdict};

/// Outcome of one decision pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// Move to send this tick.
    pub mv: Move,
    /// Behaviour that produced the move.
    pub state: BehaviourState,
    /// Cell the agent is heading for, if any.
    pub target: Option<Cell>,
    /// Committed path starting at the agent's cell.
    pub path: Vec<Cell>,
    /// Cell sets for debug rendering.
    pub diagnostics: Diagnostics,
}

/// Behaviour state machine with the memory it carries between ticks.
#[derive(Clone, Debug, Default)]
pub struct DecisionEngine {
    state: BehaviourState,
    stuck: StuckMonitor,
    explore_target: Option<Cell>,
    last_path: Vec<Cell>,
    gem_captured_tick: u64,
}

impl DecisionEngine {
    /// Creates an idle engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Behaviour chosen on the latest tick.
    #[must_use]
    pub fn state(&self) -> BehaviourState {
        self.state
    }

    /// Frontier cell the agent is exploring towards.
    #[must_use]
    pub fn explore_target(&self) -> Option<Cell> {
        self.explore_target
    }

    /// Tick in which the agent last stepped onto a gem.
    #[must_use]
    pub fn gem_captured_tick(&self) -> u64 {
        self.gem_captured_tick
    }

    /// Chooses the move for the tick the world model was last updated with.
    pub fn decide(
        &mut self,
        world: &WorldModel,
        topology: &TopologySummary,
        coverage: &mut CoverageScheduler,
        tuning: &AgentTuning,
    ) -> Decision {
        let agent = query::agent(world);
        let mut force_explore = false;

        match self.stuck.assess(agent, &tuning.stuck) {
            Verdict::Replan => {
                self.explore_target = None;
                self.stuck.clear();
                if query::reachable_frontier(world).is_empty() {
                    coverage.force_recompute();
                } else {
                    force_explore = true;
                }
                tracing::debug!(%agent, force_explore, "agent stuck, re-planning");
            }
            Verdict::Follow => {
                if self.stuck.take_follow(&tuning.stuck) {
                    if let Some(path) = self.remaining_path(world) {
                        let target = path.last().copied();
                        self.transition(BehaviourState::Unstucking, coverage);
                        return self.commit(world, topology, coverage, tuning, target, path);
                    }
                }
            }
            Verdict::Moving => self.stuck.settle(),
        }

        let state = if force_explore {
            BehaviourState::Exploring
        } else {
            select_state(world)
        };
        self.transition(state, coverage);

        let strategy = strategy_for(state, tuning);
        let mut context = PlanContext {
            world,
            topology,
            tuning,
            coverage,
            explore_target: self.explore_target,
            gem_captured_tick: self.gem_captured_tick,
        };
        let choice = strategy.run(&mut context);

        match choice {
            Some(choice) => {
                if state == BehaviourState::Exploring {
                    self.explore_target = Some(choice.target);
                }
                self.commit(world, topology, coverage, tuning, Some(choice.target), choice.path)
            }
            None => {
                tracing::debug!(state = state.as_str(), "no reachable candidate, waiting");
                self.commit(world, topology, coverage, tuning, None, Vec::new())
            }
        }
    }

    fn transition(&mut self, state: BehaviourState, coverage: &mut CoverageScheduler) {
        if state == self.state {
            return;
        }
        tracing::debug!(from = self.state.as_str(), to = state.as_str(), "behaviour changed");
        if state == BehaviourState::Patrolling {
            coverage.request_reorder();
        }
        self.state = state;
    }

    /// Tail of the previously committed path from the agent's cell, if it
    /// still leads somewhere over cells not known to be walls.
    fn remaining_path(&self, world: &WorldModel) -> Option<Vec<Cell>> {
        let agent = query::agent(world);
        let position = self.last_path.iter().position(|&cell| cell == agent)?;
        let tail = &self.last_path[position..];
        let walls = query::known_walls(world);
        if tail.len() < 2 || tail.iter().any(|cell| walls.contains_key(cell)) {
            return None;
        }
        Some(tail.to_vec())
    }

    fn commit(
        &mut self,
        world: &WorldModel,
        topology: &TopologySummary,
        coverage: &CoverageScheduler,
        tuning: &AgentTuning,
        target: Option<Cell>,
        path: Vec<Cell>,
    ) -> Decision {
        let agent = query::agent(world);
        let tick = query::tick(world).unwrap_or(0);
        let next = match path.as_slice() {
            [first, next, ..] if *first == agent => Some(*next),
            _ => None,
        };
        let mv = next.map_or(Move::Wait, |next| Move::between(agent, next));

        let path = match next {
            Some(next) if mv != Move::Wait => {
                if query::known_gems(world).contains_key(&next) {
                    self.gem_captured_tick = tick;
                    tracing::debug!(tick, gem = %next, "stepping onto gem");
                }
                self.stuck.record_move(agent, &tuning.stuck);
                self.last_path = path.clone();
                path
            }
            _ => vec![agent],
        };

        tracing::debug!(
            tick,
            state = self.state.as_str(),
            mv = %mv,
            goal = ?target,
            "decision committed"
        );

        Decision {
            mv,
            state: self.state,
            target,
            path: path.clone(),
            diagnostics: Diagnostics {
                path,
                dead_ends: topology.dead_ends.clone(),
                articulation_points: topology.articulation_points.clone(),
                viewpoints: coverage.route().to_vec(),
            },
        }
    }
}

fn select_state(world: &WorldModel) -> BehaviourState {
    if query::reachable_gems(world).next().is_some() {
        BehaviourState::CollectingGem
    } else if !query::cave_revealed(world) && !query::reachable_frontier(world).is_empty() {
        BehaviourState::Exploring
    } else {
        BehaviourState::Patrolling
    }
}

fn strategy_for(state: BehaviourState, tuning: &AgentTuning) -> LocalStrategy {
    let (planner, evaluator) = match state {
        BehaviourState::CollectingGem => {
            let planner = match tuning.gems.planner {
                GemPlannerMode::Nearest => PlannerKind::ReachableGems,
                GemPlannerMode::Route => PlannerKind::GemRoute,
            };
            (planner, EvaluatorKind::Blocking)
        }
        BehaviourState::Exploring => (PlannerKind::Frontier, EvaluatorKind::PathLength),
        BehaviourState::Patrolling | BehaviourState::Idle | BehaviourState::Unstucking => {
            let planner = match tuning.patrol.mode {
                PatrolMode::Coverage => PlannerKind::CoverageRoute,
                PatrolMode::OldestFloor => PlannerKind::OldestFloor,
                PatrolMode::SpawnLikelihood => PlannerKind::SpawnLikelihood,
            };
            (planner, EvaluatorKind::PathLength)
        }
    };
    LocalStrategy {
        planner,
        evaluator,
        tie_breaker: TieBreaker::LowestScore,
    }
}

/// The full per-tick pipeline for one agent.
#[derive(Debug)]
pub struct Agent {
    world: WorldModel,
    topology: Topology,
    coverage: CoverageScheduler,
    engine: DecisionEngine,
    tuning: AgentTuning,
}

impl Agent {
    /// Creates an agent for the announced game. Randomised planning is
    /// seeded from `config.bot_seed`.
    #[must_use]
    pub fn new(config: GameConfig, tuning: AgentTuning) -> Self {
        let seed = config.bot_seed;
        Self {
            world: WorldModel::new(config, &tuning.paths),
            topology: Topology::default(),
            coverage: CoverageScheduler::new(seed),
            engine: DecisionEngine::new(),
            tuning,
        }
    }

    /// Folds in one observation and decides the move for that tick.
    ///
    /// A malformed observation is rejected before any state changes.
    pub fn tick(&mut self, observation: &Observation) -> Result<Decision, ObservationError> {
        let _ = apply(&mut self.world, observation)?;
        let summary = self.topology.refresh(query::floor_graph(&self.world));
        Ok(self
            .engine
            .decide(&self.world, summary, &mut self.coverage, &self.tuning))
    }

    /// Current world knowledge.
    #[must_use]
    pub fn world(&self) -> &WorldModel {
        &self.world
    }

    /// Behaviour state machine.
    #[must_use]
    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Patrol route state.
    #[must_use]
    pub fn coverage(&self) -> &CoverageScheduler {
        &self.coverage
    }

    /// Tuning the agent was created with.
    #[must_use]
    pub fn tuning(&self) -> &AgentTuning {
        &self.tuning
    }
}
