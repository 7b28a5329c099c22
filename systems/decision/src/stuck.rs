use std::collections::VecDeque;

use gemrunner_core::{Cell, StuckTuning};

/// What the stall window says about the agent's current cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Verdict {
    Moving,
    Follow,
    Replan,
}

/// Rolling window of cells the agent committed a move from.
#[derive(Clone, Debug, Default)]
pub(crate) struct StuckMonitor {
    recent: VecDeque<Cell>,
    following_for: u32,
}

impl StuckMonitor {
    pub(crate) fn assess(&self, agent: Cell, tuning: &StuckTuning) -> Verdict {
        let repeats = self.recent.iter().filter(|&&cell| cell == agent).count();
        if repeats >= tuning.replan_threshold {
            Verdict::Replan
        } else if repeats >= tuning.follow_threshold {
            Verdict::Follow
        } else {
            Verdict::Moving
        }
    }

    /// Counts one more tick spent replaying the previous path. Returns
    /// `false` once the limit is spent.
    pub(crate) fn take_follow(&mut self, tuning: &StuckTuning) -> bool {
        if self.following_for >= tuning.follow_limit {
            return false;
        }
        self.following_for += 1;
        true
    }

    pub(crate) fn settle(&mut self) {
        self.following_for = 0;
    }

    pub(crate) fn record_move(&mut self, from: Cell, tuning: &StuckTuning) {
        self.recent.push_back(from);
        while self.recent.len() > tuning.window {
            let _ = self.recent.pop_front();
        }
    }

    pub(crate) fn clear(&mut self) {
        self.recent.clear();
        self.following_for = 0;
    }
}
