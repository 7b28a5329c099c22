//! Drives one game: observation lines in, move lines out.

use std::io::{BufRead, Write};

use anyhow::Context;
use gemrunner_core::{AgentTuning, Move};
use gemrunner_system_decision::Agent;

use crate::protocol::{ProtocolError, WireObservation};

/// Counters reported when the input closes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Lines answered with a move.
    pub moves: usize,
    /// Lines rejected without a move.
    pub rejected: usize,
}

/// Protocol state for a single game.
#[derive(Debug)]
pub struct Session {
    tuning: AgentTuning,
    agent: Option<Agent>,
}

impl Session {
    /// Creates a session that builds its agent from the first line.
    #[must_use]
    pub fn new(tuning: AgentTuning) -> Self {
        Self {
            tuning,
            agent: None,
        }
    }

    /// Agent created from the first configured line, if any.
    #[must_use]
    pub fn agent(&self) -> Option<&Agent> {
        self.agent.as_ref()
    }

    /// Handles one observation line and returns the move to send.
    pub fn handle_line(&mut self, line: &str) -> Result<Move, ProtocolError> {
        let wire = WireObservation::parse(line)?;
        if self.agent.is_none() {
            let config = wire.config.clone().ok_or(ProtocolError::MissingConfig)?;
            tracing::info!(
                width = config.width,
                height = config.height,
                vis_radius = config.vis_radius,
                seed = config.bot_seed,
                "game configured"
            );
            self.agent = Some(Agent::new(config, self.tuning.clone()));
        }
        let Some(agent) = self.agent.as_mut() else {
            return Err(ProtocolError::MissingConfig);
        };

        let decision = agent.tick(&wire.into_observation())?;
        Ok(decision.mv)
    }

    /// Answers every line of `input` on `output` until the input closes.
    ///
    /// Malformed lines are logged and skipped; I/O failures end the session.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: R,
        mut output: W,
    ) -> anyhow::Result<SessionSummary> {
        let mut summary = SessionSummary::default();
        for (number, line) in input.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read input line {}", number + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            match self.handle_line(&line) {
                Ok(mv) => {
                    writeln!(output, "{mv}").context("failed to write move")?;
                    output.flush().context("failed to flush move")?;
                    summary.moves += 1;
                }
                Err(error) => {
                    tracing::error!(line = number + 1, %error, "no move emitted");
                    summary.rejected += 1;
                }
            }
        }
        Ok(summary)
    }
}
