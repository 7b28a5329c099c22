//! Line-oriented JSON wire format spoken with the game server.

use gemrunner_core::{Cell, GameConfig, Observation, ObservationError, VisibleGem};
use serde::Deserialize;
use thiserror::Error;

/// Coordinate pair as sent on the wire.
pub type WireCell = [i32; 2];

fn cell([x, y]: WireCell) -> Cell {
    Cell::new(x, y)
}

/// One observation line.
#[derive(Clone, Debug, Deserialize)]
pub struct WireObservation {
    /// Static game configuration; only present on the first line.
    #[serde(default)]
    pub config: Option<GameConfig>,
    /// Tick index.
    pub tick: u64,
    /// Agent position.
    pub bot: WireCell,
    /// Walls in view.
    pub wall: Vec<WireCell>,
    /// Floor in view.
    pub floor: Vec<WireCell>,
    /// Whether the agent moves first this tick.
    pub initiative: bool,
    /// Gems in view.
    pub visible_gems: Vec<WireGem>,
    /// Rival agents in view.
    #[serde(default)]
    pub visible_bots: Vec<WireBot>,
}

/// Gem entry of an observation line.
#[derive(Clone, Debug, Deserialize)]
pub struct WireGem {
    /// Gem position.
    pub position: WireCell,
    /// Ticks left before the gem expires.
    pub ttl: u32,
    /// Server-computed steps from the agent.
    #[serde(default)]
    pub distance2bot: Option<u32>,
    /// Server-computed steps from each rival.
    #[serde(default)]
    pub distance2enemies: Option<Vec<u32>>,
}

/// Rival entry of an observation line.
#[derive(Clone, Debug, Deserialize)]
pub struct WireBot {
    /// Rival position.
    pub position: WireCell,
}

/// Reasons an input line produces no move.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line is not a well-formed observation object.
    #[error("malformed observation: {0}")]
    Json(#[from] serde_json::Error),
    /// No configuration has been received yet.
    #[error("observation arrived before the game configuration")]
    MissingConfig,
    /// The observation contradicts the grid or earlier ticks.
    #[error("rejected observation: {0}")]
    Observation(#[from] ObservationError),
}

impl WireObservation {
    /// Parses a single input line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Converts the wire form into the core observation.
    #[must_use]
    pub fn into_observation(self) -> Observation {
        Observation {
            tick: self.tick,
            agent: cell(self.bot),
            walls: self.wall.into_iter().map(cell).collect(),
            floor: self.floor.into_iter().map(cell).collect(),
            gems: self
                .visible_gems
                .into_iter()
                .map(|gem| VisibleGem {
                    cell: cell(gem.position),
                    lifetime: gem.ttl,
                    distance_to_agent: gem.distance2bot,
                    distances_to_rivals: gem.distance2enemies.unwrap_or_default(),
                })
                .collect(),
            rivals: self
                .visible_bots
                .into_iter()
                .map(|bot| cell(bot.position))
                .collect(),
            initiative: self.initiative,
        }
    }
}
