//! Per-tick observation delivered by the protocol adapter.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::{Cell, GridDimensions};

/// Everything the agent perceives during a single tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    /// Index of the tick this observation belongs to.
    pub tick: u64,
    /// Cell currently occupied by the agent.
    pub agent: Cell,
    /// Wall cells inside the field of view.
    pub walls: Vec<Cell>,
    /// Floor cells inside the field of view.
    pub floor: Vec<Cell>,
    /// Gems inside the field of view.
    pub gems: Vec<VisibleGem>,
    /// Rival agents inside the field of view.
    pub rivals: Vec<Cell>,
    /// Whether the agent moves first this tick.
    pub initiative: bool,
}

impl Observation {
    /// Checks the structural validity of the observation against the grid.
    ///
    /// Every listed cell must lie inside the grid and no cell may be reported
    /// both as a wall and as floor.
    pub fn validate(&self, dimensions: GridDimensions) -> Result<(), ObservationError> {
        let check = |field: &'static str, cell: Cell| {
            if dimensions.contains(cell) {
                Ok(())
            } else {
                Err(ObservationError::OutOfBounds {
                    field,
                    cell,
                    dimensions,
                })
            }
        };

        check("bot", self.agent)?;
        for &wall in &self.walls {
            check("wall", wall)?;
        }
        for &floor in &self.floor {
            check("floor", floor)?;
        }
        for gem in &self.gems {
            check("visible_gems", gem.cell)?;
        }
        for &rival in &self.rivals {
            check("visible_bots", rival)?;
        }

        let walls: BTreeSet<Cell> = self.walls.iter().copied().collect();
        if walls.contains(&self.agent) {
            return Err(ObservationError::ContradictoryCell { cell: self.agent });
        }
        if let Some(&cell) = self.floor.iter().find(|cell| walls.contains(cell)) {
            return Err(ObservationError::ContradictoryCell { cell });
        }

        Ok(())
    }
}

/// Gem reported inside the field of view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibleGem {
    /// Cell holding the gem.
    pub cell: Cell,
    /// Ticks remaining before the gem disappears.
    pub lifetime: u32,
    /// Distance to the agent precomputed by the game, if provided.
    pub distance_to_agent: Option<u32>,
    /// Distances to each visible rival precomputed by the game.
    pub distances_to_rivals: Vec<u32>,
}

impl VisibleGem {
    /// Creates a gem observation without precomputed distances.
    #[must_use]
    pub fn new(cell: Cell, lifetime: u32) -> Self {
        Self {
            cell,
            lifetime,
            distance_to_agent: None,
            distances_to_rivals: Vec::new(),
        }
    }
}

/// Structural problems that make an observation unusable for a tick.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ObservationError {
    /// A listed cell lies outside the configured grid.
    #[error("{field} cell {cell} lies outside the {}x{} grid", dimensions.width(), dimensions.height())]
    OutOfBounds {
        /// Observation field that carried the cell.
        field: &'static str,
        /// Offending cell.
        cell: Cell,
        /// Grid the cell was checked against.
        dimensions: GridDimensions,
    },
    /// A cell was reported as both wall and floor, or the agent stands on a wall.
    #[error("cell {cell} is reported as both wall and walkable")]
    ContradictoryCell {
        /// Offending cell.
        cell: Cell,
    },
    /// The tick index went backwards.
    #[error("tick {current} arrived after tick {previous}")]
    TickRegressed {
        /// Last tick that was processed.
        previous: u64,
        /// Tick carried by the rejected observation.
        current: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation() -> Observation {
        Observation {
            tick: 1,
            agent: Cell::new(0, 0),
            walls: vec![Cell::new(1, 1)],
            floor: vec![Cell::new(0, 0), Cell::new(1, 0)],
            ..Observation::default()
        }
    }

    #[test]
    fn validate_accepts_consistent_observation() {
        assert_eq!(observation().validate(GridDimensions::new(2, 2)), Ok(()));
    }

    #[test]
    fn validate_rejects_out_of_bounds_cells() {
        let mut observation = observation();
        observation.rivals.push(Cell::new(5, 0));
        let error = observation
            .validate(GridDimensions::new(2, 2))
            .expect_err("rival lies outside the grid");
        assert_eq!(
            error,
            ObservationError::OutOfBounds {
                field: "visible_bots",
                cell: Cell::new(5, 0),
                dimensions: GridDimensions::new(2, 2),
            }
        );
        assert_eq!(
            error.to_string(),
            "visible_bots cell (5, 0) lies outside the 2x2 grid"
        );
    }

    #[test]
    fn validate_rejects_cells_listed_as_wall_and_floor() {
        let mut observation = observation();
        observation.floor.push(Cell::new(1, 1));
        assert_eq!(
            observation.validate(GridDimensions::new(2, 2)),
            Err(ObservationError::ContradictoryCell {
                cell: Cell::new(1, 1)
            })
        );
    }
}
