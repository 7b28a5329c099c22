//! Undirected adjacency over known floor cells.

use std::collections::{BTreeMap, BTreeSet};

use crate::Cell;

/// Undirected 4-neighbour adjacency graph over known floor cells.
///
/// The graph grows incrementally: inserting a cell links it to every
/// orthogonal neighbour already present. A revision counter is bumped on
/// each structural change so analyses can skip recomputation when nothing
/// moved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FloorGraph {
    adjacency: BTreeMap<Cell, BTreeSet<Cell>>,
    revision: u64,
}

impl FloorGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph by inserting every provided cell.
    #[must_use]
    pub fn from_cells(cells: impl IntoIterator<Item = Cell>) -> Self {
        let mut graph = Self::new();
        for cell in cells {
            let _ = graph.insert(cell);
        }
        graph
    }

    /// Adds a floor cell and connects it to already-known neighbours.
    ///
    /// Returns `false` when the cell was already present.
    pub fn insert(&mut self, cell: Cell) -> bool {
        if self.adjacency.contains_key(&cell) {
            return false;
        }

        let mut links = BTreeSet::new();
        for neighbor in cell.cardinal_neighbors() {
            if let Some(reverse) = self.adjacency.get_mut(&neighbor) {
                let _ = reverse.insert(cell);
                let _ = links.insert(neighbor);
            }
        }
        let _ = self.adjacency.insert(cell, links);
        self.revision = self.revision.wrapping_add(1);
        true
    }

    /// Removes a cell and every edge touching it.
    ///
    /// Returns `false` when the cell was not present.
    pub fn remove(&mut self, cell: Cell) -> bool {
        let Some(links) = self.adjacency.remove(&cell) else {
            return false;
        };
        for neighbor in links {
            if let Some(reverse) = self.adjacency.get_mut(&neighbor) {
                let _ = reverse.remove(&cell);
            }
        }
        self.revision = self.revision.wrapping_add(1);
        true
    }

    /// Reports whether the cell is a node of the graph.
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        self.adjacency.contains_key(&cell)
    }

    /// Neighbours of the cell in cell order. Unknown cells have none.
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        self.adjacency
            .get(&cell)
            .into_iter()
            .flat_map(|links| links.iter().copied())
    }

    /// Number of edges touching the cell.
    #[must_use]
    pub fn degree(&self, cell: Cell) -> usize {
        self.adjacency.get(&cell).map_or(0, BTreeSet::len)
    }

    /// Iterates every node in cell order.
    pub fn nodes(&self) -> impl Iterator<Item = Cell> + '_ {
        self.adjacency.keys().copied()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Reports whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Counter bumped on every insertion or removal.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }
}
