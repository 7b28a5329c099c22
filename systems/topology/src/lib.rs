#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Structural analysis of the explored floor graph.
//!
//! Articulation points and bridges come from a single discovery/low-link
//! depth-first search. Dead ends are found by cutting the graph at its
//! articulation points and keeping the regions that hang off at most one of
//! them. Every traversal is iterative.

use std::collections::{BTreeMap, BTreeSet};

use gemrunner_core::{Cell, FloorGraph};

/// Derived structural views over one revision of the floor graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopologySummary {
    /// Cells whose removal disconnects their component.
    pub articulation_points: BTreeSet<Cell>,
    /// Edges whose removal disconnects their component, smaller endpoint first.
    pub bridges: BTreeSet<(Cell, Cell)>,
    /// Degree-one cells inside dead-end regions.
    pub dead_ends: BTreeSet<Cell>,
    /// Regions reachable through at most one articulation point.
    pub rooms: Vec<BTreeSet<Cell>>,
}

/// Caches the summary of the most recently analysed graph revision.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    summary: TopologySummary,
    revision: Option<u64>,
}

impl Topology {
    /// Recomputes the summary unless the graph revision is unchanged.
    pub fn refresh(&mut self, graph: &FloorGraph) -> &TopologySummary {
        if self.revision != Some(graph.revision()) {
            self.summary = analyze(graph);
            self.revision = Some(graph.revision());
            tracing::debug!(
                revision = graph.revision(),
                articulation_points = self.summary.articulation_points.len(),
                bridges = self.summary.bridges.len(),
                dead_ends = self.summary.dead_ends.len(),
                "topology recomputed"
            );
        }
        &self.summary
    }

    /// Summary produced by the latest refresh.
    #[must_use]
    pub fn summary(&self) -> &TopologySummary {
        &self.summary
    }
}

/// Runs every analysis over the graph.
#[must_use]
pub fn analyze(graph: &FloorGraph) -> TopologySummary {
    let (articulation_points, bridges) = low_link(graph);
    let rooms = regions_behind(graph, &articulation_points);
    let dead_ends = degree_one_cells(graph, &rooms);
    TopologySummary {
        articulation_points,
        bridges,
        dead_ends,
        rooms,
    }
}

/// Cells whose removal disconnects their component.
#[must_use]
pub fn articulation_points(graph: &FloorGraph) -> BTreeSet<Cell> {
    low_link(graph).0
}

/// Edges whose removal disconnects their component, smaller endpoint first.
#[must_use]
pub fn bridges(graph: &FloorGraph) -> BTreeSet<(Cell, Cell)> {
    low_link(graph).1
}

/// Degree-one cells inside regions that hang off at most one articulation point.
#[must_use]
pub fn dead_ends(graph: &FloorGraph) -> BTreeSet<Cell> {
    let points = articulation_points(graph);
    degree_one_cells(graph, &regions_behind(graph, &points))
}

/// Regions that hang off at most one articulation point.
#[must_use]
pub fn rooms(graph: &FloorGraph) -> Vec<BTreeSet<Cell>> {
    regions_behind(graph, &articulation_points(graph))
}

struct Indexed {
    cells: Vec<Cell>,
    adjacency: Vec<Vec<usize>>,
}

impl Indexed {
    fn new(graph: &FloorGraph) -> Self {
        let cells: Vec<Cell> = graph.nodes().collect();
        let positions: BTreeMap<Cell, usize> = cells
            .iter()
            .enumerate()
            .map(|(index, &cell)| (cell, index))
            .collect();
        let adjacency = cells
            .iter()
            .map(|&cell| {
                graph
                    .neighbors(cell)
                    .filter_map(|neighbor| positions.get(&neighbor).copied())
                    .collect()
            })
            .collect();
        Self { cells, adjacency }
    }
}

struct Frame {
    node: usize,
    parent: Option<usize>,
    cursor: usize,
}

const UNVISITED: u32 = u32::MAX;

fn low_link(graph: &FloorGraph) -> (BTreeSet<Cell>, BTreeSet<(Cell, Cell)>) {
    let indexed = Indexed::new(graph);
    let count = indexed.cells.len();
    let mut discovery = vec![UNVISITED; count];
    let mut low = vec![0_u32; count];
    let mut timer = 0_u32;
    let mut points = BTreeSet::new();
    let mut bridges = BTreeSet::new();

    for root in 0..count {
        if discovery[root] != UNVISITED {
            continue;
        }
        discovery[root] = timer;
        low[root] = timer;
        timer += 1;
        let mut root_children = 0_usize;
        let mut stack = vec![Frame {
            node: root,
            parent: None,
            cursor: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            let parent = frame.parent;
            let next = indexed.adjacency[node].get(frame.cursor).copied();
            frame.cursor += 1;

            match next {
                Some(next) if Some(next) == parent => {}
                Some(next) if discovery[next] == UNVISITED => {
                    discovery[next] = timer;
                    low[next] = timer;
                    timer += 1;
                    if parent.is_none() {
                        root_children += 1;
                    }
                    stack.push(Frame {
                        node: next,
                        parent: Some(node),
                        cursor: 0,
                    });
                }
                Some(next) => {
                    low[node] = low[node].min(discovery[next]);
                }
                None => {
                    let _ = stack.pop();
                    let Some(parent) = parent else {
                        continue;
                    };
                    low[parent] = low[parent].min(low[node]);
                    if low[node] > discovery[parent] {
                        let (a, b) = (indexed.cells[parent], indexed.cells[node]);
                        let _ = bridges.insert((a.min(b), a.max(b)));
                    }
                    if parent != root && low[node] >= discovery[parent] {
                        let _ = points.insert(indexed.cells[parent]);
                    }
                }
            }
        }

        if root_children > 1 {
            let _ = points.insert(indexed.cells[root]);
        }
    }

    (points, bridges)
}

fn regions_behind(graph: &FloorGraph, cuts: &BTreeSet<Cell>) -> Vec<BTreeSet<Cell>> {
    let mut visited: BTreeSet<Cell> = BTreeSet::new();
    let mut regions = Vec::new();

    for start in graph.nodes() {
        if cuts.contains(&start) || visited.contains(&start) {
            continue;
        }

        let mut region = BTreeSet::new();
        let mut connections = BTreeSet::new();
        let mut stack = vec![start];
        let _ = visited.insert(start);

        while let Some(cell) = stack.pop() {
            let _ = region.insert(cell);
            for neighbor in graph.neighbors(cell) {
                if cuts.contains(&neighbor) {
                    let _ = connections.insert(neighbor);
                } else if visited.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }

        if connections.len() <= 1 {
            regions.push(region);
        }
    }

    regions
}

fn degree_one_cells(graph: &FloorGraph, regions: &[BTreeSet<Cell>]) -> BTreeSet<Cell> {
    regions
        .iter()
        .flatten()
        .copied()
        .filter(|&cell| graph.degree(cell) == 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor(length: i32) -> FloorGraph {
        FloorGraph::from_cells((0..length).map(|x| Cell::new(x, 0)))
    }

    #[test]
    fn three_cell_corridor_has_two_dead_ends_and_one_cut() {
        let summary = analyze(&corridor(3));

        assert_eq!(
            summary.dead_ends,
            BTreeSet::from([Cell::new(0, 0), Cell::new(2, 0)])
        );
        assert_eq!(
            summary.articulation_points,
            BTreeSet::from([Cell::new(1, 0)])
        );
        assert_eq!(summary.bridges.len(), 2);
    }

    #[test]
    fn cycle_has_no_cuts_and_no_dead_ends() {
        let graph = FloorGraph::from_cells([
            Cell::new(0, 0),
            Cell::new(1, 0),
            Cell::new(0, 1),
            Cell::new(1, 1),
        ]);
        let summary = analyze(&graph);

        assert!(summary.articulation_points.is_empty());
        assert!(summary.bridges.is_empty());
        assert!(summary.dead_ends.is_empty());
        assert_eq!(summary.rooms.len(), 1);
    }

    #[test]
    fn bridges_put_smaller_endpoint_first() {
        let graph = FloorGraph::from_cells([Cell::new(1, 0), Cell::new(0, 0)]);
        assert_eq!(
            bridges(&graph),
            BTreeSet::from([(Cell::new(0, 0), Cell::new(1, 0))])
        );
    }

    #[test]
    fn room_behind_single_doorway_is_reported() {
        // 2x2 room at x = 0..2 joined to a corridor running east.
        let mut cells = vec![
            Cell::new(0, 0),
            Cell::new(1, 0),
            Cell::new(0, 1),
            Cell::new(1, 1),
        ];
        cells.extend((2..5).map(|x| Cell::new(x, 0)));
        let graph = FloorGraph::from_cells(cells);
        let summary = analyze(&graph);

        assert!(summary.articulation_points.contains(&Cell::new(1, 0)));
        assert!(summary
            .rooms
            .iter()
            .any(|room| room.contains(&Cell::new(0, 1)) && room.len() == 3));
        assert_eq!(summary.dead_ends, BTreeSet::from([Cell::new(4, 0)]));
    }

    #[test]
    fn topology_skips_unchanged_revisions() {
        let mut graph = corridor(3);
        let mut topology = Topology::default();
        assert_eq!(topology.refresh(&graph).dead_ends.len(), 2);

        let _ = graph.insert(Cell::new(3, 0));
        let summary = topology.refresh(&graph);
        assert!(summary.dead_ends.contains(&Cell::new(3, 0)));
        assert!(summary.articulation_points.contains(&Cell::new(2, 0)));
    }
}
