//! Ordering of patrol viewpoints into a route.

use std::collections::BTreeSet;

use gemrunner_core::{AntColonyTuning, Cell};
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};

/// Orders `points` by repeatedly walking to the nearest remaining one.
///
/// Points listed in `history` are charged `penalty` extra steps so recently
/// visited viewpoints drift to the back of the route. Points the distance
/// function cannot reach are left out. Ties resolve towards the smaller cell.
pub fn nearest_neighbor_route<F>(
    start: Cell,
    points: &BTreeSet<Cell>,
    history: &[Cell],
    penalty: u32,
    mut distance: F,
) -> Vec<Cell>
where
    F: FnMut(Cell, Cell) -> Option<u32>,
{
    let mut remaining = points.clone();
    let mut route = Vec::with_capacity(points.len());
    let mut current = start;

    while !remaining.is_empty() {
        let next = remaining
            .iter()
            .filter_map(|&point| {
                let steps = distance(current, point)?;
                let charge = if history.contains(&point) { penalty } else { 0 };
                Some((steps.saturating_add(charge), point))
            })
            .min();
        let Some((_, point)) = next else {
            break;
        };
        let _ = remaining.remove(&point);
        route.push(point);
        current = point;
    }

    route
}

/// Groups targets that lie within `radius` of each other, transitively, and
/// returns one representative per group: the member closest to the group's
/// centroid.
#[must_use]
pub fn cluster_targets(targets: &BTreeSet<Cell>, radius: u32) -> Vec<Cell> {
    let cells: Vec<Cell> = targets.iter().copied().collect();
    let mut parent: Vec<usize> = (0..cells.len()).collect();

    for first in 0..cells.len() {
        for second in first + 1..cells.len() {
            if cells[first].manhattan_distance(cells[second]) <= radius {
                let a = find_root(&mut parent, first);
                let b = find_root(&mut parent, second);
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut groups: Vec<Vec<Cell>> = Vec::new();
    let mut group_of_root: Vec<Option<usize>> = vec![None; cells.len()];
    for index in 0..cells.len() {
        let root = find_root(&mut parent, index);
        let group = match group_of_root[root] {
            Some(group) => group,
            None => {
                groups.push(Vec::new());
                group_of_root[root] = Some(groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[group].push(cells[index]);
    }

    groups.iter().filter_map(|members| representative(members)).collect()
}

fn find_root(parent: &mut [usize], mut node: usize) -> usize {
    while parent[node] != node {
        parent[node] = parent[parent[node]];
        node = parent[node];
    }
    node
}

fn representative(members: &[Cell]) -> Option<Cell> {
    let count = i64::try_from(members.len()).ok()?;
    let sum_x: i64 = members.iter().map(|cell| i64::from(cell.x())).sum();
    let sum_y: i64 = members.iter().map(|cell| i64::from(cell.y())).sum();
    // Distances are scaled by the member count to stay in integers.
    members.iter().copied().min_by_key(|cell| {
        let dx = (i64::from(cell.x()) * count - sum_x).abs();
        let dy = (i64::from(cell.y()) * count - sum_y).abs();
        (dx + dy, *cell)
    })
}

/// Orders `targets` with an ant-colony search for a short closed tour from
/// `start`.
///
/// Targets are first merged into clusters, so the returned route visits one
/// representative per cluster. Representatives unreachable from `start` are
/// dropped. The route excludes `start` itself and the closing return leg.
pub fn ant_colony_route<R, F>(
    start: Cell,
    targets: &BTreeSet<Cell>,
    tuning: &AntColonyTuning,
    rng: &mut R,
    mut distance: F,
) -> Vec<Cell>
where
    R: Rng,
    F: FnMut(Cell, Cell) -> Option<u32>,
{
    let mut nodes = vec![start];
    nodes.extend(
        cluster_targets(targets, tuning.cluster_radius)
            .into_iter()
            .filter(|&target| target != start && distance(start, target).is_some()),
    );
    let count = nodes.len();
    if count <= 2 {
        return nodes.into_iter().skip(1).collect();
    }

    let mut distances = vec![vec![f64::INFINITY; count]; count];
    for (from, row) in distances.iter_mut().enumerate() {
        for (to, slot) in row.iter_mut().enumerate() {
            if from != to {
                if let Some(steps) = distance(nodes[from], nodes[to]) {
                    *slot = f64::from(steps.max(1));
                }
            }
        }
    }

    let mut pheromone = vec![vec![1.0_f64; count]; count];
    let mut best_tour: Vec<usize> = Vec::new();
    let mut best_cost = f64::INFINITY;

    for _ in 0..tuning.iterations {
        let mut tours = Vec::with_capacity(tuning.ants);
        for _ in 0..tuning.ants {
            let (tour, cost) = walk_ant(&pheromone, &distances, tuning, rng);
            if cost < best_cost {
                best_cost = cost;
                best_tour = tour.clone();
            }
            tours.push((tour, cost));
        }

        for row in &mut pheromone {
            for level in row.iter_mut() {
                *level *= 1.0 - tuning.evaporation;
            }
        }
        for (tour, cost) in &tours {
            if !cost.is_finite() || *cost <= 0.0 {
                continue;
            }
            let deposit = tuning.boost / cost;
            for leg in tour.windows(2) {
                pheromone[leg[0]][leg[1]] += deposit;
            }
            if let Some(&last) = tour.last() {
                pheromone[last][0] += deposit;
            }
        }
    }

    tracing::debug!(
        clusters = count - 1,
        targets = targets.len(),
        cost = best_cost,
        "ant colony route optimised"
    );
    best_tour.into_iter().skip(1).map(|node| nodes[node]).collect()
}

/// Builds one tour starting at node zero and returns it with its closed cost.
fn walk_ant<R: Rng>(
    pheromone: &[Vec<f64>],
    distances: &[Vec<f64>],
    tuning: &AntColonyTuning,
    rng: &mut R,
) -> (Vec<usize>, f64) {
    let count = distances.len();
    let mut tour = vec![0];
    let mut unvisited: Vec<usize> = (1..count).collect();
    let mut current = 0;
    let mut cost = 0.0;

    while !unvisited.is_empty() {
        let weights: Vec<f64> = unvisited
            .iter()
            .map(|&next| {
                let heuristic = if distances[current][next].is_finite() {
                    1.0 / distances[current][next]
                } else {
                    0.0
                };
                pheromone[current][next].powf(tuning.alpha) * heuristic.powf(tuning.beta)
            })
            .collect();
        let pick = match WeightedIndex::new(&weights) {
            Ok(sampler) => sampler.sample(rng),
            Err(_) => rng.gen_range(0..unvisited.len()),
        };
        let next = unvisited.swap_remove(pick);
        cost += distances[current][next];
        tour.push(next);
        current = next;
    }

    cost += distances[current][0];
    (tour, cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn manhattan(a: Cell, b: Cell) -> Option<u32> {
        Some(a.manhattan_distance(b))
    }

    #[test]
    fn nearest_neighbor_walks_outward() {
        let points = BTreeSet::from([Cell::new(5, 0), Cell::new(1, 0), Cell::new(3, 0)]);
        let route = nearest_neighbor_route(Cell::new(0, 0), &points, &[], 100, manhattan);
        assert_eq!(route, vec![Cell::new(1, 0), Cell::new(3, 0), Cell::new(5, 0)]);
    }

    #[test]
    fn history_penalty_defers_recent_points() {
        let points = BTreeSet::from([Cell::new(1, 0), Cell::new(3, 0)]);
        let route =
            nearest_neighbor_route(Cell::new(0, 0), &points, &[Cell::new(1, 0)], 100, manhattan);
        assert_eq!(route, vec![Cell::new(3, 0), Cell::new(1, 0)]);
    }

    #[test]
    fn unreachable_points_are_dropped() {
        let points = BTreeSet::from([Cell::new(1, 0), Cell::new(9, 9)]);
        let route = nearest_neighbor_route(Cell::new(0, 0), &points, &[], 100, |a, b| {
            (b != Cell::new(9, 9)).then(|| a.manhattan_distance(b))
        });
        assert_eq!(route, vec![Cell::new(1, 0)]);
    }

    #[test]
    fn clusters_merge_transitively() {
        let targets = BTreeSet::from([
            Cell::new(0, 0),
            Cell::new(3, 0),
            Cell::new(6, 0),
            Cell::new(20, 20),
        ]);
        let representatives = cluster_targets(&targets, 4);
        assert_eq!(representatives, vec![Cell::new(3, 0), Cell::new(20, 20)]);
    }

    #[test]
    fn ant_colony_is_deterministic_for_a_seed() {
        let targets: BTreeSet<Cell> = [(10, 0), (0, 10), (10, 10), (20, 5), (5, 20)]
            .into_iter()
            .map(|(x, y)| Cell::new(x, y))
            .collect();
        let tuning = AntColonyTuning::default();

        let first = ant_colony_route(
            Cell::new(0, 0),
            &targets,
            &tuning,
            &mut ChaCha8Rng::seed_from_u64(7),
            manhattan,
        );
        let second = ant_colony_route(
            Cell::new(0, 0),
            &targets,
            &tuning,
            &mut ChaCha8Rng::seed_from_u64(7),
            manhattan,
        );

        assert_eq!(first, second);
        assert_eq!(first.len(), targets.len());
        assert_eq!(
            first.iter().copied().collect::<BTreeSet<_>>(),
            targets
        );
    }
}
