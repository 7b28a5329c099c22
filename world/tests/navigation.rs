use std::collections::{BTreeSet, VecDeque};

use gemrunner_core::{Cell, ForbiddenSet, GridDimensions};
use gemrunner_world::navigation::{find_path, path_steps, PathCache};
use proptest::prelude::*;

/// Exhaustive reference search used to check path lengths.
fn reference_distance(
    start: Cell,
    goal: Cell,
    forbidden: &BTreeSet<Cell>,
    dimensions: GridDimensions,
) -> Option<usize> {
    let mut seen = BTreeSet::from([start]);
    let mut queue = VecDeque::from([(start, 0_usize)]);
    while let Some((cell, distance)) = queue.pop_front() {
        if cell == goal {
            return Some(distance);
        }
        for neighbor in cell.cardinal_neighbors() {
            if dimensions.contains(neighbor)
                && !forbidden.contains(&neighbor)
                && seen.insert(neighbor)
            {
                queue.push_back((neighbor, distance + 1));
            }
        }
    }
    None
}

fn scenario() -> impl Strategy<Value = (GridDimensions, Cell, Cell, BTreeSet<Cell>)> {
    (2_u32..7, 2_u32..7).prop_flat_map(|(width, height)| {
        let cell = (0..width as i32, 0..height as i32).prop_map(|(x, y)| Cell::new(x, y));
        (
            Just(GridDimensions::new(width, height)),
            cell.clone(),
            cell.clone(),
            proptest::collection::btree_set(cell, 0..12),
        )
    })
}

proptest! {
    #[test]
    fn paths_are_valid_and_minimal((dimensions, start, goal, walls) in scenario()) {
        let mut walls = walls;
        let _ = walls.remove(&start);
        let _ = walls.remove(&goal);
        let forbidden = ForbiddenSet::new(walls.iter().copied());

        let path = find_path(start, goal, &forbidden, dimensions);
        let expected = reference_distance(start, goal, &walls, dimensions);

        match expected {
            None => prop_assert!(path.is_empty()),
            Some(distance) => {
                prop_assert_eq!(path.first().copied(), Some(start));
                prop_assert_eq!(path.last().copied(), Some(goal));
                prop_assert_eq!(path.len(), distance + 1);
                for pair in path.windows(2) {
                    prop_assert!(pair[0].is_orthogonally_adjacent(pair[1]));
                }
                for cell in &path {
                    prop_assert!(dimensions.contains(*cell));
                    prop_assert!(!forbidden.contains(*cell));
                }
            }
        }
    }

    #[test]
    fn cached_paths_agree_in_both_directions((dimensions, start, goal, walls) in scenario()) {
        let forbidden = ForbiddenSet::new(
            walls
                .iter()
                .copied()
                .filter(|cell| *cell != start && *cell != goal),
        );
        let mut cache = PathCache::new(64);

        let forward = cache.find_path(start, goal, &forbidden, dimensions);
        let mut backward = cache.find_path(goal, start, &forbidden, dimensions);
        backward.reverse();

        prop_assert_eq!(path_steps(&forward), path_steps(&backward));
        prop_assert_eq!(forward, backward);
        prop_assert_eq!(cache.len(), 1);
    }
}
