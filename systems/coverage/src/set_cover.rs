//! Set cover solvers over viewpoint visibility sets.
//!
//! Every solver returns the chosen viewpoints in selection order, or an empty
//! selection when the candidates cannot cover the universe.

use std::collections::{BTreeMap, BTreeSet};

use gemrunner_core::Cell;

/// Largest universe the subset dynamic program will accept regardless of tuning.
pub const MAX_EXACT_UNIVERSE: usize = 20;

/// Choice-table marker for subsets no candidate set can cover.
const NO_CHOICE: u32 = u32::MAX;

/// Repeatedly picks the viewpoint that covers the most uncovered cells.
///
/// Ties resolve towards the smaller viewpoint cell.
#[must_use]
pub fn greedy_cover(
    viewpoints: &BTreeMap<Cell, BTreeSet<Cell>>,
    universe: &BTreeSet<Cell>,
) -> Vec<Cell> {
    let mut uncovered = universe.clone();
    let mut selected = Vec::new();
    let mut remaining: BTreeMap<Cell, &BTreeSet<Cell>> =
        viewpoints.iter().map(|(&cell, seen)| (cell, seen)).collect();

    while !uncovered.is_empty() {
        let best = remaining
            .iter()
            .map(|(&cell, seen)| (cell, seen.intersection(&uncovered).count()))
            .filter(|&(_, gain)| gain > 0)
            .fold(None, |best: Option<(Cell, usize)>, (cell, gain)| match best {
                Some((_, best_gain)) if best_gain >= gain => best,
                _ => Some((cell, gain)),
            });
        let Some((cell, _)) = best else {
            return Vec::new();
        };
        if let Some(seen) = remaining.remove(&cell) {
            for covered in seen {
                let _ = uncovered.remove(covered);
            }
        }
        selected.push(cell);
    }

    selected
}

/// Greedy cover that trades coverage against travel.
///
/// Each candidate scores `uncovered / (1 + distance)` where the distance is
/// measured from the previous pick (initially `start`). Candidates the
/// distance function cannot reach are skipped.
pub fn weighted_greedy_cover<F>(
    viewpoints: &BTreeMap<Cell, BTreeSet<Cell>>,
    universe: &BTreeSet<Cell>,
    start: Cell,
    mut distance: F,
) -> Vec<Cell>
where
    F: FnMut(Cell, Cell) -> Option<u32>,
{
    let mut uncovered = universe.clone();
    let mut selected = Vec::new();
    let mut remaining: BTreeMap<Cell, &BTreeSet<Cell>> =
        viewpoints.iter().map(|(&cell, seen)| (cell, seen)).collect();
    let mut last = start;

    while !uncovered.is_empty() {
        let mut best: Option<(Cell, f64)> = None;
        for (&cell, seen) in &remaining {
            let gain = seen.intersection(&uncovered).count();
            if gain == 0 {
                continue;
            }
            let Some(steps) = distance(last, cell) else {
                continue;
            };
            let score = gain as f64 / (1.0 + f64::from(steps));
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((cell, score));
            }
        }

        let Some((cell, _)) = best else {
            return Vec::new();
        };
        if let Some(seen) = remaining.remove(&cell) {
            for covered in seen {
                let _ = uncovered.remove(covered);
            }
        }
        selected.push(cell);
        last = cell;
    }

    selected
}

/// Minimum-size cover computed by dynamic programming over subsets of the
/// universe.
///
/// Universes larger than `limit` (capped at [`MAX_EXACT_UNIVERSE`]) fall back
/// to [`greedy_cover`].
#[must_use]
pub fn exact_cover(
    viewpoints: &BTreeMap<Cell, BTreeSet<Cell>>,
    universe: &BTreeSet<Cell>,
    limit: usize,
) -> Vec<Cell> {
    let size = universe.len();
    if size > limit.min(MAX_EXACT_UNIVERSE) {
        tracing::debug!(size, limit, "universe too large for exact cover");
        return greedy_cover(viewpoints, universe);
    }

    let bits: BTreeMap<Cell, u32> = universe
        .iter()
        .enumerate()
        .map(|(bit, &cell)| (cell, 1_u32 << bit))
        .collect();

    // One candidate per distinct mask, keeping the smallest cell.
    let mut by_mask: BTreeMap<u32, Cell> = BTreeMap::new();
    for (&cell, seen) in viewpoints {
        let mask = seen
            .iter()
            .filter_map(|covered| bits.get(covered))
            .fold(0, |mask, bit| mask | bit);
        if mask != 0 {
            let _ = by_mask.entry(mask).or_insert(cell);
        }
    }
    let candidates: Vec<(u32, Cell)> = by_mask.into_iter().collect();

    let full = (1_u32 << size) - 1;
    let states = 1_usize << size;
    let mut cost = vec![u32::MAX; states];
    let mut choice = vec![NO_CHOICE; states];
    cost[0] = 0;

    for subset in 1..states {
        let Ok(subset_mask) = u32::try_from(subset) else {
            break;
        };
        for (candidate, &(mask, _)) in candidates.iter().enumerate() {
            if mask & subset_mask == 0 {
                continue;
            }
            let Ok(candidate) = u32::try_from(candidate) else {
                break;
            };
            let rest = (subset_mask & !mask) as usize;
            let Some(total) = cost[rest].checked_add(1) else {
                continue;
            };
            if total < cost[subset] {
                cost[subset] = total;
                choice[subset] = candidate;
            }
        }
    }

    let mut selected = Vec::new();
    let mut subset = full as usize;
    while subset != 0 {
        let Some(&(mask, cell)) = candidates.get(choice[subset] as usize) else {
            return Vec::new();
        };
        selected.push(cell);
        subset &= !(mask as usize);
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(xs: &[i32]) -> BTreeSet<Cell> {
        xs.iter().map(|&x| Cell::new(x, 0)).collect()
    }

    fn sample() -> (BTreeMap<Cell, BTreeSet<Cell>>, BTreeSet<Cell>) {
        // Greedy picks the wide middle set first and needs three picks,
        // the optimum uses the two halves.
        let viewpoints = BTreeMap::from([
            (Cell::new(0, 0), cells(&[0, 1, 2])),
            (Cell::new(5, 0), cells(&[3, 4, 5])),
            (Cell::new(2, 0), cells(&[1, 2, 3, 4])),
        ]);
        (viewpoints, cells(&[0, 1, 2, 3, 4, 5]))
    }

    #[test]
    fn greedy_covers_universe() {
        let (viewpoints, universe) = sample();
        let selected = greedy_cover(&viewpoints, &universe);
        assert_eq!(selected, vec![Cell::new(2, 0), Cell::new(0, 0), Cell::new(5, 0)]);
    }

    #[test]
    fn exact_finds_the_minimum() {
        let (viewpoints, universe) = sample();
        let mut selected = exact_cover(&viewpoints, &universe, 16);
        selected.sort();
        assert_eq!(selected, vec![Cell::new(0, 0), Cell::new(5, 0)]);
    }

    #[test]
    fn exact_falls_back_to_greedy_above_limit() {
        let (viewpoints, universe) = sample();
        assert_eq!(exact_cover(&viewpoints, &universe, 3).len(), 3);
    }

    #[test]
    fn exact_limit_is_capped_whatever_the_tuning() {
        // A 21-cell corridor seen by overlapping windows of three.
        let universe: BTreeSet<Cell> = (0..21).map(|x| Cell::new(x, 0)).collect();
        let viewpoints: BTreeMap<Cell, BTreeSet<Cell>> = (0..21)
            .map(|x| {
                let seen = ((x - 1).max(0)..=(x + 1).min(20)).collect::<Vec<_>>();
                (Cell::new(x, 0), cells(&seen))
            })
            .collect();

        let selected = exact_cover(&viewpoints, &universe, usize::MAX);
        assert_eq!(selected, greedy_cover(&viewpoints, &universe));
        assert!(MAX_EXACT_UNIVERSE < universe.len());
    }

    #[test]
    fn impossible_cover_is_empty() {
        let (viewpoints, mut universe) = sample();
        let _ = universe.insert(Cell::new(9, 9));
        assert!(greedy_cover(&viewpoints, &universe).is_empty());
        assert!(exact_cover(&viewpoints, &universe, 16).is_empty());
        assert!(weighted_greedy_cover(&viewpoints, &universe, Cell::new(0, 0), |a, b| Some(
            a.manhattan_distance(b)
        ))
        .is_empty());
    }

    #[test]
    fn weighted_prefers_nearby_coverage() {
        let (viewpoints, universe) = sample();
        let selected = weighted_greedy_cover(&viewpoints, &universe, Cell::new(0, 0), |a, b| {
            Some(a.manhattan_distance(b))
        });
        // Plain greedy opens with the wide middle set; the distance weight
        // keeps the first pick at the start instead.
        assert_eq!(
            selected,
            vec![Cell::new(0, 0), Cell::new(2, 0), Cell::new(5, 0)]
        );
    }
}
