//! Proximity clustering ("swarm" detection).
//!
//! Two points are linked when their distance is strictly below the radius; a
//! cluster is a connected component of that graph, so chains of close points
//! merge even if their ends are far apart. Labels are dense, start at zero and
//! are handed out in order of each component's lowest index.

use crate::Point;
use hashbag::HashBag;
use std::collections::HashMap;

/// Connected components under an arbitrary distance function.
///
/// Walks the unlabeled indices in order and floods each component with a
/// depth-first traversal. Every frontier point is compared against all points,
/// which is quadratic; fine for a few hundred agents.
pub fn detect_with<F>(len: usize, radius: f64, distance: F) -> Vec<usize>
where
    F: Fn(usize, usize) -> f64,
{
    let mut labels: Vec<Option<usize>> = vec![None; len];
    let mut next_label = 0;
    for start in 0..len {
        if labels[start].is_some() {
            continue;
        }
        labels[start] = Some(next_label);
        let mut stack = vec![start];
        while let Some(j) = stack.pop() {
            for k in 0..len {
                if labels[k].is_none() && distance(j, k) < radius {
                    labels[k] = Some(next_label);
                    stack.push(k);
                }
            }
        }
        next_label += 1;
    }
    labels.into_iter().map(|l| l.unwrap_or_default()).collect()
}

/// Euclidean clustering of `positions`.
pub fn detect(positions: &[Point], radius: f64) -> Vec<usize> {
    detect_with(positions.len(), radius, |a, b| {
        positions[a].distance(&positions[b])
    })
}

/// Same result as [`detect`], with candidates looked up in a uniform grid of
/// cell size `radius` instead of scanning every point.
pub fn detect_bucketed(positions: &[Point], radius: f64) -> Vec<usize> {
    if !(radius > 0.0) || !radius.is_finite() {
        return (0..positions.len()).collect();
    }
    let key = |p: &Point| {
        (
            (p.x / radius).floor() as i64,
            (p.y / radius).floor() as i64,
        )
    };
    let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (idx, p) in positions.iter().enumerate() {
        buckets.entry(key(p)).or_default().push(idx);
    }

    let mut labels: Vec<Option<usize>> = vec![None; positions.len()];
    let mut next_label = 0;
    for start in 0..positions.len() {
        if labels[start].is_some() {
            continue;
        }
        labels[start] = Some(next_label);
        let mut stack = vec![start];
        while let Some(j) = stack.pop() {
            let (cx, cy) = key(&positions[j]);
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let candidates = match buckets.get(&(cx + dx, cy + dy)) {
                        None => continue,
                        Some(c) => c,
                    };
                    for &k in candidates {
                        if labels[k].is_none() && positions[j].distance(&positions[k]) < radius {
                            labels[k] = Some(next_label);
                            stack.push(k);
                        }
                    }
                }
            }
        }
        next_label += 1;
    }
    labels.into_iter().map(|l| l.unwrap_or_default()).collect()
}

/// Number of distinct clusters in a label vector produced by this module.
pub fn cluster_count(labels: &[usize]) -> usize {
    labels.iter().max().map_or(0, |m| m + 1)
}

/// Multiset of labels; `contains(&label)` is the size of that cluster.
pub fn cluster_sizes(labels: &[usize]) -> HashBag<usize> {
    labels.iter().copied().collect()
}

/// Member indices of each cluster, indexed by label.
pub fn group(labels: &[usize]) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); cluster_count(labels)];
    for (idx, label) in labels.iter().enumerate() {
        groups[*label].push(idx);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point> {
        raw.iter().map(|p| Point::from(*p)).collect()
    }

    fn partition(positions: &[Point], labels: &[usize]) -> BTreeSet<Vec<(i64, i64)>> {
        group(labels)
            .into_iter()
            .map(|members| {
                let mut ps: Vec<_> = members
                    .iter()
                    .map(|i| ((positions[*i].x * 1e6) as i64, (positions[*i].y * 1e6) as i64))
                    .collect();
                ps.sort_unstable();
                ps
            })
            .collect()
    }

    #[test]
    fn separated_pair_and_loner() {
        let labels = detect(&pts(&[(0., 0.), (1., 0.), (10., 10.)]), 2.0);
        assert_eq!(labels, vec![0, 0, 1]);
        assert_eq!(cluster_count(&labels), 2);
    }

    #[test]
    fn chains_are_transitive() {
        let labels = detect(&pts(&[(0., 0.), (1., 0.), (2., 0.)]), 1.5);
        assert_eq!(labels, vec![0, 0, 0]);
        // the ends alone are too far apart
        let ends = detect(&pts(&[(0., 0.), (2., 0.)]), 1.5);
        assert_eq!(ends, vec![0, 1]);
    }

    #[test]
    fn distance_equal_to_radius_does_not_link() {
        assert_eq!(detect(&pts(&[(0., 0.), (1., 0.)]), 1.0), vec![0, 1]);
    }

    #[test]
    fn labels_follow_first_discovery() {
        let labels = detect(&pts(&[(50., 50.), (0., 0.), (50.5, 50.), (0.5, 0.)]), 1.0);
        assert_eq!(labels, vec![0, 1, 0, 1]);
        let sizes = cluster_sizes(&labels);
        assert_eq!(sizes.contains(&0), 2);
        assert_eq!(sizes.contains(&1), 2);
        assert_eq!(sizes.set_len(), 2);
    }

    #[test]
    fn empty_and_degenerate_radius() {
        assert!(detect(&[], 1.0).is_empty());
        assert_eq!(cluster_count(&[]), 0);
        let same = pts(&[(1., 1.), (1., 1.)]);
        assert_eq!(detect(&same, 0.0), vec![0, 1]);
        assert_eq!(detect_bucketed(&same, 0.0), vec![0, 1]);
        assert_eq!(detect(&same, 0.1), vec![0, 0]);
    }

    #[test]
    fn partition_is_order_independent() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut positions: Vec<Point> = (0..120)
            .map(|_| Point::new(rng.gen_range(0.0..40.0), rng.gen_range(0.0..40.0)))
            .collect();
        let reference = partition(&positions, &detect(&positions, 3.0));
        for _ in 0..5 {
            positions.shuffle(&mut rng);
            assert_eq!(partition(&positions, &detect(&positions, 3.0)), reference);
        }
    }

    #[test]
    fn bucketed_matches_brute_force() {
        let mut rng = SmallRng::seed_from_u64(42);
        for radius in [0.5, 2.0, 5.0] {
            let positions: Vec<Point> = (0..300)
                .map(|_| Point::new(rng.gen_range(-20.0..60.0), rng.gen_range(0.0..50.0)))
                .collect();
            assert_eq!(
                detect_bucketed(&positions, radius),
                detect(&positions, radius)
            );
        }
    }
}
