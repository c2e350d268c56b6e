//! Reduction of per-edge values onto nodes.
//!
//! Every edge contributes its value to both endpoints. Continuous data takes the
//! arithmetic mean of the contributions, categorical data takes the most frequent
//! one. Nodes without incident edges get zero.

use std::ops::{AddAssign, Div};

/// Values that can be averaged over incident edges.
pub trait Averageable: Copy + Default + AddAssign + Div<f32, Output = Self> {}

impl<T> Averageable for T where T: Copy + Default + AddAssign + Div<f32, Output = T> {}

/// Number of edges incident to each node. A self loop counts twice.
pub fn node_degrees(n_nodes: usize, tails: &[u32], tips: &[u32]) -> Vec<usize> {
    let mut degrees = vec![0; n_nodes];
    for (&tail, &tip) in tails.iter().zip(tips) {
        degrees[tail as usize] += 1;
        degrees[tip as usize] += 1;
    }
    degrees
}

/// Mean of the values of the edges incident to each node.
pub fn node_mean<T: Averageable>(
    n_nodes: usize,
    tails: &[u32],
    tips: &[u32],
    edge_values: &[T],
) -> Vec<T> {
    let mut sums = vec![T::default(); n_nodes];
    let mut counts = vec![0_u32; n_nodes];
    for ((&tail, &tip), &value) in tails.iter().zip(tips).zip(edge_values) {
        sums[tail as usize] += value;
        sums[tip as usize] += value;
        counts[tail as usize] += 1;
        counts[tip as usize] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            if count == 0 {
                T::default()
            } else {
                sum / count as f32
            }
        })
        .collect()
}

/// Most frequent value among the edges incident to each node.
///
/// A value must occur strictly more often than every value seen before it to win,
/// so ties go to the value met first while scanning edges in order (tail before tip).
pub fn node_mode(n_nodes: usize, tails: &[u32], tips: &[u32], edge_values: &[f32]) -> Vec<f32> {
    // (value bits, count) in first-encounter order
    let mut counts: Vec<Vec<(u32, u32)>> = vec![Vec::new(); n_nodes];
    let mut increment = |node: u32, value: f32| {
        let node_counts = &mut counts[node as usize];
        // both zeros are one label
        let bits = if value == 0.0 { 0.0_f32 } else { value }.to_bits();
        match node_counts.iter_mut().find(|(b, _)| *b == bits) {
            Some((_, count)) => *count += 1,
            None => node_counts.push((bits, 1)),
        }
    };

    for ((&tail, &tip), &value) in tails.iter().zip(tips).zip(edge_values) {
        increment(tail, value);
        increment(tip, value);
    }

    counts
        .into_iter()
        .map(|node_counts| {
            let mut best_count = 0;
            let mut best_value = 0.0;
            for (bits, count) in node_counts {
                if count > best_count {
                    best_count = count;
                    best_value = f32::from_bits(bits);
                }
            }
            best_value
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_mean_on_a_path() {
        let means = node_mean(3, &[0, 1], &[1, 2], &[2.0_f32, 4.0]);
        assert_eq!(means, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_isolated_node_gets_zero() {
        let means = node_mean(4, &[0, 1], &[1, 2], &[2.0_f32, 4.0]);
        assert_eq!(means[3], 0.0);
        let modes = node_mode(4, &[0, 1], &[1, 2], &[2.0, 4.0]);
        assert_eq!(modes[3], 0.0);
    }

    #[test]
    fn test_mean_of_colors() {
        let means = node_mean(2, &[0], &[1], &[Vec3::new(0.2, 0.4, 0.6)]);
        assert_eq!(means, vec![Vec3::new(0.2, 0.4, 0.6); 2]);

        let means = node_mean(3, &[0, 1], &[1, 2], &[Vec3::X, Vec3::Y]);
        assert_eq!(means[1], Vec3::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn test_mode_takes_majority() {
        // node 1 sees 7, 7, 3
        let modes = node_mode(4, &[0, 1, 1], &[1, 2, 3], &[7.0, 7.0, 3.0]);
        assert_eq!(modes[1], 7.0);
        assert_eq!(modes[3], 3.0);
    }

    #[test]
    fn test_mode_tie_goes_to_first_encountered() {
        let modes = node_mode(3, &[0, 1], &[1, 2], &[1.0, 2.0]);
        assert_eq!(modes, vec![1.0, 1.0, 2.0]);

        // same edges scanned in the other order
        let modes = node_mode(3, &[1, 0], &[2, 1], &[2.0, 1.0]);
        assert_eq!(modes[1], 2.0);
    }

    #[test]
    fn test_mode_counts_signed_zeros_together() {
        // node 1 sees 5.0, -0.0, 0.0
        let modes = node_mode(4, &[0, 1, 1], &[1, 2, 3], &[5.0, -0.0, 0.0]);
        assert_eq!(modes[1], 0.0);
        assert_eq!(modes[2], 0.0);
    }

    #[test]
    fn test_self_loop_counts_twice() {
        assert_eq!(node_degrees(2, &[0, 0], &[0, 1]), vec![3, 1]);
        let modes = node_mode(2, &[0, 0], &[0, 1], &[5.0, 6.0]);
        assert_eq!(modes[0], 5.0);
    }

    fn graph() -> impl Strategy<Value = (usize, Vec<(u32, u32, f32)>)> {
        (1usize..12).prop_flat_map(|n| {
            let edge = (0..n as u32, 0..n as u32, -100.0_f32..100.0);
            (Just(n), prop::collection::vec(edge, 0..30))
        })
    }

    fn split(edges: &[(u32, u32, f32)]) -> (Vec<u32>, Vec<u32>, Vec<f32>) {
        let tails = edges.iter().map(|e| e.0).collect();
        let tips = edges.iter().map(|e| e.1).collect();
        let values = edges.iter().map(|e| e.2).collect();
        (tails, tips, values)
    }

    proptest! {
        #[test]
        fn prop_mean_is_bounded_by_incident_values((n, edges) in graph()) {
            let (tails, tips, values) = split(&edges);
            let means = node_mean(n, &tails, &tips, &values);
            let degrees = node_degrees(n, &tails, &tips);
            for node in 0..n {
                let incident: Vec<f32> = edges
                    .iter()
                    .filter(|e| e.0 as usize == node || e.1 as usize == node)
                    .map(|e| e.2)
                    .collect();
                if degrees[node] == 0 {
                    prop_assert_eq!(means[node], 0.0);
                } else {
                    let lo = incident.iter().copied().fold(f32::INFINITY, f32::min);
                    let hi = incident.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    prop_assert!(means[node] >= lo - 1e-3 && means[node] <= hi + 1e-3);
                }
            }
        }

        #[test]
        fn prop_mode_of_constant_labels((n, edges) in graph(), label in 0u32..8) {
            let (tails, tips, _) = split(&edges);
            let values = vec![label as f32; tails.len()];
            let modes = node_mode(n, &tails, &tips, &values);
            let degrees = node_degrees(n, &tails, &tips);
            for node in 0..n {
                let expected = if degrees[node] == 0 { 0.0 } else { label as f32 };
                prop_assert_eq!(modes[node], expected);
            }
        }

        #[test]
        fn prop_mode_is_an_incident_value((n, edges) in graph()) {
            let (tails, tips, values) = split(&edges);
            let values: Vec<f32> = values.iter().map(|v| v.round().rem_euclid(3.0)).collect();
            let modes = node_mode(n, &tails, &tips, &values);
            for node in 0..n {
                let incident: Vec<f32> = (0..tails.len())
                    .filter(|&e| tails[e] as usize == node || tips[e] as usize == node)
                    .map(|e| values[e])
                    .collect();
                if !incident.is_empty() {
                    prop_assert!(incident.contains(&modes[node]));
                }
            }
        }
    }
}
