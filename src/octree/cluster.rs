//! k-means clustering of point normals into a node summary
//!
//! Each node collapses its points into at most [`MAX_CLUSTERS`] (normal,
//! color, weight) tuples so a whole subtree can be drawn as one splat.

use crate::core::types::Vec3;
use crate::math::encoding::{self, PolarNormal};
use crate::points::PointRecord;

use super::node::{NodeSummary, MAX_CLUSTERS};

/// Squared mean movement below which k-means is considered converged
pub const CONVERGENCE_EPSILON: f32 = f32::EPSILON;

/// Hard iteration cap; float rounding can make means oscillate forever
pub const MAX_ITERATIONS: usize = 64;

/// Result of clustering the normals of one node's points
#[derive(Clone, Debug)]
pub struct Clustering {
    /// Number of seeded clusters (<= MAX_CLUSTERS)
    pub k: usize,
    pub means: [Vec3; MAX_CLUSTERS],
    /// Points assigned to each cluster
    pub counts: [u32; MAX_CLUSTERS],
    /// Cluster index per member, parallel to the member slice
    pub assignment: Vec<u8>,
    pub iterations: usize,
}

/// Run k-means over the normals of `records[members]`.
///
/// Seeds are the first `k` pairwise-distinct normals in member order, so
/// fewer than six distinct directions simply yield fewer clusters.
pub fn cluster_normals(records: &[PointRecord], members: &[u32]) -> Clustering {
    let mut means = [Vec3::ZERO; MAX_CLUSTERS];
    let mut k = 0;

    for &m in members {
        if k == MAX_CLUSTERS {
            break;
        }
        let normal = records[m as usize].normal;
        if means[..k].iter().all(|seed| seed.distance_squared(normal) > CONVERGENCE_EPSILON) {
            means[k] = normal;
            k += 1;
        }
    }

    let mut counts = [0u32; MAX_CLUSTERS];
    let mut assignment = vec![0u8; members.len()];
    let mut iterations = 0;

    if k == 0 {
        return Clustering { k, means, counts, assignment, iterations };
    }

    loop {
        iterations += 1;

        // Assign every point to its nearest mean; ties keep the current assignment
        for (slot, &m) in assignment.iter_mut().zip(members) {
            let normal = records[m as usize].normal;
            let mut best = *slot as usize;
            let mut best_distance = normal.distance_squared(means[best]);
            for (j, mean) in means[..k].iter().enumerate() {
                let distance = normal.distance_squared(*mean);
                if distance < best_distance {
                    best = j;
                    best_distance = distance;
                }
            }
            *slot = best as u8;
        }

        let mut sums = [Vec3::ZERO; MAX_CLUSTERS];
        counts = [0; MAX_CLUSTERS];
        for (&cluster, &m) in assignment.iter().zip(members) {
            sums[cluster as usize] += records[m as usize].normal;
            counts[cluster as usize] += 1;
        }

        let mut moved = false;
        for j in 0..k {
            if counts[j] > 0 {
                let mean = sums[j] / counts[j] as f32;
                if mean.distance_squared(means[j]) > CONVERGENCE_EPSILON {
                    moved = true;
                }
                means[j] = mean;
            }
        }

        if !moved {
            break;
        }
        if iterations >= MAX_ITERATIONS {
            log::trace!("k-means stopped at iteration cap ({} points)", members.len());
            break;
        }
    }

    Clustering { k, means, counts, assignment, iterations }
}

/// Fill the cluster fields of `summary` from the points in `members`.
pub fn summarize(records: &[PointRecord], members: &[u32], summary: &mut NodeSummary) {
    let clustering = cluster_normals(records, members);
    let total = members.len() as u32;

    let mut color_sums = [[0u64; 3]; MAX_CLUSTERS];
    for (&cluster, &m) in clustering.assignment.iter().zip(members) {
        let color = records[m as usize].color;
        for c in 0..3 {
            color_sums[cluster as usize][c] += color[c] as u64;
        }
    }

    summary.point_count = total;
    summary.weights = 0;

    for slot in 0..clustering.k {
        let count = clustering.counts[slot];
        if count == 0 {
            continue;
        }
        let avg = |c: usize| (color_sums[slot][c] / count as u64) as u8;

        summary.normals[slot] = PolarNormal::encode(clustering.means[slot]);
        summary.colors[slot] = encoding::rgb_to_565(avg(0), avg(1), avg(2));
        summary.weights = encoding::pack_weight(
            summary.weights,
            slot,
            encoding::quantize_weight(count, total),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::encoding::WEIGHT_MAX;

    fn record(normal: Vec3, color: [u8; 3]) -> PointRecord {
        PointRecord::new(Vec3::ZERO, normal, color)
    }

    fn all(records: &[PointRecord]) -> Vec<u32> {
        (0..records.len() as u32).collect()
    }

    #[test]
    fn test_single_point() {
        let records = vec![record(Vec3::Y, [10, 20, 30])];
        let mut summary = NodeSummary::default();
        summarize(&records, &all(&records), &mut summary);

        assert_eq!(summary.active_clusters(), 1);
        assert_eq!(summary.point_count, 1);
        assert_eq!(encoding::unpack_weight(summary.weights, 0), WEIGHT_MAX);
        assert!(summary.cluster_normal(0).dot(Vec3::Y) > 0.999);
    }

    #[test]
    fn test_identical_normals_collapse() {
        let records: Vec<_> = (0..20).map(|i| record(Vec3::X, [i as u8, 0, 0])).collect();
        let clustering = cluster_normals(&records, &all(&records));
        assert_eq!(clustering.k, 1);
        assert_eq!(clustering.counts[0], 20);
    }

    #[test]
    fn test_two_groups() {
        // 30 points facing +z (red), 10 facing -z (blue)
        let mut records: Vec<_> = (0..30).map(|_| record(Vec3::Z, [255, 0, 0])).collect();
        records.extend((0..10).map(|_| record(-Vec3::Z, [0, 0, 255])));

        let mut summary = NodeSummary::default();
        summarize(&records, &all(&records), &mut summary);

        assert_eq!(summary.active_clusters(), 2);
        // floor(31 * 30 / 40) = 23, floor(31 * 10 / 40) = 7
        assert_eq!(encoding::unpack_weight(summary.weights, 0), 23);
        assert_eq!(encoding::unpack_weight(summary.weights, 1), 7);
        assert_eq!(summary.cluster_color(0), (255, 0, 0));
        assert_eq!(summary.cluster_color(1), (0, 0, 255));
        assert!(summary.cluster_normal(1).dot(-Vec3::Z) > 0.999);
    }

    #[test]
    fn test_six_axes() {
        let axes = [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z];
        let records: Vec<_> = axes
            .iter()
            .cycle()
            .take(60)
            .map(|&n| record(n, [128, 128, 128]))
            .collect();
        let clustering = cluster_normals(&records, &all(&records));

        assert_eq!(clustering.k, 6);
        for j in 0..6 {
            assert_eq!(clustering.counts[j], 10);
            assert!(clustering.means[j].distance(axes[j]) < 1e-5);
        }
    }

    #[test]
    fn test_weights_approximate_one() {
        let records = crate::points::sphere_cloud(997, 1.0);
        let mut summary = NodeSummary::default();
        summarize(&records, &all(&records), &mut summary);

        let clustering = cluster_normals(&records, &all(&records));
        let mut sum = 0.0;
        for slot in 0..MAX_CLUSTERS {
            let exact = clustering.counts[slot] as f32 / records.len() as f32;
            let stored = summary.cluster_weight(slot);
            assert!((exact - stored).abs() <= 1.0 / WEIGHT_MAX as f32);
            sum += stored;
        }
        assert!(sum <= 1.0 + 1e-6);
        assert!(sum >= 1.0 - clustering.k as f32 / WEIGHT_MAX as f32);
        assert!(clustering.iterations <= MAX_ITERATIONS);
    }

    #[test]
    fn test_subset_members() {
        let records = vec![
            record(Vec3::X, [0, 0, 0]),
            record(Vec3::Y, [100, 100, 100]),
            record(Vec3::Y, [200, 200, 200]),
        ];
        let mut summary = NodeSummary::default();
        summarize(&records, &[1, 2], &mut summary);

        assert_eq!(summary.point_count, 2);
        assert_eq!(summary.active_clusters(), 1);
        let (r, g, b) = summary.cluster_color(0);
        assert!((r as i32 - 150).abs() <= 8);
        assert!((g as i32 - 150).abs() <= 4);
        assert!((b as i32 - 150).abs() <= 8);
    }
}
