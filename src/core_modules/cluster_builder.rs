// THEORY:
// The `ClusterBuilder` is the spatial grouping layer. It takes the flat list of
// windows produced by the locator and groups windows that sit close to each other
// into clusters, so a caller can reason about coherent regions of vegetation
// rather than isolated samples.
//
// Key architectural principles:
// 1.  **Cheap Position Proxy**: A window's position is summarised by
//     `centroid(w) = (x / 2, y / 2)` with integer halving of the anchor. This is
//     NOT the geometric centre (`x + size / 2, y + size / 2`); it ignores the
//     window size and halves every distance. It is kept because existing
//     proximity thresholds (82 by default) were tuned against it, and switching
//     to a true centre would change every grouping.
// 2.  **Proximity Graph**: Two windows are connected when their centroids are at
//     most `proximity_threshold` apart. Clusters are built from this relation.
// 3.  **Two Strategies**:
//     - `Legacy` reproduces the historical single-link pass followed by a
//       redundancy sweep. It is order dependent: feeding the same windows in a
//       different order can split a chain that union-find would keep together.
//       This is a documented property, not a defect.
//     - `UnionFind` computes true connected components of the proximity graph.
//       The result is independent of input order.
//     Both strategies guarantee that every input window lands in exactly one
//     output cluster.
// 4.  **Stateless Utility**: Like the locator, the builder keeps nothing between
//     calls.

use crate::core_modules::window::Window;
use crate::error::{PatchError, Result};
use serde::{Deserialize, Serialize};

/// Default centroid distance below which two windows are considered connected.
pub const DEFAULT_PROXIMITY_THRESHOLD: f64 = 82.0;

/// Selects the grouping algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClusterStrategy {
    /// Historical greedy single-link pass plus redundancy resolution.
    #[default]
    Legacy,
    /// Order-independent connected components via a disjoint-set forest.
    UnionFind,
}

/// A group of spatially connected windows, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub windows: Vec<Window>,
}

impl Cluster {
    fn singleton(window: Window) -> Self {
        Self {
            windows: vec![window],
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn contains(&self, window: &Window) -> bool {
        self.windows.contains(window)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter()
    }
}

/// Position proxy used by the proximity rule. See the module notes.
pub fn centroid(window: &Window) -> (f64, f64) {
    ((window.x / 2) as f64, (window.y / 2) as f64)
}

/// Whether two centroids are within `threshold` of each other.
pub fn connected(a: (f64, f64), b: (f64, f64), threshold: f64) -> bool {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt() <= threshold
}

pub mod cluster_builder {
    use super::*;

    /// Groups `windows` with the legacy strategy.
    pub fn cluster(windows: &[Window], proximity_threshold: f64) -> Result<Vec<Cluster>> {
        cluster_with(windows, proximity_threshold, ClusterStrategy::Legacy)
    }

    /// Groups `windows` with an explicit strategy.
    pub fn cluster_with(
        windows: &[Window],
        proximity_threshold: f64,
        strategy: ClusterStrategy,
    ) -> Result<Vec<Cluster>> {
        if !proximity_threshold.is_finite() || proximity_threshold < 0.0 {
            return Err(PatchError::parameter(
                "proximity_threshold",
                format!("must be a finite, non-negative distance, got {proximity_threshold}"),
            ));
        }

        let clusters = match strategy {
            ClusterStrategy::Legacy => legacy_clusters(windows, proximity_threshold),
            ClusterStrategy::UnionFind => union_find_clusters(windows, proximity_threshold),
        };
        log::debug!(
            "grouped {} windows into {} clusters ({:?})",
            windows.len(),
            clusters.len(),
            strategy
        );
        Ok(clusters)
    }

    fn legacy_clusters(windows: &[Window], threshold: f64) -> Vec<Cluster> {
        // --- 1. Greedy single-link growth ---
        // A window may be pulled into several clusters here; the sweep below
        // settles which one keeps it.
        let mut building: Vec<Cluster> = Vec::new();
        for (i, window) in windows.iter().enumerate() {
            if !building.iter().any(|c| c.contains(window)) {
                building.push(Cluster::singleton(*window));
            }

            let window_centroid = centroid(window);
            for neighbour in &windows[i + 1..] {
                if !connected(window_centroid, centroid(neighbour), threshold) {
                    continue;
                }
                if let Some(owner) = building
                    .iter_mut()
                    .find(|c| c.contains(window) && !c.contains(neighbour))
                {
                    owner.windows.push(*neighbour);
                }
            }
        }

        // --- 2. Redundancy resolution ---
        // The first cluster is final as built. Every later cluster loses the
        // windows already claimed by a cluster finalized before it.
        let mut finalized: Vec<Cluster> = Vec::with_capacity(building.len());
        for mut candidate in building {
            candidate
                .windows
                .retain(|w| !finalized.iter().any(|done| done.contains(w)));
            finalized.push(candidate);
        }
        finalized
    }

    fn union_find_clusters(windows: &[Window], threshold: f64) -> Vec<Cluster> {
        let centroids: Vec<(f64, f64)> = windows.iter().map(centroid).collect();
        let mut forest = DisjointSet::new(windows.len());

        for i in 0..windows.len() {
            for j in i + 1..windows.len() {
                if connected(centroids[i], centroids[j], threshold) {
                    forest.union(i, j);
                }
            }
        }

        // Clusters are ordered by their first member; members keep input order.
        let mut slot_of_root: Vec<Option<usize>> = vec![None; windows.len()];
        let mut clusters: Vec<Cluster> = Vec::new();
        for (i, window) in windows.iter().enumerate() {
            let root = forest.find(i);
            match slot_of_root[root] {
                Some(slot) => clusters[slot].windows.push(*window),
                None => {
                    slot_of_root[root] = Some(clusters.len());
                    clusters.push(Cluster::singleton(*window));
                }
            }
        }
        clusters
    }

    struct DisjointSet {
        parent: Vec<usize>,
        rank: Vec<u8>,
    }

    impl DisjointSet {
        fn new(len: usize) -> Self {
            Self {
                parent: (0..len).collect(),
                rank: vec![0; len],
            }
        }

        fn find(&mut self, mut node: usize) -> usize {
            while self.parent[node] != node {
                // Path halving.
                self.parent[node] = self.parent[self.parent[node]];
                node = self.parent[node];
            }
            node
        }

        fn union(&mut self, a: usize, b: usize) {
            let (ra, rb) = (self.find(a), self.find(b));
            if ra == rb {
                return;
            }
            match self.rank[ra].cmp(&self.rank[rb]) {
                std::cmp::Ordering::Less => self.parent[ra] = rb,
                std::cmp::Ordering::Greater => self.parent[rb] = ra,
                std::cmp::Ordering::Equal => {
                    self.parent[rb] = ra;
                    self.rank[ra] += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::cluster_builder::{cluster, cluster_with};
    use super::*;
    use std::collections::HashMap;

    fn w(x: u32, y: u32) -> Window {
        Window::new(x, y, 10)
    }

    fn assert_partition(windows: &[Window], clusters: &[Cluster]) {
        let mut seen: HashMap<Window, usize> = HashMap::new();
        for c in clusters {
            for window in c.iter() {
                *seen.entry(*window).or_default() += 1;
            }
        }
        for window in windows {
            assert_eq!(seen.get(window), Some(&1), "{window:?} is not in exactly one cluster");
        }
        assert_eq!(seen.len(), windows.len());
    }

    #[test]
    fn centroid_halves_the_anchor() {
        assert_eq!(centroid(&w(10, 10)), (5.0, 5.0));
        assert_eq!(centroid(&w(11, 7)), (5.0, 3.0));
        assert_eq!(centroid(&Window::new(11, 7, 500)), (5.0, 3.0));
    }

    #[test]
    fn nearby_anchors_share_a_cluster() {
        let windows = [w(0, 0), w(10, 10)];
        let clusters = cluster(&windows, DEFAULT_PROXIMITY_THRESHOLD).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].windows, windows.to_vec());
    }

    #[test]
    fn threshold_is_inclusive() {
        // Centroids (0, 0) and (82, 0) are exactly 82 apart.
        let windows = [w(0, 0), w(164, 0)];
        assert_eq!(cluster(&windows, 82.0).unwrap().len(), 1);
        assert_eq!(cluster(&windows, 81.9).unwrap().len(), 2);
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(cluster(&[], 82.0).unwrap().is_empty());
        assert!(cluster_with(&[], 82.0, ClusterStrategy::UnionFind).unwrap().is_empty());
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let err = cluster(&[w(0, 0)], bad).unwrap_err();
            assert!(matches!(err, PatchError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn legacy_grouping_is_order_dependent() {
        // Centroids at x = 0, 120 and 60: a and b are both close to c, but not
        // to each other.
        let a = w(0, 0);
        let b = w(240, 0);
        let c = w(120, 0);
        let windows = [a, b, c];

        let legacy = cluster(&windows, 82.0).unwrap();
        assert_eq!(legacy.len(), 2);
        assert_eq!(legacy[0].windows, vec![a, c]);
        assert_eq!(legacy[1].windows, vec![b]);
        assert_partition(&windows, &legacy);

        let components = cluster_with(&windows, 82.0, ClusterStrategy::UnionFind).unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].windows, vec![a, b, c]);
    }

    #[test]
    fn legacy_grows_chains_through_later_members() {
        // c joins a's cluster first, then pulls b in when its own turn comes.
        let a = w(0, 0);
        let c = w(0, 100);
        let b = w(0, 200);
        let d = w(400, 0);
        let windows = [a, c, b, d];

        let clusters = cluster(&windows, 82.0).unwrap();
        assert_partition(&windows, &clusters);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].windows, vec![a, c, b]);
        assert_eq!(clusters[1].windows, vec![d]);
    }

    #[test]
    fn both_strategies_partition_a_grid() {
        let windows: Vec<Window> = (0..6)
            .flat_map(|row| (0..8).map(move |col| w(col * 75 + (row % 2) * 30, row * 160)))
            .collect();

        for strategy in [ClusterStrategy::Legacy, ClusterStrategy::UnionFind] {
            let clusters = cluster_with(&windows, 82.0, strategy).unwrap();
            assert_partition(&windows, &clusters);
        }
    }

    #[test]
    fn union_find_ignores_input_order() {
        let mut windows = vec![w(0, 0), w(240, 0), w(120, 0), w(1000, 1000)];
        let forward = cluster_with(&windows, 82.0, ClusterStrategy::UnionFind).unwrap();
        windows.reverse();
        let backward = cluster_with(&windows, 82.0, ClusterStrategy::UnionFind).unwrap();

        let sizes = |cs: &[Cluster]| {
            let mut s: Vec<usize> = cs.iter().map(Cluster::len).collect();
            s.sort_unstable();
            s
        };
        assert_eq!(sizes(&forward), vec![1, 3]);
        assert_eq!(sizes(&forward), sizes(&backward));
    }
}
