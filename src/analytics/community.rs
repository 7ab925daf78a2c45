//! Community detection — Louvain with deterministic tie-breaking.
//!
//! Each pass runs local moves until no node changes community, then folds
//! every community into a single node (internal weight kept as a self-loop)
//! and repeats on the folded graph. Nodes are visited in ascending ID order
//! and equal gains resolve to the lowest community label, so the same graph
//! always yields the same partition.

use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};

use super::models::{Community, CommunityConfig, CommunityPartition};
use crate::network::LayerGraph;

/// Gains closer than this are treated as equal.
const GAIN_EPSILON: f64 = 1e-12;

/// Weighted graph over positions `0..n`, with per-node self-loop weight.
struct LevelGraph {
    adj: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
}

impl LevelGraph {
    fn len(&self) -> usize {
        self.adj.len()
    }

    /// Weighted degree, self-loops counted twice.
    fn strengths(&self) -> Vec<f64> {
        self.adj
            .iter()
            .zip(&self.self_loops)
            .map(|(neighbors, &l)| neighbors.iter().map(|(_, w)| w).sum::<f64>() + 2.0 * l)
            .collect()
    }

    /// Fold each community into one node.
    fn aggregate(&self, community: &[usize], count: usize) -> LevelGraph {
        let mut self_loops = vec![0.0; count];
        let mut links: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        for (i, neighbors) in self.adj.iter().enumerate() {
            let ci = community[i];
            self_loops[ci] += self.self_loops[i];
            for &(j, w) in neighbors {
                let cj = community[j];
                if ci == cj {
                    // Each internal edge appears twice in the adjacency lists
                    self_loops[ci] += w / 2.0;
                } else {
                    *links[ci].entry(cj).or_insert(0.0) += w;
                }
            }
        }
        LevelGraph {
            adj: links.into_iter().map(|m| m.into_iter().collect()).collect(),
            self_loops,
        }
    }
}

/// Partition the layer's nodes into communities.
pub fn detect(graph: &LayerGraph, config: &CommunityConfig) -> CommunityPartition {
    let ids = graph.sorted_ids();
    let n = ids.len();
    if n == 0 {
        return CommunityPartition::default();
    }
    let position: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for edge in graph.graph.edge_references() {
        let a = position[graph.node_id(edge.source())];
        let b = position[graph.node_id(edge.target())];
        if a != b {
            adj[a].push((b, edge.weight().weight));
            adj[b].push((a, edge.weight().weight));
        }
    }
    for neighbors in adj.iter_mut() {
        neighbors.sort_by(|x, y| x.0.cmp(&y.0));
    }
    let base = LevelGraph {
        adj,
        self_loops: vec![0.0; n],
    };

    // node_comm maps original positions to the current level's node
    let mut node_comm: Vec<usize> = (0..n).collect();
    let mut level = LevelGraph {
        adj: base.adj.clone(),
        self_loops: base.self_loops.clone(),
    };
    let mut passes = 0;

    let m2: f64 = base.strengths().iter().sum();
    if m2 > 0.0 {
        while passes < config.max_passes {
            let (community, moved) = local_moves(&level, config);
            passes += 1;
            if !moved {
                break;
            }
            let (community, count) = renumber(&community);
            for c in node_comm.iter_mut() {
                *c = community[*c];
            }
            level = level.aggregate(&community, count);
            tracing::debug!(
                "Louvain pass={} layer={} communities={}",
                passes,
                graph.layer,
                count
            );
        }
    }

    // Final ids in ascending order of each community's lowest member ID
    let (final_comm, count) = renumber(&node_comm);
    let mut communities: Vec<Community> = (0..count)
        .map(|id| Community {
            id: id as u32,
            size: 0,
            members: Vec::new(),
            internal_weight: 0.0,
        })
        .collect();
    for (pos, &c) in final_comm.iter().enumerate() {
        communities[c].members.push(ids[pos].to_string());
        communities[c].size += 1;
    }
    for (i, neighbors) in base.adj.iter().enumerate() {
        for &(j, w) in neighbors {
            if i < j && final_comm[i] == final_comm[j] {
                communities[final_comm[i]].internal_weight += w;
            }
        }
    }

    let modularity = compute_modularity(&final_comm, &base.adj, &base.strengths(), m2 / 2.0);
    let assignments = ids
        .iter()
        .enumerate()
        .map(|(pos, id)| (id.to_string(), final_comm[pos] as u32))
        .collect();

    CommunityPartition {
        assignments,
        communities,
        modularity,
        passes,
    }
}

/// One local-moving phase. Returns the community per node and whether any node moved.
fn local_moves(level: &LevelGraph, config: &CommunityConfig) -> (Vec<usize>, bool) {
    let n = level.len();
    let strength = level.strengths();
    let m2: f64 = strength.iter().sum();
    let resolution = config.resolution;

    let mut community: Vec<usize> = (0..n).collect();
    let mut totals = strength.clone();
    let mut any_move = false;

    for _ in 0..config.max_sweeps {
        let mut moved = false;
        for i in 0..n {
            let current = community[i];
            let ki = strength[i];

            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for &(j, w) in &level.adj[i] {
                *links.entry(community[j]).or_insert(0.0) += w;
            }

            totals[current] -= ki;
            let stay_gain = links.get(&current).copied().unwrap_or(0.0)
                - resolution * totals[current] * ki / m2;

            // Ascending label order: on equal gain the lowest label is kept
            let mut best = current;
            let mut best_gain = stay_gain;
            for (&c, &w) in &links {
                if c == current {
                    continue;
                }
                let gain = w - resolution * totals[c] * ki / m2;
                if gain > best_gain + GAIN_EPSILON {
                    best = c;
                    best_gain = gain;
                }
            }

            totals[best] += ki;
            if best != current {
                community[i] = best;
                moved = true;
                any_move = true;
            }
        }
        if !moved {
            break;
        }
    }
    (community, any_move)
}

/// Relabel communities 0.. in order of first appearance.
fn renumber(community: &[usize]) -> (Vec<usize>, usize) {
    let mut remap: HashMap<usize, usize> = HashMap::new();
    let relabelled = community
        .iter()
        .map(|c| {
            let next = remap.len();
            *remap.entry(*c).or_insert(next)
        })
        .collect();
    (relabelled, remap.len())
}

/// Newman's modularity Q for a community assignment.
fn compute_modularity(
    community: &[usize],
    adj: &[Vec<(usize, f64)>],
    node_strengths: &[f64],
    total_weight: f64,
) -> f64 {
    if total_weight == 0.0 {
        return 0.0;
    }
    let m2 = 2.0 * total_weight;
    let mut q = 0.0;

    // Edge term; each undirected edge appears twice in the adjacency lists
    for (i, neighbors) in adj.iter().enumerate() {
        for &(j, w) in neighbors {
            if community[i] == community[j] {
                q += w;
            }
        }
    }
    // Null-model term
    let mut totals: HashMap<usize, f64> = HashMap::new();
    for (i, &k) in node_strengths.iter().enumerate() {
        *totals.entry(community[i]).or_insert(0.0) += k;
    }
    let expected: f64 = totals.values().map(|t| t * t / m2).sum();
    (q - expected) / m2
}

/// Modularity of an arbitrary ID → community assignment on `graph`.
///
/// Nodes missing from `assignments` are treated as singletons.
pub fn modularity(graph: &LayerGraph, assignments: &BTreeMap<String, u32>) -> f64 {
    let g = &graph.graph;
    let n = g.node_count();
    let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut strengths = vec![0.0; n];
    for edge in g.edge_references() {
        let (s, t, w) = (edge.source().index(), edge.target().index(), edge.weight().weight);
        adj[s].push((t, w));
        adj[t].push((s, w));
        strengths[s] += w;
        strengths[t] += w;
    }
    let offset = assignments.values().max().map_or(0, |m| *m as usize + 1);
    let community: Vec<usize> = g
        .node_indices()
        .map(|idx| {
            assignments
                .get(graph.node_id(idx))
                .map_or(offset + idx.index(), |c| *c as usize)
        })
        .collect();
    let total_weight = strengths.iter().sum::<f64>() / 2.0;
    compute_modularity(&community, &adj, &strengths, total_weight)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Layer;
    use crate::test_helpers::{graph_from_edges, two_triangles_bridged};
    use std::collections::BTreeSet;

    #[test]
    fn test_two_triangles_split() {
        let g = two_triangles_bridged();
        let partition = detect(&g, &CommunityConfig::default());
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.communities[0].members, vec!["a1", "a2", "a3"]);
        assert_eq!(partition.communities[1].members, vec!["b1", "b2", "b3"]);
        assert!((partition.communities[0].internal_weight - 3.0).abs() < 1e-12);
        // Q = 2 * (3/7 - (7/14)^2)
        let expected = 2.0 * (3.0 / 7.0 - 0.25);
        assert!((partition.modularity - expected).abs() < 1e-9);
    }

    #[test]
    fn test_partition_covers_nodes_disjointly() {
        let mut g = two_triangles_bridged();
        g.add_node("loner");
        let partition = detect(&g, &CommunityConfig::default());

        let mut seen = BTreeSet::new();
        for community in &partition.communities {
            for member in &community.members {
                assert!(seen.insert(member.clone()), "{} in two communities", member);
            }
        }
        assert_eq!(seen.len(), g.node_count());
        assert_eq!(partition.assignments.len(), g.node_count());
        // Isolated node is a singleton
        let loner = partition.community_of("loner").unwrap();
        assert_eq!(partition.members(loner), &["loner".to_string()]);
    }

    #[test]
    fn test_no_edges_all_singletons() {
        let mut g = LayerGraph::new(Layer::ContentSimilarity);
        for id in ["p3", "p1", "p2"] {
            g.add_node(id);
        }
        let partition = detect(&g, &CommunityConfig::default());
        assert_eq!(partition.len(), 3);
        assert_eq!(partition.modularity, 0.0);
        assert_eq!(partition.community_of("p1"), Some(0));
        assert_eq!(partition.community_of("p3"), Some(2));
    }

    #[test]
    fn test_single_edge_is_one_community() {
        let g = graph_from_edges(Layer::UserInteraction, &[("A", "B", 2.0)]);
        let partition = detect(&g, &CommunityConfig::default());
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.communities[0].members, vec!["A", "B"]);
    }

    #[test]
    fn test_detect_is_idempotent() {
        let g = two_triangles_bridged();
        let a = detect(&g, &CommunityConfig::default());
        let b = detect(&g, &CommunityConfig::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_modularity_matches_detect() {
        let g = two_triangles_bridged();
        let partition = detect(&g, &CommunityConfig::default());
        let q = modularity(&g, &partition.assignments);
        assert!((q - partition.modularity).abs() < 1e-12);
    }
}
