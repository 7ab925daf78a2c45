//! Per-node centrality for one layer.
//!
//! Implements on `LayerGraph`:
//! - **Degree** — raw degree / (n − 1)
//! - **Betweenness** — exact via `rustworkx_core::centrality::betweenness_centrality`
//!   on the giant component, or seeded source-sampled Brandes above the size bound
//! - **Closeness** — BFS within each node's own component
//! - **PageRank** — weighted power iteration with convergence reporting
//! - **Clustering coefficient** — local, unweighted
//! - **Connected components** — BFS in ascending node-ID order
//!
//! Shortest paths are unweighted throughout.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use super::models::{CentralityProfile, ComponentInfo, MetricConfig, MetricsResult};
use crate::error::RunWarning;
use crate::network::LayerGraph;

/// Sources summed per parallel task in sampled traversals.
const SOURCE_CHUNK: usize = 16;

// ============================================================================
// Entry point
// ============================================================================

/// Compute the centrality profile of every node in the layer.
pub fn compute(graph: &LayerGraph, config: &MetricConfig) -> MetricsResult {
    let start = Instant::now();
    let layer = graph.layer;
    let n = graph.node_count();
    let adj = adjacency(graph);
    let components = ComponentIndex::build(graph, &adj);
    let mut warnings = Vec::new();

    let rank = pagerank(graph, config);
    if !rank.converged {
        tracing::warn!(
            "PageRank did not converge layer={} iterations={}",
            layer,
            rank.iterations
        );
        warnings.push(RunWarning::Convergence {
            scope: layer.to_string(),
            algorithm: "pagerank".to_string(),
            iterations: rank.iterations,
        });
    }

    let giant = components.giant_members();
    let (betweenness, sampled_sources) = betweenness(graph, &adj, giant, config);
    let betweenness_approximate = sampled_sources.is_some();
    if let Some(k) = sampled_sources {
        warnings.push(RunWarning::Approximation {
            scope: layer.to_string(),
            detail: format!(
                "betweenness sampled from {} of {} sources",
                k,
                giant.len()
            ),
        });
    }

    let closeness = closeness(&adj, &components);
    let clustering = clustering_coefficient(&adj);

    let degree_norm = if n > 1 { (n - 1) as f64 } else { 1.0 };
    let giant_id = components.giant;
    let mut profiles = BTreeMap::new();
    for idx in graph.graph.node_indices() {
        let i = idx.index();
        let raw_degree = adj[i].len();
        let component_id = components.of[i];
        profiles.insert(
            graph.node_id(idx).to_string(),
            CentralityProfile {
                degree: if n > 1 { raw_degree as f64 / degree_norm } else { 0.0 },
                raw_degree,
                strength: graph.graph.edges(idx).map(|e| e.weight().weight).sum(),
                betweenness: betweenness[i],
                closeness: closeness[i],
                pagerank: rank.scores[i],
                clustering_coefficient: clustering[i],
                component_id,
                disconnected: giant_id != Some(component_id),
            },
        );
    }

    tracing::debug!(
        "Centrality layer={} nodes={} components={} elapsed_ms={}",
        layer,
        n,
        components.groups.len(),
        start.elapsed().as_millis()
    );

    MetricsResult {
        layer,
        profiles,
        components: components.to_infos(graph),
        pagerank_converged: rank.converged,
        pagerank_iterations: rank.iterations,
        betweenness_approximate,
        warnings,
    }
}

// ============================================================================
// Shared structure helpers
// ============================================================================

/// Sorted, de-duplicated neighbor lists by node index.
pub(crate) fn adjacency(graph: &LayerGraph) -> Vec<Vec<usize>> {
    let g = &graph.graph;
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); g.node_count()];
    for edge in g.edge_references() {
        let (s, t) = (edge.source().index(), edge.target().index());
        if s != t {
            adj[s].push(t);
            adj[t].push(s);
        }
    }
    for neighbors in adj.iter_mut() {
        neighbors.sort_unstable();
        neighbors.dedup();
    }
    adj
}

/// Connected components with deterministic numbering.
///
/// Component 0 contains the lowest node ID; the giant component is the
/// largest one, ties going to the lower component ID.
pub(crate) struct ComponentIndex {
    /// Component ID per node index
    pub of: Vec<u32>,
    /// Member node indices per component ID
    pub groups: Vec<Vec<usize>>,
    pub giant: Option<u32>,
}

impl ComponentIndex {
    pub fn build(graph: &LayerGraph, adj: &[Vec<usize>]) -> Self {
        let n = adj.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            graph
                .node_id(NodeIndex::new(a))
                .cmp(graph.node_id(NodeIndex::new(b)))
        });

        let mut of: Vec<Option<u32>> = vec![None; n];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for start in order {
            if of[start].is_some() {
                continue;
            }
            let id = groups.len() as u32;
            let mut members = vec![start];
            of[start] = Some(id);
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for &next in &adj[current] {
                    if of[next].is_none() {
                        of[next] = Some(id);
                        members.push(next);
                        queue.push_back(next);
                    }
                }
            }
            groups.push(members);
        }

        let mut giant: Option<u32> = None;
        for (id, members) in groups.iter().enumerate() {
            if giant.map_or(true, |g| members.len() > groups[g as usize].len()) {
                giant = Some(id as u32);
            }
        }

        Self {
            of: of.into_iter().map(|c| c.unwrap_or(0)).collect(),
            groups,
            giant,
        }
    }

    pub fn giant_members(&self) -> &[usize] {
        self.giant
            .map(|g| self.groups[g as usize].as_slice())
            .unwrap_or(&[])
    }

    pub fn size_of(&self, node: usize) -> usize {
        self.groups[self.of[node] as usize].len()
    }

    /// Component metadata, giant first then by descending size.
    pub fn to_infos(&self, graph: &LayerGraph) -> Vec<ComponentInfo> {
        let mut infos: Vec<ComponentInfo> = self
            .groups
            .iter()
            .enumerate()
            .map(|(id, members)| {
                let mut ids: Vec<String> = members
                    .iter()
                    .map(|&m| graph.node_id(NodeIndex::new(m)).to_string())
                    .collect();
                ids.sort();
                ComponentInfo {
                    id: id as u32,
                    size: ids.len(),
                    members: ids,
                    is_giant: self.giant == Some(id as u32),
                }
            })
            .collect();
        infos.sort_by_key(|c| (!c.is_giant, std::cmp::Reverse(c.size), c.id));
        infos
    }
}

/// Unweighted BFS distances from `source`; `usize::MAX` for unreachable nodes.
pub(crate) fn bfs_distances(adj: &[Vec<usize>], source: usize) -> Vec<usize> {
    let mut dist = vec![usize::MAX; adj.len()];
    dist[source] = 0;
    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        for &w in &adj[v] {
            if dist[w] == usize::MAX {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
        }
    }
    dist
}

/// Seeded sample of `k` distinct members, ascending.
pub(crate) fn sample_sources(members: &[usize], k: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked: Vec<usize> = rand::seq::index::sample(&mut rng, members.len(), k)
        .into_vec()
        .into_iter()
        .map(|i| members[i])
        .collect();
    picked.sort_unstable();
    picked
}

// ============================================================================
// PageRank (weighted power iteration)
// ============================================================================

pub struct PageRankResult {
    /// Score per node index, summing to 1
    pub scores: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Weighted PageRank on the undirected layer.
///
/// Each node spreads its score over its neighbors in proportion to edge
/// weight. Nodes without edges spread evenly over the whole graph. Hitting
/// the iteration cap keeps the last estimate and reports `converged = false`.
pub fn pagerank(graph: &LayerGraph, config: &MetricConfig) -> PageRankResult {
    let g = &graph.graph;
    let n = g.node_count();
    if n == 0 {
        return PageRankResult {
            scores: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    let damping = config.pagerank_damping;
    let nf = n as f64;

    // Weighted neighbor lists and strengths
    let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut strength = vec![0.0; n];
    for edge in g.edge_references() {
        let (s, t, w) = (edge.source().index(), edge.target().index(), edge.weight().weight);
        adj[s].push((t, w));
        adj[t].push((s, w));
        strength[s] += w;
        strength[t] += w;
    }

    let mut scores = vec![1.0 / nf; n];
    let mut next = vec![0.0; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.pagerank_max_iterations {
        iterations += 1;

        let dangling: f64 = (0..n).filter(|&i| strength[i] <= 0.0).map(|i| scores[i]).sum();
        let base = (1.0 - damping) / nf + damping * dangling / nf;
        for s in next.iter_mut() {
            *s = base;
        }
        for i in 0..n {
            if strength[i] > 0.0 {
                let share = damping * scores[i] / strength[i];
                for &(j, w) in &adj[i] {
                    next[j] += share * w;
                }
            }
        }

        let diff: f64 = scores.iter().zip(next.iter()).map(|(a, b)| (a - b).abs()).sum();
        std::mem::swap(&mut scores, &mut next);
        if diff < config.pagerank_tolerance {
            converged = true;
            break;
        }
    }

    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        for s in scores.iter_mut() {
            *s /= total;
        }
    }

    PageRankResult {
        scores,
        iterations,
        converged,
    }
}

// ============================================================================
// Betweenness
// ============================================================================

/// Normalized betweenness per node index, computed over `giant` only.
///
/// Returns the scores and, when sampling was used, the number of sources.
pub fn betweenness(
    graph: &LayerGraph,
    adj: &[Vec<usize>],
    giant: &[usize],
    config: &MetricConfig,
) -> (Vec<f64>, Option<usize>) {
    let mut scores = vec![0.0; adj.len()];
    if giant.len() < 3 {
        return (scores, None);
    }

    if giant.len() <= config.max_exact_betweenness_nodes {
        for (i, score) in exact_betweenness(graph, giant) {
            scores[i] = score;
        }
        return (scores, None);
    }

    let k = config.betweenness_sample_size.clamp(1, giant.len());
    let sources = sample_sources(giant, k, config.seed);
    let partials: Vec<Vec<f64>> = sources
        .par_chunks(SOURCE_CHUNK)
        .map(|chunk| {
            let mut acc = vec![0.0; adj.len()];
            for &s in chunk {
                for (a, d) in acc.iter_mut().zip(source_dependency(adj, s)) {
                    *a += d;
                }
            }
            acc
        })
        .collect();

    // Same scaling as the exact path: extrapolate to all sources, then
    // normalize by (n − 1)(n − 2) over the giant component.
    let n = giant.len() as f64;
    let scale = (n / k as f64) / ((n - 1.0) * (n - 2.0));
    for partial in partials {
        for (s, p) in scores.iter_mut().zip(partial) {
            *s += p;
        }
    }
    for &i in giant {
        scores[i] = (scores[i] * scale).clamp(0.0, 1.0);
    }
    tracing::debug!(
        "Sampled betweenness layer={} sources={} giant={}",
        graph.layer,
        k,
        giant.len()
    );
    (scores, Some(k))
}

fn exact_betweenness(graph: &LayerGraph, giant: &[usize]) -> Vec<(usize, f64)> {
    let g = &graph.graph;
    let mut local: Vec<Option<NodeIndex>> = vec![None; g.node_count()];
    let mut sub: UnGraph<(), ()> = UnGraph::with_capacity(giant.len(), 0);
    for &i in giant {
        local[i] = Some(sub.add_node(()));
    }
    for edge in g.edge_references() {
        if let (Some(a), Some(b)) = (local[edge.source().index()], local[edge.target().index()]) {
            sub.add_edge(a, b, ());
        }
    }

    let scores = rustworkx_core::centrality::betweenness_centrality(
        &sub, false, // include_endpoints
        true,  // normalized
        200,   // parallel_threshold
    );

    giant
        .iter()
        .map(|&i| {
            let score = local[i]
                .and_then(|l| scores.get(l.index()).copied().flatten())
                .unwrap_or(0.0);
            (i, score)
        })
        .collect()
}

/// Brandes single-source dependency accumulation (unweighted).
fn source_dependency(adj: &[Vec<usize>], s: usize) -> Vec<f64> {
    let n = adj.len();
    let mut stack = Vec::new();
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut dist = vec![usize::MAX; n];
    sigma[s] = 1.0;
    dist[s] = 0;

    let mut queue = VecDeque::from([s]);
    while let Some(v) = queue.pop_front() {
        stack.push(v);
        for &w in &adj[v] {
            if dist[w] == usize::MAX {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1 {
                sigma[w] += sigma[v];
                preds[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0; n];
    while let Some(w) = stack.pop() {
        for &v in &preds[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
    }
    delta[s] = 0.0;
    delta
}

// ============================================================================
// Closeness
// ============================================================================

/// Closeness `(c − 1) / Σd` within each node's component of size `c`.
pub(crate) fn closeness(adj: &[Vec<usize>], components: &ComponentIndex) -> Vec<f64> {
    (0..adj.len())
        .into_par_iter()
        .map(|i| {
            let c = components.size_of(i);
            if c <= 1 {
                return 0.0;
            }
            let total: usize = bfs_distances(adj, i)
                .into_iter()
                .filter(|&d| d != usize::MAX)
                .sum();
            if total == 0 {
                0.0
            } else {
                (c - 1) as f64 / total as f64
            }
        })
        .collect()
}

// ============================================================================
// Clustering Coefficient
// ============================================================================

/// Triangles through each node.
pub(crate) fn triangle_counts(adj: &[Vec<usize>]) -> Vec<usize> {
    (0..adj.len())
        .into_par_iter()
        .map(|i| {
            let neighbors = &adj[i];
            let mut triangles = 0;
            for (a, &u) in neighbors.iter().enumerate() {
                for &v in &neighbors[a + 1..] {
                    if adj[u].binary_search(&v).is_ok() {
                        triangles += 1;
                    }
                }
            }
            triangles
        })
        .collect()
}

/// Local clustering: triangles / (k(k−1)/2), 0 for k < 2.
pub fn clustering_coefficient(adj: &[Vec<usize>]) -> Vec<f64> {
    triangle_counts(adj)
        .into_iter()
        .zip(adj)
        .map(|(t, neighbors)| {
            let k = neighbors.len();
            if k < 2 {
                0.0
            } else {
                t as f64 / (k * (k - 1) / 2) as f64
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Layer;
    use crate::test_helpers::{graph_from_edges, two_triangles_bridged};

    #[test]
    fn test_pair_degree_is_one() {
        let g = graph_from_edges(Layer::UserInteraction, &[("A", "B", 2.0)]);
        let result = compute(&g, &MetricConfig::default());
        assert!((result.profiles["A"].degree - 1.0).abs() < f64::EPSILON);
        assert!((result.profiles["B"].degree - 1.0).abs() < f64::EPSILON);
        assert!((result.profiles["A"].strength - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_handshake() {
        let g = two_triangles_bridged();
        let result = compute(&g, &MetricConfig::default());
        let total: usize = result.profiles.values().map(|p| p.raw_degree).sum();
        assert_eq!(total, 2 * g.edge_count());
    }

    #[test]
    fn test_pagerank_sums_to_one() {
        let mut g = two_triangles_bridged();
        g.add_node("isolated");
        let rank = pagerank(&g, &MetricConfig::default());
        let total: f64 = rank.scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(rank.converged);
    }

    #[test]
    fn test_pagerank_cap_reports_non_convergence() {
        let g = two_triangles_bridged();
        let config = MetricConfig {
            pagerank_max_iterations: 1,
            pagerank_tolerance: 0.0,
            ..Default::default()
        };
        let result = compute(&g, &config);
        assert!(!result.pagerank_converged);
        assert_eq!(result.pagerank_iterations, 1);
        assert!(matches!(
            result.warnings[0],
            RunWarning::Convergence { iterations: 1, .. }
        ));
        let total: f64 = result.profiles.values().map(|p| p.pagerank).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_path_betweenness() {
        let g = graph_from_edges(
            Layer::UserInteraction,
            &[("a", "b", 1.0), ("b", "c", 1.0)],
        );
        let result = compute(&g, &MetricConfig::default());
        assert!((result.profiles["b"].betweenness - 1.0).abs() < 1e-9);
        assert!(result.profiles["a"].betweenness.abs() < 1e-9);
    }

    #[test]
    fn test_bridge_nodes_have_highest_betweenness() {
        let g = two_triangles_bridged();
        let result = compute(&g, &MetricConfig::default());
        let bridge = result.profiles["a3"].betweenness;
        assert!(bridge > result.profiles["a1"].betweenness);
        assert!((bridge - result.profiles["b1"].betweenness).abs() < 1e-9);
    }

    #[test]
    fn test_sampled_betweenness_with_all_sources_matches_exact() {
        let g = two_triangles_bridged();
        let exact = compute(&g, &MetricConfig::default());
        let sampled = compute(
            &g,
            &MetricConfig {
                max_exact_betweenness_nodes: 2,
                betweenness_sample_size: 1000,
                ..Default::default()
            },
        );
        assert!(sampled.betweenness_approximate);
        assert!(!exact.betweenness_approximate);
        for (id, p) in &exact.profiles {
            assert!((p.betweenness - sampled.profiles[id].betweenness).abs() < 1e-9, "{}", id);
        }
    }

    #[test]
    fn test_nodes_outside_giant_component_flagged() {
        let g = graph_from_edges(
            Layer::UserInteraction,
            &[("a", "b", 1.0), ("b", "c", 1.0), ("x", "y", 1.0)],
        );
        let result = compute(&g, &MetricConfig::default());
        assert!(!result.profiles["a"].disconnected);
        assert!(result.profiles["x"].disconnected);
        assert_eq!(result.profiles["x"].betweenness, 0.0);
        // Closeness within own component: x reaches y at distance 1
        assert!((result.profiles["x"].closeness - 1.0).abs() < 1e-9);
        assert!((result.profiles["b"].closeness - 1.0).abs() < 1e-9);
        assert!((result.profiles["a"].closeness - 2.0 / 3.0).abs() < 1e-9);
        assert!(result.components[0].is_giant);
        assert_eq!(result.components[0].members, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_clustering_coefficient() {
        let g = two_triangles_bridged();
        let result = compute(&g, &MetricConfig::default());
        assert!((result.profiles["a1"].clustering_coefficient - 1.0).abs() < 1e-9);
        // a3: neighbors a1, a2, b1 with one connected pair of three
        assert!((result.profiles["a3"].clustering_coefficient - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_graph() {
        let g = LayerGraph::new(Layer::ContentSimilarity);
        let result = compute(&g, &MetricConfig::default());
        assert!(result.profiles.is_empty());
        assert!(result.pagerank_converged);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let g = two_triangles_bridged();
        let a = compute(&g, &MetricConfig::default());
        let b = compute(&g, &MetricConfig::default());
        assert_eq!(a.profiles, b.profiles);
    }
}
