//! Aggregate statistics of a layer.

use rayon::prelude::*;

use super::centrality::{adjacency, bfs_distances, sample_sources, triangle_counts, ComponentIndex};
use super::community::modularity;
use super::models::{CommunityPartition, GraphSummary, MetricConfig};
use crate::network::LayerGraph;

/// Summarize a layer. Modularity is reported only when `partition` is given.
///
/// Path statistics cover the giant component; above
/// `max_exact_betweenness_nodes` they are estimated from sampled sources
/// and the summary is flagged approximate.
pub fn summarize(
    graph: &LayerGraph,
    partition: Option<&CommunityPartition>,
    config: &MetricConfig,
) -> GraphSummary {
    let n = graph.node_count();
    let m = graph.edge_count();
    if n == 0 {
        return GraphSummary::default();
    }

    let adj = adjacency(graph);
    let components = ComponentIndex::build(graph, &adj);
    let giant = components.giant_members();

    let degrees: Vec<usize> = adj.iter().map(Vec::len).collect();
    let avg_degree = degrees.iter().sum::<usize>() as f64 / n as f64;
    let degree_std = (degrees
        .iter()
        .map(|&d| (d as f64 - avg_degree).powi(2))
        .sum::<f64>()
        / n as f64)
        .sqrt();

    let triangles = triangle_counts(&adj);
    let average_clustering = triangles
        .iter()
        .zip(&degrees)
        .map(|(&t, &k)| {
            if k < 2 {
                0.0
            } else {
                t as f64 / (k * (k - 1) / 2) as f64
            }
        })
        .sum::<f64>()
        / n as f64;
    let triples: usize = degrees.iter().map(|&k| k * k.saturating_sub(1) / 2).sum();
    let transitivity = if triples == 0 {
        0.0
    } else {
        triangles.iter().sum::<usize>() as f64 / triples as f64
    };

    let (avg_path_length, diameter, approximate) = path_statistics(&adj, giant, config);

    GraphSummary {
        node_count: n,
        edge_count: m,
        density: if n > 1 {
            2.0 * m as f64 / (n * (n - 1)) as f64
        } else {
            0.0
        },
        avg_path_length,
        diameter,
        modularity: partition.map(|p| modularity(graph, &p.assignments)),
        assortativity: degree_assortativity(&adj),
        average_clustering,
        transitivity,
        component_count: components.groups.len(),
        giant_component_size: giant.len(),
        avg_degree,
        max_degree: degrees.iter().copied().max().unwrap_or(0),
        degree_std,
        is_connected: components.groups.len() == 1,
        approximate,
    }
}

/// Mean and maximum shortest-path length over ordered pairs in `giant`.
fn path_statistics(
    adj: &[Vec<usize>],
    giant: &[usize],
    config: &MetricConfig,
) -> (Option<f64>, Option<usize>, bool) {
    if giant.len() < 2 {
        return (None, None, false);
    }
    let (sources, approximate) = if giant.len() <= config.max_exact_betweenness_nodes {
        (giant.to_vec(), false)
    } else {
        let k = config.betweenness_sample_size.clamp(1, giant.len());
        (sample_sources(giant, k, config.seed), true)
    };

    let per_source: Vec<(usize, usize, usize)> = sources
        .par_iter()
        .map(|&s| {
            let dist = bfs_distances(adj, s);
            let reached: Vec<usize> = dist
                .into_iter()
                .filter(|&d| d != usize::MAX && d > 0)
                .collect();
            let total = reached.iter().sum();
            let max = reached.iter().copied().max().unwrap_or(0);
            (total, reached.len(), max)
        })
        .collect();

    let total: usize = per_source.iter().map(|p| p.0).sum();
    let pairs: usize = per_source.iter().map(|p| p.1).sum();
    let diameter = per_source.iter().map(|p| p.2).max().unwrap_or(0);
    if pairs == 0 {
        return (None, None, approximate);
    }
    (Some(total as f64 / pairs as f64), Some(diameter), approximate)
}

/// Pearson correlation of degrees at either end of each edge.
fn degree_assortativity(adj: &[Vec<usize>]) -> Option<f64> {
    let mut count = 0.0;
    let (mut sum_xy, mut sum_x, mut sum_x2) = (0.0, 0.0, 0.0);
    for (i, neighbors) in adj.iter().enumerate() {
        let x = adj[i].len() as f64;
        for &j in neighbors {
            // Both orientations of every edge: symmetric, so x and y share moments
            let y = adj[j].len() as f64;
            sum_xy += x * y;
            sum_x += x;
            sum_x2 += x * x;
            count += 1.0;
        }
    }
    if count == 0.0 {
        return None;
    }
    let mean = sum_x / count;
    let variance = sum_x2 / count - mean * mean;
    if variance.abs() < 1e-12 {
        return None;
    }
    Some((sum_xy / count - mean * mean) / variance)
}
