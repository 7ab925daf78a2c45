//! Report export.
//!
//! - Layer graphs as node-link JSON and GraphML, nodes carrying their
//!   centrality profile and community
//! - Hub, daily and hourly time-series, peak, phase and Resonance tables as
//!   JSON row arrays
//! - [`write_artifacts`] writes the whole set to a directory, and
//!   [`write_comparison`] a cross-crisis comparison

use anyhow::{Context, Result};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::analytics::{CentralityProfile, GraphSummary};
use crate::comparison::CrisisComparison;
use crate::engine::{LayerReport, RunReport};
use crate::network::{Layer, NodeKind};
use crate::resonance::ResonanceBatch;
use crate::temporal::{ActivityBucket, TemporalProfile};

// ============================================================================
// Node-link graph
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct NodeLinkGraph {
    pub directed: bool,
    pub multigraph: bool,
    pub graph: NodeLinkMeta,
    pub nodes: Vec<NodeLinkNode>,
    pub links: Vec<NodeLinkEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeLinkMeta {
    pub layer: Layer,
    pub approximate: bool,
    pub summary: GraphSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeLinkNode {
    pub id: String,
    pub kind: NodeKind,
    pub community_id: Option<u32>,
    #[serde(flatten)]
    pub profile: CentralityProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeLinkEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
    pub interactions: u32,
}

/// Nodes ascending by ID, edges ascending by (source, target) with
/// `source < target`.
pub fn node_link(report: &LayerReport) -> NodeLinkGraph {
    let graph = &report.graph;
    let nodes = graph
        .sorted_ids()
        .into_iter()
        .map(|id| NodeLinkNode {
            id: id.to_string(),
            kind: report.layer.node_kind(),
            community_id: report.communities.community_of(id),
            profile: report.metrics.profile(id).cloned().unwrap_or_default(),
        })
        .collect();

    NodeLinkGraph {
        directed: false,
        multigraph: false,
        graph: NodeLinkMeta {
            layer: report.layer,
            approximate: graph.approximate,
            summary: report.summary.clone(),
        },
        nodes,
        links: sorted_edges(report),
    }
}

fn sorted_edges(report: &LayerReport) -> Vec<NodeLinkEdge> {
    let graph = &report.graph;
    let mut edges: Vec<NodeLinkEdge> = graph
        .graph
        .edge_references()
        .map(|e| {
            let a = graph.node_id(e.source());
            let b = graph.node_id(e.target());
            let (source, target) = if a <= b { (a, b) } else { (b, a) };
            NodeLinkEdge {
                source: source.to_string(),
                target: target.to_string(),
                weight: e.weight().weight,
                interactions: e.weight().interactions,
            }
        })
        .collect();
    edges.sort_by(|x, y| x.source.cmp(&y.source).then_with(|| x.target.cmp(&y.target)));
    edges
}

// ============================================================================
// GraphML
// ============================================================================

const NODE_KEYS: [(&str, &str); 8] = [
    ("kind", "string"),
    ("community_id", "int"),
    ("degree", "double"),
    ("betweenness", "double"),
    ("closeness", "double"),
    ("pagerank", "double"),
    ("clustering_coefficient", "double"),
    ("component_id", "int"),
];

/// Render a layer as a GraphML document.
///
/// Nodes without a community omit the `community_id` data element.
pub fn graphml(report: &LayerReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_graphml(&mut out, report.layer, &node_link(report));
    out
}

fn write_graphml(out: &mut String, layer: Layer, doc: &NodeLinkGraph) -> std::fmt::Result {
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#)?;
    for (name, ty) in NODE_KEYS {
        writeln!(
            out,
            r#"  <key id="{name}" for="node" attr.name="{name}" attr.type="{ty}"/>"#
        )?;
    }
    writeln!(
        out,
        r#"  <key id="weight" for="edge" attr.name="weight" attr.type="double"/>"#
    )?;
    writeln!(
        out,
        r#"  <key id="interactions" for="edge" attr.name="interactions" attr.type="int"/>"#
    )?;
    writeln!(out, r#"  <graph id="{}" edgedefault="undirected">"#, layer)?;

    for node in &doc.nodes {
        writeln!(out, r#"    <node id="{}">"#, escape(&node.id))?;
        let kind = serde_json::to_value(node.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        writeln!(out, r#"      <data key="kind">{}</data>"#, kind)?;
        if let Some(c) = node.community_id {
            writeln!(out, r#"      <data key="community_id">{}</data>"#, c)?;
        }
        let p = &node.profile;
        for (key, value) in [
            ("degree", p.degree),
            ("betweenness", p.betweenness),
            ("closeness", p.closeness),
            ("pagerank", p.pagerank),
            ("clustering_coefficient", p.clustering_coefficient),
        ] {
            writeln!(out, r#"      <data key="{}">{}</data>"#, key, value)?;
        }
        writeln!(out, r#"      <data key="component_id">{}</data>"#, p.component_id)?;
        writeln!(out, "    </node>")?;
    }

    for edge in &doc.links {
        writeln!(
            out,
            r#"    <edge source="{}" target="{}">"#,
            escape(&edge.source),
            escape(&edge.target)
        )?;
        writeln!(out, r#"      <data key="weight">{}</data>"#, edge.weight)?;
        writeln!(out, r#"      <data key="interactions">{}</data>"#, edge.interactions)?;
        writeln!(out, "    </edge>")?;
    }

    writeln!(out, "  </graph>")?;
    writeln!(out, "</graphml>")
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// ============================================================================
// Tables
// ============================================================================

/// One row of the Resonance table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResonanceRow {
    pub post_id: String,
    pub novelty: f64,
    pub persistence: f64,
    pub crisis_relevance: f64,
    pub cognitive_resonance: f64,
    pub composite: f64,
}

pub fn resonance_table(batch: &ResonanceBatch) -> Vec<ResonanceRow> {
    batch
        .scores
        .iter()
        .map(|s| ResonanceRow {
            post_id: s.post_id.clone(),
            novelty: s.novelty,
            persistence: s.persistence,
            crisis_relevance: s.crisis_relevance,
            cognitive_resonance: s.cognitive_resonance,
            composite: s.composite,
        })
        .collect()
}

/// Peak days and hours of the temporal profile.
#[derive(Debug, Clone, Serialize)]
pub struct PeakTable<'a> {
    pub peak_days: &'a [ActivityBucket],
    pub peak_hours: &'a [ActivityBucket],
}

pub fn peak_table(profile: &TemporalProfile) -> PeakTable<'_> {
    PeakTable {
        peak_days: &profile.peak_days,
        peak_hours: &profile.peak_hours,
    }
}

// ============================================================================
// Artifact writer
// ============================================================================

/// Write every artifact of `report` into `dir`, creating it if needed.
///
/// Returns the written paths in write order.
pub fn write_artifacts(report: &RunReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::new();
    write_json(dir, "report.json", report, &mut written)?;

    for (layer, layer_report) in &report.layers {
        write_json(
            dir,
            &format!("graph_{}.json", layer),
            &node_link(layer_report),
            &mut written,
        )?;
        let path = dir.join(format!("graph_{}.graphml", layer));
        std::fs::write(&path, graphml(layer_report))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    if let Some(hubs) = &report.hubs {
        write_json(dir, "hubs.json", &hubs.records, &mut written)?;
    }
    write_json(dir, "timeseries.json", &report.temporal.daily, &mut written)?;
    write_json(dir, "timeseries_hourly.json", &report.temporal.hourly, &mut written)?;
    write_json(dir, "peaks.json", &peak_table(&report.temporal), &mut written)?;
    write_json(dir, "phases.json", &report.temporal.phases, &mut written)?;
    if let Some(batch) = &report.resonance {
        write_json(dir, "resonance.json", &resonance_table(batch), &mut written)?;
    }

    tracing::info!(
        "Artifacts written: run_id={} dir={} files={}",
        report.run_id,
        dir.display(),
        written.len()
    );
    Ok(written)
}

/// Write `comparison` to `crisis_comparison.json` in `dir`.
pub fn write_comparison(comparison: &CrisisComparison, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let mut written = Vec::with_capacity(1);
    write_json(dir, "crisis_comparison.json", comparison, &mut written)?;
    written
        .pop()
        .with_context(|| format!("Nothing written to {}", dir.display()))
}

fn write_json<T: Serialize + ?Sized>(
    dir: &Path,
    name: &str,
    value: &T,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", name))?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(path);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CrisisSignalEngine, SignalEngine};
    use crate::posts::LinguisticScores;
    use crate::test_helpers::{crisis_store, linguistic_for, post_at, reply_at, store_of};

    fn reply_pair_report() -> RunReport {
        let store = store_of(vec![
            post_at("p1", "B", "news", 0),
            reply_at("c1", "A", "news", 10, "p1"),
            reply_at("c2", "A", "news", 20, "p1"),
        ]);
        CrisisSignalEngine::default()
            .run(&store, &LinguisticScores::new())
            .unwrap()
    }

    #[test]
    fn test_node_link_carries_profiles_and_communities() {
        let report = reply_pair_report();
        let doc = node_link(report.layer(Layer::UserInteraction).unwrap());
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[0].id, "A");
        assert!((doc.nodes[0].profile.degree - 1.0).abs() < 1e-12);
        assert!(doc.nodes[0].community_id.is_some());
        assert_eq!(doc.links.len(), 1);
        assert_eq!(doc.links[0].source, "A");
        assert!((doc.links[0].weight - 2.0).abs() < 1e-12);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["directed"], false);
        assert!(json["nodes"][0]["pagerank"].is_number());
    }

    #[test]
    fn test_graphml_is_escaped() {
        assert_eq!(escape(r#"a<b&"c""#), "a&lt;b&amp;&quot;c&quot;");
        let report = reply_pair_report();
        let xml = graphml(report.layer(Layer::UserInteraction).unwrap());
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"<graph id="user_interaction" edgedefault="undirected">"#));
        assert!(xml.contains(r#"<edge source="A" target="B">"#));
        assert!(xml.trim_end().ends_with("</graphml>"));
    }

    #[test]
    fn test_write_artifacts() {
        let store = crisis_store();
        let report = CrisisSignalEngine::default()
            .run(&store, &linguistic_for(&store))
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let written = write_artifacts(&report, dir.path()).unwrap();

        // report + 4 layers × 2 formats + hubs, daily, hourly, peaks, phases, resonance
        assert_eq!(written.len(), 1 + 8 + 6);
        for path in &written {
            assert!(path.exists(), "{}", path.display());
        }
        let rows: Vec<serde_json::Value> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("resonance.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(rows.len(), store.len());

        let hourly: Vec<serde_json::Value> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("timeseries_hourly.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(hourly.len(), report.temporal.hourly.len());
        let peaks: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("peaks.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(
            peaks["peak_days"].as_array().unwrap().len(),
            report.temporal.peak_days.len()
        );
        assert_eq!(
            peaks["peak_hours"].as_array().unwrap().len(),
            report.temporal.peak_hours.len()
        );
    }

    #[test]
    fn test_graphml_lists_every_node_and_edge() {
        let store = crisis_store();
        let report = CrisisSignalEngine::default()
            .run(&store, &linguistic_for(&store))
            .unwrap();
        let layer = report.layer(Layer::UserInteraction).unwrap();
        let xml = graphml(layer);
        assert_eq!(xml.matches("<node id=").count(), layer.graph.node_count());
        assert_eq!(xml.matches("<edge source=").count(), layer.graph.edge_count());
        assert_eq!(xml.matches(r#"<key id=""#).count(), NODE_KEYS.len() + 2);
    }
}
