//! Applies the hub rules to the user-interaction layer.

use std::collections::{BTreeMap, BTreeSet};

use super::models::{HubConfig, HubLabel, HubRankings, HubRecord, HubReport, NodeFeatures, RankedNode};
use super::rules::{default_rules, HubRule, Population};
use crate::analytics::{CommunityPartition, MetricsResult};
use crate::network::LayerGraph;
use crate::posts::{CrisisLexicon, LinguisticScores, PostStore};

/// Inputs the classifier reads. All borrowed; nothing is mutated.
pub struct HubInput<'a> {
    /// User-interaction layer
    pub graph: &'a LayerGraph,
    pub metrics: &'a MetricsResult,
    pub partition: &'a CommunityPartition,
    pub store: &'a PostStore,
    pub linguistic: &'a LinguisticScores,
    pub lexicon: &'a CrisisLexicon,
    /// Post ID → composite Resonance, when the content layer was scored
    pub resonance: Option<&'a BTreeMap<String, f64>>,
}

pub struct HubClassifier {
    config: HubConfig,
    rules: Vec<Box<dyn HubRule>>,
}

impl HubClassifier {
    pub fn new(config: HubConfig) -> Self {
        let rules = default_rules(&config);
        Self { config, rules }
    }

    /// Replace the rule set.
    pub fn with_rules(config: HubConfig, rules: Vec<Box<dyn HubRule>>) -> Self {
        Self { config, rules }
    }

    pub fn rule_labels(&self) -> Vec<HubLabel> {
        self.rules.iter().map(|r| r.label()).collect()
    }

    pub fn classify(&self, input: &HubInput<'_>) -> HubReport {
        let (population, ineligible) = self.population(input);

        let mut labels: BTreeMap<&str, BTreeSet<HubLabel>> = BTreeMap::new();
        for rule in &self.rules {
            let selected = rule.select(&population);
            tracing::debug!("Hub rule {} selected={}", rule.label(), selected.len());
            for node in selected {
                if let Some((id, _)) = population.get_key_value(&node) {
                    labels.entry(id.as_str()).or_default().insert(rule.label());
                }
            }
        }

        let records = population
            .iter()
            .map(|(id, features)| HubRecord {
                node: id.clone(),
                labels: labels.remove(id.as_str()).unwrap_or_default(),
                features: features.clone(),
            })
            .collect::<Vec<_>>();

        let k = self.config.top_k;
        let rankings = HubRankings {
            high_degree: top_k(&population, k, |f: &NodeFeatures| f.degree),
            information_brokers: top_k(&population, k, |f: &NodeFeatures| f.betweenness),
            quick_spreaders: top_k(&population, k, |f: &NodeFeatures| f.closeness),
            influence_leaders: top_k(&population, k, |f: &NodeFeatures| f.pagerank),
        };

        let labelled = records.iter().filter(|r| !r.labels.is_empty()).count();
        tracing::info!(
            "Classified hubs eligible={} ineligible={} labelled={}",
            records.len(),
            ineligible,
            labelled
        );

        HubReport {
            records,
            rankings,
            ineligible,
        }
    }

    /// Features for every node with at least `min_post_count` posts.
    fn population(&self, input: &HubInput<'_>) -> (Population, usize) {
        let by_author = input.store.posts_by_author();
        let mut population = Population::new();
        let mut ineligible = 0;

        for id in input.graph.sorted_ids() {
            let posts = by_author.get(id).map(Vec::as_slice).unwrap_or(&[]);
            if posts.len() < self.config.min_post_count {
                ineligible += 1;
                continue;
            }
            let profile = input.metrics.profile(id).cloned().unwrap_or_default();
            let community_id = input.partition.community_of(id);

            let mut ego: BTreeSet<u32> = community_id.into_iter().collect();
            for (neighbor, _) in input.graph.neighbors(id) {
                if let Some(c) = input.partition.community_of(neighbor) {
                    ego.insert(c);
                }
            }

            let count = posts.len().max(1) as f64;
            let emotional_intensity = posts
                .iter()
                .map(|p| {
                    input
                        .linguistic
                        .sum_categories(&p.id, &self.config.emotion_categories)
                })
                .sum::<f64>()
                / count;
            let crisis_posts = posts.iter().filter(|p| input.lexicon.matches(&p.text())).count();

            let resonance = input.resonance.and_then(|scores| {
                let scored: Vec<f64> = posts.iter().filter_map(|p| scores.get(&p.id).copied()).collect();
                (!scored.is_empty()).then(|| scored.iter().sum::<f64>() / scored.len() as f64)
            });

            population.insert(
                id.to_string(),
                NodeFeatures {
                    post_count: posts.len(),
                    degree: profile.degree,
                    raw_degree: profile.raw_degree,
                    betweenness: profile.betweenness,
                    closeness: profile.closeness,
                    pagerank: profile.pagerank,
                    community_id,
                    ego_communities: ego.len(),
                    emotional_intensity,
                    resonance,
                    crisis_share: if posts.is_empty() {
                        0.0
                    } else {
                        crisis_posts as f64 / count
                    },
                },
            );
        }
        (population, ineligible)
    }
}

impl Default for HubClassifier {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

fn top_k(population: &Population, k: usize, value: fn(&NodeFeatures) -> f64) -> Vec<RankedNode> {
    let mut ranked: Vec<RankedNode> = population
        .iter()
        .map(|(id, f)| RankedNode {
            node: id.clone(),
            value: value(f),
        })
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.node.cmp(&b.node)));
    ranked.truncate(k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{compute, detect, CommunityConfig, MetricConfig};
    use crate::network::NetworkBuilder;
    use crate::test_helpers::{post_at, reply_at, store_of};

    struct Fixture {
        store: PostStore,
        graph: LayerGraph,
        metrics: MetricsResult,
        partition: CommunityPartition,
    }

    fn fixture(store: PostStore) -> Fixture {
        let graph = NetworkBuilder::default()
            .build_user_interaction(&store)
            .unwrap();
        let metrics = compute(&graph, &MetricConfig::default());
        let partition = detect(&graph, &CommunityConfig::default());
        Fixture {
            store,
            graph,
            metrics,
            partition,
        }
    }

    fn classify(f: &Fixture, linguistic: &LinguisticScores, config: HubConfig) -> HubReport {
        classify_with_resonance(f, linguistic, config, None)
    }

    fn classify_with_resonance(
        f: &Fixture,
        linguistic: &LinguisticScores,
        config: HubConfig,
        resonance: Option<&BTreeMap<String, f64>>,
    ) -> HubReport {
        let lexicon = CrisisLexicon::default();
        HubClassifier::new(config).classify(&HubInput {
            graph: &f.graph,
            metrics: &f.metrics,
            partition: &f.partition,
            store: &f.store,
            linguistic,
            lexicon: &lexicon,
            resonance,
        })
    }

    /// Reply triangles a1-a2-a3 (news) and b1-b2-b3 (weather); b1 answers a3.
    fn bridged_authors() -> PostStore {
        store_of(vec![
            post_at("pa", "a1", "news", 0),
            reply_at("ra2", "a2", "news", 60, "pa"),
            reply_at("ra3", "a3", "news", 120, "pa"),
            reply_at("ra3b", "a3", "news", 180, "ra2"),
            post_at("pb", "b1", "weather", 30),
            reply_at("rb2", "b2", "weather", 90, "pb"),
            reply_at("rb3", "b3", "weather", 150, "pb"),
            reply_at("rb3b", "b3", "weather", 210, "rb2"),
            reply_at("bridge", "b1", "news", 240, "ra3"),
        ])
    }

    #[test]
    fn test_reply_pair_coordinator_is_lowest_id() {
        let f = fixture(store_of(vec![
            post_at("p1", "B", "news", 0),
            reply_at("c1", "A", "news", 10, "p1"),
            reply_at("c2", "A", "news", 20, "p1"),
        ]));
        let report = classify(&f, &LinguisticScores::new(), HubConfig::default());
        assert_eq!(report.with_label(HubLabel::CommunityCoordinator), vec!["A"]);
        // Both have degree 1.0 → both structural hubs through the tie
        assert_eq!(report.with_label(HubLabel::StructuralHub), vec!["A", "B"]);
        assert!(report.labels_of("B").contains(&HubLabel::StructuralHub));
    }

    #[test]
    fn test_ineligible_nodes_get_no_labels() {
        let f = fixture(store_of(vec![
            post_at("p1", "B", "news", 0),
            reply_at("c1", "A", "news", 10, "p1"),
            reply_at("c2", "A", "news", 20, "p1"),
        ]));
        let config = HubConfig {
            min_post_count: 2,
            ..Default::default()
        };
        let report = classify(&f, &LinguisticScores::new(), config);
        assert_eq!(report.ineligible, 1);
        assert_eq!(report.records.len(), 1);
        assert!(report.labels_of("B").is_empty());
    }

    #[test]
    fn test_crisis_specialist_and_cognitive_influencer() {
        let mut p1 = post_at("p1", "alice", "news", 0);
        p1.title = "Evacuation order issued".into();
        let mut p2 = post_at("p2", "alice", "news", 60);
        p2.title = "Shelter at the high school".into();
        let mut p3 = post_at("p3", "bob", "news", 120);
        p3.title = "Traffic update".into();
        let f = fixture(store_of(vec![p1, p2, p3]));

        let mut linguistic = LinguisticScores::new();
        linguistic.insert("p3", [("anx".to_string(), 4.0)].into_iter().collect());
        let report = classify(&f, &linguistic, HubConfig::default());

        assert_eq!(report.with_label(HubLabel::CrisisSpecialist), vec!["alice"]);
        assert_eq!(report.with_label(HubLabel::CognitiveInfluencer), vec!["bob"]);
        assert!(report.with_label(HubLabel::ResonanceLeader).is_empty());
    }

    #[test]
    fn test_rankings_sorted_and_truncated() {
        let f = fixture(crate::test_helpers::crisis_store());
        let config = HubConfig {
            top_k: 2,
            ..Default::default()
        };
        let report = classify(&f, &LinguisticScores::new(), config);
        let ranking = &report.rankings.influence_leaders;
        assert!(ranking.len() <= 2);
        if ranking.len() == 2 {
            assert!(ranking[0].value >= ranking[1].value);
        }
    }

    #[test]
    fn test_bridge_authors_are_information_brokers() {
        let f = fixture(bridged_authors());
        assert_eq!(f.graph.edge_count(), 7);
        assert_eq!(f.partition.len(), 2);
        assert_ne!(
            f.partition.community_of("a3"),
            f.partition.community_of("b1")
        );

        let report = classify(&f, &LinguisticScores::new(), HubConfig::default());
        assert_eq!(
            report.with_label(HubLabel::InformationBroker),
            vec!["a3", "b1"]
        );
        assert!(!report.labels_of("a1").contains(&HubLabel::InformationBroker));
        let broker = report.records.iter().find(|r| r.node == "a3").unwrap();
        assert_eq!(broker.features.ego_communities, 2);
    }

    #[test]
    fn test_resonance_leader_uses_mean_composite() {
        let f = fixture(bridged_authors());
        let composites: BTreeMap<String, f64> = [
            ("pa", 0.2),
            ("ra2", 0.2),
            // a3 averages to 0.5 across two posts
            ("ra3", 0.95),
            ("ra3b", 0.05),
            ("pb", 0.3),
            ("rb2", 0.9),
            ("rb3", 0.1),
            ("rb3b", 0.1),
        ]
        .into_iter()
        .map(|(id, v)| (id.to_string(), v))
        .collect();

        let report = classify_with_resonance(
            &f,
            &LinguisticScores::new(),
            HubConfig::default(),
            Some(&composites),
        );
        assert_eq!(report.with_label(HubLabel::ResonanceLeader), vec!["b2"]);
        let a3 = report.records.iter().find(|r| r.node == "a3").unwrap();
        assert!((a3.features.resonance.unwrap() - 0.5).abs() < 1e-12);
        // b1's unscored bridge reply is left out of its mean
        let b1 = report.records.iter().find(|r| r.node == "b1").unwrap();
        assert!((b1.features.resonance.unwrap() - 0.3).abs() < 1e-12);
    }
}
