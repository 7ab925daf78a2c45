//! Independent hub predicates.
//!
//! Each [`HubRule`] inspects the whole eligible population and returns the
//! nodes that earn its label. Rules never see each other's output.

use std::collections::{BTreeMap, BTreeSet};

use super::models::{HubConfig, HubLabel, NodeFeatures};

/// Eligible nodes with their features, keyed by node ID.
pub type Population = BTreeMap<String, NodeFeatures>;

pub trait HubRule: Send + Sync {
    fn label(&self) -> HubLabel;

    /// Nodes of `population` that satisfy this rule.
    fn select(&self, population: &Population) -> BTreeSet<String>;
}

/// The six standard rules configured from `config`.
pub fn default_rules(config: &HubConfig) -> Vec<Box<dyn HubRule>> {
    vec![
        Box::new(TopFractionRule::new(
            HubLabel::StructuralHub,
            config.top_fraction,
            |f: &NodeFeatures| f.degree,
        )),
        Box::new(InformationBrokerRule {
            top_fraction: config.top_fraction,
            min_ego_communities: config.min_ego_communities,
        }),
        Box::new(TopFractionRule::new(
            HubLabel::CognitiveInfluencer,
            config.top_fraction,
            |f: &NodeFeatures| f.emotional_intensity,
        )),
        Box::new(TopFractionRule::new(
            HubLabel::ResonanceLeader,
            config.top_fraction,
            |f: &NodeFeatures| f.resonance.unwrap_or(0.0),
        )),
        Box::new(CrisisSpecialistRule {
            ratio: config.crisis_specialist_ratio,
        }),
        Box::new(CommunityCoordinatorRule),
    ]
}

/// Nodes in the top `fraction` by value.
///
/// The cut keeps `ceil(fraction · n)` nodes (at least one), extended to
/// every node tied with the last one kept. Only positive values qualify.
pub fn top_fraction<'a>(
    values: impl IntoIterator<Item = (&'a str, f64)>,
    fraction: f64,
) -> BTreeSet<String> {
    let mut ranked: Vec<(&str, f64)> = values.into_iter().collect();
    if ranked.is_empty() {
        return BTreeSet::new();
    }
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let keep = ((fraction * ranked.len() as f64).ceil() as usize).clamp(1, ranked.len());
    let cut = ranked[keep - 1].1;
    ranked
        .into_iter()
        .take_while(|(_, v)| *v >= cut)
        .filter(|(_, v)| *v > 0.0)
        .map(|(id, _)| id.to_string())
        .collect()
}

// ============================================================================
// Rules
// ============================================================================

/// Top-decile rule over a single feature.
pub struct TopFractionRule {
    label: HubLabel,
    fraction: f64,
    value: fn(&NodeFeatures) -> f64,
}

impl TopFractionRule {
    pub fn new(label: HubLabel, fraction: f64, value: fn(&NodeFeatures) -> f64) -> Self {
        Self {
            label,
            fraction,
            value,
        }
    }
}

impl HubRule for TopFractionRule {
    fn label(&self) -> HubLabel {
        self.label
    }

    fn select(&self, population: &Population) -> BTreeSet<String> {
        top_fraction(
            population.iter().map(|(id, f)| (id.as_str(), (self.value)(f))),
            self.fraction,
        )
    }
}

/// Top-decile betweenness whose ego network spans several communities.
pub struct InformationBrokerRule {
    pub top_fraction: f64,
    pub min_ego_communities: usize,
}

impl HubRule for InformationBrokerRule {
    fn label(&self) -> HubLabel {
        HubLabel::InformationBroker
    }

    fn select(&self, population: &Population) -> BTreeSet<String> {
        let top = top_fraction(
            population.iter().map(|(id, f)| (id.as_str(), f.betweenness)),
            self.top_fraction,
        );
        top.into_iter()
            .filter(|id| {
                population
                    .get(id)
                    .is_some_and(|f| f.ego_communities >= self.min_ego_communities)
            })
            .collect()
    }
}

/// Majority of posts carry crisis vocabulary.
pub struct CrisisSpecialistRule {
    pub ratio: f64,
}

impl HubRule for CrisisSpecialistRule {
    fn label(&self) -> HubLabel {
        HubLabel::CrisisSpecialist
    }

    fn select(&self, population: &Population) -> BTreeSet<String> {
        population
            .iter()
            .filter(|(_, f)| f.crisis_share > self.ratio)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Highest raw degree within each community; ties go to the lowest ID.
pub struct CommunityCoordinatorRule;

impl HubRule for CommunityCoordinatorRule {
    fn label(&self) -> HubLabel {
        HubLabel::CommunityCoordinator
    }

    fn select(&self, population: &Population) -> BTreeSet<String> {
        // Population iterates in ascending ID order, so the first maximum wins
        let mut best: BTreeMap<u32, (&str, usize)> = BTreeMap::new();
        for (id, f) in population {
            let Some(community) = f.community_id else {
                continue;
            };
            match best.get(&community) {
                Some((_, degree)) if *degree >= f.raw_degree => {}
                _ => {
                    best.insert(community, (id.as_str(), f.raw_degree));
                }
            }
        }
        best.into_values().map(|(id, _)| id.to_string()).collect()
    }
}
