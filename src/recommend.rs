/// Exact-match recommendation over the feature-comparison matrix.
///
/// A service qualifies when every required feature's recorded value (false when
/// unrecorded) equals the required value. Qualifying services are ordered by the
/// context's stored ranking; services the context has not ranked yet follow the
/// ranked ones, by name, with no score.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::{FeatureMap, FeatureRepository};
use crate::errors::SvcrankError;
use crate::ranking::RankingEngine;

/// Required feature values; keys not listed are unconstrained.
pub type Requirements = BTreeMap<String, bool>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
    pub features: FeatureMap,
}

/// True when `features` satisfies every entry of `requirements`.
pub fn satisfies(features: &FeatureMap, requirements: &Requirements) -> bool {
    requirements
        .iter()
        .all(|(feature, required)| features.get(feature).copied().unwrap_or(false) == *required)
}

#[derive(Debug, Clone)]
pub struct RecommendationFilter {
    repo: FeatureRepository,
    engine: RankingEngine,
}

impl RecommendationFilter {
    pub fn new(repo: FeatureRepository, engine: RankingEngine) -> Self {
        RecommendationFilter { repo, engine }
    }

    pub async fn recommend(
        &self,
        requirements: &Requirements,
        context: &str,
        category_slug: Option<&str>,
    ) -> Result<Vec<Recommendation>, SvcrankError> {
        let matrix = self.repo.get_feature_comparison(category_slug).await?;
        let qualifying: Vec<(String, FeatureMap)> = matrix
            .iter()
            .filter(|(_, features)| satisfies(features, requirements))
            .map(|(name, features)| (name.to_string(), features.clone()))
            .collect();

        let rankings = self.engine.get_rankings(context).await?;
        let standing: HashMap<&str, (i64, f64, i64)> = rankings
            .iter()
            .map(|e| (e.service_name.as_str(), (e.service_id, e.score, e.rank)))
            .collect();

        let mut ranked = Vec::new();
        let mut unranked = Vec::new();
        for (name, features) in qualifying {
            match standing.get(name.as_str()) {
                Some(&(service_id, score, rank)) => ranked.push(Recommendation {
                    service_name: name,
                    service_id: Some(service_id),
                    score: Some(score),
                    rank: Some(rank),
                    features,
                }),
                None => unranked.push(Recommendation {
                    service_name: name,
                    service_id: None,
                    score: None,
                    rank: None,
                    features,
                }),
            }
        }

        ranked.sort_by(|a, b| {
            let (sa, sb) = (a.score.unwrap_or(0.0), b.score.unwrap_or(0.0));
            sb.total_cmp(&sa).then_with(|| a.service_name.cmp(&b.service_name))
        });
        unranked.sort_by(|a, b| a.service_name.cmp(&b.service_name));

        if !unranked.is_empty() {
            tracing::debug!(context, count = unranked.len(), "Qualifying services without a ranking");
        }
        ranked.extend(unranked);
        Ok(ranked)
    }
}
