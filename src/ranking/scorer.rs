/// Weighted feature scoring.
///
/// score = Σ weight[f] over every feature f that has a weight AND is recorded as
/// available for the service. Unweighted features and features that are false or
/// unrecorded contribute nothing. Pure function, no I/O.
///
/// Summation walks the weight vector in key order, so a given (features, weights)
/// pair always produces the same bits; across differently-ordered inputs the
/// result may differ in the last ulp.

use std::collections::BTreeMap;

use crate::catalog::{FeatureMap, CORE_FEATURES};

/// Scoring vector for one context: feature name → importance.
pub type WeightVector = BTreeMap<String, f64>;

pub fn score(features: &FeatureMap, weights: &WeightVector) -> f64 {
    weights
        .iter()
        .filter(|(feature, _)| features.get(feature.as_str()).copied().unwrap_or(false))
        .map(|(_, weight)| *weight)
        .sum()
}

/// Weight 1.0 on each of the eleven core features.
pub fn uniform_weights() -> WeightVector {
    CORE_FEATURES.iter().map(|f| (f.to_string(), 1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(pairs: &[(&str, bool)]) -> FeatureMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn weights(pairs: &[(&str, f64)]) -> WeightVector {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_score_truth_table() {
        let w = weights(&[("a", 2.0), ("b", 1.0)]);
        assert_eq!(score(&features(&[("a", true), ("b", false)]), &w), 2.0);
        assert_eq!(score(&features(&[("a", false), ("b", true)]), &w), 1.0);
        assert_eq!(score(&features(&[("a", true), ("b", true)]), &w), 3.0);
        assert_eq!(score(&features(&[("a", false), ("b", false)]), &w), 0.0);
    }

    #[test]
    fn test_unweighted_features_contribute_nothing() {
        let w = weights(&[("a", 2.0)]);
        assert_eq!(score(&features(&[("a", true), ("z", true)]), &w), 2.0);
    }

    #[test]
    fn test_unrecorded_features_count_as_false() {
        let w = weights(&[("a", 2.0), ("b", 5.0)]);
        assert_eq!(score(&features(&[("a", true)]), &w), 2.0);
        assert_eq!(score(&FeatureMap::new(), &w), 0.0);
    }

    #[test]
    fn test_zero_and_negative_weights_are_summed_as_given() {
        let w = weights(&[("a", 0.0), ("b", -1.5), ("c", 1.0)]);
        let all = features(&[("a", true), ("b", true), ("c", true)]);
        assert_eq!(score(&all, &w), -0.5);
    }

    #[test]
    fn test_uniform_weights_cover_core_features() {
        let w = uniform_weights();
        assert_eq!(w.len(), 11);
        assert!(w.values().all(|&v| v == 1.0));
        let everything: FeatureMap = CORE_FEATURES.iter().map(|f| (f.to_string(), true)).collect();
        assert_eq!(score(&everything, &w), 11.0);
    }
}
