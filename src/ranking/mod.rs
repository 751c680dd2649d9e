/// Context-specific scoring and ranking.

pub mod engine;
pub mod scorer;

pub use engine::{assign_ranks, Candidate, RankingEngine, RankingEntry};
pub use scorer::{score, uniform_weights, WeightVector};

/// Contexts that ship with preset weight vectors.
pub const PRESET_CONTEXTS: [&str; 4] = ["personal_use", "team_collaboration", "enterprise", "minimalist"];

/// Preset weight vector for a built-in context.
///
/// The enterprise preset also weights `security` and `admin_controls`; those only
/// count for services that have such feature rows.
pub fn preset_weights(context: &str) -> Option<WeightVector> {
    let pairs: &[(&str, f64)] = match context {
        "personal_use" => &[
            ("free_tier", 2.0),
            ("reminders", 2.0),
            ("due_dates", 1.5),
            ("tags_labels", 1.5),
            ("subtasks", 1.0),
            ("attachments", 1.0),
            ("offline_mode", 1.5),
            ("calendar_view", 1.0),
            ("collaboration", 0.5),
            ("integrations", 1.0),
            ("api_available", 0.5),
        ],
        "team_collaboration" => &[
            ("collaboration", 3.0),
            ("integrations", 2.0),
            ("api_available", 1.5),
            ("attachments", 1.5),
            ("tags_labels", 1.0),
            ("subtasks", 1.5),
            ("due_dates", 1.0),
            ("calendar_view", 1.0),
            ("reminders", 1.0),
            ("free_tier", 0.5),
            ("offline_mode", 0.5),
        ],
        "enterprise" => &[
            ("collaboration", 2.5),
            ("api_available", 2.5),
            ("integrations", 2.0),
            ("attachments", 1.5),
            ("security", 2.0),
            ("admin_controls", 2.0),
            ("tags_labels", 1.0),
            ("subtasks", 1.0),
            ("due_dates", 1.0),
            ("calendar_view", 0.5),
            ("offline_mode", 0.5),
            ("free_tier", 0.0),
        ],
        "minimalist" => &[
            ("free_tier", 2.0),
            ("due_dates", 2.0),
            ("reminders", 1.5),
            ("offline_mode", 1.0),
            ("tags_labels", 0.5),
            ("subtasks", 0.5),
            ("attachments", 0.5),
            ("calendar_view", 0.5),
            ("collaboration", 0.0),
            ("integrations", 0.5),
            ("api_available", 0.0),
        ],
        _ => return None,
    };
    Some(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_context_has_weights() {
        for context in PRESET_CONTEXTS {
            assert!(preset_weights(context).is_some(), "{}", context);
        }
        assert!(preset_weights("unknown").is_none());
    }

    #[test]
    fn test_team_preset_favours_collaboration() {
        let w = preset_weights("team_collaboration").unwrap();
        let max = w.values().cloned().fold(f64::MIN, f64::max);
        assert_eq!(w["collaboration"], max);
    }
}
