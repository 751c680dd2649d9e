/// Pivot of per-service feature rows into a service → feature → bool matrix.
///
/// Services keep the order in which they were first seen in the input rows; the
/// repository feeds rows ordered by service name, then feature name.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::catalog::{feature_label, FeatureMap, CORE_FEATURES};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonMatrix {
    entries: Vec<(String, FeatureMap)>,
    index: HashMap<String, usize>,
}

impl ComparisonMatrix {
    /// Record one (service, feature) cell. A repeated pair overwrites the cell.
    pub fn insert(&mut self, service: String, feature: String, available: bool) {
        let slot = match self.index.get(&service) {
            Some(&i) => i,
            None => {
                self.entries.push((service.clone(), FeatureMap::new()));
                self.index.insert(service, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        self.entries[slot].1.insert(feature, available);
    }

    pub fn get(&self, service: &str) -> Option<&FeatureMap> {
        self.index.get(service).map(|&i| &self.entries[i].1)
    }

    /// Service names in first-seen order.
    pub fn services(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureMap)> {
        self.entries.iter().map(|(name, features)| (name.as_str(), features))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the services for which `keep` returns true, preserving order.
    pub fn retain_services<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.entries.retain(|(name, _)| keep(name));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
    }
}

impl Serialize for ComparisonMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, features) in &self.entries {
            map.serialize_entry(name, features)?;
        }
        map.end()
    }
}

/// Build the matrix in one pass over (service, feature, available) rows.
pub fn build_matrix<I>(rows: I) -> ComparisonMatrix
where
    I: IntoIterator<Item = (String, String, bool)>,
{
    let mut matrix = ComparisonMatrix::default();
    for (service, feature, available) in rows {
        matrix.insert(service, feature, available);
    }
    matrix
}

/// Plain-text table: one row per core feature, one column per service.
/// Unrecorded cells render as ✗.
pub fn render_table(matrix: &ComparisonMatrix) -> String {
    if matrix.is_empty() {
        return "No services to compare.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!("{:<20}", "Feature"));
    for name in matrix.services() {
        let short: String = name.chars().take(15).collect();
        out.push_str(&format!("{:>17}", short));
    }
    out.push('\n');
    out.push_str(&"-".repeat(20 + 17 * matrix.len()));
    out.push('\n');

    for feature in CORE_FEATURES {
        out.push_str(&format!("{:<20}", feature_label(feature)));
        for (_, features) in matrix.iter() {
            let symbol = if features.get(feature).copied().unwrap_or(false) { "✓" } else { "✗" };
            out.push_str(&format!("{:>17}", symbol));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(service: &str, feature: &str, available: bool) -> (String, String, bool) {
        (service.to_string(), feature.to_string(), available)
    }

    #[test]
    fn test_build_preserves_first_seen_order() {
        let matrix = build_matrix(vec![
            row("Todoist", "free_tier", true),
            row("Asana", "free_tier", false),
            row("Todoist", "api_available", true),
        ]);
        assert_eq!(matrix.services(), vec!["Todoist", "Asana"]);
        assert_eq!(matrix.get("Todoist").unwrap().len(), 2);
        assert_eq!(matrix.get("Asana").unwrap().get("free_tier"), Some(&false));
    }

    #[test]
    fn test_unrecorded_pairs_are_absent() {
        let matrix = build_matrix(vec![row("Todoist", "free_tier", true)]);
        assert_eq!(matrix.get("Todoist").unwrap().get("offline_mode"), None);
        assert!(matrix.get("Asana").is_none());
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let matrix = build_matrix(vec![
            row("Zenkit", "subtasks", true),
            row("Asana", "subtasks", false),
        ]);
        let text = serde_json::to_string(&matrix).unwrap();
        assert_eq!(text, r#"{"Zenkit":{"subtasks":true},"Asana":{"subtasks":false}}"#);
    }

    #[test]
    fn test_retain_services_reindexes() {
        let mut matrix = build_matrix(vec![
            row("A", "free_tier", true),
            row("B", "free_tier", true),
            row("C", "free_tier", true),
        ]);
        matrix.retain_services(|name| name != "A");
        assert_eq!(matrix.services(), vec!["B", "C"]);
        assert!(matrix.get("A").is_none());
        assert_eq!(matrix.get("C").unwrap().get("free_tier"), Some(&true));
    }

    #[test]
    fn test_render_table_marks_cells() {
        let matrix = build_matrix(vec![row("Todoist", "free_tier", true)]);
        let table = render_table(&matrix);
        let free_tier_line = table.lines().find(|l| l.starts_with("Free Tier")).unwrap();
        assert!(free_tier_line.ends_with('✓'));
        let api_line = table.lines().find(|l| l.starts_with("API")).unwrap();
        assert!(api_line.ends_with('✗'));
    }
}
