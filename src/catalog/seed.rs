/// Built-in categories: Todo Apps, Note-taking Apps and Password Managers.

use serde_json::{json, Value};

use crate::catalog::{FeatureRepository, NewCategory};
use crate::errors::SvcrankError;

fn boolean_schema(fields: &[(&str, &str)]) -> Value {
    let map: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(key, label)| (key.to_string(), json!({"label": label, "type": "boolean"})))
        .collect();
    Value::Object(map)
}

fn contexts(entries: &[(&str, &str, &str)]) -> Value {
    let map: serde_json::Map<String, Value> = entries
        .iter()
        .map(|(key, label, description)| {
            (key.to_string(), json!({"label": label, "description": description}))
        })
        .collect();
    Value::Object(map)
}

pub fn builtin_categories() -> Vec<NewCategory> {
    vec![
        NewCategory {
            name: "Todo Apps".to_string(),
            slug: "todo".to_string(),
            description: Some(
                "Task management and to-do list applications for personal and team productivity.".to_string(),
            ),
            feature_schema: Some(boolean_schema(&[
                ("free_tier", "Free Tier"),
                ("collaboration", "Collaboration"),
                ("reminders", "Reminders"),
                ("due_dates", "Due Dates"),
                ("tags_labels", "Tags/Labels"),
                ("subtasks", "Subtasks"),
                ("attachments", "Attachments"),
                ("offline_mode", "Offline Mode"),
                ("calendar_view", "Calendar View"),
                ("integrations", "Integrations"),
                ("api_available", "API"),
            ])),
            ranking_contexts: Some(contexts(&[
                ("personal_use", "Personal Use", "Best for individual productivity"),
                ("team_collaboration", "Team Collaboration", "Best for team projects"),
                ("enterprise", "Enterprise", "Best for large organizations"),
                ("minimalist", "Minimalist", "Simple and focused"),
            ])),
        },
        NewCategory {
            name: "Note-taking Apps".to_string(),
            slug: "notes".to_string(),
            description: Some(
                "Applications for taking notes, organizing thoughts, and knowledge management.".to_string(),
            ),
            feature_schema: Some(boolean_schema(&[
                ("free_tier", "Free Tier"),
                ("markdown_support", "Markdown Support"),
                ("sync", "Cloud Sync"),
                ("offline_mode", "Offline Mode"),
                ("tags", "Tags/Organization"),
                ("search", "Full-text Search"),
                ("collaboration", "Collaboration"),
                ("export", "Export Options"),
                ("plugins", "Plugins/Extensions"),
                ("api_available", "API"),
            ])),
            ranking_contexts: Some(contexts(&[
                ("personal_use", "Personal Use", "Best for personal notes"),
                ("knowledge_base", "Knowledge Base", "Best for building a knowledge base"),
                ("team_wiki", "Team Wiki", "Best for team documentation"),
            ])),
        },
        NewCategory {
            name: "Password Managers".to_string(),
            slug: "passwords".to_string(),
            description: Some("Secure password storage and management applications.".to_string()),
            feature_schema: Some(boolean_schema(&[
                ("free_tier", "Free Tier"),
                ("encryption", "End-to-end Encryption"),
                ("two_factor", "2FA Support"),
                ("browser_extension", "Browser Extension"),
                ("mobile_app", "Mobile App"),
                ("password_generator", "Password Generator"),
                ("secure_sharing", "Secure Sharing"),
                ("breach_monitoring", "Breach Monitoring"),
                ("family_plan", "Family Plan"),
            ])),
            ranking_contexts: Some(contexts(&[
                ("personal_use", "Personal Use", "Best for individuals"),
                ("family", "Family", "Best for families"),
                ("business", "Business", "Best for businesses"),
            ])),
        },
    ]
}

impl FeatureRepository {
    /// Upsert the built-in categories. Returns (slug, id) pairs.
    pub async fn seed_categories(&self) -> Result<Vec<(String, i64)>, SvcrankError> {
        let mut seeded = Vec::new();
        for category in builtin_categories() {
            let id = self.add_category(&category).await?;
            tracing::info!(category = %category.name, id, "Seeded category");
            seeded.push((category.slug, id));
        }
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Storage;

    #[test]
    fn test_todo_schema_covers_core_features() {
        let todo = &builtin_categories()[0];
        let schema = todo.feature_schema.as_ref().unwrap().as_object().unwrap();
        for feature in crate::catalog::CORE_FEATURES {
            assert!(schema.contains_key(feature), "missing {}", feature);
        }
    }

    #[tokio::test]
    async fn test_seeding_twice_is_stable() {
        let repo = FeatureRepository::new(Storage::in_memory().await.unwrap());
        let first = repo.seed_categories().await.unwrap();
        let second = repo.seed_categories().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.get_categories().await.unwrap().len(), 3);
    }
}
