/// Service catalog: the records handed over by feature extraction, the stored
/// service/category shapes, and the repository that persists them.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub mod categories;
pub mod repository;
pub mod seed;

pub use repository::FeatureRepository;

/// The eleven recognized boolean capabilities, in display order.
pub const CORE_FEATURES: [&str; 11] = [
    "free_tier",
    "collaboration",
    "reminders",
    "due_dates",
    "tags_labels",
    "subtasks",
    "attachments",
    "offline_mode",
    "calendar_view",
    "integrations",
    "api_available",
];

/// Human-readable label for a core feature.
pub fn feature_label(feature: &str) -> &str {
    match feature {
        "free_tier" => "Free Tier",
        "collaboration" => "Collaboration",
        "reminders" => "Reminders",
        "due_dates" => "Due Dates",
        "tags_labels" => "Tags/Labels",
        "subtasks" => "Subtasks",
        "attachments" => "Attachments",
        "offline_mode" => "Offline Mode",
        "calendar_view" => "Calendar View",
        "integrations" => "Integrations",
        "api_available" => "API",
        other => other,
    }
}

/// Recorded boolean features of one service. A missing key means "unknown".
pub type FeatureMap = BTreeMap<String, bool>;

/// A finished feature record from the extraction side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceFeatures {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub pricing: Option<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub free_tier: bool,
    #[serde(default)]
    pub collaboration: bool,
    #[serde(default)]
    pub reminders: bool,
    #[serde(default)]
    pub due_dates: bool,
    #[serde(default)]
    pub tags_labels: bool,
    #[serde(default)]
    pub subtasks: bool,
    #[serde(default)]
    pub attachments: bool,
    #[serde(default)]
    pub offline_mode: bool,
    #[serde(default)]
    pub calendar_view: bool,
    #[serde(default)]
    pub integrations: bool,
    #[serde(default)]
    pub api_available: bool,
    #[serde(default)]
    pub additional_features: Vec<String>,
    /// Slug of the category to file the service under, if known.
    #[serde(default)]
    pub category: Option<String>,
}

impl ServiceFeatures {
    /// The eleven core flags as (name, value) pairs in `CORE_FEATURES` order.
    pub fn core_flags(&self) -> [(&'static str, bool); 11] {
        [
            ("free_tier", self.free_tier),
            ("collaboration", self.collaboration),
            ("reminders", self.reminders),
            ("due_dates", self.due_dates),
            ("tags_labels", self.tags_labels),
            ("subtasks", self.subtasks),
            ("attachments", self.attachments),
            ("offline_mode", self.offline_mode),
            ("calendar_view", self.calendar_view),
            ("integrations", self.integrations),
            ("api_available", self.api_available),
        ]
    }
}

/// A stored service, optionally annotated with its features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub pricing: Option<String>,
    pub platforms: Vec<String>,
    pub category_id: Option<i64>,
    pub scraped_at: Option<NaiveDateTime>,
    pub last_updated: Option<NaiveDateTime>,
    #[serde(default)]
    pub features: FeatureMap,
    #[serde(default)]
    pub additional_features: Vec<String>,
}

/// A category with its opaque schema and context documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub feature_schema: Option<serde_json::Value>,
    pub ranking_contexts: Option<serde_json::Value>,
    pub created_at: Option<NaiveDateTime>,
}

/// Input for creating or replacing a category, keyed on slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub feature_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub ranking_contexts: Option<serde_json::Value>,
}

/// A service's standing in one context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextStanding {
    pub rank: i64,
    pub score: f64,
}

/// Everything known about one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSummary {
    pub service: Service,
    pub rankings: BTreeMap<String, ContextStanding>,
}
