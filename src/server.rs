/// HTTP dispatcher over the catalog, ranking engine and recommendation filter.
///
/// Every route is a read. Lookups that miss become 404, rejected input 400, and
/// anything else 500 with `{"error": message}`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::{Category, FeatureRepository, Service};
use crate::comparison::ComparisonMatrix;
use crate::errors::SvcrankError;
use crate::ranking::{RankingEngine, RankingEntry};
use crate::recommend::{Recommendation, RecommendationFilter, Requirements};
use crate::store::Storage;

/// Feature flags the recommend endpoint accepts as requirements.
pub const RECOMMEND_FLAGS: [&str; 4] = ["free_tier", "collaboration", "offline_mode", "api_available"];

/// Shared state handed to every handler.
pub struct AppState {
    pub repo: FeatureRepository,
    pub engine: RankingEngine,
    pub filter: RecommendationFilter,
    pub default_context: String,
    engine_name: &'static str,
}

impl AppState {
    pub fn new(storage: Storage, default_context: impl Into<String>) -> Self {
        let repo = FeatureRepository::new(storage.clone());
        let engine = RankingEngine::new(storage.clone());
        let filter = RecommendationFilter::new(repo.clone(), engine.clone());
        AppState {
            engine_name: storage.dialect().name(),
            repo,
            engine,
            filter,
            default_context: default_context.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub supports_categories: bool,
    pub version: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(e: SvcrankError) -> ApiError {
    let status = match &e {
        SvcrankError::NotFound { .. } => StatusCode::NOT_FOUND,
        SvcrankError::Validation { .. } => StatusCode::BAD_REQUEST,
        _ => {
            tracing::error!(error = %e, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/categories", get(list_categories))
        .route("/api/categories/:slug", get(get_category))
        .route("/api/services", get(get_services))
        .route("/api/rankings/:context", get(get_rankings))
        .route("/api/compare", get(get_comparison))
        .route("/api/recommend", get(get_recommendations))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> Result<(), SvcrankError> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SvcrankError::Config(format!("Cannot bind {}: {}", addr, e)))?;
    tracing::info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, create_router(state))
        .await
        .map_err(|e| SvcrankError::Internal(format!("Server error: {}", e)))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        database: state.engine_name.to_string(),
        supports_categories: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_categories(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Category>> {
    state.repo.get_categories().await.map(Json).map_err(api_error)
}

async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<Category> {
    match state.repo.get_category_by_slug(&slug).await {
        Ok(Some(category)) => Ok(Json(category)),
        Ok(None) => Err(api_error(SvcrankError::not_found("Category", &slug))),
        Err(e) => Err(api_error(e)),
    }
}

#[derive(Debug, Deserialize)]
struct ServicesQuery {
    name: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ServicesResponse {
    One(Service),
    Many(Vec<Service>),
}

async fn get_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServicesQuery>,
) -> ApiResult<ServicesResponse> {
    if let Some(name) = query.name {
        return match state.repo.get_service_with_features(&name).await {
            Ok(Some(service)) => Ok(Json(ServicesResponse::One(service))),
            Ok(None) => Err(api_error(SvcrankError::not_found("Service", &name))),
            Err(e) => Err(api_error(e)),
        };
    }
    state
        .repo
        .get_all_services(query.category.as_deref())
        .await
        .map(|services| Json(ServicesResponse::Many(services)))
        .map_err(api_error)
}

async fn get_rankings(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
) -> ApiResult<Vec<RankingEntry>> {
    state.engine.get_rankings(&context).await.map(Json).map_err(api_error)
}

#[derive(Debug, Deserialize)]
struct CompareQuery {
    category: Option<String>,
}

async fn get_comparison(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CompareQuery>,
) -> ApiResult<ComparisonMatrix> {
    state
        .repo
        .get_feature_comparison(query.category.as_deref())
        .await
        .map(Json)
        .map_err(api_error)
}

#[derive(Debug, Default, Deserialize)]
struct RecommendQuery {
    context: Option<String>,
    category: Option<String>,
    free_tier: Option<String>,
    collaboration: Option<String>,
    offline_mode: Option<String>,
    api_available: Option<String>,
}

impl RecommendQuery {
    /// Only flags present in the query constrain the result; `"true"` means
    /// required, any other value means required absent.
    fn requirements(&self) -> Requirements {
        let values = [&self.free_tier, &self.collaboration, &self.offline_mode, &self.api_available];
        RECOMMEND_FLAGS
            .iter()
            .zip(values)
            .filter_map(|(flag, value)| value.as_ref().map(|v| (flag.to_string(), v == "true")))
            .collect()
    }
}

async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecommendQuery>,
) -> ApiResult<Vec<Recommendation>> {
    let context = query.context.clone().unwrap_or_else(|| state.default_context.clone());
    state
        .filter
        .recommend(&query.requirements(), &context, query.category.as_deref())
        .await
        .map(Json)
        .map_err(api_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NewCategory, ServiceFeatures};
    use axum_test::TestServer;
    use serde_json::Value;

    async fn test_server() -> (TestServer, Arc<AppState>) {
        let storage = Storage::in_memory().await.expect("in-memory storage");
        let state = Arc::new(AppState::new(storage, "personal_use"));
        let server = TestServer::new(create_router(state.clone())).unwrap();
        (server, state)
    }

    async fn seed_services(state: &AppState) {
        state
            .repo
            .add_category(&NewCategory {
                name: "Todo Apps".to_string(),
                slug: "todo".to_string(),
                description: Some("Task managers".to_string()),
                feature_schema: None,
                ranking_contexts: None,
            })
            .await
            .unwrap();
        state
            .repo
            .save_service_features(&ServiceFeatures {
                name: "Todoist".to_string(),
                url: "https://todoist.com".to_string(),
                free_tier: true,
                collaboration: true,
                category: Some("todo".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        state
            .repo
            .save_service_features(&ServiceFeatures {
                name: "Things".to_string(),
                url: "https://culturedcode.com/things".to_string(),
                offline_mode: true,
                ..Default::default()
            })
            .await
            .unwrap();
        state.engine.calculate_rankings("personal_use", None).await.unwrap();
    }

    #[test]
    fn test_only_present_flags_become_requirements() {
        let query = RecommendQuery {
            free_tier: Some("true".to_string()),
            offline_mode: Some("no".to_string()),
            ..Default::default()
        };
        let requirements = query.requirements();
        assert_eq!(requirements.len(), 2);
        assert_eq!(requirements["free_tier"], true);
        assert_eq!(requirements["offline_mode"], false);
        assert!(!requirements.contains_key("collaboration"));
    }

    #[tokio::test]
    async fn test_health_reports_engine() {
        let (server, _state) = test_server().await;
        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert_eq!(body.database, "sqlite");
    }

    #[tokio::test]
    async fn test_unknown_category_is_404() {
        let (server, _state) = test_server().await;
        let response = server.get("/api/categories/missing").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: ErrorResponse = response.json();
        assert!(body.error.contains("missing"));
    }

    #[tokio::test]
    async fn test_category_by_slug() {
        let (server, state) = test_server().await;
        seed_services(&state).await;
        let response = server.get("/api/categories/todo").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["name"], "Todo Apps");
        assert_eq!(server.get("/api/categories").await.json::<Vec<Value>>().len(), 1);
    }

    #[tokio::test]
    async fn test_services_list_and_lookup() {
        let (server, state) = test_server().await;
        seed_services(&state).await;

        let all: Vec<Value> = server.get("/api/services").await.json();
        assert_eq!(all.len(), 2);

        let todo: Vec<Value> = server.get("/api/services").add_query_param("category", "todo").await.json();
        assert_eq!(todo.len(), 1);
        assert_eq!(todo[0]["name"], "Todoist");

        let one = server.get("/api/services").add_query_param("name", "Things").await;
        one.assert_status_ok();
        let body: Value = one.json();
        assert_eq!(body["features"]["offline_mode"], true);

        server
            .get("/api/services")
            .add_query_param("name", "Nope")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rankings_and_compare() {
        let (server, state) = test_server().await;
        seed_services(&state).await;

        let rankings: Vec<Value> = server.get("/api/rankings/personal_use").await.json();
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings[0]["service_name"], "Todoist");
        assert_eq!(rankings[0]["rank"], 1);

        let empty: Vec<Value> = server.get("/api/rankings/unknown").await.json();
        assert!(empty.is_empty());

        let matrix: Value = server.get("/api/compare").await.json();
        assert_eq!(matrix["Todoist"]["free_tier"], true);
        assert_eq!(matrix["Things"]["free_tier"], false);
    }

    #[tokio::test]
    async fn test_recommend_applies_query_flags() {
        let (server, state) = test_server().await;
        seed_services(&state).await;

        let matches: Vec<Value> = server
            .get("/api/recommend")
            .add_query_param("free_tier", "true")
            .await
            .json();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["service_name"], "Todoist");

        let unconstrained: Vec<Value> = server.get("/api/recommend").await.json();
        assert_eq!(unconstrained.len(), 2);
    }
}
