use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use gearpack_api::{
    init_tracing, GearpackApi, RecommendRequest, RecommendationReport, TripRecord, TripStatus,
    API_CONTRACT_VERSION, DEFAULT_LOG_FILTER,
};
use gearpack_core::{Rule, RULESET_VERSION};
use serde::{Deserialize, Serialize};

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");

#[derive(Debug, Clone)]
struct ServiceState {
    api: GearpackApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    service_contract_version: &'static str,
    error: String,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct RulesResponse {
    ruleset_version: &'static str,
    total: usize,
    rules: &'static [Rule],
}

#[derive(Debug, Clone, Serialize)]
struct TripListResponse {
    total: usize,
    trips: Vec<TripRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TripListQuery {
    status: Option<TripStatus>,
}

#[derive(Debug, Parser)]
#[command(name = "gearpack-service")]
#[command(about = "Local HTTP service for gearpack recommendations")]
struct Args {
    #[arg(long, env = "GEARPACK_SNAPSHOT_DIR", default_value = "./snapshot")]
    snapshot: PathBuf,
    #[arg(long, env = "GEARPACK_BIND", default_value = "127.0.0.1:4010")]
    bind: SocketAddr,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = StatusCode::BAD_REQUEST;
        (status, Json(self)).into_response()
    }
}

impl ServiceState {
    fn error(message: impl Into<String>) -> ServiceError {
        let error = message.into();
        tracing::warn!(error = %error, "request failed");
        ServiceError { service_contract_version: SERVICE_CONTRACT_VERSION, error }
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/openapi", get(openapi))
        .route("/v1/rules", get(rules))
        .route("/v1/recommendations", post(recommend_inline))
        .route("/v1/trips", get(trip_list))
        .route("/v1/trips/:trip_id", get(trip_show))
        .route("/v1/trips/:trip_id/recommendations", get(trip_recommendations))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(DEFAULT_LOG_FILTER);
    let args = Args::parse();
    let state = ServiceState { api: GearpackApi::new(args.snapshot) };
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(
        bind = %args.bind,
        snapshot_dir = %state.api.snapshot_dir().display(),
        "gearpack service listening"
    );
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn rules() -> Json<ServiceEnvelope<RulesResponse>> {
    let rules = GearpackApi::rules();
    Json(envelope(RulesResponse { ruleset_version: RULESET_VERSION, total: rules.len(), rules }))
}

async fn recommend_inline(
    State(state): State<ServiceState>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<ServiceEnvelope<RecommendationReport>>, ServiceError> {
    let report =
        state.api.recommend(request).map_err(|err| ServiceState::error(format!("{err:#}")))?;
    Ok(Json(envelope(report)))
}

async fn trip_list(
    State(state): State<ServiceState>,
    Query(query): Query<TripListQuery>,
) -> Result<Json<ServiceEnvelope<TripListResponse>>, ServiceError> {
    let trips =
        state.api.list_trips(query.status).map_err(|err| ServiceState::error(format!("{err:#}")))?;
    Ok(Json(envelope(TripListResponse { total: trips.len(), trips })))
}

async fn trip_show(
    State(state): State<ServiceState>,
    Path(trip_id): Path<u64>,
) -> Result<Json<ServiceEnvelope<TripRecord>>, ServiceError> {
    let trip = state.api.show_trip(trip_id).map_err(|err| ServiceState::error(format!("{err:#}")))?;
    Ok(Json(envelope(trip)))
}

async fn trip_recommendations(
    State(state): State<ServiceState>,
    Path(trip_id): Path<u64>,
) -> Result<Json<ServiceEnvelope<RecommendationReport>>, ServiceError> {
    let report = state
        .api
        .recommend_for_trip(trip_id)
        .map_err(|err| ServiceState::error(format!("{err:#}")))?;
    Ok(Json(envelope(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use http::Request;
    use tower::ServiceExt;

    fn unique_snapshot_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gearpack-service-{}", ulid::Ulid::new()));
        if let Err(err) = std::fs::create_dir_all(&dir) {
            panic!("failed to create snapshot dir {}: {err}", dir.display());
        }
        dir
    }

    fn seeded_state() -> ServiceState {
        let dir = unique_snapshot_dir();
        let trips = serde_json::json!([
            {
                "id": 11,
                "title": "Coastal weekend",
                "start_date": "2025-05-17",
                "end_date": "2025-05-18",
                "activities": ["Kayaking", "Camping"],
                "expected_temp_min": 12,
                "expected_temp_max": 27,
                "expected_weather": "Sunny",
                "status": "in_progress"
            },
            {
                "id": 12,
                "title": "Ridge run",
                "start_date": "2025-05-20",
                "end_date": "2025-05-20",
                "activities": ["Trail Running"],
                "status": "completed"
            }
        ]);
        let gear = serde_json::json!([
            { "id": 1, "name": "Life jacket", "category_name": "Water Sports", "weight_grams": 700 }
        ]);
        for (file, value) in [("trips.json", trips), ("gear.json", gear)] {
            let path = dir.join(file);
            if let Err(err) = std::fs::write(&path, value.to_string()) {
                panic!("failed to write {}: {err}", path.display());
            }
        }
        ServiceState { api: GearpackApi::new(dir) }
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        let body = match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        };
        match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON: {err}; body={body}"),
        }
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> Response {
        let builder = Request::builder().uri(uri).method(method);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(axum::body::Body::from(body.to_string())),
            None => builder.body(axum::body::Body::empty()),
        }
        .unwrap_or_else(|err| panic!("failed to build request: {err}"));

        match router.oneshot(request).await {
            Ok(response) => response,
            Err(err) => panic!("router request failed: {err}"),
        }
    }

    // Test IDs: TSVC-001
    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let router = app(ServiceState { api: GearpackApi::new(unique_snapshot_dir()) });

        let response = send(router, "GET", "/v1/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(
            value.get("service_contract_version").and_then(serde_json::Value::as_str),
            Some(SERVICE_CONTRACT_VERSION)
        );
        assert_eq!(value["api_contract_version"], API_CONTRACT_VERSION);
        assert_eq!(value["data"]["status"], "ok");
    }

    // Test IDs: TSVC-002
    #[tokio::test]
    async fn openapi_endpoint_returns_versioned_artifact() {
        let router = app(ServiceState { api: GearpackApi::new(unique_snapshot_dir()) });

        let response = send(router, "GET", "/v1/openapi", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        let body = match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        };
        assert!(body.contains("openapi: 3.1.0"));
        assert!(body.contains("version: service.v1"));
        assert!(body.contains("/v1/recommendations"));
        assert!(body.contains("/v1/trips/{trip_id}/recommendations"));
    }

    // Test IDs: TSVC-003
    #[tokio::test]
    async fn rules_endpoint_lists_rule_table() {
        let router = app(ServiceState { api: GearpackApi::new(unique_snapshot_dir()) });

        let response = send(router, "GET", "/v1/rules", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(value["data"]["ruleset_version"], RULESET_VERSION);
        assert_eq!(value["data"]["total"], 28);
        assert_eq!(value["data"]["rules"][27]["category"], "Tools");
    }

    // Test IDs: TSVC-004
    #[tokio::test]
    async fn inline_recommendations_flow_through_envelope() {
        let router = app(ServiceState { api: GearpackApi::new(unique_snapshot_dir()) });
        let payload = serde_json::json!({
            "trip": {
                "duration_days": 3,
                "activities": ["Hiking"],
                "expected_temp_min": 0,
                "expected_temp_max": 4,
                "expected_weather": "Snowy"
            },
            "owned_gear": [
                { "id": 5, "name": "Boots", "category": "Footwear", "weight_grams": 1100 }
            ],
            "catalog": [
                { "id": 90, "name": "Microspikes", "category": "Winter Sports", "weight_grams": 400 }
            ]
        });

        let response = send(router, "POST", "/v1/recommendations", Some(payload)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        let data = &value["data"];
        let recommendations = data["recommendations"]
            .as_array()
            .unwrap_or_else(|| panic!("recommendations should be an array: {data}"));
        assert_eq!(data["total_recommendations"], recommendations.len());
        assert!(recommendations.iter().all(|rec| rec["category"] != "Footwear"));
        assert!(recommendations.iter().all(|rec| rec["category"] != "Insect Protection"));

        let winter = recommendations
            .iter()
            .find(|rec| rec["category"] == "Winter Sports")
            .unwrap_or_else(|| panic!("winter sports missing: {data}"));
        assert_eq!(winter["source"], "catalog");
        assert_eq!(winter["priority"], "high");

        let outer = recommendations
            .iter()
            .find(|rec| rec["category"] == "Clothing - Outer Layer")
            .unwrap_or_else(|| panic!("outer layer missing: {data}"));
        assert_eq!(outer["reason"], "Recommended for your trip");
    }

    // Test IDs: TSVC-005
    #[tokio::test]
    async fn invalid_inline_trip_returns_bad_request() {
        let router = app(ServiceState { api: GearpackApi::new(unique_snapshot_dir()) });
        let payload = serde_json::json!({ "trip": { "duration_days": 0 } });

        let response = send(router, "POST", "/v1/recommendations", Some(payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let value = response_json(response).await;
        assert_eq!(value["service_contract_version"], SERVICE_CONTRACT_VERSION);
        let error = value["error"].as_str().unwrap_or_default();
        assert!(error.contains("validation error"), "unexpected error: {error}");
    }

    // Test IDs: TSVC-006
    #[tokio::test]
    async fn snapshot_trip_routes_serve_records_and_reports() {
        let state = seeded_state();
        let snapshot_dir = state.api.snapshot_dir().to_path_buf();

        let response = send(app(state.clone()), "GET", "/v1/trips?status=completed", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listed = response_json(response).await;
        assert_eq!(listed["data"]["total"], 1);
        assert_eq!(listed["data"]["trips"][0]["id"], 12);

        let response = send(app(state.clone()), "GET", "/v1/trips/11", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let shown = response_json(response).await;
        assert_eq!(shown["data"]["title"], "Coastal weekend");
        assert_eq!(shown["data"]["status"], "in_progress");

        let response = send(app(state.clone()), "GET", "/v1/trips/11/recommendations", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let report = response_json(response).await;
        assert_eq!(report["data"]["trip_id"], 11);
        let recommendations = report["data"]["recommendations"]
            .as_array()
            .unwrap_or_else(|| panic!("recommendations should be an array: {report}"));
        assert!(recommendations.iter().all(|rec| rec["category"] != "Water Sports"));
        assert!(recommendations.iter().any(|rec| rec["category"] == "Sun Protection"));

        let response = send(app(state), "GET", "/v1/trips/404/recommendations", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = response_json(response).await;
        assert_eq!(value["error"], "trip not found: 404");

        let _ = std::fs::remove_dir_all(&snapshot_dir);
    }
}
