//! REST API handlers.
//!
//! Reads go through the `StateView`, writes through the `Scheduler`.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use podgrid_placement::PlacementAlgorithm;
use podgrid_state::Labels;

use crate::ApiState;
use crate::error::{ApiError, ApiResponse, error_response};

// ── Nodes ──────────────────────────────────────────────────────

/// Add-node request body.
#[derive(Debug, Deserialize)]
pub struct AddNodeRequest {
    pub id: String,
    pub capacity: u32,
    #[serde(default)]
    pub labels: Labels,
}

/// Update-node request body.
#[derive(Debug, Deserialize)]
pub struct UpdateNodeRequest {
    pub capacity: u32,
}

/// GET /api/v1/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.view.list_nodes())
}

/// GET /api/v1/nodes/{id}
pub async fn get_node(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.view.get_node(&id) {
        Some(node) => ApiResponse::ok(node).into_response(),
        None => error_response("node not found", StatusCode::NOT_FOUND),
    }
}

/// POST /api/v1/nodes
pub async fn add_node(
    State(state): State<ApiState>,
    Json(req): Json<AddNodeRequest>,
) -> Result<Response, ApiError> {
    let node = state
        .scheduler
        .add_node(&req.id, req.capacity, req.labels)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(node)).into_response())
}

/// PUT /api/v1/nodes/{id}
pub async fn update_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateNodeRequest>,
) -> Result<Response, ApiError> {
    let node = state.scheduler.update_node(&id, req.capacity)?;
    Ok(ApiResponse::ok(node).into_response())
}

/// DELETE /api/v1/nodes/{id}
pub async fn remove_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let removal = state.scheduler.remove_node(&id).await?;
    Ok(ApiResponse::ok(removal).into_response())
}

/// POST /api/v1/nodes/{id}/heartbeat
pub async fn heartbeat(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let node = state.scheduler.record_heartbeat(&id)?;
    Ok(ApiResponse::ok(node).into_response())
}

// ── Pods ───────────────────────────────────────────────────────

/// Create-pod request body.
#[derive(Debug, Deserialize)]
pub struct CreatePodRequest {
    pub cpu_requirement: u32,
    #[serde(default)]
    pub labels: Labels,
}

/// Update-pod request body.
#[derive(Debug, Deserialize)]
pub struct UpdatePodRequest {
    pub cpu_requirement: u32,
}

/// Pod listing filter.
#[derive(Debug, Default, Deserialize)]
pub struct PodFilter {
    pub node: Option<String>,
}

/// GET /api/v1/pods
pub async fn list_pods(
    State(state): State<ApiState>,
    Query(filter): Query<PodFilter>,
) -> impl IntoResponse {
    let pods = match filter.node {
        Some(node_id) => state.view.workloads_on(&node_id),
        None => state.view.list_workloads(),
    };
    ApiResponse::ok(pods)
}

/// GET /api/v1/pods/{id}
pub async fn get_pod(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.view.get_workload(&id) {
        Some(pod) => ApiResponse::ok(pod).into_response(),
        None => error_response("pod not found", StatusCode::NOT_FOUND),
    }
}

/// POST /api/v1/pods
pub async fn create_pod(
    State(state): State<ApiState>,
    Json(req): Json<CreatePodRequest>,
) -> Result<Response, ApiError> {
    let pod = state
        .scheduler
        .create_workload(req.cpu_requirement, req.labels)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(pod)).into_response())
}

/// PUT /api/v1/pods/{id}
pub async fn update_pod(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePodRequest>,
) -> Result<Response, ApiError> {
    let pod = state
        .scheduler
        .update_workload(&id, req.cpu_requirement)
        .await?;
    Ok(ApiResponse::ok(pod).into_response())
}

/// DELETE /api/v1/pods/{id}
pub async fn remove_pod(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let removal = state.scheduler.remove_workload(&id).await?;
    Ok(ApiResponse::ok(removal).into_response())
}

/// POST /api/v1/pods/{id}/reschedule
pub async fn reschedule_pod(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let relocation = state.scheduler.reschedule_pod(&id).await?;
    Ok(ApiResponse::ok(relocation).into_response())
}

// ── Scheduler ──────────────────────────────────────────────────

/// Algorithm switch request body.
#[derive(Debug, Deserialize)]
pub struct AlgorithmRequest {
    pub algorithm: String,
}

/// GET /api/v1/scheduler/algorithm
pub async fn get_algorithm(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({
        "algorithm": state.scheduler.algorithm(),
        "available": PlacementAlgorithm::ALL,
    }))
}

/// PUT /api/v1/scheduler/algorithm
pub async fn set_algorithm(
    State(state): State<ApiState>,
    Json(req): Json<AlgorithmRequest>,
) -> Response {
    let algorithm = match req.algorithm.parse::<PlacementAlgorithm>() {
        Ok(a) => a,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST),
    };
    let previous = state.scheduler.set_algorithm(algorithm);
    ApiResponse::ok(serde_json::json!({
        "algorithm": algorithm,
        "previous": previous,
    }))
    .into_response()
}

// ── Cluster ────────────────────────────────────────────────────

/// GET /api/v1/cluster
pub async fn cluster_summary(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.view.summary())
}

/// GET /api/v1/cluster/audit
pub async fn audit_units(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.scheduler.audit_units().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use podgrid_driver::SimDriver;
    use podgrid_scheduler::{Scheduler, SchedulerConfig};
    use podgrid_state::StateStore;

    fn test_state() -> (ApiState, Arc<SimDriver>) {
        let driver = Arc::new(SimDriver::new());
        let scheduler = Scheduler::new(StateStore::new(), driver.clone(), SchedulerConfig::default());
        (ApiState::new(Arc::new(scheduler)), driver)
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn node_req(id: &str, capacity: u32) -> Json<AddNodeRequest> {
        Json(AddNodeRequest {
            id: id.to_string(),
            capacity,
            labels: Labels::new(),
        })
    }

    fn pod_req(cpu: u32) -> Json<CreatePodRequest> {
        Json(CreatePodRequest {
            cpu_requirement: cpu,
            labels: Labels::new(),
        })
    }

    fn into_response(result: Result<Response, ApiError>) -> Response {
        result.into_response()
    }

    #[tokio::test]
    async fn list_nodes_empty() {
        let (state, _) = test_state();
        let resp = list_nodes(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], serde_json::json!([]));
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn add_and_get_node() {
        let (state, _) = test_state();
        let resp = into_response(add_node(State(state.clone()), node_req("n1", 4)).await);
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = get_node(State(state), Path("n1".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["available_capacity"], 4);
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn duplicate_node_is_conflict() {
        let (state, _) = test_state();
        into_response(add_node(State(state.clone()), node_req("n1", 4)).await);
        let resp = into_response(add_node(State(state), node_req("n1", 4)).await);
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn node_provision_failure_is_bad_gateway() {
        let (state, driver) = test_state();
        driver.fail_next_provisions(1);
        let resp = into_response(add_node(State(state.clone()), node_req("n1", 4)).await);
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(state.view.list_nodes().is_empty());
    }

    #[tokio::test]
    async fn get_nonexistent_node() {
        let (state, _) = test_state();
        let resp = get_node(State(state), Path("nope".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn remove_busy_node_is_conflict() {
        let (state, _) = test_state();
        into_response(add_node(State(state.clone()), node_req("n1", 4)).await);
        into_response(create_pod(State(state.clone()), pod_req(2)).await);

        let resp = into_response(remove_node(State(state), Path("n1".to_string())).await);
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn heartbeat_unknown_node() {
        let (state, _) = test_state();
        let resp = into_response(heartbeat(State(state), Path("ghost".to_string())).await);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_pod_without_nodes_is_unprocessable() {
        let (state, _) = test_state();
        let resp = into_response(create_pod(State(state.clone()), pod_req(2)).await);
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(state.view.list_workloads().is_empty());
    }

    #[tokio::test]
    async fn create_pod_with_zero_demand_is_bad_request() {
        let (state, _) = test_state();
        into_response(add_node(State(state.clone()), node_req("n1", 4)).await);
        let resp = into_response(create_pod(State(state), pod_req(0)).await);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_update_and_remove_pod() {
        let (state, _) = test_state();
        into_response(add_node(State(state.clone()), node_req("n1", 4)).await);

        let resp = into_response(create_pod(State(state.clone()), pod_req(2)).await);
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["node_id"], "n1");
        assert_eq!(body["data"]["status"], "running");

        let resp = into_response(
            update_pod(
                State(state.clone()),
                Path(id.clone()),
                Json(UpdatePodRequest { cpu_requirement: 8 }),
            )
            .await,
        );
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = into_response(remove_pod(State(state.clone()), Path(id.clone())).await);
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["cleanup"]["result"], "destroyed");

        let resp = get_pod(State(state), Path(id)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_pods_filters_by_node() {
        let (state, _) = test_state();
        into_response(add_node(State(state.clone()), node_req("n1", 2)).await);
        into_response(add_node(State(state.clone()), node_req("n2", 2)).await);
        into_response(create_pod(State(state.clone()), pod_req(2)).await);
        into_response(create_pod(State(state.clone()), pod_req(2)).await);

        let resp = list_pods(
            State(state.clone()),
            Query(PodFilter {
                node: Some("n2".to_string()),
            }),
        )
        .await
        .into_response();
        let body = body_json(resp).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["node_id"], "n2");

        let resp = list_pods(State(state), Query(PodFilter::default()))
            .await
            .into_response();
        assert_eq!(body_json(resp).await["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reschedule_returns_relocation() {
        let (state, _) = test_state();
        into_response(add_node(State(state.clone()), node_req("n1", 4)).await);
        let body = body_json(into_response(create_pod(State(state.clone()), pod_req(4)).await)).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        // The pod's own capacity is released first, so it lands back on n1.
        let resp = into_response(reschedule_pod(State(state.clone()), Path(id.clone())).await);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"]["to"], "n1");

        let resp = into_response(reschedule_pod(State(state), Path("pod-nope".to_string())).await);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn switch_algorithm() {
        let (state, _) = test_state();
        let resp = get_algorithm(State(state.clone())).await.into_response();
        let body = body_json(resp).await;
        assert_eq!(body["data"]["algorithm"], "first-fit");
        assert_eq!(body["data"]["available"].as_array().unwrap().len(), 3);

        let resp = set_algorithm(
            State(state.clone()),
            Json(AlgorithmRequest {
                algorithm: "best_fit".to_string(),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["algorithm"], "best-fit");
        assert_eq!(body["data"]["previous"], "first-fit");
        assert_eq!(state.scheduler.algorithm(), PlacementAlgorithm::BestFit);
    }

    #[tokio::test]
    async fn unknown_algorithm_is_bad_request() {
        let (state, _) = test_state();
        let resp = set_algorithm(
            State(state.clone()),
            Json(AlgorithmRequest {
                algorithm: "random".to_string(),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.scheduler.algorithm(), PlacementAlgorithm::FirstFit);
    }

    #[tokio::test]
    async fn cluster_summary_counts() {
        let (state, _) = test_state();
        into_response(add_node(State(state.clone()), node_req("n1", 4)).await);
        into_response(create_pod(State(state.clone()), pod_req(3)).await);

        let body = body_json(cluster_summary(State(state)).await.into_response()).await;
        assert_eq!(body["data"]["nodes"], 1);
        assert_eq!(body["data"]["running_pods"], 1);
        assert_eq!(body["data"]["available_capacity"], 1);
    }

    #[tokio::test]
    async fn audit_reports_missing_units() {
        let (state, driver) = test_state();
        let body = body_json(into_response(add_node(State(state.clone()), node_req("n1", 4)).await)).await;
        let unit = body["data"]["runtime_unit_id"].as_str().unwrap().to_string();
        driver.vanish(&unit);

        let body = body_json(audit_units(State(state)).await.into_response()).await;
        assert_eq!(body["data"]["missing_node_units"][0][0], "n1");
        assert_eq!(body["data"]["missing_node_units"][0][1], unit);
    }
}
