//! podgrid-api — REST API for podgrid.
//!
//! Thin axum adapter: every route is one `Scheduler` call (mutations) or
//! one `StateView` read (listings). Bodies are JSON and every response is
//! wrapped as `{ "success": bool, "data"?: T, "error"?: string }`.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/nodes` | List nodes |
//! | POST | `/api/v1/nodes` | Add a node |
//! | GET | `/api/v1/nodes/{id}` | Get node details |
//! | PUT | `/api/v1/nodes/{id}` | Change node capacity |
//! | DELETE | `/api/v1/nodes/{id}` | Remove an empty node |
//! | POST | `/api/v1/nodes/{id}/heartbeat` | Record a heartbeat |
//! | GET | `/api/v1/pods` | List pods (`?node=` filter) |
//! | POST | `/api/v1/pods` | Create a pod |
//! | GET | `/api/v1/pods/{id}` | Get pod details |
//! | PUT | `/api/v1/pods/{id}` | Change pod demand |
//! | DELETE | `/api/v1/pods/{id}` | Remove a pod |
//! | POST | `/api/v1/pods/{id}/reschedule` | Relocate a pod |
//! | GET | `/api/v1/scheduler/algorithm` | Active placement algorithm |
//! | PUT | `/api/v1/scheduler/algorithm` | Switch placement algorithm |
//! | GET | `/api/v1/cluster` | Cluster summary |
//! | GET | `/api/v1/cluster/audit` | Units the driver no longer knows |

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use podgrid_scheduler::Scheduler;
use podgrid_state::StateView;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Entry point for every mutation.
    pub scheduler: Arc<Scheduler>,
    /// Read-only handle for listings.
    pub view: StateView,
}

impl ApiState {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let view = scheduler.view();
        Self { scheduler, view }
    }
}

/// Build the complete API router.
pub fn build_router(scheduler: Arc<Scheduler>) -> Router {
    let api_state = ApiState::new(scheduler);

    let api_routes = Router::new()
        .route("/nodes", get(handlers::list_nodes).post(handlers::add_node))
        .route(
            "/nodes/{id}",
            get(handlers::get_node)
                .put(handlers::update_node)
                .delete(handlers::remove_node),
        )
        .route("/nodes/{id}/heartbeat", post(handlers::heartbeat))
        .route("/pods", get(handlers::list_pods).post(handlers::create_pod))
        .route(
            "/pods/{id}",
            get(handlers::get_pod)
                .put(handlers::update_pod)
                .delete(handlers::remove_pod),
        )
        .route("/pods/{id}/reschedule", post(handlers::reschedule_pod))
        .route(
            "/scheduler/algorithm",
            get(handlers::get_algorithm).put(handlers::set_algorithm),
        )
        .route("/cluster", get(handlers::cluster_summary))
        .route("/cluster/audit", get(handlers::audit_units))
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}
