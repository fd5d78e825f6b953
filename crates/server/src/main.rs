use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, RawQuery, State},
    routing::get,
    Json, Router,
};
use ism_server_api::{delete_policy, get_policies, get_policy, put_policy, ApiContext, HttpCluster};
use ism_shared::{
    domain::{ListQuery, ListResult, PolicyItem},
    error::ApiError,
    protocol::{PutPolicyParams, ServerResponse, POLICIES_PATH},
};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings()?;
    let cluster = HttpCluster::new(
        &settings.cluster_url,
        settings.credentials(),
        settings.request_timeout(),
    )?;
    let api = ApiContext {
        cluster: Arc::new(cluster),
    };
    if !settings.enabled {
        warn!("index management is disabled; policy routes are not mounted");
    }
    let app = build_router(Arc::new(AppState { api }), settings.enabled);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, cluster_url = %settings.cluster_url, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, policies_enabled: bool) -> Router {
    let router = Router::new().route("/healthz", get(healthz));
    let router = if policies_enabled {
        router
            .route(POLICIES_PATH, get(http_get_policies))
            .route(
                &format!("{POLICIES_PATH}/:id"),
                get(http_get_policy)
                    .put(http_put_policy)
                    .delete(http_delete_policy),
            )
    } else {
        router
    };
    router.with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn respond<T>(operation: &'static str, result: Result<T, ApiError>) -> Json<ServerResponse<T>> {
    match result {
        Ok(response) => Json(ServerResponse::success(response)),
        Err(err) => {
            warn!(operation, code = ?err.code, error = %err.message, "policy request failed");
            Json(ServerResponse::failure(err.message))
        }
    }
}

async fn http_get_policies(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Json<ServerResponse<ListResult>> {
    let parsed = ListQuery::parse(raw.as_deref().unwrap_or_default());
    for param in &parsed.malformed {
        warn!(key = param.key, value = %param.value, "ignoring malformed list parameter");
    }
    respond("get_policies", get_policies(&state.api, &parsed.query).await)
}

async fn http_get_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<ServerResponse<PolicyItem>> {
    respond("get_policy", get_policy(&state.api, &id).await)
}

async fn http_put_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<PutPolicyParams>,
    Json(body): Json<Value>,
) -> Json<ServerResponse<PolicyItem>> {
    respond("put_policy", put_policy(&state.api, &id, params, body).await)
}

async fn http_delete_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<ServerResponse<bool>> {
    let result = delete_policy(&state.api, &id).await;
    match result {
        Ok(true) => Json(ServerResponse::success(true)),
        Ok(false) => Json(ServerResponse::failure(format!(
            "policy {id} was not deleted"
        ))),
        Err(err) => respond("delete_policy", Err(err)),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
