//! HTTP API.
//!
//! - `GET /distribution` runs the engine with query-string parameters
//! - `GET /manage/schemas` lists allow-listed schemas
//! - `GET /manage/schemas/:schema/tables` describes a schema's tables
//! - `GET /healthz`
//!
//! Store access is blocking, so every handler runs its work on the blocking
//! pool. Errors come back as `{"error": "..."}` with 400 for malformed input,
//! 404 for unknown schemas or tables and 500 for everything else.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use hubflow_core::data::StoreError;
use hubflow_core::domain::{AllocationRow, BranchId, CategoryId, ProductId};
use hubflow_core::query::{
    AllocationFilter, Identifier, IdentifierError, SourceTables, TableKind,
};
use hubflow_core::schema::SchemaMeta;
use hubflow_core::{AllocationError, AllocationRequest, MinimumShipmentPolicy};

use crate::config::AppConfig;
use crate::introspect;
use crate::pool::{PoolError, StorePool};
use crate::runner::{run_allocation, RunError};

// ── State ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiState {
    pub pool: StorePool,
    pub schemas: Arc<Vec<Identifier>>,
}

impl ApiState {
    pub fn new(pool: StorePool, schemas: Vec<Identifier>) -> Self {
        Self {
            pool,
            schemas: Arc::new(schemas),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, PoolError> {
        Ok(Self::new(StorePool::from_config(config)?, config.schemas.clone()))
    }
}

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Internal(m) => m,
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "request rejected");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidIdentifier(_) => ApiError::BadRequest(e.to_string()),
            _ if e.is_not_found() => ApiError::NotFound(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<IdentifierError> for ApiError {
    fn from(e: IdentifierError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<RunError> for ApiError {
    fn from(e: RunError) -> Self {
        match e {
            RunError::Allocation(AllocationError::Store(store)) => store.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(e: PoolError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

/// Run blocking store work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("worker failed: {e}")))?
}

// ── /distribution ────────────────────────────────────────────────────

/// Query string of `/distribution`. Every parameter is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionParams {
    pub run_date: Option<NaiveDate>,
    pub branch_id: Option<BranchId>,
    pub product_id: Option<ProductId>,
    pub category_id: Option<CategoryId>,
    pub min_demand: Option<f64>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub respect_volume: bool,
    pub minimum_policy: Option<MinimumShipmentPolicy>,
    pub schema: Option<String>,
    pub rc_table: Option<String>,
    pub branch_table: Option<String>,
    pub needs_table: Option<String>,
    pub min_table: Option<String>,
    pub volume_table: Option<String>,
    pub limit_table: Option<String>,
    pub product_table: Option<String>,
    pub logdays_table: Option<String>,
}

impl DistributionParams {
    /// Table-name overrides, paired with the table each one replaces.
    fn table_overrides(&self) -> [(TableKind, Option<&str>); 8] {
        [
            (TableKind::HubHistory, self.rc_table.as_deref()),
            (TableKind::BranchHistory, self.branch_table.as_deref()),
            (TableKind::Needs, self.needs_table.as_deref()),
            (TableKind::MinShipment, self.min_table.as_deref()),
            (TableKind::ProductVolume, self.volume_table.as_deref()),
            (TableKind::StorageLimit, self.limit_table.as_deref()),
            (TableKind::Product, self.product_table.as_deref()),
            (TableKind::LeadTime, self.logdays_table.as_deref()),
        ]
    }

    pub fn into_request(self) -> Result<AllocationRequest, IdentifierError> {
        let mut tables = SourceTables::default();
        if let Some(schema) = &self.schema {
            tables = tables.with_schema(schema)?;
        }
        for (kind, name) in self.table_overrides() {
            if let Some(name) = name {
                tables = tables.with_table(kind, name)?;
            }
        }

        let mut request = match self.run_date {
            Some(date) => AllocationRequest::new(date),
            None => AllocationRequest::today(),
        }
        .with_volume(self.respect_volume)
        .with_tables(tables);

        if let Some(id) = self.branch_id {
            request = request.with_filter(AllocationFilter::Branch(id));
        }
        if let Some(id) = self.product_id {
            request = request.with_filter(AllocationFilter::Product(id));
        }
        if let Some(id) = self.category_id {
            request = request.with_filter(AllocationFilter::Category(id));
        }
        if let Some(min) = self.min_demand {
            request = request.with_filter(AllocationFilter::MinDemand(min));
        }
        if let Some(limit) = self.limit {
            request = request.with_limit(limit);
        }
        if let Some(policy) = self.minimum_policy {
            request = request.with_policy(policy);
        }
        Ok(request)
    }
}

async fn distribution(
    State(state): State<ApiState>,
    params: Result<Query<DistributionParams>, QueryRejection>,
) -> Result<Json<Vec<AllocationRow>>, ApiError> {
    let Query(params) = params?;
    let request = params.into_request()?;
    introspect::check_allowed(&state.schemas, &request.tables.schema)?;
    let run = blocking(move || Ok(run_allocation(&state.pool, request)?)).await?;
    Ok(Json(run.rows))
}

// ── /manage ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct SchemasResponse {
    pub schemas: Vec<String>,
}

async fn schemas(State(state): State<ApiState>) -> Result<Json<SchemasResponse>, ApiError> {
    let schemas = blocking(move || {
        let store = state.pool.acquire()?;
        Ok(introspect::list_schemas(&store, &state.schemas)?)
    })
    .await?;
    Ok(Json(SchemasResponse { schemas }))
}

async fn schema_tables(
    State(state): State<ApiState>,
    Path(schema): Path<String>,
) -> Result<Json<SchemaMeta>, ApiError> {
    let schema = Identifier::parse(&schema)?;
    let meta = blocking(move || {
        let store = state.pool.acquire()?;
        Ok(introspect::schema_structure(&store, &state.schemas, &schema)?)
    })
    .await?;
    Ok(Json(meta))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Server ───────────────────────────────────────────────────────────

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/distribution", get(distribution))
        .route("/manage/schemas", get(schemas))
        .route("/manage/schemas/:schema/tables", get(schema_tables))
        .with_state(state)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown requested");
    }
}

/// Serve until Ctrl-C.
pub async fn serve(state: ApiState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, pool_size = state.pool.size(), "API server starting");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use hubflow_core::data::ParquetStore;
    use hubflow_core::domain::{DemandRequirement, HubInventoryFact, MinimumShipment};
    use tower::ServiceExt;

    const PRODUCT: &str = "00000000-0000-0000-0000-000000000001";

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn seeded() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        crate::migrate::migrate(&store).unwrap();
        let tables = SourceTables::default();

        let product = ProductId::from_u128(1);
        store
            .write(
                &tables.table(TableKind::HubHistory),
                &[HubInventoryFact {
                    product_id: product,
                    date: run_date(),
                    stock: 100.0,
                    reserved: 0.0,
                    in_transit: 0.0,
                }],
            )
            .unwrap();
        let needs: Vec<_> = (1..=3)
            .map(|b| DemandRequirement {
                branch_id: BranchId::from_u128(b),
                product_id: product,
                needs: 10.0 * b as f64,
            })
            .collect();
        let minimums: Vec<_> = (1..=3)
            .map(|b| MinimumShipment {
                branch_id: BranchId::from_u128(b),
                product_id: product,
                min_qty: 1.0,
            })
            .collect();
        store.write(&tables.table(TableKind::Needs), &needs).unwrap();
        store.write(&tables.table(TableKind::MinShipment), &minimums).unwrap();

        let pool = StorePool::new(dir.path(), 2).unwrap();
        let state = ApiState::new(pool, vec![Identifier::parse("logistics").unwrap()]);
        (dir, router(state))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (_dir, app) = seeded();
        let (status, body) = get(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn distribution_returns_sorted_rows() {
        let (_dir, app) = seeded();
        let (status, body) = get(app, "/distribution?run_date=2024-03-01").await;
        assert_eq!(status, StatusCode::OK);
        let rows: Vec<AllocationRow> = serde_json::from_value(body).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|w| w[0].branch_id < w[1].branch_id));
        assert!(rows.iter().all(|r| r.product_id.to_string() == PRODUCT));
    }

    #[tokio::test]
    async fn distribution_rejects_schema_outside_allow_list() {
        let (dir, app) = seeded();
        // Same tables on disk, but the schema is not configured
        let staging = dir.path().join("staging");
        std::fs::create_dir_all(&staging).unwrap();
        for entry in std::fs::read_dir(dir.path().join("logistics")).unwrap() {
            let entry = entry.unwrap();
            std::fs::copy(entry.path(), staging.join(entry.file_name())).unwrap();
        }

        let (status, body) = get(app.clone(), "/distribution?run_date=2024-03-01&schema=staging").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("staging"));

        let (status, _) = get(app, "/distribution?run_date=2024-03-01&schema=logistics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn distribution_applies_filters_and_limit() {
        let (_dir, app) = seeded();
        let (_, body) = get(app.clone(), "/distribution?run_date=2024-03-01&limit=2").await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (_, body) = get(app, "/distribution?run_date=2024-03-01&min_demand=15").await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bad_identifier_is_400() {
        let (_dir, app) = seeded();
        let (status, body) =
            get(app, "/distribution?run_date=2024-03-01&needs_table=needs;drop").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_query_is_400() {
        let (_dir, app) = seeded();
        let (status, _) = get(app, "/distribution?run_date=yesterday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_table_is_404() {
        let (_dir, app) = seeded();
        let (status, body) =
            get(app, "/distribution?run_date=2024-03-01&needs_table=needs_archive").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("needs_archive"));
    }

    #[tokio::test]
    async fn schemas_and_tables() {
        let (_dir, app) = seeded();
        let (status, body) = get(app.clone(), "/manage/schemas").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["schemas"], serde_json::json!(["logistics"]));

        let (status, body) = get(app.clone(), "/manage/schemas/logistics/tables").await;
        assert_eq!(status, StatusCode::OK);
        let tables = body["tables"].as_array().unwrap();
        assert_eq!(tables.len(), TableKind::ALL.len());
        assert!(tables[0]["fields"][0]["type"].is_string());

        let (status, _) = get(app, "/manage/schemas/staging/tables").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn params_map_onto_request() {
        let params = DistributionParams {
            run_date: Some(run_date()),
            min_demand: Some(2.0),
            limit: Some(5),
            respect_volume: true,
            schema: Some("staging".into()),
            logdays_table: Some("lead_times".into()),
            ..Default::default()
        };
        let req = params.into_request().unwrap();
        assert_eq!(req.run_date, run_date());
        assert_eq!(req.effective_limit(), Some(5));
        assert!(req.respect_volume);
        assert_eq!(req.tables.schema.as_str(), "staging");
        assert_eq!(req.tables.name(TableKind::LeadTime).as_str(), "lead_times");
        assert_eq!(req.filters.iter().count(), 1);
    }
}
