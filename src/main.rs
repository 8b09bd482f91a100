//! Thin demo surface for the payroll/PSP engine: wires the in-memory store
//! and a couple of read operations behind an axum router. Not part of the
//! tested correctness core — every invariant lives in the library crate.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use payroll_psp_engine::config::{
    EventStoreConfig, FundingGateConfig, LedgerConfig, LiabilityConfig, ProviderConfig,
    PspConfig, RailKind, ReconciliationConfig,
};
use payroll_psp_engine::domain::value_objects::{LegalEntityId, PayRunId, TenantId};
use payroll_psp_engine::store::memory::InMemoryStore;
use payroll_psp_engine::store::PayRunRepository;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    store: Arc<InMemoryStore>,
    config: Arc<PspConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(PspConfig::new(
        TenantId::new(),
        LegalEntityId::new(),
        LedgerConfig::default(),
        FundingGateConfig::default(),
        vec![
            ProviderConfig::new("ach_primary", RailKind::Ach)?,
            ProviderConfig::new("fednow_primary", RailKind::Fednow)?,
        ],
        EventStoreConfig::default(),
        ReconciliationConfig::default(),
        LiabilityConfig::default(),
    )?);

    let state = AppState {
        store: Arc::new(InMemoryStore::new()),
        config,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/config", get(show_config))
        .route("/pay-runs/:pay_run_id", get(get_pay_run))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8082".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(%port, "payroll-psp-engine demo listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "service": "payroll-psp-engine" }))
}

async fn show_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "tenant_id": state.config.tenant_id.to_string(),
        "legal_entity_id": state.config.legal_entity_id.to_string(),
        "providers": state.config.providers.iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
        "funding_model": format!("{:?}", state.config.funding_gate.default_model),
    }))
}

async fn get_pay_run(State(state): State<AppState>, Path(pay_run_id): Path<uuid::Uuid>) -> impl IntoResponse {
    match state.store.get_pay_run(PayRunId::from_uuid(pay_run_id)).await {
        Some(run) => Json(serde_json::json!({
            "pay_run_id": run.pay_run_id.to_string(),
            "status": run.status.to_string(),
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "pay run not found" })),
        )
            .into_response(),
    }
}
