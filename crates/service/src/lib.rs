//! Composition root for the inventory transfer engine.
//!
//! Wires the store, ledger, transfer orchestrator and sale coordinator
//! together and exposes the operational endpoints (`/health`, `/metrics`)
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use domain::{InventoryLedger, LedgerConfig, TenancyDirectory};
use inventory_store::InventoryStore;
use metrics_exporter_prometheus::PrometheusHandle;
use sales::{InMemoryStockAlertNotifier, SaleTransactionCoordinator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use transfer::{InMemoryCatalogService, TransferOrchestrator};

/// Shared application state.
///
/// The catalog and alert collaborators are in-process implementations; the
/// tenancy directory is injected by the caller.
pub struct AppState<S: InventoryStore> {
    pub ledger: Arc<InventoryLedger<S>>,
    pub transfers: TransferOrchestrator<S, InMemoryCatalogService>,
    pub sales: SaleTransactionCoordinator<S, InMemoryStockAlertNotifier>,
}

/// Builds the ledger and both orchestration services on top of `store`.
pub fn create_state<S: InventoryStore + 'static>(
    store: S,
    tenancy: Arc<dyn TenancyDirectory>,
    catalog: InMemoryCatalogService,
    notifier: InMemoryStockAlertNotifier,
    ledger_config: LedgerConfig,
) -> Arc<AppState<S>> {
    let ledger = Arc::new(InventoryLedger::new(store, tenancy, ledger_config));
    let transfers = TransferOrchestrator::new(ledger.clone(), catalog);
    let sales = SaleTransactionCoordinator::new(ledger.clone(), notifier);

    Arc::new(AppState {
        ledger,
        transfers,
        sales,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: InventoryStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Registers descriptions for the metrics the services emit.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "inventory_movements_total",
        "Inventory movements written, by movement type"
    );
    metrics::describe_counter!(
        "warehouse_bills_total",
        "Warehouse bill transitions, by bill type and transition"
    );
    metrics::describe_counter!(
        "transfer_validation_failures_total",
        "Transfer requests rejected by line validation"
    );
    metrics::describe_counter!("sales_total", "Sales committed");
    metrics::describe_counter!("refunds_total", "Refunds committed");
    metrics::describe_counter!(
        "low_stock_alerts_total",
        "Records that ended below the low-stock threshold"
    );
    metrics::describe_histogram!(
        "store_commit_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent committing a unit of work"
    );
}
