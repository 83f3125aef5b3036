#![allow(clippy::too_many_arguments, clippy::type_complexity)]

pub mod domain;
pub mod handlers;
pub mod projections;
pub mod shared;
pub mod system;
pub mod usecases;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use axum::middleware::{self, Next};
    use axum::response::Response;
    use axum::{
        routing::{get, post},
        Router,
    };
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tower_http::cors::{Any, CorsLayer};

    use crate::handlers::AppState;
    use crate::shared::data::sea_orm_store::SeaOrmStore;
    use crate::shared::data::storage::SyncStore;
    use crate::system::sync_scheduler::SyncScheduler;
    use crate::usecases::u501_sync_from_erp::{
        source_api::build_source_api, ProgressTracker, SyncExecutor, SyncService,
    };

    system::tracing::initialize()?;

    // Простой middleware для логирования запросов
    async fn request_logger(req: Request<Body>, next: Next) -> Response {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let start = std::time::Instant::now();
        let response = next.run(req).await;
        tracing::info!(
            "{} {} -> {} ({}ms)",
            method,
            uri.path(),
            response.status().as_u16(),
            start.elapsed().as_millis()
        );
        response
    }

    let config = shared::config::load_config()?;
    let db_path = shared::config::get_database_path(&config)?;
    let conn = shared::data::db::initialize_database(db_path.to_str())
        .await
        .map_err(|e| anyhow::anyhow!("db init failed: {e}"))?;

    let store: Arc<dyn SyncStore> = Arc::new(SeaOrmStore::new(conn));
    let source = build_source_api(&config.source_api)?;

    let service = Arc::new(SyncService::new(store.clone(), source));
    let executor = Arc::new(SyncExecutor::new(
        service.clone(),
        Arc::new(ProgressTracker::new()),
        config.sync.clone(),
    ));
    let scheduler = Arc::new(SyncScheduler::new(
        executor.clone(),
        store.clone(),
        config.sync.clone(),
    ));

    tokio::spawn({
        let scheduler = scheduler.clone();
        async move {
            if let Err(e) = scheduler.run_loop().await {
                tracing::error!("Sync scheduler stopped: {}", e);
            }
        }
    });

    let state = AppState {
        store,
        service,
        executor,
        scheduler,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        // ========================================
        // A001 TENANTS
        // ========================================
        .route(
            "/api/a001/tenants",
            get(handlers::a001_tenant::list_tenants).post(handlers::a001_tenant::create_tenant),
        )
        // ========================================
        // U501 SYNC FROM ERP
        // ========================================
        .route("/api/u501/sync/start", post(handlers::u501_sync::start_sync))
        .route(
            "/api/u501/sync/:session_id/progress",
            get(handlers::u501_sync::get_progress),
        )
        .route(
            "/api/u501/sync/:session_id/cancel",
            post(handlers::u501_sync::cancel_sync),
        )
        .route(
            "/api/u501/sync/run-scheduled",
            post(handlers::u501_sync::run_scheduled),
        )
        // ========================================
        // P901 INVENTORY DIRECTORY
        // ========================================
        .route(
            "/api/p901/inventory-directory/:tenant_id/upload",
            post(handlers::p901_inventory_directory::upload_csv),
        )
        .route(
            "/api/p901/inventory-directory/:tenant_id/sync",
            post(handlers::p901_inventory_directory::sync_from_source),
        )
        .with_state(state)
        .layer(middleware::from_fn(request_logger))
        .layer(cors);

    let port = config.server.port;
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    tracing::info!("Attempting to bind server to http://{}", addr);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            tracing::info!("Server successfully bound to {}", addr);
            listener
        }
        Err(e) => {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                tracing::error!("Error: Port {} is already in use.", port);
            } else {
                tracing::error!("Failed to bind to port {}. Error: {}", port, e);
            }
            return Err(e.into());
        }
    };

    axum::serve(listener, app).await?;

    Ok(())
}
