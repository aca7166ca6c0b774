//! HTTP route assembly and server loop.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::activity::ActivityLog;
use crate::config::Config;
use crate::customer::CustomerStore;
use crate::document::DocumentStore;
use crate::notify::SharedNotifier;
use crate::store::StoreResult;
use crate::task::{TaskService, TaskStore};
use crate::uploads::{UploadStore, UPLOADS_ROUTE};
use crate::users::SharedUserDirectory;

use super::auth;
use super::types::HealthResponse;

/// Uploads are capped at 50 MB per request.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Task workflow (owns the task store)
    pub tasks: TaskService,
    pub customers: Arc<CustomerStore>,
    pub documents: DocumentStore,
    pub activity: Arc<ActivityLog>,
    /// Injected account source
    pub users: SharedUserDirectory,
    pub uploads: UploadStore,
    /// Best-effort mail sender
    pub notifier: SharedNotifier,
}

impl AppState {
    /// Open every store under `config.data_dir`.
    pub fn open(
        config: Config,
        users: SharedUserDirectory,
        notifier: SharedNotifier,
    ) -> StoreResult<Self> {
        let data_dir = config.data_dir.clone();
        let customers = Arc::new(CustomerStore::open(data_dir.join("customers.json"))?);
        let activity = Arc::new(ActivityLog::open(data_dir.join("activity.jsonl"))?);
        let task_store = Arc::new(TaskStore::open(data_dir.join("tasks.json"))?);
        let documents = DocumentStore::open(data_dir.join("documents.json"))?;

        let tasks = TaskService::new(
            task_store,
            Arc::clone(&customers),
            Arc::clone(&activity),
            Arc::clone(&users),
            config.task_write_retries,
        );

        Ok(Self {
            uploads: UploadStore::new(config.uploads_dir.clone()),
            config,
            tasks,
            customers,
            documents,
            activity,
            users,
            notifier,
        })
    }
}

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/login", post(auth::login))
        .nest_service(UPLOADS_ROUTE, ServeDir::new(state.uploads.dir()));

    // File upload routes with increased body limit
    let upload_routes = Router::new()
        .nest("/api/uploads", super::documents::upload_routes())
        .nest("/api/documents", super::documents::routes())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    let protected_routes = Router::new()
        .nest("/api/tasks", super::tasks::routes())
        .nest("/api/customers", super::customers::routes())
        .nest("/api/projects", super::projects::routes())
        .nest("/api/activity", super::activity::routes())
        .nest("/api/users", super::users::routes())
        .merge(upload_routes)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        auth_required: state.config.auth.auth_required(state.config.dev_mode),
    })
}
