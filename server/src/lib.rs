//! HTTP todo-list service.
//!
//! # Overview
//! Each signed-in user keeps a small list of todos. Every todo route answers
//! in one of two encodings: JSON for API clients (see [`negotiate`]) and
//! HTML, short text or redirects for browsers. A separately built frontend
//! bundle is served from `/static_root/`.
//!
//! # Design
//! - [`AppState`] carries trait objects for the record store and the user
//!   store, so the same router runs against memory or Postgres.
//! - Authentication is one middleware ([`middleware::require_identity`])
//!   applied to all todo routes; handlers receive the caller's
//!   [`identity::Identity`] as a request extension.
//! - Errors flow through [`error::AppError`], which owns the status code and
//!   payload mapping.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware::from_fn_with_state,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod assets;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod model;
pub mod negotiate;
pub mod render;
pub mod store;

pub use config::Config;
pub use error::AppError;
pub use identity::{Identity, IdentityProvider};
pub use model::Todo;
pub use store::{InMemoryTodoStore, TodoRepository};

use handlers::{auth, todos};
use identity::{InMemoryUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub todos: Arc<dyn TodoRepository>,
    pub identity: Arc<IdentityProvider>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(todos: Arc<dyn TodoRepository>, users: Arc<dyn UserStore>, config: Config) -> Self {
        let identity = IdentityProvider::new(users, config.session_ttl);
        Self {
            todos,
            identity: Arc::new(identity),
            config: Arc::new(config),
        }
    }

    /// State backed entirely by process memory.
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            Arc::new(InMemoryTodoStore::new()),
            Arc::new(InMemoryUserStore::new()),
            config,
        )
    }

    /// Pick storage from configuration.
    ///
    /// With the `postgres` feature and `DATABASE_URL` set, todos and
    /// accounts live in Postgres; otherwise everything is in memory.
    ///
    /// # Errors
    /// Fails when the database is unreachable or its tables cannot be
    /// created.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        #[cfg(feature = "postgres")]
        {
            if let Some(url) = config.database_url.clone() {
                let pool = sqlx::PgPool::connect(&url).await?;
                let todos = store::PostgresTodoStore::new(pool.clone());
                let users = identity::PostgresUserStore::new(pool);
                todos.migrate().await?;
                users.migrate().await?;
                info!("using postgres storage");
                return Ok(Self::new(Arc::new(todos), Arc::new(users), config));
            }
        }

        if config.database_url.is_some() && !cfg!(feature = "postgres") {
            warn!("DATABASE_URL is set but postgres support is not compiled in; using memory");
        }
        info!("using in-memory storage");
        Ok(Self::in_memory(config))
    }
}

pub fn app(state: AppState) -> Router {
    let todo_routes = Router::new()
        .route("/", get(todos::index).post(todos::index))
        .route("/{id}/", any(todos::detail))
        .route("/{id}/set_state", any(todos::set_state))
        .route("/{id}/update_title", any(todos::update_title))
        .route("/{id}/delete", any(todos::delete))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_identity));

    Router::new()
        .merge(todo_routes)
        .route("/login/", get(auth::login_page).post(auth::login))
        .route("/signup/", get(auth::signup_page).post(auth::signup))
        .route("/logout/", any(auth::logout))
        .route("/static_root/", get(assets::entry))
        .route("/static_root/{*path}", get(assets::file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// How often idle expired sessions are purged while serving.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    let sweeper = tokio::spawn(sweep_sessions(Arc::clone(&state.identity)));
    let served = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    sweeper.abort();
    served
}

async fn sweep_sessions(identity: Arc<IdentityProvider>) {
    let mut ticks = tokio::time::interval(SESSION_SWEEP_INTERVAL);
    loop {
        ticks.tick().await;
        identity.purge_expired_sessions().await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
