pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/ssh-key", get(handlers::handle_ssh_key))
        .route(
            "/sessions",
            get(handlers::handle_session_list).post(handlers::handle_session_connect),
        )
        .route(
            "/sessions/{node_id}",
            get(handlers::handle_session_inspect).delete(handlers::handle_session_drop),
        )
        .route("/session-status", post(handlers::handle_session_status))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    serve_on(listener, state).await
}

/// Serve on an already bound listener (port 0 in tests).
pub async fn serve_on(listener: TcpListener, state: ApiState) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    tracing::info!(port, "API listening on 127.0.0.1");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
