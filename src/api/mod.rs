pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

use tokio::net::TcpListener;

use crate::infrastructure::config::ServerConfig;

/// Binds the configured address. Host names such as `localhost` are resolved.
pub async fn bind(server: &ServerConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind((server.host.as_str(), server.port)).await
}
