mod config;
mod rate_limit;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env();
    let port = config.port;
    tracing::info!(
        env = %config.env,
        rate_burst = config.ws.rate_burst,
        rate_refill = ?config.ws.rate_refill,
        client_buffer = config.ws.client_buffer,
        publish_enabled = config.publish_token.is_some(),
        "relay config loaded"
    );

    let state = state::AppState::new(config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "globechat relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
