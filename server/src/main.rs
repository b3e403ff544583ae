use pong_server::config::ServerConfig;
use pong_server::ws::{router, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid server configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();
    tracing::info!(
        "Tick rate {} Hz, up to {} rooms, CORS origin {}",
        config.tick_rate_hz,
        config.max_rooms,
        config.allowed_origin.as_deref().unwrap_or("*")
    );
    let app = router(AppState::new(config));

    tracing::info!("Starting pong server on {}", listen_addr);
    println!("Pong server listening on {}", listen_addr);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", listen_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
