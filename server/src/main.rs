use axum::routing::get;
use axum::Router;
use bowling_server::bowl_loop::{run_bowl_loop, BowlCommand};
use bowling_server::config::ServerConfig;
use bowling_server::ws::{ws_handler, AppState};
use bowling_shared::protocol::ServerMsg;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;

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

    let (cmd_tx, cmd_rx) = mpsc::channel::<BowlCommand>(256);
    // Room for a whole delivery's positions plus its trajectory
    let (broadcast_tx, _) = broadcast::channel::<ServerMsg>(256);

    // Spawn bowling loop
    let bc_tx = broadcast_tx.clone();
    tokio::spawn(async move {
        run_bowl_loop(cmd_rx, bc_tx, config).await;
    });

    let app_state = AppState {
        cmd_tx,
        broadcast_tx,
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("Starting bowling server on {}", listen_addr);
    println!("Bowling server listening on {}", listen_addr);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", listen_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
