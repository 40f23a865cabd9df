use std::net::SocketAddr;

use tokio::net::TcpListener;

use michat_server::auth::jwt;
use michat_server::config::{generate_config_template, Config};
use michat_server::db;
use michat_server::identity::store;
use michat_server::routes;
use michat_server::state::AppState;
use michat_server::ws::SessionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "michat_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "michat_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("MiChat server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Load or generate JWT signing key (256-bit random, stored in data_dir)
    let jwt_secret = jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    // Seed the admin account on first boot
    store::seed_admin(
        &db,
        &config.admin_username,
        &config.admin_password,
        &config.admin_color,
    )
    .await?;

    let state = AppState {
        db,
        jwt_secret,
        registry: SessionRegistry::new(),
        admin_username: config.admin_username.clone(),
    };

    let app = routes::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
