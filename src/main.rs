use anyhow::Context;
use clap::Parser;

use places_api::app::{build_state, open_store, router, AppState};
use places_api::auth::{generate_jwt, Claims};
use places_api::config::AppConfig;
use places_api::database::models::User;
use places_api::database::UserRepository;

#[derive(Parser)]
#[command(name = "places-api")]
#[command(about = "Places API server")]
#[command(version)]
struct Args {
    #[arg(long, help = "Port to listen on (overrides PORT / PLACES_API_PORT)")]
    port: Option<u16>,

    #[arg(long = "seed-user", help = "Create a user at startup and log its id and token (repeatable)")]
    seed_users: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();
    places_api::init_tracing();

    let args = Args::parse();
    let config = places_api::config::config();
    config.validate()?;
    tracing::info!("Starting Places API in {:?} mode", config.environment);

    let store = open_store(config).await?;
    let state = build_state(config, store)?;
    seed_users(&state, config, &args.seed_users).await?;

    let app = router(state, config);

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Places API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn seed_users(state: &AppState, config: &AppConfig, names: &[String]) -> anyhow::Result<()> {
    for name in names {
        let user = User::new(name.as_str());
        state.places.store().save_user(&user).await?;

        let claims = Claims::new(user.id, name.as_str(), config.security.jwt_expiry_hours);
        let token = generate_jwt(&claims, &config.security.jwt_secret)?;
        tracing::info!("Seeded user '{}' id={} token={}", name, user.id, token);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
