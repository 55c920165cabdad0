// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::http::{HeaderName, Method};
use clap::Parser;
use server::auth::TokenService;
use server::config::Config;
use server::state::AppState;
use server::{database, routes};
use std::sync::Arc;
use tokio::time;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting up the server...");
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET is not set, signing tokens with the development secret.");
    }

    let db_pool = match database::establish_connection_pool(&config.database_url).await {
        Ok(pool) => {
            tracing::info!("Database connection was made successfully.");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect with the database: {:?}", e);
            std::process::exit(1);
        }
    };

    let state = AppState::new(
        db_pool,
        TokenService::new(config.jwt_secret.as_bytes(), config.token_ttl()),
    );

    let tokens = Arc::clone(&state.tokens);
    let sweep_every = config.revocation_sweep_interval();
    tokio::spawn(async move {
        let mut interval = time::interval(sweep_every);

        // The first tick completes immediately. Skip it to wait for the first interval.
        interval.tick().await;

        loop {
            interval.tick().await;
            let dropped = tokens.sweep_revoked();
            if dropped > 0 {
                tracing::info!("Forgot {} expired revoked tokens.", dropped);
            } else {
                tracing::debug!("No expired revoked tokens to forget.");
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("authorization"),
        ])
        .allow_origin(Any);

    let app = routes::create_router(state).layer(cors);

    tracing::info!("The server listens on http://{}", config.listen);
    let listener = match tokio::net::TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {:?}", config.listen, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {:?}", e);
        std::process::exit(1);
    }
}
