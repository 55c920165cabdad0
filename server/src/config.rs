// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Only meant for local development; the server warns when it is in use.
pub const DEV_JWT_SECRET: &str = "boardsync-development-secret";

/// Process configuration, read once at startup from flags, the environment
/// and an optional `.env` file, then handed to whatever needs it.
#[derive(Parser, Debug, Clone)]
#[command(name = "boardsync", about = "BoardSync Kanban board API server", version)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, default_value = "0.0.0.0:3000", env = "BOARDSYNC_LISTEN")]
    pub listen: SocketAddr,

    /// SQLite database URL
    #[arg(long, default_value = "sqlite://database/boardsync.db", env = "DATABASE_URL")]
    pub database_url: String,

    /// Secret used to sign bearer tokens
    #[arg(long, default_value = DEV_JWT_SECRET, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Lifetime of issued tokens, in hours
    #[arg(long, default_value_t = 24, env = "TOKEN_TTL_HOURS")]
    pub token_ttl_hours: i64,

    /// How often revoked tokens are swept from memory, in seconds
    #[arg(long, default_value_t = 300, env = "REVOCATION_SWEEP_SECS")]
    pub revocation_sweep_secs: u64,
}

impl Config {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    pub fn revocation_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.revocation_sweep_secs.max(1))
    }
}
