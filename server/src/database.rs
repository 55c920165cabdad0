// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// The schema file, embedded so the binary can bootstrap an empty database.
const SCHEMA: &str = include_str!("../schema.sql");

const MAX_CONNECTIONS: u32 = 5;

/// How long a writer waits for SQLite's write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Establishes the database connection pool.
/// If the database file (or its directory) does not exist, it is created.
/// The schema is applied on every start; all statements are idempotent.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database URL: {database_url}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    if let Some(dir) = database_file(database_url).and_then(|f| f.parent().map(PathBuf::from)) {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            info!("Creating database directory {}", dir.display());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    apply_schema(&pool).await?;
    info!("Database schema is ready.");

    Ok(pool)
}

/// A private in-memory database with the schema applied.
///
/// A single connection is kept alive for the lifetime of the pool, otherwise
/// SQLite would drop the database as soon as the connection is recycled.
pub async fn in_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("Failed to open in-memory database")?;

    apply_schema(&pool).await?;
    Ok(pool)
}

async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for statement in split_statements(SCHEMA) {
        debug!("Applying schema statement: {}", first_line(&statement));
        sqlx::query(&statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to apply schema statement: {}", first_line(&statement)))?;
    }
    Ok(())
}

/// Splits a schema file into individual statements, dropping `--` comments.
fn split_statements(sql: &str) -> Vec<String> {
    let without_comments: String = sql
        .lines()
        .map(|line| match line.find("--") {
            Some(idx) => &line[..idx],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or_default()
}

/// Extracts the on-disk path from a `sqlite:` URL, if there is one.
fn database_file(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(PathBuf::from(path))
    }
}
