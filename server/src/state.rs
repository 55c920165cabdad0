// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth::TokenService;
use anyhow::Context;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(pool: SqlitePool, tokens: TokenService) -> Self {
        Self {
            pool,
            tokens: Arc::new(tokens),
        }
    }

    /// Starts a transaction for a mutation.
    ///
    /// `BEGIN IMMEDIATE` takes SQLite's write lock up front, so a second
    /// writer waits on the busy timeout instead of failing when it later
    /// tries to upgrade a stale read snapshot.
    pub async fn begin_write(&self) -> anyhow::Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .context("Failed to start transaction")
    }
}
