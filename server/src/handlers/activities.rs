// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use super::{ApiResult, ValidPath, ValidQuery, ok};
use crate::access;
use crate::activity::{self, DEFAULT_LIMIT};
use crate::auth::AuthUser;
use crate::state::AppState;
use anyhow::Context;
use axum::extract::State;
use common::Activity;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    limit: Option<i64>,
}

/// Handler for the newest activities of a board.
pub async fn board_activities(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(board_id): ValidPath<i64>,
    ValidQuery(query): ValidQuery<ActivityQuery>,
) -> ApiResult<Vec<Activity>> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    access::board_access(&mut conn, caller.id, board_id).await?;
    let activities =
        activity::for_board(&mut conn, board_id, query.limit.unwrap_or(DEFAULT_LIMIT)).await?;
    ok("Activities retrieved successfully.", activities)
}
