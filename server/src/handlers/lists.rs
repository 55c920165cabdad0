// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use super::{ApiResult, AppError, CreatedResult, ValidJson, ValidPath, created, ok};
use crate::access;
use crate::activity::{self, ActivityEntry};
use crate::adapter::{self, Filter, FindOptions, Record, Table};
use crate::auth::AuthUser;
use crate::positions::{self, LISTS_IN_BOARD};
use crate::state::AppState;
use anyhow::Context;
use axum::extract::State;
use chrono::Utc;
use common::{BoardList, CreateListPayload, UpdateListPayload};
use tracing::{debug, info};

/// Handler for the lists of a board, in display order.
pub async fn list_lists(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(board_id): ValidPath<i64>,
) -> ApiResult<Vec<BoardList>> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    access::board_access(&mut conn, caller.id, board_id).await?;
    let lists: Vec<BoardList> = adapter::find_many(
        &mut conn,
        Table::Lists,
        &Filter::new().eq("board_id", board_id).live(),
        &FindOptions::ordered_by("position"),
    )
    .await?;
    ok("Lists retrieved successfully.", lists)
}

/// Handler for appending a list at the end of a board.
pub async fn create_list(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidJson(payload): ValidJson<CreateListPayload>,
) -> CreatedResult<BoardList> {
    let mut tx = state.begin_write().await?;
    let access = access::board_access(&mut tx, caller.id, payload.board_id).await?;
    access.require_write()?;

    let position = positions::next_position(&mut tx, LISTS_IN_BOARD, payload.board_id).await?;
    let now = Utc::now();
    let list: BoardList = adapter::insert(
        &mut tx,
        Table::Lists,
        &Record::new()
            .set("board_id", payload.board_id)
            .set("name", payload.name.trim())
            .set("color", payload.color)
            .set("position", position)
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &access.board,
            caller.id,
            "list_created",
            format!("Created list \"{}\"", list.name),
        )
        .after(&list),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("List {} created at position {}", list.id, list.position);
    created("List created successfully.", list)
}

pub async fn get_list(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(list_id): ValidPath<i64>,
) -> ApiResult<BoardList> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let access = access::list_access(&mut conn, caller.id, list_id).await?;
    ok("List retrieved successfully.", access.list)
}

/// Handler for renaming, recoloring or reordering a list.
pub async fn update_list(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(list_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<UpdateListPayload>,
) -> ApiResult<BoardList> {
    let mut tx = state.begin_write().await?;
    let access = access::list_access(&mut tx, caller.id, list_id).await?;
    access.board.require_write()?;

    if let Some(target) = payload.position {
        debug!("Reordering list {} to position {}", list_id, target);
        positions::move_within(
            &mut tx,
            LISTS_IN_BOARD,
            access.list.board_id,
            list_id,
            access.list.position,
            target,
        )
        .await?;
    }

    let patch = Record::new()
        .set_some("name", payload.name.as_deref().map(str::trim))
        .set_some("color", payload.color);
    let updated: BoardList = adapter::update(&mut tx, Table::Lists, &Filter::id(list_id).live(), &patch)
        .await?
        .ok_or_else(|| AppError::not_found("List not found."))?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &access.board.board,
            caller.id,
            "list_updated",
            format!("Updated list \"{}\"", updated.name),
        )
        .before(&access.list)
        .after(&updated),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok("List updated successfully.", updated)
}

/// Soft-deletes a list. Its cards stay in place but become unreachable, and
/// the remaining lists keep their positions.
pub async fn delete_list(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(list_id): ValidPath<i64>,
) -> ApiResult<()> {
    let mut tx = state.begin_write().await?;
    let access = access::list_access(&mut tx, caller.id, list_id).await?;
    access.board.require_write()?;

    adapter::soft_delete(&mut tx, Table::Lists, &Filter::id(list_id)).await?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &access.board.board,
            caller.id,
            "list_deleted",
            format!("Deleted list \"{}\"", access.list.name),
        )
        .before(&access.list),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("List {} deleted by user {}", list_id, caller.id);
    ok("List deleted successfully.", ())
}
