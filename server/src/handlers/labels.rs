// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use super::{ApiResult, AppError, CreatedResult, ValidJson, ValidPath, created, ok};
use crate::access::{self, BoardAccess};
use crate::activity::{self, ActivityEntry};
use crate::adapter::{self, Filter, FindOptions, Record, Table};
use crate::auth::AuthUser;
use crate::colors;
use crate::state::AppState;
use anyhow::Context;
use axum::extract::State;
use chrono::Utc;
use common::{CreateLabelPayload, Label, UpdateLabelPayload};
use sqlx::SqliteConnection;
use tracing::info;

/// Loads a label and the caller's access to its board. A label of a deleted
/// board is reported as missing.
async fn label_access(
    conn: &mut SqliteConnection,
    user_id: i64,
    label_id: i64,
) -> Result<(Label, BoardAccess), AppError> {
    let label: Label = adapter::find_one(conn, Table::Labels, &Filter::id(label_id))
        .await?
        .ok_or_else(|| AppError::not_found("Label not found."))?;
    let board = access::board_access(conn, user_id, label.board_id)
        .await
        .map_err(|e| {
            if e.status() == axum::http::StatusCode::NOT_FOUND {
                AppError::not_found("Label not found.")
            } else {
                e
            }
        })?;
    Ok((label, board))
}

pub async fn list_labels(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(board_id): ValidPath<i64>,
) -> ApiResult<Vec<Label>> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    access::board_access(&mut conn, caller.id, board_id).await?;
    let labels: Vec<Label> = adapter::find_many(
        &mut conn,
        Table::Labels,
        &Filter::new().eq("board_id", board_id),
        &FindOptions::ordered_by("name"),
    )
    .await?;
    ok("Labels retrieved successfully.", labels)
}

/// Handler for creating a label. Without a color, the next palette color of
/// the board is used.
pub async fn create_label(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(board_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<CreateLabelPayload>,
) -> CreatedResult<Label> {
    let mut tx = state.begin_write().await?;
    let access = access::board_access(&mut tx, caller.id, board_id).await?;
    access.require_write()?;

    let color = colors::color_or_next(
        &mut tx,
        payload.color,
        Table::Labels,
        &Filter::new().eq("board_id", board_id),
    )
    .await?;
    let label: Label = adapter::insert(
        &mut tx,
        Table::Labels,
        &Record::new()
            .set("board_id", board_id)
            .set("name", payload.name.trim())
            .set("color", color)
            .set("bg_color", payload.bg_color)
            .set("logo_path", payload.logo_path)
            .set("created_at", Utc::now()),
    )
    .await?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &access.board,
            caller.id,
            "label_created",
            format!("Created label \"{}\"", label.name),
        )
        .after(&label),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Label {} created on board {}", label.id, board_id);
    created("Label created successfully.", label)
}

pub async fn get_label(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(label_id): ValidPath<i64>,
) -> ApiResult<Label> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let (label, _) = label_access(&mut conn, caller.id, label_id).await?;
    ok("Label retrieved successfully.", label)
}

pub async fn update_label(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(label_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<UpdateLabelPayload>,
) -> ApiResult<Label> {
    let mut tx = state.begin_write().await?;
    let (label, access) = label_access(&mut tx, caller.id, label_id).await?;
    access.require_write()?;

    let patch = Record::new()
        .set_some("name", payload.name.as_deref().map(str::trim))
        .set_some("color", payload.color)
        .set_some("bg_color", payload.bg_color)
        .set_some("logo_path", payload.logo_path);
    if patch.is_empty() {
        return ok("Label updated successfully.", label);
    }
    let updated: Label = adapter::update(&mut tx, Table::Labels, &Filter::id(label_id), &patch)
        .await?
        .ok_or_else(|| AppError::not_found("Label not found."))?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &access.board,
            caller.id,
            "label_updated",
            format!("Updated label \"{}\"", updated.name),
        )
        .before(&label)
        .after(&updated),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok("Label updated successfully.", updated)
}

/// Removes a label for good, together with its card attachments.
pub async fn delete_label(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(label_id): ValidPath<i64>,
) -> ApiResult<()> {
    let mut tx = state.begin_write().await?;
    let (label, access) = label_access(&mut tx, caller.id, label_id).await?;
    access.require_write()?;

    let detached = adapter::delete(
        &mut tx,
        Table::CardLabels,
        &Filter::new().eq("label_id", label_id),
    )
    .await?;
    adapter::delete(&mut tx, Table::Labels, &Filter::id(label_id)).await?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &access.board,
            caller.id,
            "label_deleted",
            format!("Deleted label \"{}\" from {} card(s)", label.name, detached),
        )
        .before(&label),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Label {} deleted by user {}", label_id, caller.id);
    ok("Label deleted successfully.", ())
}
