// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use super::{ApiResult, AppError, CreatedResult, ValidJson, ValidPath, created, ok};
use crate::access::{self, CardAccess};
use crate::activity::{self, ActivityEntry};
use crate::adapter::{self, Filter, FindOptions, Record, Table};
use crate::auth::AuthUser;
use crate::state::AppState;
use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use common::{Comment, CommentPayload};
use sqlx::SqliteConnection;
use tracing::info;

async fn comment_access(
    conn: &mut SqliteConnection,
    user_id: i64,
    comment_id: i64,
) -> Result<(Comment, CardAccess), AppError> {
    let comment: Comment = adapter::find_one(conn, Table::Comments, &Filter::id(comment_id).live())
        .await?
        .ok_or_else(|| AppError::not_found("Comment not found."))?;
    let card = access::card_access(conn, user_id, comment.card_id)
        .await
        .map_err(|e| {
            if e.status() == StatusCode::NOT_FOUND {
                AppError::not_found("Comment not found.")
            } else {
                e
            }
        })?;
    Ok((comment, card))
}

/// Handler for the comments of a card, oldest first.
pub async fn list_comments(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(card_id): ValidPath<i64>,
) -> ApiResult<Vec<Comment>> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    access::card_access(&mut conn, caller.id, card_id).await?;
    let comments: Vec<Comment> = adapter::find_many(
        &mut conn,
        Table::Comments,
        &Filter::new().eq("card_id", card_id).live(),
        &FindOptions::ordered_by("created_at"),
    )
    .await?;
    ok("Comments retrieved successfully.", comments)
}

pub async fn create_comment(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(card_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<CommentPayload>,
) -> CreatedResult<Comment> {
    let mut tx = state.begin_write().await?;
    let access = access::card_access(&mut tx, caller.id, card_id).await?;
    access.board.require_write()?;

    let now = Utc::now();
    let comment: Comment = adapter::insert(
        &mut tx,
        Table::Comments,
        &Record::new()
            .set("card_id", card_id)
            .set("user_id", caller.id)
            .set("content", payload.content.trim())
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await?;
    activity::record(
        &mut tx,
        ActivityEntry::card(
            &access.board.board,
            card_id,
            caller.id,
            "comment_added",
            format!("Commented on \"{}\"", access.card.title),
        )
        .after(&comment),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Comment {} added to card {}", comment.id, card_id);
    created("Comment created successfully.", comment)
}

pub async fn get_comment(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(comment_id): ValidPath<i64>,
) -> ApiResult<Comment> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let (comment, _) = comment_access(&mut conn, caller.id, comment_id).await?;
    ok("Comment retrieved successfully.", comment)
}

/// Only the author may edit a comment.
pub async fn update_comment(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(comment_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<CommentPayload>,
) -> ApiResult<Comment> {
    let mut tx = state.begin_write().await?;
    let (comment, access) = comment_access(&mut tx, caller.id, comment_id).await?;
    if comment.user_id != caller.id {
        return Err(AppError::forbidden("Only the author can edit this comment."));
    }

    let updated: Comment = adapter::update(
        &mut tx,
        Table::Comments,
        &Filter::id(comment_id).live(),
        &Record::new().set("content", payload.content.trim()),
    )
    .await?
    .ok_or_else(|| AppError::not_found("Comment not found."))?;
    activity::record(
        &mut tx,
        ActivityEntry::card(
            &access.board.board,
            comment.card_id,
            caller.id,
            "comment_updated",
            format!("Edited a comment on \"{}\"", access.card.title),
        )
        .before(&comment)
        .after(&updated),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok("Comment updated successfully.", updated)
}

/// The author or an admin of the workspace may delete a comment.
pub async fn delete_comment(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(comment_id): ValidPath<i64>,
) -> ApiResult<()> {
    let mut tx = state.begin_write().await?;
    let (comment, access) = comment_access(&mut tx, caller.id, comment_id).await?;
    if comment.user_id != caller.id {
        access.board.require_workspace_admin().map_err(|_| {
            AppError::forbidden("Only the author or a workspace admin can delete this comment.")
        })?;
    }

    adapter::soft_delete(&mut tx, Table::Comments, &Filter::id(comment_id)).await?;
    activity::record(
        &mut tx,
        ActivityEntry::card(
            &access.board.board,
            comment.card_id,
            caller.id,
            "comment_deleted",
            format!("Deleted a comment on \"{}\"", access.card.title),
        )
        .before(&comment),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Comment {} deleted by user {}", comment_id, caller.id);
    ok("Comment deleted successfully.", ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;
    use crate::test_support::{self, Fixture, caller};
    use common::Role;

    fn text(content: &str) -> ValidJson<CommentPayload> {
        ValidJson(CommentPayload {
            content: content.to_string(),
        })
    }

    #[tokio::test]
    async fn test_only_author_edits_and_admin_may_delete() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let bob = test_support::user(&mut conn, "Bob").await;
        let cat = test_support::user(&mut conn, "Cat").await;
        test_support::member(&mut conn, &fx.workspace, &bob, Role::Member).await;
        test_support::member(&mut conn, &fx.workspace, &cat, Role::Member).await;
        let cards = fx.cards(&mut conn, fx.list.id, &["A"]).await;
        drop(conn);
        let state = test_support::state(&pool);

        let (_, body) = create_comment(State(state.clone()), caller(&bob), ValidPath(cards[0].id), text(" First! "))
            .await
            .unwrap();
        let comment = body.0.data;
        assert_eq!(comment.content, "First!");

        let err = update_comment(State(state.clone()), caller(&fx.owner), ValidPath(comment.id), text("Hijacked"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let edited = update_comment(State(state.clone()), caller(&bob), ValidPath(comment.id), text("Edited"))
            .await
            .unwrap();
        assert_eq!(edited.0.data.content, "Edited");

        let err = delete_comment(State(state.clone()), caller(&cat), ValidPath(comment.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        delete_comment(State(state.clone()), caller(&fx.owner), ValidPath(comment.id))
            .await
            .unwrap();
        let listed = list_comments(State(state.clone()), caller(&bob), ValidPath(cards[0].id))
            .await
            .unwrap();
        assert!(listed.0.data.is_empty());
        let err = get_comment(State(state), caller(&bob), ValidPath(comment.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_viewer_cannot_comment() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let vic = test_support::user(&mut conn, "Vic").await;
        test_support::member(&mut conn, &fx.workspace, &vic, Role::Viewer).await;
        let cards = fx.cards(&mut conn, fx.list.id, &["A"]).await;
        drop(conn);

        let err = create_comment(State(test_support::state(&pool)), caller(&vic), ValidPath(cards[0].id), text("Hi"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
