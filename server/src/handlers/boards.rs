// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use super::{ApiResult, AppError, CreatedResult, ValidJson, ValidPath, created, ok};
use crate::access;
use crate::activity::{self, ActivityEntry};
use crate::adapter::{self, Filter, FindOptions, Record, Table, Value};
use crate::auth::AuthUser;
use crate::state::AppState;
use anyhow::Context;
use axum::extract::State;
use chrono::Utc;
use common::{
    AddBoardMemberPayload, Board, BoardDetail, BoardList, BoardMember, CreateBoardPayload, Label,
    Role, UpdateBoardPayload, User, Workspace,
};
use tracing::{debug, info};

/// Handler for listing the boards of a workspace.
///
/// Workspace members see every live board; users invited to single boards
/// only see those.
pub async fn list_boards(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(workspace_id): ValidPath<i64>,
) -> ApiResult<Vec<Board>> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let _: Workspace =
        adapter::find_one(&mut conn, Table::Workspaces, &Filter::id(workspace_id).live())
            .await?
            .ok_or_else(|| AppError::not_found("Workspace not found."))?;

    let boards: Vec<Board> = if access::workspace_role(&mut conn, caller.id, workspace_id)
        .await?
        .is_some()
    {
        adapter::find_many(
            &mut conn,
            Table::Boards,
            &Filter::new().eq("workspace_id", workspace_id).live(),
            &FindOptions::ordered_by("created_at"),
        )
        .await?
    } else {
        let invited: Vec<Board> = adapter::fetch_raw(
            &mut conn,
            "SELECT b.* FROM boards b JOIN board_members bm ON bm.board_id = b.id \
             WHERE b.workspace_id = ? AND bm.user_id = ? AND b.deleted_at IS NULL \
             ORDER BY b.created_at ASC, b.id ASC",
            &[Value::Int(workspace_id), Value::Int(caller.id)],
        )
        .await?;
        if invited.is_empty() {
            return Err(AppError::forbidden(
                "You do not have access to this workspace.",
            ));
        }
        invited
    };

    info!("Retrieved {} boards of workspace {}", boards.len(), workspace_id);
    ok("Boards retrieved successfully.", boards)
}

pub async fn create_board(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidJson(payload): ValidJson<CreateBoardPayload>,
) -> CreatedResult<Board> {
    debug!("User {} creating board '{}'", caller.id, payload.name);
    let mut tx = state.begin_write().await?;
    let access = access::workspace_access(&mut tx, caller.id, payload.workspace_id).await?;
    access.require_write()?;

    let now = Utc::now();
    let board: Board = adapter::insert(
        &mut tx,
        Table::Boards,
        &Record::new()
            .set("workspace_id", payload.workspace_id)
            .set("name", payload.name.trim())
            .set("description", payload.description)
            .set("background_color", payload.background_color)
            .set("background_image", payload.background_image)
            .set("created_by", caller.id)
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &board,
            caller.id,
            "board_created",
            format!("Created board \"{}\"", board.name),
        )
        .after(&board),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Board created successfully with ID: {}", board.id);
    created("Board created successfully.", board)
}

/// Handler returning a board with its lists in display order and its labels.
pub async fn get_board(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(board_id): ValidPath<i64>,
) -> ApiResult<BoardDetail> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let access = access::board_access(&mut conn, caller.id, board_id).await?;

    let lists: Vec<BoardList> = adapter::find_many(
        &mut conn,
        Table::Lists,
        &Filter::new().eq("board_id", board_id).live(),
        &FindOptions::ordered_by("position"),
    )
    .await?;
    let labels: Vec<Label> = adapter::find_many(
        &mut conn,
        Table::Labels,
        &Filter::new().eq("board_id", board_id),
        &FindOptions::ordered_by("name"),
    )
    .await?;

    ok(
        "Board retrieved successfully.",
        BoardDetail {
            board: access.board,
            lists,
            labels,
        },
    )
}

pub async fn update_board(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(board_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<UpdateBoardPayload>,
) -> ApiResult<Board> {
    let mut tx = state.begin_write().await?;
    let access = access::board_access(&mut tx, caller.id, board_id).await?;
    access.require_write()?;

    let patch = Record::new()
        .set_some("name", payload.name.as_deref().map(str::trim))
        .set_some("description", payload.description)
        .set_some("background_color", payload.background_color)
        .set_some("background_image", payload.background_image);
    let updated: Board = adapter::update(&mut tx, Table::Boards, &Filter::id(board_id).live(), &patch)
        .await?
        .ok_or_else(|| AppError::not_found("Board not found."))?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &updated,
            caller.id,
            "board_updated",
            format!("Updated board \"{}\"", updated.name),
        )
        .before(&access.board)
        .after(&updated),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok("Board updated successfully.", updated)
}

pub async fn delete_board(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(board_id): ValidPath<i64>,
) -> ApiResult<()> {
    let mut tx = state.begin_write().await?;
    let access = access::board_access(&mut tx, caller.id, board_id).await?;
    access.require_workspace_admin()?;

    adapter::soft_delete(&mut tx, Table::Boards, &Filter::id(board_id)).await?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &access.board,
            caller.id,
            "board_deleted",
            format!("Deleted board \"{}\"", access.board.name),
        )
        .before(&access.board),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Board {} deleted by user {}", board_id, caller.id);
    ok("Board deleted successfully.", ())
}

/// Handler granting a single user access to one board.
pub async fn add_board_member(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(board_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<AddBoardMemberPayload>,
) -> CreatedResult<BoardMember> {
    let mut tx = state.begin_write().await?;
    let access = access::board_access(&mut tx, caller.id, board_id).await?;
    access.require_workspace_admin()?;

    let user: User = adapter::find_one(&mut tx, Table::Users, &Filter::id(payload.user_id).live())
        .await?
        .ok_or_else(|| AppError::not_found("User not found."))?;
    let existing: Option<BoardMember> = adapter::find_one(
        &mut tx,
        Table::BoardMembers,
        &Filter::new().eq("board_id", board_id).eq("user_id", user.id),
    )
    .await?;
    if existing.is_some() {
        return Err(AppError::conflict("User is already a member of this board."));
    }

    let role = payload.role.unwrap_or(Role::Member);
    let member: BoardMember = adapter::insert(
        &mut tx,
        Table::BoardMembers,
        &Record::new()
            .set("board_id", board_id)
            .set("user_id", user.id)
            .set("role", role)
            .set("added_by", caller.id)
            .set("added_at", Utc::now()),
    )
    .await?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &access.board,
            caller.id,
            "board_member_added",
            format!("Added {} to the board as {}", user.email, role.as_str()),
        )
        .after(&member),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    created("Board member added successfully.", member)
}

pub async fn remove_board_member(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath((board_id, user_id)): ValidPath<(i64, i64)>,
) -> ApiResult<()> {
    let mut tx = state.begin_write().await?;
    let access = access::board_access(&mut tx, caller.id, board_id).await?;
    access.require_workspace_admin()?;

    let member: BoardMember = adapter::find_one(
        &mut tx,
        Table::BoardMembers,
        &Filter::new().eq("board_id", board_id).eq("user_id", user_id),
    )
    .await?
    .ok_or_else(|| AppError::not_found("Board member not found."))?;
    adapter::delete(&mut tx, Table::BoardMembers, &Filter::id(member.id)).await?;
    activity::record(
        &mut tx,
        ActivityEntry::board(
            &access.board,
            caller.id,
            "board_member_removed",
            format!("Removed user {} from the board", user_id),
        )
        .before(&member),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok("Board member removed successfully.", ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;
    use crate::test_support::{self, Fixture, caller};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_get_board_orders_lists_by_position() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let third = test_support::list(&mut conn, fx.board.id, 3).await;
        let second = test_support::list(&mut conn, fx.board.id, 2).await;
        test_support::label(&mut conn, fx.board.id, "bug").await;
        drop(conn);

        let detail = get_board(State(test_support::state(&pool)), caller(&fx.owner), ValidPath(fx.board.id))
            .await
            .unwrap()
            .0
            .data;
        let ids: Vec<i64> = detail.lists.iter().map(|l| l.id).collect();
        assert_eq!(ids, [fx.list.id, second.id, third.id]);
        assert_eq!(detail.labels.len(), 1);
        assert_eq!(detail.board.id, fx.board.id);
    }

    #[tokio::test]
    async fn test_viewer_cannot_create_board() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let vic = test_support::user(&mut conn, "Vic").await;
        test_support::member(&mut conn, &fx.workspace, &vic, Role::Viewer).await;
        drop(conn);

        let err = create_board(
            State(test_support::state(&pool)),
            caller(&vic),
            ValidJson(CreateBoardPayload {
                workspace_id: fx.workspace.id,
                name: "Side project".to_string(),
                description: None,
                background_color: None,
                background_image: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_board_member_sees_only_their_board() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        test_support::board(&mut conn, &fx.workspace, &fx.owner).await;
        let guest = test_support::user(&mut conn, "Guest").await;
        drop(conn);
        let state = test_support::state(&pool);

        let err = list_boards(State(state.clone()), caller(&guest), ValidPath(fx.workspace.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        add_board_member(
            State(state.clone()),
            caller(&fx.owner),
            ValidPath(fx.board.id),
            ValidJson(AddBoardMemberPayload {
                user_id: guest.id,
                role: Some(Role::Viewer),
            }),
        )
        .await
        .unwrap();

        let boards = list_boards(State(state.clone()), caller(&guest), ValidPath(fx.workspace.id))
            .await
            .unwrap()
            .0
            .data;
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].id, fx.board.id);

        // Board members never administer the board.
        let err = delete_board(State(state.clone()), caller(&guest), ValidPath(fx.board.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        remove_board_member(State(state.clone()), caller(&fx.owner), ValidPath((fx.board.id, guest.id)))
            .await
            .unwrap();
        let err = get_board(State(state), caller(&guest), ValidPath(fx.board.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delete_board_hides_it() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        drop(conn);
        let state = test_support::state(&pool);

        delete_board(State(state.clone()), caller(&fx.owner), ValidPath(fx.board.id))
            .await
            .unwrap();
        let err = get_board(State(state.clone()), caller(&fx.owner), ValidPath(fx.board.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let boards = list_boards(State(state), caller(&fx.owner), ValidPath(fx.workspace.id))
            .await
            .unwrap();
        assert!(boards.0.data.is_empty());
    }
}
