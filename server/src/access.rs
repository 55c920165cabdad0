// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Authorization by walking the containment chain
//! card -> list -> board -> workspace -> membership.
//!
//! A user reaches a board through a workspace membership of the board's
//! workspace or, failing that, through a direct board membership. Soft-deleted
//! links anywhere in the chain make the resource unreachable.
//!
//! Handlers run these checks on the same connection (usually the same
//! transaction) as the write that follows.
use crate::adapter::{self, Filter, Table};
use crate::handlers::AppError;
use anyhow::Result;
use common::{Board, BoardList, BoardMember, Card, Role, Workspace, WorkspaceMember};
use sqlx::SqliteConnection;

/// The caller's role in a workspace, if they are a member of it.
pub async fn workspace_role(
    conn: &mut SqliteConnection,
    user_id: i64,
    workspace_id: i64,
) -> Result<Option<Role>> {
    let membership: Option<WorkspaceMember> = adapter::find_one(
        conn,
        Table::WorkspaceMembers,
        &Filter::new()
            .eq("workspace_id", workspace_id)
            .eq("user_id", user_id),
    )
    .await?;
    Ok(membership.map(|m| m.role))
}

async fn board_member_role(
    conn: &mut SqliteConnection,
    user_id: i64,
    board_id: i64,
) -> Result<Option<Role>> {
    let membership: Option<BoardMember> = adapter::find_one(
        conn,
        Table::BoardMembers,
        &Filter::new().eq("board_id", board_id).eq("user_id", user_id),
    )
    .await?;
    Ok(membership.map(|m| m.role))
}

/// Workspace role first, board membership as a fallback.
async fn effective_board_role(
    conn: &mut SqliteConnection,
    user_id: i64,
    board: &Board,
) -> Result<(Option<Role>, Option<Role>)> {
    let workspace_role = workspace_role(conn, user_id, board.workspace_id).await?;
    if workspace_role.is_some() {
        return Ok((workspace_role, workspace_role));
    }
    let board_role = board_member_role(conn, user_id, board.id).await?;
    Ok((board_role, None))
}

async fn live_board(conn: &mut SqliteConnection, board_id: i64) -> Result<Option<Board>> {
    let board: Option<Board> =
        adapter::find_one(conn, Table::Boards, &Filter::id(board_id).live()).await?;
    let Some(board) = board else {
        return Ok(None);
    };
    // A board inside a deleted workspace is gone as well.
    let workspace: Option<Workspace> = adapter::find_one(
        conn,
        Table::Workspaces,
        &Filter::id(board.workspace_id).live(),
    )
    .await?;
    Ok(workspace.map(|_| board))
}

async fn live_list(conn: &mut SqliteConnection, list_id: i64) -> Result<Option<BoardList>> {
    adapter::find_one(conn, Table::Lists, &Filter::id(list_id).live()).await
}

async fn live_card(conn: &mut SqliteConnection, card_id: i64) -> Result<Option<Card>> {
    adapter::find_one(conn, Table::Cards, &Filter::id(card_id).live()).await
}

/// Visibility predicates for an arbitrary user. Handlers acting for the
/// caller use the `*_access` guards below, which also carry the role; these
/// answer the yes/no question for someone else, such as a would-be assignee.
pub async fn can_access_board(
    conn: &mut SqliteConnection,
    user_id: i64,
    board_id: i64,
) -> Result<bool> {
    match live_board(conn, board_id).await? {
        Some(board) => Ok(effective_board_role(conn, user_id, &board).await?.0.is_some()),
        None => Ok(false),
    }
}

pub async fn can_access_list(
    conn: &mut SqliteConnection,
    user_id: i64,
    list_id: i64,
) -> Result<bool> {
    match live_list(conn, list_id).await? {
        Some(list) => can_access_board(conn, user_id, list.board_id).await,
        None => Ok(false),
    }
}

pub async fn can_access_card(
    conn: &mut SqliteConnection,
    user_id: i64,
    card_id: i64,
) -> Result<bool> {
    match live_card(conn, card_id).await? {
        Some(card) => can_access_list(conn, user_id, card.list_id).await,
        None => Ok(false),
    }
}

/// A live workspace together with the caller's membership role.
#[derive(Debug, Clone)]
pub struct WorkspaceAccess {
    pub workspace: Workspace,
    pub role: Role,
}

impl WorkspaceAccess {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "Only workspace admins can perform this action.",
            ))
        }
    }

    pub fn require_write(&self) -> Result<(), AppError> {
        if self.role.can_write() {
            Ok(())
        } else {
            Err(AppError::forbidden("Viewers cannot modify this workspace."))
        }
    }
}

/// A live board together with how the caller reaches it.
#[derive(Debug, Clone)]
pub struct BoardAccess {
    pub board: Board,
    pub role: Role,
    /// Set only when access comes from a workspace membership.
    pub workspace_role: Option<Role>,
}

impl BoardAccess {
    pub fn require_write(&self) -> Result<(), AppError> {
        if self.role.can_write() {
            Ok(())
        } else {
            Err(AppError::forbidden("Viewers cannot modify this board."))
        }
    }

    /// Board-level administration is reserved to admins of the workspace;
    /// a direct board membership never grants it.
    pub fn require_workspace_admin(&self) -> Result<(), AppError> {
        if self.workspace_role.is_some_and(|r| r.is_admin()) {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "Only workspace admins can perform this action.",
            ))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListAccess {
    pub list: BoardList,
    pub board: BoardAccess,
}

#[derive(Debug, Clone)]
pub struct CardAccess {
    pub card: Card,
    pub list: BoardList,
    pub board: BoardAccess,
}

/// Resolves a workspace for `user_id`: 404 if it is missing or deleted,
/// 403 if the caller is not a member.
pub async fn workspace_access(
    conn: &mut SqliteConnection,
    user_id: i64,
    workspace_id: i64,
) -> Result<WorkspaceAccess, AppError> {
    let workspace: Workspace =
        adapter::find_one(conn, Table::Workspaces, &Filter::id(workspace_id).live())
            .await?
            .ok_or_else(|| AppError::not_found("Workspace not found."))?;
    let role = workspace_role(conn, user_id, workspace_id)
        .await?
        .ok_or_else(|| AppError::forbidden("You do not have access to this workspace."))?;
    Ok(WorkspaceAccess { workspace, role })
}

pub async fn board_access(
    conn: &mut SqliteConnection,
    user_id: i64,
    board_id: i64,
) -> Result<BoardAccess, AppError> {
    let board = live_board(conn, board_id)
        .await?
        .ok_or_else(|| AppError::not_found("Board not found."))?;
    let (role, workspace_role) = effective_board_role(conn, user_id, &board).await?;
    let role = role.ok_or_else(|| AppError::forbidden("You do not have access to this board."))?;
    Ok(BoardAccess {
        board,
        role,
        workspace_role,
    })
}

pub async fn list_access(
    conn: &mut SqliteConnection,
    user_id: i64,
    list_id: i64,
) -> Result<ListAccess, AppError> {
    let list = live_list(conn, list_id)
        .await?
        .ok_or_else(|| AppError::not_found("List not found."))?;
    let board = board_access(conn, user_id, list.board_id)
        .await
        .map_err(|e| relabel_not_found(e, "List not found."))?;
    Ok(ListAccess { list, board })
}

pub async fn card_access(
    conn: &mut SqliteConnection,
    user_id: i64,
    card_id: i64,
) -> Result<CardAccess, AppError> {
    let card = live_card(conn, card_id)
        .await?
        .ok_or_else(|| AppError::not_found("Card not found."))?;
    let ListAccess { list, board } = list_access(conn, user_id, card.list_id)
        .await
        .map_err(|e| relabel_not_found(e, "Card not found."))?;
    Ok(CardAccess { card, list, board })
}

// A missing ancestor means the child itself is gone from the caller's view.
fn relabel_not_found(err: AppError, message: &str) -> AppError {
    if err.status() == axum::http::StatusCode::NOT_FOUND {
        AppError::not_found(message)
    } else {
        err
    }
}
