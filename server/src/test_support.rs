// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Row seeding helpers shared by the unit tests.
use crate::adapter::{self, Record, Table};
use crate::auth::{AuthUser, TokenService};
use crate::state::AppState;
use chrono::{Duration, Utc};
use common::{Board, BoardList, Card, Label, Role, User, Workspace, WorkspaceMember};
use sqlx::{SqliteConnection, SqlitePool};

/// Application state over `pool`. The in-memory pool holds a single
/// connection, so release any seeding connection before calling a handler.
pub fn state(pool: &SqlitePool) -> AppState {
    AppState::new(
        pool.clone(),
        TokenService::new(b"test-secret", Duration::hours(1)),
    )
}

/// An authenticated caller as the bearer extractor would produce it.
pub fn caller(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        email: user.email.clone(),
        token: format!("token-of-{}", user.id),
        expires_at: (Utc::now() + Duration::hours(1)).timestamp(),
    }
}

pub async fn user(conn: &mut SqliteConnection, name: &str) -> User {
    let now = Utc::now();
    let email = format!("{}@example.com", name.to_lowercase());
    adapter::insert(
        conn,
        Table::Users,
        &Record::new()
            .set("name", name)
            .set("email", email)
            .set("password_hash", "not-a-real-hash")
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await
    .unwrap()
}

pub async fn workspace(conn: &mut SqliteConnection, owner: &User) -> Workspace {
    let now = Utc::now();
    let workspace: Workspace = adapter::insert(
        conn,
        Table::Workspaces,
        &Record::new()
            .set("name", "Acme")
            .set("color", "#1f77b4")
            .set("visibility", "private")
            .set("created_by", owner.id)
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await
    .unwrap();
    member(conn, &workspace, owner, Role::Admin).await;
    workspace
}

pub async fn member(
    conn: &mut SqliteConnection,
    workspace: &Workspace,
    user: &User,
    role: Role,
) -> WorkspaceMember {
    adapter::insert(
        conn,
        Table::WorkspaceMembers,
        &Record::new()
            .set("workspace_id", workspace.id)
            .set("user_id", user.id)
            .set("role", role)
            .set("joined_at", Utc::now()),
    )
    .await
    .unwrap()
}

pub async fn board(conn: &mut SqliteConnection, workspace: &Workspace, owner: &User) -> Board {
    let now = Utc::now();
    adapter::insert(
        conn,
        Table::Boards,
        &Record::new()
            .set("workspace_id", workspace.id)
            .set("name", "Roadmap")
            .set("created_by", owner.id)
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await
    .unwrap()
}

pub async fn list(conn: &mut SqliteConnection, board_id: i64, position: i64) -> BoardList {
    let now = Utc::now();
    adapter::insert(
        conn,
        Table::Lists,
        &Record::new()
            .set("board_id", board_id)
            .set("name", format!("List {position}"))
            .set("position", position)
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await
    .unwrap()
}

pub async fn card(
    conn: &mut SqliteConnection,
    list_id: i64,
    position: i64,
    title: &str,
    created_by: i64,
) -> Card {
    let now = Utc::now();
    adapter::insert(
        conn,
        Table::Cards,
        &Record::new()
            .set("list_id", list_id)
            .set("title", title)
            .set("position", position)
            .set("priority", "media")
            .set("created_by", created_by)
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await
    .unwrap()
}

pub async fn label(conn: &mut SqliteConnection, board_id: i64, name: &str) -> Label {
    adapter::insert(
        conn,
        Table::Labels,
        &Record::new()
            .set("board_id", board_id)
            .set("name", name)
            .set("color", "#d62728")
            .set("created_at", Utc::now()),
    )
    .await
    .unwrap()
}

/// An owner who administers a workspace holding one board with one list.
pub struct Fixture {
    pub owner: User,
    pub workspace: Workspace,
    pub board: Board,
    pub list: BoardList,
}

impl Fixture {
    pub async fn new(conn: &mut SqliteConnection) -> Self {
        let owner = user(conn, "Owner").await;
        let workspace = workspace(conn, &owner).await;
        let board = board(conn, &workspace, &owner).await;
        let list = list(conn, board.id, 1).await;
        Self {
            owner,
            workspace,
            board,
            list,
        }
    }

    /// Seeds cards titled by `titles` at positions 1..=n of `list_id`.
    pub async fn cards(&self, conn: &mut SqliteConnection, list_id: i64, titles: &[&str]) -> Vec<Card> {
        let mut cards = Vec::with_capacity(titles.len());
        for (i, title) in titles.iter().enumerate() {
            cards.push(card(conn, list_id, i as i64 + 1, title, self.owner.id).await);
        }
        cards
    }
}
