// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a user inside a workspace or on a single board.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }

    /// Viewers may read everything they can reach but never modify it.
    pub fn can_write(&self) -> bool {
        matches!(self, Role::Admin | Role::Member)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Card priority. The wire values are kept from the original Portuguese UI.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
pub enum Priority {
    #[serde(rename = "baixa")]
    #[sqlx(rename = "baixa")]
    Low,
    #[default]
    #[serde(rename = "media")]
    #[sqlx(rename = "media")]
    Medium,
    #[serde(rename = "alta")]
    #[sqlx(rename = "alta")]
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "baixa",
            Priority::Medium => "media",
            Priority::High => "alta",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }
}

/// A registered account. The password hash never leaves the server.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// The public part of a user, as embedded in member and assignee listings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub visibility: Visibility,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A workspace as seen by one of its members.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct WorkspaceWithRole {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub workspace: Workspace,
    pub role: Role,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct WorkspaceMember {
    pub id: i64,
    pub workspace_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub invited_by: Option<i64>,
    pub joined_at: DateTime<Utc>,
}

/// Membership row joined with the member's user record.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct MemberDetail {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Board {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub background_color: Option<String>,
    pub background_image: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Direct access to one board, granted outside of workspace membership.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct BoardMember {
    pub id: i64,
    pub board_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub added_by: Option<i64>,
    pub added_at: DateTime<Utc>,
}

/// A column of a board. Named `BoardList` to stay clear of `std` collections.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct BoardList {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub position: i64,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Card {
    pub id: i64,
    pub list_id: i64,
    pub title: String,
    pub description: Option<String>,
    // 1-based rank inside the list. Soft deletes may leave gaps.
    pub position: i64,
    pub priority: Priority,
    pub category: Option<String>,
    pub parent_card_id: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct CardAssignee {
    pub id: i64,
    pub card_id: i64,
    pub user_id: i64,
    pub assigned_by: Option<i64>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Label {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub color: String,
    pub bg_color: Option<String>,
    pub logo_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct CardLabel {
    pub id: i64,
    pub card_id: i64,
    pub label_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub card_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// One entry of the append-only audit log.
///
/// `old_value` and `new_value` hold JSON snapshots of the affected row, as text.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Activity {
    pub id: i64,
    pub workspace_id: Option<i64>,
    pub board_id: Option<i64>,
    pub card_id: Option<i64>,
    pub user_id: i64,
    pub action_type: String,
    pub description: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Returned by register and login.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BoardDetail {
    #[serde(flatten)]
    pub board: Board,
    pub lists: Vec<BoardList>,
    pub labels: Vec<Label>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CardDetail {
    #[serde(flatten)]
    pub card: Card,
    pub assignees: Vec<UserSummary>,
    pub labels: Vec<Label>,
    pub subtasks: Vec<Card>,
}
