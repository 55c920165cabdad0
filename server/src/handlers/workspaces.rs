// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use super::{ApiResult, AppError, CreatedResult, ValidJson, ValidPath, created, ok};
use crate::access;
use crate::activity::{self, ActivityEntry};
use crate::adapter::{self, Filter, Record, Table, Value};
use crate::auth::AuthUser;
use crate::colors;
use crate::state::AppState;
use anyhow::Context;
use axum::extract::State;
use chrono::Utc;
use common::{
    AddMemberPayload, CreateWorkspacePayload, MemberDetail, Role, UpdateMemberPayload,
    UpdateWorkspacePayload, User, Workspace, WorkspaceMember, WorkspaceWithRole,
};
use sqlx::SqliteConnection;
use tracing::{debug, info};

/// Handler for listing the workspaces the caller belongs to.
pub async fn list_workspaces(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Vec<WorkspaceWithRole>> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let workspaces: Vec<WorkspaceWithRole> = adapter::fetch_raw(
        &mut conn,
        "SELECT w.*, m.role AS role FROM workspaces w \
         JOIN workspace_members m ON m.workspace_id = w.id \
         WHERE m.user_id = ? AND w.deleted_at IS NULL \
         ORDER BY w.created_at ASC, w.id ASC",
        &[Value::Int(caller.id)],
    )
    .await?;
    info!("Retrieved {} workspaces for user {}", workspaces.len(), caller.id);
    ok("Workspaces retrieved successfully.", workspaces)
}

/// Handler for creating a workspace. The caller becomes its first admin.
pub async fn create_workspace(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidJson(payload): ValidJson<CreateWorkspacePayload>,
) -> CreatedResult<WorkspaceWithRole> {
    debug!("User {} creating workspace '{}'", caller.id, payload.name);
    let mut tx = state.begin_write().await?;

    let color = colors::color_or_next(
        &mut tx,
        payload.color,
        Table::Workspaces,
        &Filter::new().eq("created_by", caller.id),
    )
    .await?;
    let now = Utc::now();
    let workspace: Workspace = adapter::insert(
        &mut tx,
        Table::Workspaces,
        &Record::new()
            .set("name", payload.name.trim())
            .set("description", payload.description)
            .set("color", color)
            .set("visibility", payload.visibility.unwrap_or_default())
            .set("created_by", caller.id)
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await?;
    let _: WorkspaceMember = adapter::insert(
        &mut tx,
        Table::WorkspaceMembers,
        &Record::new()
            .set("workspace_id", workspace.id)
            .set("user_id", caller.id)
            .set("role", Role::Admin)
            .set("joined_at", now),
    )
    .await?;
    activity::record(
        &mut tx,
        ActivityEntry::workspace(
            workspace.id,
            caller.id,
            "workspace_created",
            format!("Created workspace \"{}\"", workspace.name),
        )
        .after(&workspace),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Workspace created successfully with ID: {}", workspace.id);
    created(
        "Workspace created successfully.",
        WorkspaceWithRole {
            workspace,
            role: Role::Admin,
        },
    )
}

pub async fn get_workspace(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(workspace_id): ValidPath<i64>,
) -> ApiResult<WorkspaceWithRole> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let access = access::workspace_access(&mut conn, caller.id, workspace_id).await?;
    ok(
        "Workspace retrieved successfully.",
        WorkspaceWithRole {
            workspace: access.workspace,
            role: access.role,
        },
    )
}

pub async fn update_workspace(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(workspace_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<UpdateWorkspacePayload>,
) -> ApiResult<Workspace> {
    let mut tx = state.begin_write().await?;
    let access = access::workspace_access(&mut tx, caller.id, workspace_id).await?;
    access.require_admin()?;

    let patch = Record::new()
        .set_some("name", payload.name.as_deref().map(str::trim))
        .set_some("description", payload.description)
        .set_some("color", payload.color)
        .set_some("visibility", payload.visibility);
    let updated: Workspace =
        adapter::update(&mut tx, Table::Workspaces, &Filter::id(workspace_id).live(), &patch)
            .await?
            .ok_or_else(|| AppError::not_found("Workspace not found."))?;
    activity::record(
        &mut tx,
        ActivityEntry::workspace(
            workspace_id,
            caller.id,
            "workspace_updated",
            format!("Updated workspace \"{}\"", updated.name),
        )
        .before(&access.workspace)
        .after(&updated),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Workspace {} updated by user {}", workspace_id, caller.id);
    ok("Workspace updated successfully.", updated)
}

pub async fn delete_workspace(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(workspace_id): ValidPath<i64>,
) -> ApiResult<()> {
    let mut tx = state.begin_write().await?;
    let access = access::workspace_access(&mut tx, caller.id, workspace_id).await?;
    access.require_admin()?;

    adapter::soft_delete(&mut tx, Table::Workspaces, &Filter::id(workspace_id)).await?;
    activity::record(
        &mut tx,
        ActivityEntry::workspace(
            workspace_id,
            caller.id,
            "workspace_deleted",
            format!("Deleted workspace \"{}\"", access.workspace.name),
        )
        .before(&access.workspace),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Workspace {} deleted by user {}", workspace_id, caller.id);
    ok("Workspace deleted successfully.", ())
}

pub async fn list_members(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(workspace_id): ValidPath<i64>,
) -> ApiResult<Vec<MemberDetail>> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    access::workspace_access(&mut conn, caller.id, workspace_id).await?;
    let members: Vec<MemberDetail> = adapter::fetch_raw(
        &mut conn,
        "SELECT u.id AS user_id, u.name, u.email, m.role, m.joined_at \
         FROM workspace_members m JOIN users u ON u.id = m.user_id \
         WHERE m.workspace_id = ? ORDER BY m.joined_at ASC, m.id ASC",
        &[Value::Int(workspace_id)],
    )
    .await?;
    ok("Members retrieved successfully.", members)
}

async fn admin_count(conn: &mut SqliteConnection, workspace_id: i64) -> anyhow::Result<i64> {
    adapter::count(
        conn,
        Table::WorkspaceMembers,
        &Filter::new()
            .eq("workspace_id", workspace_id)
            .eq("role", Role::Admin),
    )
    .await
}

async fn find_membership(
    conn: &mut SqliteConnection,
    workspace_id: i64,
    user_id: i64,
) -> Result<WorkspaceMember, AppError> {
    adapter::find_one(
        conn,
        Table::WorkspaceMembers,
        &Filter::new()
            .eq("workspace_id", workspace_id)
            .eq("user_id", user_id),
    )
    .await?
    .ok_or_else(|| AppError::not_found("Member not found."))
}

pub async fn add_member(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(workspace_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<AddMemberPayload>,
) -> CreatedResult<WorkspaceMember> {
    let mut tx = state.begin_write().await?;
    let access = access::workspace_access(&mut tx, caller.id, workspace_id).await?;
    access.require_admin()?;

    let lookup = match (payload.user_id, payload.email.as_deref()) {
        (Some(user_id), _) => Filter::id(user_id).live(),
        (None, Some(email)) => Filter::new().eq("email", email.trim().to_lowercase()).live(),
        (None, None) => return Err(AppError::bad_request("Either user_id or email is required.")),
    };
    let user: User = adapter::find_one(&mut tx, Table::Users, &lookup)
        .await?
        .ok_or_else(|| AppError::not_found("User not found."))?;

    if access::workspace_role(&mut tx, user.id, workspace_id).await?.is_some() {
        return Err(AppError::conflict(
            "User is already a member of this workspace.",
        ));
    }

    let role = payload.role.unwrap_or(Role::Member);
    let member: WorkspaceMember = adapter::insert(
        &mut tx,
        Table::WorkspaceMembers,
        &Record::new()
            .set("workspace_id", workspace_id)
            .set("user_id", user.id)
            .set("role", role)
            .set("invited_by", caller.id)
            .set("joined_at", Utc::now()),
    )
    .await?;
    activity::record(
        &mut tx,
        ActivityEntry::workspace(
            workspace_id,
            caller.id,
            "member_added",
            format!("Added {} as {}", user.email, role.as_str()),
        )
        .after(&member),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("User {} added to workspace {}", user.id, workspace_id);
    created("Member added successfully.", member)
}

pub async fn update_member(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath((workspace_id, user_id)): ValidPath<(i64, i64)>,
    ValidJson(payload): ValidJson<UpdateMemberPayload>,
) -> ApiResult<WorkspaceMember> {
    let mut tx = state.begin_write().await?;
    let access = access::workspace_access(&mut tx, caller.id, workspace_id).await?;
    access.require_admin()?;

    let member = find_membership(&mut tx, workspace_id, user_id).await?;
    if member.role.is_admin()
        && !payload.role.is_admin()
        && admin_count(&mut tx, workspace_id).await? <= 1
    {
        return Err(AppError::bad_request(
            "A workspace must keep at least one admin.",
        ));
    }

    let updated: WorkspaceMember = adapter::update(
        &mut tx,
        Table::WorkspaceMembers,
        &Filter::id(member.id),
        &Record::new().set("role", payload.role),
    )
    .await?
    .ok_or_else(|| AppError::not_found("Member not found."))?;
    activity::record(
        &mut tx,
        ActivityEntry::workspace(
            workspace_id,
            caller.id,
            "member_role_changed",
            format!(
                "Changed role of user {} from {} to {}",
                user_id,
                member.role.as_str(),
                updated.role.as_str()
            ),
        )
        .before(&member)
        .after(&updated),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok("Member updated successfully.", updated)
}

/// Admins may remove anyone; any member may remove themselves. The last
/// admin can never be removed.
pub async fn remove_member(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath((workspace_id, user_id)): ValidPath<(i64, i64)>,
) -> ApiResult<()> {
    let mut tx = state.begin_write().await?;
    let access = access::workspace_access(&mut tx, caller.id, workspace_id).await?;
    if user_id != caller.id {
        access.require_admin()?;
    }

    let member = find_membership(&mut tx, workspace_id, user_id).await?;
    if member.role.is_admin() && admin_count(&mut tx, workspace_id).await? <= 1 {
        return Err(AppError::bad_request(
            "Cannot remove the last admin of the workspace.",
        ));
    }

    adapter::delete(&mut tx, Table::WorkspaceMembers, &Filter::id(member.id)).await?;
    activity::record(
        &mut tx,
        ActivityEntry::workspace(
            workspace_id,
            caller.id,
            "member_removed",
            format!("Removed user {} from the workspace", user_id),
        )
        .before(&member),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("User {} removed from workspace {}", user_id, workspace_id);
    ok("Member removed successfully.", ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;
    use crate::test_support::{self, caller};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_create_workspace_makes_creator_admin() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let ana = test_support::user(&mut conn, "Ana").await;
        drop(conn);
        let state = test_support::state(&pool);

        let (status, body) = create_workspace(
            State(state.clone()),
            caller(&ana),
            ValidJson(CreateWorkspacePayload {
                name: "  Team  ".to_string(),
                description: None,
                color: None,
                visibility: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        let created = body.0.data;
        assert_eq!(created.workspace.name, "Team");
        assert_eq!(created.role, Role::Admin);
        assert_eq!(created.workspace.color, colors::PALETTE[0]);

        let listed = list_workspaces(State(state), caller(&ana)).await.unwrap();
        assert_eq!(listed.0.data.len(), 1);
        assert_eq!(listed.0.data[0].workspace.id, created.workspace.id);
    }

    #[tokio::test]
    async fn test_member_cannot_update_workspace() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = test_support::user(&mut conn, "Owner").await;
        let bob = test_support::user(&mut conn, "Bob").await;
        let ws = test_support::workspace(&mut conn, &owner).await;
        test_support::member(&mut conn, &ws, &bob, Role::Member).await;
        drop(conn);

        let err = update_workspace(
            State(test_support::state(&pool)),
            caller(&bob),
            ValidPath(ws.id),
            ValidJson(UpdateWorkspacePayload {
                name: Some("Renamed".to_string()),
                description: None,
                color: None,
                visibility: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_add_member_by_email_then_conflict() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = test_support::user(&mut conn, "Owner").await;
        test_support::user(&mut conn, "Bob").await;
        let ws = test_support::workspace(&mut conn, &owner).await;
        drop(conn);
        let state = test_support::state(&pool);
        let payload = || {
            ValidJson(AddMemberPayload {
                user_id: None,
                email: Some("BOB@example.com".to_string()),
                role: None,
            })
        };

        let (_, body) = add_member(State(state.clone()), caller(&owner), ValidPath(ws.id), payload())
            .await
            .unwrap();
        assert_eq!(body.0.data.role, Role::Member);
        assert_eq!(body.0.data.invited_by, Some(owner.id));

        let err = add_member(State(state.clone()), caller(&owner), ValidPath(ws.id), payload())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let members = list_members(State(state), caller(&owner), ValidPath(ws.id))
            .await
            .unwrap();
        assert_eq!(members.0.data.len(), 2);
    }

    #[tokio::test]
    async fn test_add_unknown_user_is_not_found() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = test_support::user(&mut conn, "Owner").await;
        let ws = test_support::workspace(&mut conn, &owner).await;
        drop(conn);

        let err = add_member(
            State(test_support::state(&pool)),
            caller(&owner),
            ValidPath(ws.id),
            ValidJson(AddMemberPayload {
                user_id: Some(999),
                email: None,
                role: Some(Role::Viewer),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_last_admin_is_protected() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = test_support::user(&mut conn, "Owner").await;
        let ws = test_support::workspace(&mut conn, &owner).await;
        drop(conn);
        let state = test_support::state(&pool);

        let err = remove_member(State(state.clone()), caller(&owner), ValidPath((ws.id, owner.id)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = update_member(
            State(state),
            caller(&owner),
            ValidPath((ws.id, owner.id)),
            ValidJson(UpdateMemberPayload { role: Role::Member }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_member_can_leave_and_deleted_workspace_disappears() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = test_support::user(&mut conn, "Owner").await;
        let bob = test_support::user(&mut conn, "Bob").await;
        let ws = test_support::workspace(&mut conn, &owner).await;
        test_support::member(&mut conn, &ws, &bob, Role::Viewer).await;
        drop(conn);
        let state = test_support::state(&pool);

        remove_member(State(state.clone()), caller(&bob), ValidPath((ws.id, bob.id)))
            .await
            .unwrap();
        let err = get_workspace(State(state.clone()), caller(&bob), ValidPath(ws.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        delete_workspace(State(state.clone()), caller(&owner), ValidPath(ws.id))
            .await
            .unwrap();
        let err = get_workspace(State(state.clone()), caller(&owner), ValidPath(ws.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let listed = list_workspaces(State(state), caller(&owner)).await.unwrap();
        assert!(listed.0.data.is_empty());
    }
}
