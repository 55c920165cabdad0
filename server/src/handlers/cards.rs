// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use super::{ApiResult, AppError, CreatedResult, ValidJson, ValidPath, ValidQuery, created, ok};
use crate::access::{self, CardAccess};
use crate::activity::{self, ActivityEntry};
use crate::adapter::{self, Filter, FindOptions, Record, Table, Value};
use crate::auth::AuthUser;
use crate::pagination::{PaginationMeta, PaginationParams};
use crate::positions::{self, CARDS_IN_LIST};
use crate::state::AppState;
use anyhow::Context;
use axum::extract::State;
use chrono::Utc;
use common::{
    AssignCardPayload, AttachLabelPayload, BlockCardPayload, BoardList, Card, CardDetail,
    CardLabel, CreateCardPayload, Label, MoveCardPayload, UpdateCardPayload, UserSummary,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct CardPage {
    pub cards: Vec<Card>,
    pub pagination: PaginationMeta,
}

/// Collects assignees, labels and live subtasks of a card.
async fn card_detail(conn: &mut SqliteConnection, card: Card) -> anyhow::Result<CardDetail> {
    let assignees: Vec<UserSummary> = adapter::fetch_raw(
        conn,
        "SELECT u.id, u.name, u.email, u.avatar_url FROM card_assignees ca \
         JOIN users u ON u.id = ca.user_id \
         WHERE ca.card_id = ? ORDER BY ca.assigned_at ASC, ca.id ASC",
        &[Value::Int(card.id)],
    )
    .await?;
    let labels: Vec<Label> = adapter::fetch_raw(
        conn,
        "SELECT l.* FROM card_labels cl JOIN labels l ON l.id = cl.label_id \
         WHERE cl.card_id = ? ORDER BY l.name ASC, l.id ASC",
        &[Value::Int(card.id)],
    )
    .await?;
    let subtasks: Vec<Card> = adapter::find_many(
        conn,
        Table::Cards,
        &Filter::new().eq("parent_card_id", card.id).live(),
        &FindOptions::ordered_by("created_at"),
    )
    .await?;
    Ok(CardDetail {
        card,
        assignees,
        labels,
        subtasks,
    })
}

/// A parent must be a live card of the same board, and following parents
/// upwards from it must never lead back to `card_id`.
async fn check_parent(
    conn: &mut SqliteConnection,
    board_id: i64,
    card_id: Option<i64>,
    parent_id: i64,
) -> Result<(), AppError> {
    if card_id == Some(parent_id) {
        return Err(AppError::bad_request("A card cannot be its own parent."));
    }
    let parent: Card = adapter::find_one(conn, Table::Cards, &Filter::id(parent_id).live())
        .await?
        .ok_or_else(|| AppError::bad_request("Parent card not found."))?;
    let parent_list: Option<BoardList> =
        adapter::find_one(conn, Table::Lists, &Filter::id(parent.list_id).live()).await?;
    if parent_list.map(|l| l.board_id) != Some(board_id) {
        return Err(AppError::bad_request(
            "Parent card must belong to the same board.",
        ));
    }

    let Some(card_id) = card_id else {
        return Ok(());
    };
    let mut seen = HashSet::new();
    let mut ancestor = parent.parent_card_id;
    while let Some(id) = ancestor {
        if id == card_id {
            return Err(AppError::bad_request(
                "Parent card would create a cycle.",
            ));
        }
        if !seen.insert(id) {
            warn!("Existing parent cycle detected around card {}", id);
            break;
        }
        let row: Option<Card> = adapter::find_one(conn, Table::Cards, &Filter::id(id)).await?;
        ancestor = row.and_then(|c| c.parent_card_id);
    }
    Ok(())
}

/// Handler for one page of a list's cards, in position order.
pub async fn list_cards(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(list_id): ValidPath<i64>,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> ApiResult<CardPage> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    access::list_access(&mut conn, caller.id, list_id).await?;

    let filter = Filter::new().eq("list_id", list_id).live();
    let total = adapter::count(&mut conn, Table::Cards, &filter).await?;
    let cards: Vec<Card> = adapter::find_many(
        &mut conn,
        Table::Cards,
        &filter,
        &FindOptions::ordered_by("position")
            .limit(params.limit())
            .offset(params.offset()),
    )
    .await?;

    debug!("Page {} of list {}: {} of {} cards", params.page(), list_id, cards.len(), total);
    ok(
        "Cards retrieved successfully.",
        CardPage {
            cards,
            pagination: PaginationMeta::new(&params, total),
        },
    )
}

/// Handler for appending a card at the end of a list.
pub async fn create_card(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidJson(payload): ValidJson<CreateCardPayload>,
) -> CreatedResult<Card> {
    let mut tx = state.begin_write().await?;
    let access = access::list_access(&mut tx, caller.id, payload.list_id).await?;
    access.board.require_write()?;
    if let Some(parent_id) = payload.parent_card_id {
        check_parent(&mut tx, access.list.board_id, None, parent_id).await?;
    }

    let position = positions::next_position(&mut tx, CARDS_IN_LIST, payload.list_id).await?;
    let now = Utc::now();
    let card: Card = adapter::insert(
        &mut tx,
        Table::Cards,
        &Record::new()
            .set("list_id", payload.list_id)
            .set("title", payload.title.trim())
            .set("description", payload.description)
            .set("position", position)
            .set("priority", payload.priority.unwrap_or_default())
            .set("category", payload.category)
            .set("parent_card_id", payload.parent_card_id)
            .set("due_date", payload.due_date)
            .set("start_date", payload.start_date)
            .set("estimated_hours", payload.estimated_hours)
            .set("created_by", caller.id)
            .set("created_at", now)
            .set("updated_at", now),
    )
    .await?;
    activity::record(
        &mut tx,
        ActivityEntry::card(
            &access.board.board,
            card.id,
            caller.id,
            "card_created",
            format!("Created card \"{}\" in list \"{}\"", card.title, access.list.name),
        )
        .after(&card),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Card {} created at position {} of list {}", card.id, card.position, card.list_id);
    created("Card created successfully.", card)
}

pub async fn get_card(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(card_id): ValidPath<i64>,
) -> ApiResult<CardDetail> {
    let mut conn = state.pool.acquire().await.context("Failed to acquire connection")?;
    let access = access::card_access(&mut conn, caller.id, card_id).await?;
    let detail = card_detail(&mut conn, access.card).await?;
    ok("Card retrieved successfully.", detail)
}

pub async fn update_card(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(card_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<UpdateCardPayload>,
) -> ApiResult<Card> {
    let mut tx = state.begin_write().await?;
    let CardAccess { card, board, .. } = access::card_access(&mut tx, caller.id, card_id).await?;
    board.require_write()?;

    if let Some(Some(parent_id)) = payload.parent_card_id {
        check_parent(&mut tx, board.board.id, Some(card_id), parent_id).await?;
    }
    // Dates not sent keep their stored value; the pair must stay ordered.
    let start = payload.start_date.unwrap_or(card.start_date);
    let due = payload.due_date.unwrap_or(card.due_date);
    if let (Some(start), Some(due)) = (start, due) {
        if due < start {
            return Err(AppError::bad_request("due_date cannot be before start_date"));
        }
    }

    let patch = Record::new()
        .set_some("title", payload.title.as_deref().map(str::trim))
        .set_some("description", payload.description)
        .set_some("priority", payload.priority)
        .set_some("category", payload.category)
        .set_some("parent_card_id", payload.parent_card_id)
        .set_some("due_date", payload.due_date)
        .set_some("start_date", payload.start_date)
        .set_some("estimated_hours", payload.estimated_hours)
        .set_some("actual_hours", payload.actual_hours);
    let updated: Card = adapter::update(&mut tx, Table::Cards, &Filter::id(card_id).live(), &patch)
        .await?
        .ok_or_else(|| AppError::not_found("Card not found."))?;
    activity::record(
        &mut tx,
        ActivityEntry::card(
            &board.board,
            card_id,
            caller.id,
            "card_updated",
            format!("Updated card \"{}\"", updated.title),
        )
        .before(&card)
        .after(&updated),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok("Card updated successfully.", updated)
}

/// Handler for moving a card inside its list or to another list of the same
/// board. Siblings are renumbered in the same transaction.
pub async fn move_card(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(card_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<MoveCardPayload>,
) -> ApiResult<Card> {
    let mut tx = state.begin_write().await?;
    let source = access::card_access(&mut tx, caller.id, card_id).await?;
    source.board.require_write()?;
    let target = access::list_access(&mut tx, caller.id, payload.new_list_id).await?;
    target.board.require_write()?;
    if target.list.board_id != source.list.board_id {
        return Err(AppError::bad_request(
            "Cards can only move between lists of the same board.",
        ));
    }

    let position = positions::move_across(
        &mut tx,
        CARDS_IN_LIST,
        card_id,
        source.list.id,
        source.card.position,
        target.list.id,
        payload.new_position,
    )
    .await?;
    let moved: Card = adapter::find_one(&mut tx, Table::Cards, &Filter::id(card_id))
        .await?
        .ok_or_else(|| AppError::not_found("Card not found."))?;

    let description = if source.list.id == target.list.id {
        format!(
            "Moved card \"{}\" from position {} to {}",
            moved.title, source.card.position, position
        )
    } else {
        format!(
            "Moved card \"{}\" from \"{}\" to \"{}\" at position {}",
            moved.title, source.list.name, target.list.name, position
        )
    };
    activity::record(
        &mut tx,
        ActivityEntry::card(&source.board.board, card_id, caller.id, "card_moved", description)
            .before(&source.card)
            .after(&moved),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Card {} moved to list {} position {}", card_id, moved.list_id, moved.position);
    ok("Card moved successfully.", moved)
}

/// Handler replacing the assignees of a card. Every assignee must be able to
/// reach the card's board.
pub async fn assign_card(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(card_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<AssignCardPayload>,
) -> ApiResult<CardDetail> {
    let mut tx = state.begin_write().await?;
    let access = access::card_access(&mut tx, caller.id, card_id).await?;
    access.board.require_write()?;

    let mut user_ids = payload.user_ids;
    user_ids.sort_unstable();
    user_ids.dedup();
    for user_id in &user_ids {
        if !access::can_access_card(&mut tx, *user_id, card_id).await? {
            return Err(AppError::bad_request(&format!(
                "User {user_id} cannot access this board."
            )));
        }
    }

    adapter::delete(
        &mut tx,
        Table::CardAssignees,
        &Filter::new().eq("card_id", card_id),
    )
    .await?;
    let now = Utc::now();
    for user_id in &user_ids {
        let _: common::CardAssignee = adapter::insert(
            &mut tx,
            Table::CardAssignees,
            &Record::new()
                .set("card_id", card_id)
                .set("user_id", *user_id)
                .set("assigned_by", caller.id)
                .set("assigned_at", now),
        )
        .await?;
    }
    activity::record(
        &mut tx,
        ActivityEntry::card(
            &access.board.board,
            card_id,
            caller.id,
            "card_assigned",
            format!("Assigned {} user(s) to \"{}\"", user_ids.len(), access.card.title),
        )
        .after(&user_ids),
    )
    .await?;
    let detail = card_detail(&mut tx, access.card).await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok("Card assignees updated successfully.", detail)
}

async fn set_blocked(
    state: AppState,
    caller: AuthUser,
    card_id: i64,
    reason: Option<String>,
) -> ApiResult<Card> {
    let mut tx = state.begin_write().await?;
    let access = access::card_access(&mut tx, caller.id, card_id).await?;
    access.board.require_write()?;

    let blocked = reason.is_some();
    let (action, verb) = if blocked {
        ("card_blocked", "Blocked")
    } else {
        ("card_unblocked", "Unblocked")
    };
    let updated: Card = adapter::update(
        &mut tx,
        Table::Cards,
        &Filter::id(card_id).live(),
        &Record::new()
            .set("is_blocked", blocked)
            .set("block_reason", reason),
    )
    .await?
    .ok_or_else(|| AppError::not_found("Card not found."))?;
    activity::record(
        &mut tx,
        ActivityEntry::card(
            &access.board.board,
            card_id,
            caller.id,
            action,
            format!("{verb} card \"{}\"", updated.title),
        )
        .before(&access.card)
        .after(&updated),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok(format!("Card {} successfully.", verb.to_lowercase()), updated)
}

pub async fn block_card(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(card_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<BlockCardPayload>,
) -> ApiResult<Card> {
    set_blocked(state, caller, card_id, Some(payload.reason.trim().to_string())).await
}

pub async fn unblock_card(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(card_id): ValidPath<i64>,
) -> ApiResult<Card> {
    set_blocked(state, caller, card_id, None).await
}

pub async fn attach_label(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(card_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<AttachLabelPayload>,
) -> ApiResult<CardDetail> {
    let mut tx = state.begin_write().await?;
    let access = access::card_access(&mut tx, caller.id, card_id).await?;
    access.board.require_write()?;

    let label: Label = adapter::find_one(&mut tx, Table::Labels, &Filter::id(payload.label_id))
        .await?
        .ok_or_else(|| AppError::not_found("Label not found."))?;
    if label.board_id != access.board.board.id {
        return Err(AppError::bad_request(
            "Label belongs to another board.",
        ));
    }
    let existing: Option<CardLabel> = adapter::find_one(
        &mut tx,
        Table::CardLabels,
        &Filter::new().eq("card_id", card_id).eq("label_id", label.id),
    )
    .await?;
    if existing.is_some() {
        return Err(AppError::conflict("Label is already attached to this card."));
    }

    let _: CardLabel = adapter::insert(
        &mut tx,
        Table::CardLabels,
        &Record::new()
            .set("card_id", card_id)
            .set("label_id", label.id)
            .set("created_at", Utc::now()),
    )
    .await?;
    activity::record(
        &mut tx,
        ActivityEntry::card(
            &access.board.board,
            card_id,
            caller.id,
            "label_attached",
            format!("Added label \"{}\" to \"{}\"", label.name, access.card.title),
        )
        .after(&label),
    )
    .await?;
    let detail = card_detail(&mut tx, access.card).await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok("Label attached successfully.", detail)
}

pub async fn detach_label(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath((card_id, label_id)): ValidPath<(i64, i64)>,
) -> ApiResult<()> {
    let mut tx = state.begin_write().await?;
    let access = access::card_access(&mut tx, caller.id, card_id).await?;
    access.board.require_write()?;

    let removed = adapter::delete(
        &mut tx,
        Table::CardLabels,
        &Filter::new().eq("card_id", card_id).eq("label_id", label_id),
    )
    .await?;
    if removed == 0 {
        return Err(AppError::not_found("Label is not attached to this card."));
    }
    activity::record(
        &mut tx,
        ActivityEntry::card(
            &access.board.board,
            card_id,
            caller.id,
            "label_detached",
            format!("Removed label {} from \"{}\"", label_id, access.card.title),
        ),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    ok("Label detached successfully.", ())
}

/// Soft-deletes a card. The remaining cards keep their positions.
pub async fn delete_card(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidPath(card_id): ValidPath<i64>,
) -> ApiResult<()> {
    let mut tx = state.begin_write().await?;
    let access = access::card_access(&mut tx, caller.id, card_id).await?;
    access.board.require_write()?;

    adapter::soft_delete(&mut tx, Table::Cards, &Filter::id(card_id)).await?;
    activity::record(
        &mut tx,
        ActivityEntry::card(
            &access.board.board,
            card_id,
            caller.id,
            "card_deleted",
            format!("Deleted card \"{}\"", access.card.title),
        )
        .before(&access.card),
    )
    .await?;
    tx.commit().await.context("Failed to commit transaction")?;

    info!("Card {} deleted by user {}", card_id, caller.id);
    ok("Card deleted successfully.", ())
}
