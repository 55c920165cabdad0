// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::handlers::{activities, auth, boards, cards, comments, labels, lists, workspaces};
use crate::state::AppState;
use axum::{
    Json, Router,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Accounts and sessions
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", get(auth::verify))
        .route("/auth/logout", post(auth::logout))
        // Workspaces and their members
        .route(
            "/workspaces",
            get(workspaces::list_workspaces).post(workspaces::create_workspace),
        )
        .route(
            "/workspaces/{id}",
            get(workspaces::get_workspace)
                .put(workspaces::update_workspace)
                .delete(workspaces::delete_workspace),
        )
        .route(
            "/workspaces/{id}/members",
            get(workspaces::list_members).post(workspaces::add_member),
        )
        .route(
            "/workspaces/{id}/members/{user_id}",
            put(workspaces::update_member).delete(workspaces::remove_member),
        )
        // Boards
        .route("/boards", post(boards::create_board))
        .route("/boards/workspace/{workspace_id}", get(boards::list_boards))
        .route(
            "/boards/{id}",
            get(boards::get_board)
                .put(boards::update_board)
                .delete(boards::delete_board),
        )
        .route("/boards/{id}/members", post(boards::add_board_member))
        .route(
            "/boards/{id}/members/{user_id}",
            delete(boards::remove_board_member),
        )
        // Lists
        .route("/lists", post(lists::create_list))
        .route("/lists/board/{board_id}", get(lists::list_lists))
        .route(
            "/lists/{id}",
            get(lists::get_list)
                .put(lists::update_list)
                .delete(lists::delete_list),
        )
        // Cards
        .route("/cards", post(cards::create_card))
        .route("/cards/list/{list_id}", get(cards::list_cards))
        .route(
            "/cards/{id}",
            get(cards::get_card)
                .put(cards::update_card)
                .delete(cards::delete_card),
        )
        .route("/cards/{id}/move", post(cards::move_card))
        .route("/cards/{id}/assign", post(cards::assign_card))
        .route("/cards/{id}/block", post(cards::block_card))
        .route("/cards/{id}/unblock", post(cards::unblock_card))
        .route("/cards/{id}/labels", post(cards::attach_label))
        .route(
            "/cards/{id}/labels/{label_id}",
            delete(cards::detach_label),
        )
        // Labels
        .route(
            "/labels/board/{board_id}",
            get(labels::list_labels).post(labels::create_label),
        )
        .route(
            "/labels/{id}",
            get(labels::get_label)
                .put(labels::update_label)
                .delete(labels::delete_label),
        )
        // Comments
        .route(
            "/comments/card/{card_id}",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/comments/{id}",
            get(comments::get_comment)
                .put(comments::update_comment)
                .delete(comments::delete_comment),
        )
        // Audit log
        .route(
            "/activities/board/{board_id}",
            get(activities::board_activities),
        )
}

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
