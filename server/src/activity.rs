// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Append-only audit log. Rows are written next to the mutation they describe,
//! on the same connection, and are never updated or deleted.
use crate::adapter::{self, FindOptions, Filter, Record, Table};
use anyhow::Result;
use chrono::Utc;
use common::{Activity, Board};
use serde::Serialize;
use sqlx::SqliteConnection;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 200;

#[derive(Debug, Clone)]
pub struct ActivityEntry {
    workspace_id: Option<i64>,
    board_id: Option<i64>,
    card_id: Option<i64>,
    user_id: i64,
    action_type: &'static str,
    description: String,
    old_value: Option<String>,
    new_value: Option<String>,
}

impl ActivityEntry {
    pub fn workspace(
        workspace_id: i64,
        user_id: i64,
        action_type: &'static str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: Some(workspace_id),
            board_id: None,
            card_id: None,
            user_id,
            action_type,
            description: description.into(),
            old_value: None,
            new_value: None,
        }
    }

    pub fn board(
        board: &Board,
        user_id: i64,
        action_type: &'static str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            board_id: Some(board.id),
            ..Self::workspace(board.workspace_id, user_id, action_type, description)
        }
    }

    pub fn card(
        board: &Board,
        card_id: i64,
        user_id: i64,
        action_type: &'static str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            card_id: Some(card_id),
            ..Self::board(board, user_id, action_type, description)
        }
    }

    /// Snapshot of the row before the change.
    pub fn before<T: Serialize>(mut self, value: &T) -> Self {
        self.old_value = serde_json::to_string(value).ok();
        self
    }

    /// Snapshot of the row after the change.
    pub fn after<T: Serialize>(mut self, value: &T) -> Self {
        self.new_value = serde_json::to_string(value).ok();
        self
    }
}

pub async fn record(conn: &mut SqliteConnection, entry: ActivityEntry) -> Result<Activity> {
    adapter::insert(
        conn,
        Table::Activities,
        &Record::new()
            .set("workspace_id", entry.workspace_id)
            .set("board_id", entry.board_id)
            .set("card_id", entry.card_id)
            .set("user_id", entry.user_id)
            .set("action_type", entry.action_type)
            .set("description", entry.description)
            .set("old_value", entry.old_value)
            .set("new_value", entry.new_value)
            .set("created_at", Utc::now()),
    )
    .await
}

/// Newest first.
pub async fn for_board(
    conn: &mut SqliteConnection,
    board_id: i64,
    limit: i64,
) -> Result<Vec<Activity>> {
    adapter::find_many(
        conn,
        Table::Activities,
        &Filter::new().eq("board_id", board_id),
        &FindOptions::ordered_by("created_at")
            .desc()
            .limit(limit.clamp(1, MAX_LIMIT)),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;
    use crate::test_support::Fixture;

    #[tokio::test]
    async fn test_record_card_activity_with_snapshots() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;

        let entry = ActivityEntry::board(&fx.board, fx.owner.id, "list_updated", "Renamed list")
            .before(&fx.list)
            .after(&serde_json::json!({ "name": "Done" }));
        let activity = record(&mut conn, entry).await.unwrap();

        assert_eq!(activity.workspace_id, Some(fx.workspace.id));
        assert_eq!(activity.board_id, Some(fx.board.id));
        assert_eq!(activity.card_id, None);
        assert_eq!(activity.action_type, "list_updated");
        assert!(activity.old_value.unwrap().contains("\"board_id\""));
        assert_eq!(activity.new_value.as_deref(), Some(r#"{"name":"Done"}"#));
    }

    #[tokio::test]
    async fn test_for_board_is_newest_first_and_limited() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;

        for i in 0..3 {
            let entry =
                ActivityEntry::board(&fx.board, fx.owner.id, "list_created", format!("#{i}"));
            record(&mut conn, entry).await.unwrap();
        }
        record(
            &mut conn,
            ActivityEntry::workspace(fx.workspace.id, fx.owner.id, "workspace_updated", "ws"),
        )
        .await
        .unwrap();

        let activities = for_board(&mut conn, fx.board.id, 2).await.unwrap();
        let descriptions: Vec<&str> = activities.iter().map(|a| a.description.as_str()).collect();
        assert_eq!(descriptions, ["#2", "#1"]);
    }
}
