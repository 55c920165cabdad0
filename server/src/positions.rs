// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! 1-based ordering of cards inside a list and of lists inside a board.
//!
//! Moves renumber the affected siblings so that no two live rows of the same
//! container share a position. Soft deletes leave gaps behind, so positions
//! are only dense right after moves and appends; new rows always go to
//! `max(position) + 1`, never `count + 1`.
//!
//! The move functions issue several statements. Run them inside a transaction.
use crate::adapter::{self, Filter, Record, Table, Value};
use anyhow::Result;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

/// Which rows are ordered, and by which parent they are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    table: Table,
    parent_column: &'static str,
}

pub const CARDS_IN_LIST: Scope = Scope {
    table: Table::Cards,
    parent_column: "list_id",
};

pub const LISTS_IN_BOARD: Scope = Scope {
    table: Table::Lists,
    parent_column: "board_id",
};

/// An inclusive range of sibling positions and how far they move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub first: i64,
    pub last: i64,
    pub delta: i64,
}

/// Sibling renumbering needed to move a row from `current` to `target`
/// inside the same container. `None` when the row stays put.
pub fn shift_for_move(current: i64, target: i64) -> Option<Shift> {
    if target > current {
        // (current, target] slide up one slot.
        Some(Shift {
            first: current + 1,
            last: target,
            delta: -1,
        })
    } else if target < current {
        // [target, current) slide down one slot.
        Some(Shift {
            first: target,
            last: current - 1,
            delta: 1,
        })
    } else {
        None
    }
}

/// Keeps a requested position inside `1..=max`.
pub fn clamp_target(requested: i64, max: i64) -> i64 {
    requested.clamp(1, max.max(1))
}

pub async fn max_position(conn: &mut SqliteConnection, scope: Scope, parent_id: i64) -> Result<i64> {
    let sql = format!(
        "SELECT COALESCE(MAX(position), 0) FROM {} WHERE {} = ? AND deleted_at IS NULL",
        scope.table, scope.parent_column
    );
    adapter::fetch_int_raw(conn, &sql, &[Value::Int(parent_id)]).await
}

/// Position for a row appended at the end of its container.
pub async fn next_position(conn: &mut SqliteConnection, scope: Scope, parent_id: i64) -> Result<i64> {
    Ok(max_position(conn, scope, parent_id).await? + 1)
}

async fn shift_range(
    conn: &mut SqliteConnection,
    scope: Scope,
    parent_id: i64,
    moving_id: i64,
    first: i64,
    last: Option<i64>,
    delta: i64,
) -> Result<u64> {
    let mut sql = format!(
        "UPDATE {} SET position = position + ?, updated_at = ? \
         WHERE {} = ? AND id <> ? AND deleted_at IS NULL AND position >= ?",
        scope.table, scope.parent_column
    );
    let mut params = vec![
        Value::Int(delta),
        Value::Timestamp(Utc::now()),
        Value::Int(parent_id),
        Value::Int(moving_id),
        Value::Int(first),
    ];
    if let Some(last) = last {
        sql.push_str(" AND position <= ?");
        params.push(Value::Int(last));
    }
    adapter::execute_raw(conn, &sql, &params).await
}

/// Moves a row to `target` inside its current container and returns the
/// position it ended up at (the target, clamped to the occupied range).
pub async fn move_within(
    conn: &mut SqliteConnection,
    scope: Scope,
    parent_id: i64,
    item_id: i64,
    current: i64,
    target: i64,
) -> Result<i64> {
    let max = max_position(conn, scope, parent_id).await?;
    let target = clamp_target(target, max);
    let Some(shift) = shift_for_move(current, target) else {
        debug!("{} {} already at position {}", scope.table, item_id, current);
        return Ok(current);
    };

    let shifted = shift_range(
        conn,
        scope,
        parent_id,
        item_id,
        shift.first,
        Some(shift.last),
        shift.delta,
    )
    .await?;
    adapter::update_all(
        conn,
        scope.table,
        &Filter::id(item_id),
        &Record::new().set("position", target),
    )
    .await?;

    debug!(
        "Moved {} {} from {} to {} ({} siblings shifted)",
        scope.table, item_id, current, target, shifted
    );
    Ok(target)
}

/// Moves a row from one container to another: closes the gap it leaves in
/// `from_parent`, opens a slot at `target` in `to_parent` and re-parents it.
/// Returns the final position (clamped to `1..=max+1` of the destination).
pub async fn move_across(
    conn: &mut SqliteConnection,
    scope: Scope,
    item_id: i64,
    from_parent: i64,
    current: i64,
    to_parent: i64,
    target: i64,
) -> Result<i64> {
    if from_parent == to_parent {
        return move_within(conn, scope, from_parent, item_id, current, target).await;
    }

    let max = max_position(conn, scope, to_parent).await?;
    let target = clamp_target(target, max + 1);

    shift_range(conn, scope, from_parent, item_id, current + 1, None, -1).await?;
    shift_range(conn, scope, to_parent, item_id, target, None, 1).await?;
    adapter::update_all(
        conn,
        scope.table,
        &Filter::id(item_id),
        &Record::new()
            .set(scope.parent_column, to_parent)
            .set("position", target),
    )
    .await?;

    debug!(
        "Moved {} {} from {}:{} to {}:{}",
        scope.table, item_id, from_parent, current, to_parent, target
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;
    use crate::test_support::{self, Fixture};
    use common::{BoardList, Card};
    use sqlx::SqlitePool;

    /// Titles of the live cards of a list, in position order, with positions.
    async fn layout(pool: &SqlitePool, list_id: i64) -> Vec<(String, i64)> {
        let mut conn = pool.acquire().await.unwrap();
        let cards: Vec<Card> = adapter::find_many(
            &mut conn,
            Table::Cards,
            &Filter::new().eq("list_id", list_id).live(),
            &adapter::FindOptions::ordered_by("position"),
        )
        .await
        .unwrap();
        cards.into_iter().map(|c| (c.title, c.position)).collect()
    }

    fn expect(pairs: &[(&str, i64)]) -> Vec<(String, i64)> {
        pairs.iter().map(|(t, p)| (t.to_string(), *p)).collect()
    }

    #[test]
    fn test_shift_for_move_down_the_list() {
        assert_eq!(
            shift_for_move(2, 5),
            Some(Shift {
                first: 3,
                last: 5,
                delta: -1
            })
        );
    }

    #[test]
    fn test_shift_for_move_up_the_list() {
        assert_eq!(
            shift_for_move(5, 2),
            Some(Shift {
                first: 2,
                last: 4,
                delta: 1
            })
        );
        assert_eq!(shift_for_move(3, 3), None);
    }

    #[test]
    fn test_clamp_target() {
        assert_eq!(clamp_target(0, 4), 1);
        assert_eq!(clamp_target(9, 4), 4);
        assert_eq!(clamp_target(3, 4), 3);
        assert_eq!(clamp_target(5, 0), 1);
    }

    #[tokio::test]
    async fn test_next_position_uses_max_not_count() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;

        assert_eq!(next_position(&mut conn, CARDS_IN_LIST, fx.list.id).await.unwrap(), 1);

        let cards = fx.cards(&mut conn, fx.list.id, &["a", "b", "c"]).await;
        adapter::soft_delete(&mut conn, Table::Cards, &Filter::id(cards[1].id))
            .await
            .unwrap();

        // Two live cards, but the highest live position is still 3.
        assert_eq!(next_position(&mut conn, CARDS_IN_LIST, fx.list.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_move_within_towards_end() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let cards = fx.cards(&mut conn, fx.list.id, &["a", "b", "c", "d"]).await;

        let pos = move_within(&mut conn, CARDS_IN_LIST, fx.list.id, cards[0].id, 1, 3)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(pos, 3);
        assert_eq!(
            layout(&pool, fx.list.id).await,
            expect(&[("b", 1), ("c", 2), ("a", 3), ("d", 4)])
        );
    }

    #[tokio::test]
    async fn test_move_within_towards_start() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let cards = fx.cards(&mut conn, fx.list.id, &["a", "b", "c", "d"]).await;

        move_within(&mut conn, CARDS_IN_LIST, fx.list.id, cards[3].id, 4, 2)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(
            layout(&pool, fx.list.id).await,
            expect(&[("a", 1), ("d", 2), ("b", 3), ("c", 4)])
        );
    }

    #[tokio::test]
    async fn test_move_to_current_position_is_a_no_op() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let cards = fx.cards(&mut conn, fx.list.id, &["a", "b", "c"]).await;

        let pos = move_within(&mut conn, CARDS_IN_LIST, fx.list.id, cards[1].id, 2, 2)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(pos, 2);
        assert_eq!(
            layout(&pool, fx.list.id).await,
            expect(&[("a", 1), ("b", 2), ("c", 3)])
        );
    }

    #[tokio::test]
    async fn test_move_within_clamps_past_the_end() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let cards = fx.cards(&mut conn, fx.list.id, &["a", "b", "c"]).await;

        let pos = move_within(&mut conn, CARDS_IN_LIST, fx.list.id, cards[0].id, 1, 42)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(pos, 3);
        assert_eq!(
            layout(&pool, fx.list.id).await,
            expect(&[("b", 1), ("c", 2), ("a", 3)])
        );
    }

    #[tokio::test]
    async fn test_move_across_lists() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let other: BoardList = test_support::list(&mut conn, fx.board.id, 2).await;
        let a = fx.cards(&mut conn, fx.list.id, &["a1", "a2", "a3"]).await;
        fx.cards(&mut conn, other.id, &["b1"]).await;

        let pos = move_across(&mut conn, CARDS_IN_LIST, a[1].id, fx.list.id, 2, other.id, 1)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(pos, 1);
        assert_eq!(layout(&pool, fx.list.id).await, expect(&[("a1", 1), ("a3", 2)]));
        assert_eq!(layout(&pool, other.id).await, expect(&[("a2", 1), ("b1", 2)]));
    }

    #[tokio::test]
    async fn test_move_across_into_empty_list_and_past_end() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let empty = test_support::list(&mut conn, fx.board.id, 2).await;
        let a = fx.cards(&mut conn, fx.list.id, &["a1", "a2"]).await;

        let pos = move_across(&mut conn, CARDS_IN_LIST, a[0].id, fx.list.id, 1, empty.id, 7)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(pos, 1);
        assert_eq!(layout(&pool, fx.list.id).await, expect(&[("a2", 1)]));
        assert_eq!(layout(&pool, empty.id).await, expect(&[("a1", 1)]));
    }

    #[tokio::test]
    async fn test_lists_reorder_within_board() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let second = test_support::list(&mut conn, fx.board.id, 2).await;
        let third = test_support::list(&mut conn, fx.board.id, 3).await;

        move_within(&mut conn, LISTS_IN_BOARD, fx.board.id, third.id, 3, 1)
            .await
            .unwrap();

        let lists: Vec<BoardList> = adapter::find_many(
            &mut conn,
            Table::Lists,
            &Filter::new().eq("board_id", fx.board.id).live(),
            &adapter::FindOptions::ordered_by("position"),
        )
        .await
        .unwrap();
        let order: Vec<(i64, i64)> = lists.iter().map(|l| (l.id, l.position)).collect();
        assert_eq!(order, vec![(third.id, 1), (fx.list.id, 2), (second.id, 3)]);
    }

    #[tokio::test]
    async fn test_sequence_of_moves_keeps_positions_dense() {
        let pool = in_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let fx = Fixture::new(&mut conn).await;
        let other = test_support::list(&mut conn, fx.board.id, 2).await;
        let cards = fx.cards(&mut conn, fx.list.id, &["a", "b", "c", "d", "e"]).await;

        // (card index, destination list, target position)
        let moves = [
            (0, other.id, 1),
            (4, fx.list.id, 1),
            (2, other.id, 2),
            (1, other.id, 1),
            (3, fx.list.id, 9),
            (0, fx.list.id, 2),
        ];
        for (idx, to_list, target) in moves {
            let card: Card = adapter::find_one(&mut conn, Table::Cards, &Filter::id(cards[idx].id))
                .await
                .unwrap()
                .unwrap();
            move_across(
                &mut conn,
                CARDS_IN_LIST,
                card.id,
                card.list_id,
                card.position,
                to_list,
                target,
            )
            .await
            .unwrap();
        }
        drop(conn);

        for list_id in [fx.list.id, other.id] {
            let positions: Vec<i64> = layout(&pool, list_id).await.into_iter().map(|(_, p)| p).collect();
            let expected: Vec<i64> = (1..=positions.len() as i64).collect();
            assert_eq!(positions, expected, "list {list_id} is not dense");
        }
    }
}
