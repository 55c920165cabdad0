// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Uniform data access over SQLite.
//!
//! Every operation builds a parameterized statement from a [`Table`], a
//! [`Filter`] of ANDed equality conditions and, for writes, a [`Record`] of
//! column values. Inserts and updates always re-read the affected row by
//! primary key, so callers get the same canonical row shape back no matter
//! which operation produced it.
//!
//! All functions take a `&mut SqliteConnection`, which works with both a pooled
//! connection and an open transaction (`&mut *tx`).
use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use common::{Priority, Role, Visibility};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Arguments, FromRow, SqliteConnection};
use std::fmt;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Users,
    Workspaces,
    WorkspaceMembers,
    Boards,
    BoardMembers,
    Lists,
    Cards,
    CardAssignees,
    Labels,
    CardLabels,
    Comments,
    Activities,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Workspaces => "workspaces",
            Table::WorkspaceMembers => "workspace_members",
            Table::Boards => "boards",
            Table::BoardMembers => "board_members",
            Table::Lists => "lists",
            Table::Cards => "cards",
            Table::CardAssignees => "card_assignees",
            Table::Labels => "labels",
            Table::CardLabels => "card_labels",
            Table::Comments => "comments",
            Table::Activities => "activities",
        }
    }

    /// Tables whose rows carry `deleted_at` and `updated_at`.
    /// Join rows, labels and activities are never soft deleted.
    pub fn soft_deletes(&self) -> bool {
        matches!(
            self,
            Table::Users
                | Table::Workspaces
                | Table::Boards
                | Table::Lists
                | Table::Cards
                | Table::Comments
        )
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Role> for Value {
    fn from(v: Role) -> Self {
        Value::Text(v.as_str().to_string())
    }
}

impl From<Priority> for Value {
    fn from(v: Priority) -> Self {
        Value::Text(v.as_str().to_string())
    }
}

impl From<Visibility> for Value {
    fn from(v: Visibility) -> Self {
        Value::Text(v.as_str().to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// ANDed equality conditions, optionally restricted to live rows.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(&'static str, Value)>,
    live_only: bool,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(id: i64) -> Self {
        Self::new().eq("id", id)
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push((column, value.into()));
        self
    }

    /// Excludes soft-deleted rows.
    pub fn live(mut self) -> Self {
        self.live_only = true;
        self
    }

    fn write_where(&self, sql: &mut String, params: &mut Vec<Value>) {
        let mut clauses = Vec::with_capacity(self.conditions.len() + 1);
        for (column, value) in &self.conditions {
            if *value == Value::Null {
                clauses.push(format!("{column} IS NULL"));
            } else {
                clauses.push(format!("{column} = ?"));
                params.push(value.clone());
            }
        }
        if self.live_only {
            clauses.push("deleted_at IS NULL".to_string());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
    }
}

/// Column values for an insert or an update.
#[derive(Debug, Clone, Default)]
pub struct Record {
    values: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.values.push((column, value.into()));
        self
    }

    /// Sets the column only when a value is present.
    pub fn set_some<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(column, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn has(&self, column: &str) -> bool {
        self.values.iter().any(|(c, _)| *c == column)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// Ordering and paging for [`find_many`]. Without `order_by`, rows come back
/// in storage order.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub order_by: Option<&'static str>,
    pub order: Order,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FindOptions {
    pub fn ordered_by(column: &'static str) -> Self {
        Self {
            order_by: Some(column),
            ..Self::default()
        }
    }

    pub fn desc(mut self) -> Self {
        self.order = Order::Desc;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}

fn arguments<'q>(params: &[Value]) -> Result<SqliteArguments<'q>> {
    let mut args = SqliteArguments::default();
    for param in params {
        let bound = match param {
            Value::Null => args.add(None::<i64>),
            Value::Bool(v) => args.add(*v),
            Value::Int(v) => args.add(*v),
            Value::Real(v) => args.add(*v),
            Value::Text(v) => args.add(v.clone()),
            Value::Timestamp(v) => args.add(*v),
        };
        bound.map_err(|e| anyhow!("Failed to bind parameter {param:?}: {e}"))?;
    }
    Ok(args)
}

/// Returns the first row matching `filter`, if any.
pub async fn find_one<T>(
    conn: &mut SqliteConnection,
    table: Table,
    filter: &Filter,
) -> Result<Option<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut sql = format!("SELECT * FROM {table}");
    let mut params = Vec::new();
    filter.write_where(&mut sql, &mut params);
    sql.push_str(" LIMIT 1");

    sqlx::query_as_with::<_, T, _>(&sql, arguments(&params)?)
        .fetch_optional(&mut *conn)
        .await
        .inspect_err(|e| error!("find_one on {} failed: {:?}", table, e))
        .with_context(|| format!("Failed to read from {table}"))
}

/// Returns every row matching `filter`.
pub async fn find_many<T>(
    conn: &mut SqliteConnection,
    table: Table,
    filter: &Filter,
    options: &FindOptions,
) -> Result<Vec<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut sql = format!("SELECT * FROM {table}");
    let mut params = Vec::new();
    filter.write_where(&mut sql, &mut params);
    if let Some(column) = options.order_by {
        let direction = match options.order {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        };
        // The id tiebreaker keeps ordering stable among equal keys.
        sql.push_str(&format!(" ORDER BY {column} {direction}, id {direction}"));
    }
    match (options.limit, options.offset) {
        (Some(limit), offset) => {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Value::Int(limit));
            params.push(Value::Int(offset.unwrap_or(0)));
        }
        (None, Some(offset)) => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(Value::Int(offset));
        }
        (None, None) => {}
    }

    sqlx::query_as_with::<_, T, _>(&sql, arguments(&params)?)
        .fetch_all(&mut *conn)
        .await
        .inspect_err(|e| error!("find_many on {} failed: {:?}", table, e))
        .with_context(|| format!("Failed to list rows of {table}"))
}

pub async fn count(conn: &mut SqliteConnection, table: Table, filter: &Filter) -> Result<i64> {
    let mut sql = format!("SELECT COUNT(*) FROM {table}");
    let mut params = Vec::new();
    filter.write_where(&mut sql, &mut params);

    sqlx::query_scalar_with::<_, i64, _>(&sql, arguments(&params)?)
        .fetch_one(&mut *conn)
        .await
        .inspect_err(|e| error!("count on {} failed: {:?}", table, e))
        .with_context(|| format!("Failed to count rows of {table}"))
}

/// Inserts `record` and returns the stored row.
pub async fn insert<T>(conn: &mut SqliteConnection, table: Table, record: &Record) -> Result<T>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    if record.is_empty() {
        bail!("Refusing to insert an empty record into {table}");
    }
    let columns: Vec<&str> = record.values.iter().map(|(c, _)| *c).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        columns.join(", ")
    );
    let params: Vec<Value> = record.values.iter().map(|(_, v)| v.clone()).collect();

    let id = sqlx::query_with(&sql, arguments(&params)?)
        .execute(&mut *conn)
        .await
        .inspect_err(|e| error!("insert into {} failed: {:?}", table, e))
        .with_context(|| format!("Failed to insert into {table}"))?
        .last_insert_rowid();
    debug!("Inserted row {} into {}", id, table);

    find_one(conn, table, &Filter::id(id))
        .await?
        .with_context(|| format!("Row {id} of {table} vanished right after insert"))
}

async fn update_ids(
    conn: &mut SqliteConnection,
    table: Table,
    filter: &Filter,
    patch: &Record,
) -> Result<Vec<i64>> {
    let mut patch = patch.clone();
    if table.soft_deletes() && !patch.has("updated_at") {
        patch = patch.set("updated_at", Utc::now());
    }
    if patch.is_empty() {
        bail!("Refusing to run an empty update on {table}");
    }

    let assignments: Vec<String> = patch
        .values
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect();
    let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
    let mut params: Vec<Value> = patch.values.iter().map(|(_, v)| v.clone()).collect();
    filter.write_where(&mut sql, &mut params);
    sql.push_str(" RETURNING id");

    sqlx::query_scalar_with::<_, i64, _>(&sql, arguments(&params)?)
        .fetch_all(&mut *conn)
        .await
        .inspect_err(|e| error!("update of {} failed: {:?}", table, e))
        .with_context(|| format!("Failed to update {table}"))
}

/// Applies `patch` to the rows matching `filter` and returns the first of
/// them as stored afterwards, or `None` when nothing matched.
pub async fn update<T>(
    conn: &mut SqliteConnection,
    table: Table,
    filter: &Filter,
    patch: &Record,
) -> Result<Option<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let ids = update_ids(conn, table, filter, patch).await?;
    match ids.first() {
        Some(id) => find_one(conn, table, &Filter::id(*id)).await,
        None => Ok(None),
    }
}

/// Applies `patch` to every matching row and returns how many changed.
pub async fn update_all(
    conn: &mut SqliteConnection,
    table: Table,
    filter: &Filter,
    patch: &Record,
) -> Result<u64> {
    let ids = update_ids(conn, table, filter, patch).await?;
    Ok(ids.len() as u64)
}

/// Physically removes matching rows. Returns the number of rows removed.
pub async fn delete(conn: &mut SqliteConnection, table: Table, filter: &Filter) -> Result<u64> {
    let mut sql = format!("DELETE FROM {table}");
    let mut params = Vec::new();
    filter.write_where(&mut sql, &mut params);

    let result = sqlx::query_with(&sql, arguments(&params)?)
        .execute(&mut *conn)
        .await
        .inspect_err(|e| error!("delete from {} failed: {:?}", table, e))
        .with_context(|| format!("Failed to delete from {table}"))?;
    Ok(result.rows_affected())
}

/// Marks matching live rows as deleted. Returns the number of rows marked.
pub async fn soft_delete(
    conn: &mut SqliteConnection,
    table: Table,
    filter: &Filter,
) -> Result<u64> {
    if !table.soft_deletes() {
        bail!("{table} rows cannot be soft deleted");
    }
    let filter = filter.clone().live();
    update_all(conn, table, &filter, &Record::new().set("deleted_at", Utc::now())).await
}

/// Runs an arbitrary statement and returns the number of affected rows.
pub async fn execute_raw(conn: &mut SqliteConnection, sql: &str, params: &[Value]) -> Result<u64> {
    let result = sqlx::query_with(sql, arguments(params)?)
        .execute(&mut *conn)
        .await
        .inspect_err(|e| error!("raw statement failed: {:?}; sql: {}", e, sql))
        .context("Failed to execute raw statement")?;
    Ok(result.rows_affected())
}

/// Runs an arbitrary query and maps every row to `T`.
pub async fn fetch_raw<T>(conn: &mut SqliteConnection, sql: &str, params: &[Value]) -> Result<Vec<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    sqlx::query_as_with::<_, T, _>(sql, arguments(params)?)
        .fetch_all(&mut *conn)
        .await
        .inspect_err(|e| error!("raw query failed: {:?}; sql: {}", e, sql))
        .context("Failed to run raw query")
}

/// Runs an arbitrary query that yields exactly one integer.
pub async fn fetch_int_raw(conn: &mut SqliteConnection, sql: &str, params: &[Value]) -> Result<i64> {
    sqlx::query_scalar_with::<_, i64, _>(sql, arguments(params)?)
        .fetch_one(&mut *conn)
        .await
        .inspect_err(|e| error!("raw scalar query failed: {:?}; sql: {}", e, sql))
        .context("Failed to run raw scalar query")
}
