// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::adapter::{self, Filter, Table};
use anyhow::Result;
use sqlx::SqliteConnection;

/// A palette of 20 distinct colors handed out to workspaces and labels that
/// are created without one.
pub const PALETTE: [&str; 20] = [
    "#1f77b4", // Muted blue
    "#ff7f0e", // Orange
    "#2ca02c", // Green
    "#d62728", // Red
    "#9467bd", // Purple
    "#8c564b", // Brown
    "#e377c2", // Pink
    "#7f7f7f", // Grey
    "#bcbd22", // Olive
    "#17becf", // Cyan
    "#aec7e8", // Light blue
    "#ffbb78", // Light orange
    "#98df8a", // Light green
    "#ff9896", // Light red
    "#c5b0d5", // Light purple
    "#c49c94", // Light brown
    "#f7b6d2", // Light pink
    "#c7c7c7", // Light grey
    "#dbdb8d", // Light olive
    "#9edae5", // Light cyan
];

/// Picks the palette entry following `taken` already-colored siblings,
/// wrapping around once the palette is exhausted.
pub fn palette_color(taken: i64) -> &'static str {
    let index = taken.rem_euclid(PALETTE.len() as i64) as usize;
    PALETTE[index]
}

/// Returns `requested` if present, otherwise the next palette color among
/// the rows of `table` matched by `siblings`.
pub async fn color_or_next(
    conn: &mut SqliteConnection,
    requested: Option<String>,
    table: Table,
    siblings: &Filter,
) -> Result<String> {
    match requested {
        Some(color) => Ok(color),
        None => {
            let taken = adapter::count(conn, table, siblings).await?;
            Ok(palette_color(taken).to_string())
        }
    }
}
