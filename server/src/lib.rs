// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! BoardSync server: a Kanban board REST API over SQLite.
pub mod access;
pub mod activity;
pub mod adapter;
pub mod auth;
pub mod colors;
pub mod config;
pub mod database;
pub mod handlers;
pub mod pagination;
pub mod positions;
pub mod routes;
pub mod state;

#[cfg(test)]
mod test_support;
