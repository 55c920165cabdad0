// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Types shared between the BoardSync server and its clients: database row
//! models, request payloads and the JSON response envelope.
mod models;
mod payloads;
mod validation;

pub use models::*;
pub use payloads::*;
pub use validation::{FieldError, FieldErrors, Validate, is_hex_color};

use serde::{Deserialize, Serialize};

/// Envelope returned by every successful API call.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}
