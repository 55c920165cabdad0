// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use serde::{Deserialize, Serialize};

/// A single rejected field of a request payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Implemented by every request payload the API accepts.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

/// Accumulates field errors so a payload reports all problems at once.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Rejects blank strings and strings longer than `max` characters.
    pub fn text(&mut self, field: &str, value: &str, max: usize) {
        if value.trim().is_empty() {
            self.add(field, format!("{field} cannot be empty"));
        } else if value.chars().count() > max {
            self.add(field, format!("{field} must be at most {max} characters"));
        }
    }

    /// Like [`FieldErrors::text`], but only when the value was sent.
    pub fn optional_text(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            self.text(field, value, max);
        }
    }

    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.add(field, format!("{field} must be at most {max} characters"));
        }
    }

    pub fn color(&mut self, field: &str, value: Option<&str>) {
        if value.is_some_and(|v| !is_hex_color(v)) {
            self.add(field, format!("{field} must be a hex color like #1f77b4"));
        }
    }

    pub fn non_negative(&mut self, field: &str, value: Option<f64>) {
        if value.is_some_and(|v| v < 0.0 || v.is_nan()) {
            self.add(field, format!("{field} cannot be negative"));
        }
    }

    pub fn positive_id(&mut self, field: &str, value: i64) {
        if value < 1 {
            self.add(field, format!("{field} must be a positive id"));
        }
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.0)
        }
    }
}

/// Accepts `#rgb` and `#rrggbb`.
pub fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
