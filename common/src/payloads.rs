// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Request bodies accepted by the API.
//!
//! Update payloads only touch the fields that are present; a missing field
//! leaves the stored value as it is.
use crate::models::{Priority, Role, Visibility};
use crate::validation::{FieldError, FieldErrors, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

const NAME_MAX: usize = 255;
const TITLE_MAX: usize = 500;
const TEXT_MAX: usize = 5000;
const PASSWORD_MIN: usize = 6;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterPayload {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Validate for RegisterPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.text("name", &self.name, NAME_MAX);
        check_email(&mut errors, &self.email);
        if self.password.chars().count() < PASSWORD_MIN {
            errors.add(
                "password",
                format!("password must be at least {PASSWORD_MIN} characters"),
            );
        }
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

impl Validate for LoginPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);
        if self.password.is_empty() {
            errors.add("password", "password cannot be empty");
        }
        errors.finish()
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
    if !well_formed {
        errors.add("email", "email must be a valid address");
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CreateWorkspacePayload {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub visibility: Option<Visibility>,
}

impl Validate for CreateWorkspacePayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.text("name", &self.name, NAME_MAX);
        errors.max_len("description", self.description.as_deref(), TEXT_MAX);
        errors.color("color", self.color.as_deref());
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateWorkspacePayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub visibility: Option<Visibility>,
}

impl Validate for UpdateWorkspacePayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.optional_text("name", self.name.as_deref(), NAME_MAX);
        errors.max_len("description", self.description.as_deref(), TEXT_MAX);
        errors.color("color", self.color.as_deref());
        errors.finish()
    }
}

/// Adds a user to a workspace, looked up either by id or by email.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AddMemberPayload {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl Validate for AddMemberPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        match (&self.user_id, &self.email) {
            (None, None) => errors.add("user_id", "either user_id or email is required"),
            (Some(id), _) => errors.positive_id("user_id", *id),
            (None, Some(email)) => check_email(&mut errors, email),
        }
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateMemberPayload {
    pub role: Role,
}

impl Validate for UpdateMemberPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CreateBoardPayload {
    pub workspace_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub background_color: Option<String>,
    pub background_image: Option<String>,
}

impl Validate for CreateBoardPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.positive_id("workspace_id", self.workspace_id);
        errors.text("name", &self.name, NAME_MAX);
        errors.max_len("description", self.description.as_deref(), TEXT_MAX);
        errors.color("background_color", self.background_color.as_deref());
        errors.max_len("background_image", self.background_image.as_deref(), TEXT_MAX);
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateBoardPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub background_color: Option<String>,
    pub background_image: Option<String>,
}

impl Validate for UpdateBoardPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.optional_text("name", self.name.as_deref(), NAME_MAX);
        errors.max_len("description", self.description.as_deref(), TEXT_MAX);
        errors.color("background_color", self.background_color.as_deref());
        errors.max_len("background_image", self.background_image.as_deref(), TEXT_MAX);
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AddBoardMemberPayload {
    pub user_id: i64,
    pub role: Option<Role>,
}

impl Validate for AddBoardMemberPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.positive_id("user_id", self.user_id);
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CreateListPayload {
    pub board_id: i64,
    pub name: String,
    pub color: Option<String>,
}

impl Validate for CreateListPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.positive_id("board_id", self.board_id);
        errors.text("name", &self.name, NAME_MAX);
        errors.color("color", self.color.as_deref());
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateListPayload {
    pub name: Option<String>,
    pub color: Option<String>,
    /// New 1-based position among the board's lists.
    pub position: Option<i64>,
}

impl Validate for UpdateListPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.optional_text("name", self.name.as_deref(), NAME_MAX);
        errors.color("color", self.color.as_deref());
        if self.position.is_some_and(|p| p < 1) {
            errors.add("position", "position must be 1 or greater");
        }
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CreateCardPayload {
    pub list_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub parent_card_id: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
}

impl Validate for CreateCardPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.positive_id("list_id", self.list_id);
        errors.text("title", &self.title, TITLE_MAX);
        errors.max_len("description", self.description.as_deref(), TEXT_MAX);
        errors.max_len("category", self.category.as_deref(), NAME_MAX);
        errors.non_negative("estimated_hours", self.estimated_hours);
        check_schedule(&mut errors, self.start_date, self.due_date);
        errors.finish()
    }
}

/// Card patch. The nullable columns take `Option<Option<T>>`: a missing
/// field keeps the stored value and an explicit `null` clears it.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateCardPayload {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub parent_card_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
}

impl Validate for UpdateCardPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.optional_text("title", self.title.as_deref(), TITLE_MAX);
        errors.max_len("description", self.description.as_ref().and_then(Option::as_deref), TEXT_MAX);
        errors.max_len("category", self.category.as_ref().and_then(Option::as_deref), NAME_MAX);
        errors.non_negative("estimated_hours", self.estimated_hours);
        errors.non_negative("actual_hours", self.actual_hours);
        check_schedule(&mut errors, self.start_date.flatten(), self.due_date.flatten());
        errors.finish()
    }
}

/// Deserializes a present field, `null` included, as `Some`. Paired with
/// `#[serde(default)]` so an absent field stays `None`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn check_schedule(
    errors: &mut FieldErrors,
    start: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
) {
    if let (Some(start), Some(due)) = (start, due) {
        if due < start {
            errors.add("due_date", "due_date cannot be before start_date");
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MoveCardPayload {
    pub new_list_id: i64,
    pub new_position: i64,
}

impl Validate for MoveCardPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.positive_id("new_list_id", self.new_list_id);
        if self.new_position < 1 {
            errors.add("new_position", "new_position must be 1 or greater");
        }
        errors.finish()
    }
}

/// Replaces the full set of assignees of a card.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AssignCardPayload {
    pub user_ids: Vec<i64>,
}

impl Validate for AssignCardPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        if self.user_ids.iter().any(|id| *id < 1) {
            errors.add("user_ids", "user_ids must only contain positive ids");
        }
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BlockCardPayload {
    pub reason: String,
}

impl Validate for BlockCardPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.text("reason", &self.reason, TEXT_MAX);
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AttachLabelPayload {
    pub label_id: i64,
}

impl Validate for AttachLabelPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.positive_id("label_id", self.label_id);
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CreateLabelPayload {
    pub name: String,
    pub color: Option<String>,
    pub bg_color: Option<String>,
    pub logo_path: Option<String>,
}

impl Validate for CreateLabelPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.text("name", &self.name, NAME_MAX);
        errors.color("color", self.color.as_deref());
        errors.color("bg_color", self.bg_color.as_deref());
        errors.max_len("logo_path", self.logo_path.as_deref(), TEXT_MAX);
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateLabelPayload {
    pub name: Option<String>,
    pub color: Option<String>,
    pub bg_color: Option<String>,
    pub logo_path: Option<String>,
}

impl Validate for UpdateLabelPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.optional_text("name", self.name.as_deref(), NAME_MAX);
        errors.color("color", self.color.as_deref());
        errors.color("bg_color", self.bg_color.as_deref());
        errors.max_len("logo_path", self.logo_path.as_deref(), TEXT_MAX);
        errors.finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CommentPayload {
    pub content: String,
}

impl Validate for CommentPayload {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = FieldErrors::new();
        errors.text("content", &self.content, TEXT_MAX);
        errors.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_register_rejects_bad_email_and_short_password() {
        let payload = RegisterPayload {
            name: "Ana".to_string(),
            email: "not-an-email".to_string(),
            password: "123".to_string(),
        };
        let errors = payload.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "email");
        assert_eq!(errors[1].field, "password");
    }

    #[test]
    fn test_add_member_needs_user_or_email() {
        let payload = AddMemberPayload::default();
        assert_eq!(payload.validate().unwrap_err()[0].field, "user_id");

        let payload = AddMemberPayload {
            email: Some("bob@example.com".to_string()),
            ..Default::default()
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_card_due_date_before_start_is_rejected() {
        let start = Utc::now();
        let payload = CreateCardPayload {
            list_id: 1,
            title: "Ship it".to_string(),
            start_date: Some(start),
            due_date: Some(start - Duration::days(1)),
            ..Default::default()
        };
        let errors = payload.validate().unwrap_err();
        assert_eq!(errors[0].field, "due_date");
    }

    #[test]
    fn test_move_requires_positive_position() {
        let payload = MoveCardPayload {
            new_list_id: 3,
            new_position: 0,
        };
        assert_eq!(payload.validate().unwrap_err()[0].field, "new_position");
    }

    #[test]
    fn test_card_patch_tells_null_from_missing() {
        let patch: UpdateCardPayload =
            serde_json::from_str(r#"{"parent_card_id":null,"due_date":null,"title":"t"}"#).unwrap();
        assert_eq!(patch.parent_card_id, Some(None));
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.description, None);
        assert_eq!(patch.start_date, None);

        let patch: UpdateCardPayload = serde_json::from_str(r#"{"parent_card_id":7}"#).unwrap();
        assert_eq!(patch.parent_card_id, Some(Some(7)));
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn test_priority_wire_values() {
        let payload: CreateCardPayload =
            serde_json::from_str(r#"{"list_id":1,"title":"t","priority":"alta"}"#).unwrap();
        assert_eq!(payload.priority, Some(Priority::High));
        assert_eq!(Priority::Low.as_str(), "baixa");
    }
}
