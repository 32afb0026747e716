pub mod comment;
pub mod event;
pub mod registration;
pub mod review;
pub mod rundown_item;
pub mod user;

pub use comment::{Comment, CommentWithAuthor};
pub use event::{Event, EventForm, EventInput, EventStatus, EventSummary};
pub use registration::{NewRegistration, Registration, RegistrationStatus};
pub use review::{Review, ReviewInput, ReviewWithAuthor};
pub use rundown_item::{RundownItem, RundownItemInput};
pub use user::{NewUser, ProfileInput, SignupForm, User};

use thiserror::Error;

use crate::utils::error::AppError;

/// Raised when a status column holds a value outside its enum.
#[derive(Debug, Error)]
#[error("unknown {kind} status '{value}'")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

/// Per-field validation messages, rendered inline on forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    entries: Vec<(&'static str, String)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.entries.push((field, message.into()));
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.entries.iter().any(|(f, _)| *f == field)
    }

    /// First message for a field, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    /// Messages prefixed with a humanized field name, e.g. "Ends at must be after the start date".
    pub fn full_messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(field, message)| format!("{} {}", humanize(field), message))
            .collect()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationError(errors.full_messages().join(", "))
    }
}

fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Trims a form value, turning blank input into `None`.
pub fn presence(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Case-insensitive comparison matching Postgres `LOWER(a) = LOWER(b)`.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Loose email check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
