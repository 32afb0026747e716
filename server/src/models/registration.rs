use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{eq_ignore_case, is_valid_email, presence, UnknownStatus, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    CheckedIn,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::CheckedIn => "checked_in",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "registered" => Some(RegistrationStatus::Registered),
            "checked_in" => Some(RegistrationStatus::CheckedIn),
            "cancelled" => Some(RegistrationStatus::Cancelled),
            _ => None,
        }
    }

    /// Active registrations count against capacity.
    pub fn is_active(self) -> bool {
        self != RegistrationStatus::Cancelled
    }
}

impl TryFrom<String> for RegistrationStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RegistrationStatus::parse(&value).ok_or(UnknownStatus {
            kind: "registration",
            value,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub name: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: RegistrationStatus,
    pub check_in_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_checked_in(&self) -> bool {
        self.status == RegistrationStatus::CheckedIn
    }

    pub fn belongs_to_email(&self, email: &str) -> bool {
        eq_ignore_case(&self.email, email.trim())
    }

    /// Name shown on attendee lists, falling back to the email's local part.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or(&self.email)
                .to_string(),
        }
    }

    /// Status after an organizer presses the check-in button.
    pub fn toggled_check_in(&self) -> RegistrationStatus {
        if self.is_checked_in() {
            RegistrationStatus::Registered
        } else {
            RegistrationStatus::CheckedIn
        }
    }
}

/// A validated RSVP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub email: String,
    pub name: Option<String>,
    pub user_id: Option<Uuid>,
}

impl NewRegistration {
    /// Normalizes the email (trimmed, lowercased) and validates its format.
    pub fn parse(
        email: &str,
        name: Option<&str>,
        user_id: Option<Uuid>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            errors.add("email", "can't be blank");
        } else if !is_valid_email(&email) {
            errors.add("email", "is invalid");
        }
        errors.into_result().map(|()| NewRegistration {
            email,
            name: name.and_then(presence),
            user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_email() {
        let registration = NewRegistration::parse("  Ada@Example.COM ", Some(" Ada "), None).unwrap();
        assert_eq!(registration.email, "ada@example.com");
        assert_eq!(registration.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_parse_rejects_invalid_email() {
        let errors = NewRegistration::parse("not-an-email", None, None).unwrap_err();
        assert_eq!(errors.get("email"), Some("is invalid"));

        let errors = NewRegistration::parse("   ", None, None).unwrap_err();
        assert_eq!(errors.get("email"), Some("can't be blank"));
    }

    #[test]
    fn test_cancelled_is_not_active() {
        assert!(RegistrationStatus::Registered.is_active());
        assert!(RegistrationStatus::CheckedIn.is_active());
        assert!(!RegistrationStatus::Cancelled.is_active());
        assert_eq!(
            RegistrationStatus::try_from("checked_in".to_string()).unwrap(),
            RegistrationStatus::CheckedIn
        );
        assert!(RegistrationStatus::try_from("gone".to_string()).is_err());
    }
}
