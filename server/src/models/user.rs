use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{is_valid_email, presence, ValidationErrors};

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub gender: Option<String>,
    pub time_zone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn initial(&self) -> String {
        self.first_name
            .chars()
            .next()
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_else(|| "U".to_string())
    }
}

/// Sign-up data; the password is hashed before it reaches the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SignupForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_email(&self.email, &mut errors);
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add(
                "password",
                format!("is too short (minimum is {MIN_PASSWORD_LENGTH} characters)"),
            );
        }
        if self.password != self.password_confirmation {
            errors.add("password_confirmation", "doesn't match Password");
        }
        validate_names(&self.first_name, &self.last_name, &mut errors);
        errors.into_result()
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProfileInput {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub gender: String,
}

impl ProfileInput {
    pub fn from_user(user: &User) -> Self {
        ProfileInput {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone().unwrap_or_default(),
            gender: user.gender.clone().unwrap_or_default(),
        }
    }

    /// Trims every field and lowercases the email.
    pub fn normalized(&self) -> ProfileInput {
        ProfileInput {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            phone_number: self.phone_number.trim().to_string(),
            gender: self.gender.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_names(&self.first_name, &self.last_name, &mut errors);
        validate_email(&self.email, &mut errors);
        errors.into_result()
    }

    pub fn phone_number_value(&self) -> Option<String> {
        presence(&self.phone_number)
    }

    pub fn gender_value(&self) -> Option<String> {
        presence(&self.gender)
    }
}

fn validate_email(email: &str, errors: &mut ValidationErrors) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", "can't be blank");
    } else if !is_valid_email(email) {
        errors.add("email", "is invalid");
    }
}

fn validate_names(first_name: &str, last_name: &str, errors: &mut ValidationErrors) {
    if first_name.trim().is_empty() {
        errors.add("first_name", "can't be blank");
    }
    if last_name.trim().is_empty() {
        errors.add("last_name", "can't be blank");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> SignupForm {
        SignupForm {
            email: "grace@example.com".into(),
            password: "hopper123".into(),
            password_confirmation: "hopper123".into(),
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
        }
    }

    #[test]
    fn test_valid_signup() {
        assert!(signup().validate().is_ok());
    }

    #[test]
    fn test_signup_rejects_short_and_mismatched_passwords() {
        let mut form = signup();
        form.password = "abc".into();
        let errors = form.validate().unwrap_err();
        assert!(errors.has("password"));
        assert!(errors.has("password_confirmation"));
    }

    #[test]
    fn test_profile_requires_names() {
        let profile = ProfileInput {
            email: "x@y.io".into(),
            ..ProfileInput::default()
        };
        let errors = profile.validate().unwrap_err();
        assert!(errors.has("first_name"));
        assert!(errors.has("last_name"));
        assert!(!errors.has("email"));
    }
}
