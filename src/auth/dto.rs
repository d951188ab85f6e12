use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ValidationErrors};
use crate::users::dto::{validate_new_user, CreateUser, UserResource};
use crate::validation::{check_email, normalize_email, required};

/// Email and password as typed at login, email already normalized.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Request body for registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

impl RegisterRequest {
    pub fn validate(self) -> AppResult<CreateUser> {
        let (input, mut errors) = validate_new_user(
            self.name.as_deref(),
            self.email.as_deref(),
            self.password.as_deref(),
        );
        if !input.password.is_empty()
            && self.password_confirmation.as_deref() != Some(input.password.as_str())
        {
            errors.add("password", "The password field confirmation does not match.");
        }
        errors.into_result()?;
        Ok(input)
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn validate(self) -> AppResult<Credentials> {
        let mut errors = ValidationErrors::new();

        let email = required(&mut errors, "email", self.email.as_deref())
            .map(normalize_email)
            .unwrap_or_default();
        if !email.is_empty() {
            check_email(&mut errors, &email);
        }
        let password = required(&mut errors, "password", self.password.as_deref())
            .unwrap_or_default()
            .to_string();

        errors.into_result()?;
        Ok(Credentials { email, password })
    }
}

/// Response returned after register or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResource,
    pub token: String,
}
