use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::filters::FilterParams;
use super::repo_types::User;
use crate::error::{AppResult, ValidationErrors};
use crate::pagination::PageRequest;
use crate::validation::{check_email, check_name, check_password, normalize_email, required};

/// Public projection of a user. Credentials never leave the service.
#[derive(Debug, Clone, Serialize)]
pub struct UserResource {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub email_verified_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl From<User> for UserResource {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            email_verified_at: u.email_verified_at,
            created_at: u.created_at,
            updated_at: u.updated_at,
            deleted_at: u.deleted_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Validated input for a new user; the password is still plaintext here.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for `POST /users`.
#[derive(Debug, Deserialize)]
pub struct StoreUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl StoreUserRequest {
    pub fn validate(self) -> AppResult<CreateUser> {
        let (input, errors) = validate_new_user(
            self.name.as_deref(),
            self.email.as_deref(),
            self.password.as_deref(),
        );
        errors.into_result()?;
        Ok(input)
    }
}

/// Shared by user creation and registration. The returned input is only
/// meaningful when the errors are empty.
pub(crate) fn validate_new_user(
    name: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
) -> (CreateUser, ValidationErrors) {
    let mut errors = ValidationErrors::new();

    let name = required(&mut errors, "name", name).map(str::trim).unwrap_or_default();
    if !name.is_empty() {
        check_name(&mut errors, name);
    }

    let email = required(&mut errors, "email", email)
        .map(normalize_email)
        .unwrap_or_default();
    if !email.is_empty() {
        check_email(&mut errors, &email);
    }

    let password = required(&mut errors, "password", password).unwrap_or_default();
    if !password.is_empty() {
        check_password(&mut errors, password);
    }

    (
        CreateUser {
            name: name.to_string(),
            email,
            password: password.to_string(),
        },
        errors,
    )
}

/// Request body for `PUT /users/:id`. Every field is optional, but a field
/// that is sent must satisfy the creation rules.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(self) -> AppResult<UpdateUser> {
        let mut errors = ValidationErrors::new();
        let mut input = UpdateUser::default();

        if let Some(name) = required_if_present(&mut errors, "name", self.name) {
            let name = name.trim().to_string();
            check_name(&mut errors, &name);
            input.name = Some(name);
        }
        if let Some(email) = required_if_present(&mut errors, "email", self.email) {
            let email = normalize_email(&email);
            check_email(&mut errors, &email);
            input.email = Some(email);
        }
        if let Some(password) = required_if_present(&mut errors, "password", self.password) {
            check_password(&mut errors, &password);
            input.password = Some(password);
        }

        errors.into_result()?;
        Ok(input)
    }
}

fn required_if_present(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<String>,
) -> Option<String> {
    let value = value?;
    required(errors, field, Some(&value))?;
    Some(value)
}

const TRASHED_VALUES: [&str; 4] = ["true", "false", "1", "0"];

/// Validates the raw listing query string and returns the parameters the
/// filter pipeline runs on.
pub fn validate_index_params(mut raw: HashMap<String, String>) -> AppResult<FilterParams> {
    let mut errors = ValidationErrors::new();

    if let Err(e) = PageRequest::parse(
        raw.get("page").map(String::as_str),
        raw.get("per_page").map(String::as_str),
    ) {
        errors.merge(e);
    }

    if let Some(trashed) = raw.get("trashed") {
        if !TRASHED_VALUES.contains(&trashed.as_str()) {
            errors.add("trashed", "The trashed field must be true, false, 1 or 0.");
        }
    }

    if let Some(search) = raw.get_mut("search") {
        *search = search.trim().to_string();
    }

    errors.into_result()?;
    Ok(FilterParams::from(raw))
}
