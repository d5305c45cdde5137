use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Accepted username length, counted after trimming.
pub const USERNAME_LEN: RangeInclusive<usize> = 1..=32;
/// Accepted password length in characters.
pub const PASSWORD_LEN: RangeInclusive<usize> = 8..=128;

/// New account credentials.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    /// Login name for the engineer. Surrounding whitespace is ignored; the
    /// rest must be ASCII letters, digits or `_`.
    #[schema(example = "plant_eng", min_length = 1, max_length = 32)]
    pub username: String,
    #[schema(example = "s3cure_P@ss!", min_length = 8, max_length = 128)]
    pub password: String,
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn validate_register_request(payload: &RegisterRequest) -> Result<(), AppError> {
    let username = payload.username.trim();
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(AppError::Validation(format!(
            "username: expected {} to {} characters",
            USERNAME_LEN.start(),
            USERNAME_LEN.end()
        )));
    }
    if let Some(bad) = username.chars().find(|&c| !is_username_char(c)) {
        return Err(AppError::Validation(format!(
            "username: {bad:?} is not allowed, use A-Z, a-z, 0-9 or _"
        )));
    }
    if !PASSWORD_LEN.contains(&payload.password.chars().count()) {
        return Err(AppError::Validation(format!(
            "password: expected {} to {} characters",
            PASSWORD_LEN.start(),
            PASSWORD_LEN.end()
        )));
    }
    Ok(())
}

/// Credentials exchanged for a bearer token.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[schema(example = "plant_eng")]
    pub username: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "username and password are both required".into(),
        ));
    }
    Ok(())
}

/// The account that was just created.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    #[schema(example = 42)]
    pub id: i32,
    /// Stored form of the name, without surrounding whitespace.
    #[schema(example = "plant_eng")]
    pub username: String,
}

impl From<crate::entity::user::Model> for RegisterResponse {
    fn from(user: crate::entity::user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// HS256 token for the `Authorization: Bearer` header. Expires after
    /// `auth.token_ttl_hours`.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    #[schema(example = "plant_eng")]
    pub username: String,
}

/// Identity carried by the presented token.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "plant_eng")]
    pub username: String,
}
