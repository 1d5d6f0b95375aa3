use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rand_core::OsRng;
use tracing::{error, info};
use uuid::Uuid;

use tally_db::Database;
use tally_gateway::dispatcher::Dispatcher;
use tally_types::api::{Claims, LoginRequest, LoginResponse, SignUpRequest, SignUpResponse};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
}

pub const MIN_PASSWORD_LEN: usize = 6;

/// Message for any failed sign-in, so unknown emails and wrong passwords
/// look the same.
pub const INVALID_CREDENTIALS: &str = "Invalid login credentials";

pub const ALREADY_REGISTERED: &str = "User already registered";

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("Unable to validate email address: invalid format".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password should be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let profile = req.profile;

    let (user_id, token) = run_blocking(&state, move |state| {
        if state.db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::Conflict(ALREADY_REGISTERED.into()));
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
            .to_string();

        // A concurrent sign-up can still win the race to the insert
        let user_id = Uuid::new_v4();
        if !state
            .db
            .create_user(&user_id.to_string(), &email, &password_hash, profile)?
        {
            return Err(ApiError::Conflict(ALREADY_REGISTERED.into()));
        }

        let token = issue_token(&state.jwt_secret, user_id, &email, profile)?;
        info!("User registered: {} as {}", email, profile);
        Ok((user_id, token))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user_id,
            profile,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();

    let response = run_blocking(&state, move |state| {
        let user = state
            .db
            .get_user_by_email(&email)?
            .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.into()))?;

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash for {}: {}", user.id, e)))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized(INVALID_CREDENTIALS.into()))?;

        let user_id: Uuid = user
            .id
            .parse()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id {}: {}", user.id, e)))?;
        let profile = user.profile()?;

        let token = issue_token(&state.jwt_secret, user_id, &user.email, profile)?;
        Ok(LoginResponse {
            user_id,
            email: user.email,
            profile,
            token,
        })
    })
    .await?;

    info!("{} signed in as {}", response.email, response.profile);
    Ok(Json(response))
}

fn issue_token(secret: &str, user_id: Uuid, email: &str, profile: tally_types::Person) -> Result<String, ApiError> {
    Claims::new(user_id, email, profile)
        .issue(secret)
        .map_err(|e| ApiError::Internal(e.into()))
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && email.len() <= 254,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_email() {
        assert!(is_plausible_email("filipe@example.com"));
        assert!(!is_plausible_email("filipe"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("filipe@localhost"));
    }
}
