use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::SecondsFormat;
use common_auth::Role;
use common_http_errors::{ApiError, ApiResult};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;
use uuid::Uuid;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub expires_at: String,
}

/// Well-formed argon2id hash that matches no password. Verified against on
/// the unknown-email login path to keep its cost equal to a real miss.
const PHANTOM_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHRzYWx0c2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[derive(FromRow)]
struct AuthRow {
    email: String,
    role: String,
    password_hash: String,
}

/// Registration doubles as implicit login: the fresh identity's token is
/// returned straight away.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let RegisterRequest {
        email,
        password,
        role,
    } = request;

    let email = email.trim().to_string();
    if email.is_empty() {
        return Err(ApiError::BadRequest {
            code: "EMPTY_EMAIL",
            message: Some("Email must not be empty".into()),
        });
    }

    let role: Role = role.parse().map_err(|_| ApiError::BadRequest {
        code: "UNSUPPORTED_ROLE",
        message: Some("Unsupported role. Allowed roles: ADMIN, DOCTOR, PATIENT".into()),
    })?;

    let password_hash = hash_password(&password)?;

    let inserted = sqlx::query("INSERT INTO users (id, email, role, password_hash) VALUES ($1, $2, $3, $4)")
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(role.as_str())
        .bind(password_hash)
        .execute(&state.db)
        .await;

    if let Err(err) = inserted {
        if is_unique_violation(&err) {
            return Err(ApiError::conflict(
                "DUPLICATE_EMAIL",
                "User with this email already exists.",
            ));
        }
        return Err(ApiError::internal(err));
    }

    let response = issue_token(&state, &email, role)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let LoginRequest { email, password } = request;

    let row = sqlx::query_as::<_, AuthRow>(
        "SELECT email, role, password_hash FROM users WHERE email = $1",
    )
    .bind(email.trim())
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::internal)?;

    // Unknown email and wrong password must be indistinguishable on the
    // wire and in timing, so a miss burns the same argon2 work.
    let Some(row) = row else {
        if let Ok(parsed) = PasswordHash::new(PHANTOM_HASH) {
            let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
        }
        state.metrics.login_attempt("unknown_email");
        return Err(ApiError::InvalidCredentials);
    };

    let parsed_hash = PasswordHash::new(&row.password_hash).map_err(ApiError::internal)?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        state.metrics.login_attempt("bad_password");
        return Err(ApiError::InvalidCredentials);
    }

    let role: Role = row.role.parse().map_err(|err| {
        warn!(email = %row.email, "stored role is not a known role");
        ApiError::internal(err)
    })?;

    let response = issue_token(&state, &row.email, role)?;
    state.metrics.login_attempt("success");
    Ok(Json(response))
}

fn issue_token(state: &AppState, email: &str, role: Role) -> ApiResult<AuthResponse> {
    let issued = state.signer.issue(email, role).map_err(ApiError::internal)?;
    Ok(AuthResponse {
        token: issued.token,
        token_type: issued.token_type,
        expires_in: issued.expires_in,
        expires_at: issued
            .expires_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

fn hash_password(password: &str) -> ApiResult<String> {
    if password.trim().is_empty() {
        return Err(ApiError::BadRequest {
            code: "EMPTY_PASSWORD",
            message: Some("Password must not be empty".into()),
        });
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(ApiError::internal)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_password_rejects_empty() {
        let err = hash_password("   ").expect_err("should reject");
        assert!(matches!(
            err,
            ApiError::BadRequest {
                code: "EMPTY_PASSWORD",
                ..
            }
        ));
    }

    #[test]
    fn hash_password_verifies_with_argon2() {
        let hash = hash_password("pw").expect("hash");
        let parsed = PasswordHash::new(&hash).expect("parse");
        assert!(Argon2::default()
            .verify_password(b"pw", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"other", &parsed)
            .is_err());
    }

    // The timing equalizer only works if the constant parses; a malformed
    // hash would skip the argon2 run and reopen the oracle.
    #[test]
    fn phantom_hash_parses_and_never_verifies() {
        let parsed = PasswordHash::new(PHANTOM_HASH).expect("parse");
        assert!(Argon2::default()
            .verify_password(b"anything", &parsed)
            .is_err());
    }
}
