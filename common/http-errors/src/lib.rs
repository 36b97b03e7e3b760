use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Request-boundary error surface. Every failure in the system ends up as
/// one of these; none is process-fatal.
#[derive(Debug)]
pub enum ApiError {
    /// No identity on a protected operation (missing, invalid, or expired
    /// credential).
    Unauthenticated { message: Option<String> },
    /// Valid identity, insufficient role.
    Forbidden { required: Vec<&'static str> },
    /// Login/registration credential mismatch. One constructor so unknown
    /// email and wrong password are byte-identical on the wire.
    InvalidCredentials,
    /// Caller must change input: double booking, duplicate email.
    Conflict { code: &'static str, message: String },
    BadRequest { code: &'static str, message: Option<String> },
    NotFound { code: &'static str, message: String },
    /// Store or other infrastructure failure. The detail is logged, never
    /// sent to the client.
    Internal,
}

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials. Please try again.";

impl ApiError {
    pub fn unauthenticated() -> Self {
        Self::Unauthenticated { message: None }
    }

    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        error!(%err, "internal failure surfaced as 500");
        Self::Internal
    }

    pub fn bad_request(code: &'static str) -> Self {
        Self::BadRequest {
            code,
            message: None,
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthenticated { message } => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "UNAUTHENTICATED".into(),
                    required_roles: None,
                    message: message.or_else(|| Some("Authentication required.".into())),
                },
            ),
            ApiError::Forbidden { required } => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "FORBIDDEN".into(),
                    required_roles: Some(required.iter().map(|r| r.to_string()).collect()),
                    message: Some("Insufficient role for this operation.".into()),
                },
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "INVALID_CREDENTIALS".into(),
                    required_roles: None,
                    message: Some(INVALID_CREDENTIALS_MESSAGE.into()),
                },
            ),
            ApiError::Conflict { code, message } => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: code.into(),
                    required_roles: None,
                    message: Some(message),
                },
            ),
            ApiError::BadRequest { code, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: code.into(),
                    required_roles: None,
                    message,
                },
            ),
            ApiError::NotFound { code, message } => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: code.into(),
                    required_roles: None,
                    message: Some(message),
                },
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    code: "internal_error".into(),
                    required_roles: None,
                    message: Some("An unexpected error occurred.".into()),
                },
            ),
        };

        let code = body.code.clone();
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(&code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn invalid_credentials_is_identical_regardless_of_cause() {
        let unknown_email = ApiError::InvalidCredentials.into_response();
        let wrong_password = ApiError::InvalidCredentials.into_response();
        assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(unknown_email).await,
            body_json(wrong_password).await
        );
    }

    #[tokio::test]
    async fn forbidden_reports_required_roles() {
        let resp = ApiError::Forbidden {
            required: vec!["ADMIN"],
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            resp.headers().get("X-Error-Code").unwrap(),
            &HeaderValue::from_static("FORBIDDEN")
        );
        let json = body_json(resp).await;
        assert_eq!(json["required_roles"][0], "ADMIN");
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_detail() {
        let resp = ApiError::internal("connection refused to db-host:5432").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert!(!json["message"].as_str().unwrap().contains("db-host"));
    }
}
