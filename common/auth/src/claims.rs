use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Application-focused representation of a verified token payload.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    /// The subject's email address.
    pub subject: String,
    /// Role embedded at issuance. Absent on tokens minted before roles were
    /// added to the payload; the gate falls back to a store lookup then.
    pub role: Option<Role>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    #[serde(default)]
    role: Option<String>,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        if value.sub.trim().is_empty() {
            return Err(AuthError::InvalidClaim("sub", value.sub));
        }

        let role = match value.role {
            Some(raw) => Some(
                raw.parse::<Role>()
                    .map_err(|_| AuthError::InvalidClaim("role", raw))?,
            ),
            None => None,
        };

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            subject: value.sub,
            role,
            expires_at,
            issued_at,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value)
            .map_err(|err| AuthError::Malformed(err.to_string()))?;
        Claims::try_from(repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_payload() {
        let claims = Claims::try_from(json!({
            "sub": "a@x.com",
            "role": "PATIENT",
            "exp": 1_900_000_000i64,
            "iat": 1_899_990_000i64,
        }))
        .expect("claims");
        assert_eq!(claims.subject, "a@x.com");
        assert_eq!(claims.role, Some(Role::Patient));
        assert!(claims.issued_at.is_some());
    }

    #[test]
    fn role_is_optional() {
        let claims = Claims::try_from(json!({
            "sub": "a@x.com",
            "exp": 1_900_000_000i64,
        }))
        .expect("claims");
        assert_eq!(claims.role, None);
    }

    #[test]
    fn rejects_unknown_role() {
        let err = Claims::try_from(json!({
            "sub": "a@x.com",
            "role": "RECEPTIONIST",
            "exp": 1_900_000_000i64,
        }))
        .expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidClaim("role", _)));
    }

    #[test]
    fn rejects_empty_subject() {
        let err = Claims::try_from(json!({
            "sub": "  ",
            "exp": 1_900_000_000i64,
        }))
        .expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidClaim("sub", _)));
    }
}
