use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::config::TokenConfig;
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Mints self-contained HS256 bearer tokens. The signing secret is loaded
/// once at startup and the signer is shared by reference; no key material is
/// read after construction.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    config: TokenConfig,
}

pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
    pub token_type: &'static str,
}

#[derive(Serialize)]
struct AccessClaims<'a> {
    sub: &'a str,
    role: &'static str,
    exp: i64,
    iat: i64,
}

impl TokenSigner {
    pub fn new(secret: &[u8], config: TokenConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            config,
        }
    }

    pub fn issue(&self, email: &str, role: Role) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.ttl_seconds);

        let claims = AccessClaims {
            sub: email,
            role: role.as_str(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: self.config.ttl_seconds,
            token_type: "Bearer",
        })
    }
}
