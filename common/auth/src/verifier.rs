use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::TokenConfig;
use crate::error::AuthResult;
use crate::roles::Role;

/// Validates bearer tokens against the shared signing secret.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8], config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds.into();
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verifies signature integrity and expiry, then parses the payload into
    /// typed claims.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let token_data = decode::<Value>(token, &self.decoding_key, &self.validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(subject = %claims.subject, "verified bearer token");
        Ok(claims)
    }

    /// Verified read of the embedded role claim. Spares the caller a
    /// credential-store lookup when the role is already in the payload.
    pub fn extract_role(&self, token: &str) -> AuthResult<Option<Role>> {
        Ok(self.verify(token)?.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::roles::ALL_ROLES;
    use crate::signer::TokenSigner;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    const SECRET: &[u8] = b"test-secret-key";

    fn signer() -> TokenSigner {
        TokenSigner::new(SECRET, TokenConfig::new())
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(SECRET, &TokenConfig::new())
    }

    #[test]
    fn issue_then_verify_round_trips_email_and_role() {
        let signer = signer();
        let verifier = verifier();

        for role in ALL_ROLES {
            let issued = signer.issue("someone@clinic.test", role).expect("issue");
            let claims = verifier.verify(&issued.token).expect("verify");
            assert_eq!(claims.subject, "someone@clinic.test");
            assert_eq!(claims.role, Some(role));
            // The exp claim carries whole seconds only.
            assert_eq!(claims.expires_at.timestamp(), issued.expires_at.timestamp());
        }
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        // Correctly signed, already past its exp.
        let signer = TokenSigner::new(SECRET, TokenConfig::new().with_ttl(-600));
        let verifier = TokenVerifier::new(SECRET, &TokenConfig::new().with_leeway(0));

        let issued = signer.issue("late@clinic.test", Role::Patient).expect("issue");
        let err = verifier.verify(&issued.token).expect_err("must fail");
        assert!(matches!(err, AuthError::Expired), "got {err:?}");
    }

    #[test]
    fn altered_payload_is_rejected_as_bad_signature() {
        let signer = signer();
        let verifier = verifier();

        let issued = signer.issue("victim@clinic.test", Role::Patient).expect("issue");
        let mut parts = issued.token.split('.');
        let header = parts.next().expect("header");
        let payload = parts.next().expect("payload");
        let signature = parts.next().expect("signature");

        // Escalate the embedded role, keep the original signature.
        let decoded = URL_SAFE_NO_PAD.decode(payload).expect("decode payload");
        let tampered_json = String::from_utf8(decoded)
            .expect("utf8")
            .replace("PATIENT", "ADMIN");
        let tampered_payload = URL_SAFE_NO_PAD.encode(tampered_json.as_bytes());
        let forged = format!("{header}.{tampered_payload}.{signature}");

        let err = verifier.verify(&forged).expect_err("must fail");
        assert!(matches!(err, AuthError::BadSignature), "got {err:?}");
    }

    #[test]
    fn wrong_secret_is_rejected_as_bad_signature() {
        let signer = signer();
        let verifier = TokenVerifier::new(b"some-other-secret", &TokenConfig::new());

        let issued = signer.issue("someone@clinic.test", Role::Admin).expect("issue");
        let err = verifier.verify(&issued.token).expect_err("must fail");
        assert!(matches!(err, AuthError::BadSignature), "got {err:?}");
    }

    #[test]
    fn garbage_is_rejected_as_malformed() {
        let err = verifier().verify("not-a-token").expect_err("must fail");
        assert!(matches!(err, AuthError::Malformed(_)), "got {err:?}");
    }

    #[test]
    fn extract_role_returns_embedded_role() {
        let issued = signer().issue("dr@clinic.test", Role::Doctor).expect("issue");
        let role = verifier().extract_role(&issued.token).expect("extract");
        assert_eq!(role, Some(Role::Doctor));
    }
}
