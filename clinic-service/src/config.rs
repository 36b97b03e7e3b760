use anyhow::{anyhow, Context, Result};
use std::env;

/// Process-wide configuration, loaded once at startup and handed to the
/// components that need it. Never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ClinicConfig {
    /// HMAC secret for signing and verifying bearer tokens.
    pub jwt_secret: String,
    /// Token lifetime in seconds (default 24 hours).
    pub token_ttl_seconds: i64,
    /// When set, a verified token is still rejected unless its subject
    /// exists in the credential store.
    pub strict_subject: bool,
}

pub fn load_clinic_config() -> Result<ClinicConfig> {
    let jwt_secret = env::var("CLINIC_JWT_SECRET")
        .context("CLINIC_JWT_SECRET must be set")?;
    if jwt_secret.trim().is_empty() {
        return Err(anyhow!("CLINIC_JWT_SECRET must not be empty"));
    }

    let token_ttl_seconds = match env::var("CLINIC_TOKEN_TTL_SECONDS") {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|err| anyhow!("Invalid CLINIC_TOKEN_TTL_SECONDS '{raw}': {err}"))
            .and_then(|ttl| {
                if ttl > 0 {
                    Ok(ttl)
                } else {
                    Err(anyhow!("CLINIC_TOKEN_TTL_SECONDS must be positive"))
                }
            })?,
        Err(_) => 86_400,
    };

    let strict_subject = bool_from_env("CLINIC_STRICT_SUBJECT").unwrap_or(false);

    Ok(ClinicConfig {
        jwt_secret,
        token_ttl_seconds,
        strict_subject,
    })
}

fn bool_from_env(key: &str) -> Option<bool> {
    env::var(key).ok().map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}
