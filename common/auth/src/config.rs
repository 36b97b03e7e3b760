/// Runtime configuration for token issuance and verification.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Lifetime of issued tokens in seconds.
    pub ttl_seconds: i64,
    /// Allowable clock skew in seconds when validating exp.
    pub leeway_seconds: u32,
}

impl TokenConfig {
    /// Construct config with the default 24 hour lifetime and 30 second leeway.
    pub fn new() -> Self {
        Self {
            ttl_seconds: 86_400,
            leeway_seconds: 30,
        }
    }

    pub fn with_ttl(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::new()
    }
}
