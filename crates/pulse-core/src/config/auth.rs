//! Token verification configuration.

use serde::{Deserialize, Serialize};

/// Settings for verifying externally-issued bearer tokens.
///
/// Pulse only verifies tokens; issuance lives in the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret used to verify token signatures.
    pub jwt_secret: String,
    /// Clock-skew leeway in seconds applied to expiry validation.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
}

fn default_leeway() -> u64 {
    5
}
