//! Connection gatekeeping — validates externally-issued bearer tokens.
//!
//! Pulse never issues tokens; it verifies signatures against the shared
//! secret and nothing else. A rejected token closes the transport before
//! any presence state is touched.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use pulse_core::config::auth::AuthConfig;
use pulse_core::error::AppError;
use pulse_core::types::id::UserId;

/// Claims Pulse cares about in the platform's access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user id claiming the connection.
    pub sub: String,
    /// Expiry, seconds since epoch.
    pub exp: u64,
    /// Token id, when the issuer sets one.
    #[serde(default)]
    pub jti: Option<String>,
}

/// Verifies HS256 tokens against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenVerifier {
    /// Creates a verifier from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decode and validate a token string.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AppError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::authentication("Token has expired")
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::authentication("Invalid token signature")
                }
                _ => AppError::authentication("Invalid token"),
            })
    }
}

/// An inbound connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Bearer token presented by the client.
    pub token: String,
    /// User ids the client wants to observe, beyond itself. The set is
    /// conversation-derived and authorized by the issuing service.
    pub watch: Vec<UserId>,
}

/// A connection that passed the gate. Registration into the pool and
/// registry is a separate explicit step, so auth failures never touch
/// presence state.
#[derive(Debug, Clone)]
pub struct AcceptedConnection {
    /// The authenticated user.
    pub user_id: UserId,
    /// Observed user ids from the connect request.
    pub watch: Vec<UserId>,
}

/// The connection gatekeeper.
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    /// Token verifier.
    verifier: TokenVerifier,
}

impl Gatekeeper {
    /// Creates a gatekeeper with the given verifier.
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }

    /// Authenticate a connection attempt.
    pub async fn accept(&self, request: ConnectRequest) -> Result<AcceptedConnection, AppError> {
        let claims = self.verifier.verify(&request.token)?;
        Ok(AcceptedConnection {
            user_id: UserId::new(claims.sub),
            watch: request.watch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jsonwebtoken::{EncodingKey, Header, encode};

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            leeway_seconds: 5,
        }
    }

    fn token(secret: &str, sub: &str, exp_offset: i64) -> String {
        let claims = TokenClaims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as u64,
            jti: None,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode")
    }

    #[tokio::test]
    async fn test_accept_valid_token() {
        let gate = Gatekeeper::new(TokenVerifier::new(&config()));
        let accepted = gate
            .accept(ConnectRequest {
                token: token("test-secret", "u1", 3600),
                watch: vec![UserId::new("u2")],
            })
            .await
            .expect("accept");
        assert_eq!(accepted.user_id, UserId::new("u1"));
        assert_eq!(accepted.watch, vec![UserId::new("u2")]);
    }

    #[tokio::test]
    async fn test_reject_bad_signature() {
        let gate = Gatekeeper::new(TokenVerifier::new(&config()));
        let err = gate
            .accept(ConnectRequest {
                token: token("wrong-secret", "u1", 3600),
                watch: vec![],
            })
            .await
            .expect_err("should reject");
        assert_eq!(err.kind, pulse_core::ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_reject_expired_token() {
        let gate = Gatekeeper::new(TokenVerifier::new(&config()));
        let err = gate
            .accept(ConnectRequest {
                token: token("test-secret", "u1", -3600),
                watch: vec![],
            })
            .await
            .expect_err("should reject");
        assert_eq!(err.kind, pulse_core::ErrorKind::Authentication);
        assert!(err.message.contains("expired"));
    }

    #[tokio::test]
    async fn test_reject_garbage_token() {
        let gate = Gatekeeper::new(TokenVerifier::new(&config()));
        let err = gate
            .accept(ConnectRequest {
                token: "not-a-jwt".to_string(),
                watch: vec![],
            })
            .await
            .expect_err("should reject");
        assert_eq!(err.kind, pulse_core::ErrorKind::Authentication);
    }
}
