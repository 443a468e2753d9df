//! Bearer token authentication
//!
//! Every study endpoint runs behind `require_user`, which verifies an HS256
//! JWT and exposes the caller's id to handlers as an `AuthUser` extension.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::server::state::AppState;

/// Claims the server relies on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Expiry (seconds since the epoch)
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

/// Verifies tokens against the configured secret
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        match &config.audience {
            Some(audience) => {
                validation.set_required_spec_claims(&["exp", "sub", "aud"]);
                validation.set_audience(&[audience]);
            }
            None => {
                validation.set_required_spec_claims(&["exp", "sub"]);
                validation.validate_aud = false;
            }
        }

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decode and validate a raw token
    pub fn verify(&self, token: &str) -> Result<AuthUser> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| Error::Unauthenticated(format!("Invalid or expired token: {}", e)))?;

        let user_id = data.claims.sub.trim();
        if user_id.is_empty() {
            return Err(Error::Unauthenticated("Token has an empty subject".to_string()));
        }
        Ok(AuthUser {
            user_id: user_id.to_string(),
        })
    }

    /// Extract and verify the token in an `Authorization: Bearer` header value
    pub fn verify_header(&self, header: Option<&str>) -> Result<AuthUser> {
        let header = header.ok_or_else(|| Error::Unauthenticated("Missing authorization token".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Unauthenticated("Expected a Bearer token".to_string()))?;
        self.verify(token)
    }
}

/// Middleware rejecting requests without a valid bearer token
pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response> {
    let header = req.headers().get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    let user = state.verifier().verify_header(header)?;

    tracing::debug!("Authenticated user {}", user.user_id);
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| Error::Unauthenticated("Missing authorization token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret-key-for-testing-only-min-32-chars";

    fn config(audience: Option<&str>) -> AuthConfig {
        AuthConfig {
            jwt_secret: SECRET.to_string(),
            audience: audience.map(str::to_string),
            leeway_secs: 0,
        }
    }

    fn token(sub: &str, exp_offset: i64, aud: Option<&str>, secret: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as u64,
            aud: aud.map(str::to_string),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let verifier = TokenVerifier::new(&config(None));
        let header = format!("Bearer {}", token("user-1", 3600, None, SECRET));
        assert_eq!(verifier.verify_header(Some(&header)).unwrap().user_id, "user-1");
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let verifier = TokenVerifier::new(&config(None));
        let expired = token("user-1", -3600, None, SECRET);
        let forged = token("user-1", 3600, None, "another-secret-that-is-long-enough!!");

        for header in [
            None,
            Some("Basic abc".to_string()),
            Some("Bearer ".to_string()),
            Some(format!("Bearer {}", expired)),
            Some(format!("Bearer {}", forged)),
            Some(format!("Bearer {}", token("  ", 3600, None, SECRET))),
        ] {
            let err = verifier.verify_header(header.as_deref()).unwrap_err();
            assert!(matches!(err, Error::Unauthenticated(_)), "{:?}", header);
        }
    }

    #[test]
    fn test_audience_is_checked_when_configured() {
        let verifier = TokenVerifier::new(&config(Some("authenticated")));
        assert!(verifier.verify(&token("u", 3600, Some("authenticated"), SECRET)).is_ok());
        assert!(verifier.verify(&token("u", 3600, Some("anon"), SECRET)).is_err());
        assert!(verifier.verify(&token("u", 3600, None, SECRET)).is_err());
    }
}
