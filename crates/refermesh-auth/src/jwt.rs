//! HS256 JWT issue and verify.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use refermesh_types::UserRole;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Claims carried in access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user id.
    pub sub: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_lifetime: Duration,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_lifetime: Duration::hours(24),
        }
    }

    pub fn issue(&self, user_id: Uuid, role: UserRole) -> AuthResult<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.token_lifetime).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> AuthResult<(Uuid, UserRole)> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &Validation::default())?;
        let user_id = data
            .claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| AuthError::InvalidToken)?;
        Ok((user_id, data.claims.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify_round_trips() {
        let svc = JwtService::new("test-secret-key-at-least-32-bytes!!");
        let user_id = Uuid::new_v4();

        let token = svc.issue(user_id, UserRole::Agent).unwrap();
        let (verified_id, role) = svc.verify(&token).unwrap();

        assert_eq!(verified_id, user_id);
        assert_eq!(role, UserRole::Agent);
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let issuer = JwtService::new("secret-one-secret-one-secret-one!");
        let verifier = JwtService::new("secret-two-secret-two-secret-two!");

        let token = issuer.issue(Uuid::new_v4(), UserRole::BrokerAdmin).unwrap();
        assert!(matches!(verifier.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn verify_rejects_garbage() {
        let svc = JwtService::new("test-secret-key-at-least-32-bytes!!");
        assert!(svc.verify("not.a.token").is_err());
    }
}
