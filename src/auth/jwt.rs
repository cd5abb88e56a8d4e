//! JWT issue and validation for access and refresh tokens.

use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which secret signed a token and what it may be exchanged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub typ: TokenKind,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKeys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Mints and verifies the two token kinds, each with its own secret and lifetime.
#[derive(Clone)]
pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
}

impl TokenIssuer {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access: SigningKeys::new(access_secret, access_ttl),
            refresh: SigningKeys::new(refresh_secret, refresh_ttl),
        }
    }

    pub fn issue_access_token(&self, user_id: Uuid) -> AppResult<String> {
        self.issue(TokenKind::Access, user_id)
    }

    pub fn issue_refresh_token(&self, user_id: Uuid) -> AppResult<String> {
        self.issue(TokenKind::Refresh, user_id)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Uuid> {
        self.verify(TokenKind::Access, token)
    }

    pub fn verify_refresh_token(&self, token: &str) -> AppResult<Uuid> {
        self.verify(TokenKind::Refresh, token)
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn issue(&self, kind: TokenKind, user_id: Uuid) -> AppResult<String> {
        let keys = self.keys(kind);
        let now = Utc::now();
        let exp = now
            .checked_add_signed(keys.ttl)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token lifetime out of range")))?;
        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
            typ: kind,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("sign token: {}", e)))?;
        Ok(token)
    }

    fn verify(&self, kind: TokenKind, token: &str) -> AppResult<Uuid> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::InvalidToken("Token expired".to_string()),
                _ => AppError::InvalidToken("Invalid token".to_string()),
            }
        })?;
        if data.claims.typ != kind {
            return Err(AppError::InvalidToken("Wrong token type".to_string()));
        }
        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::InvalidToken("Invalid token subject".to_string()))?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            "test-access-secret",
            "test-refresh-secret",
            Duration::minutes(15),
            Duration::days(10),
        )
    }

    #[test]
    fn issued_tokens_verify_to_their_user() {
        let tokens = issuer();
        let user_id = Uuid::new_v4();
        let access = tokens.issue_access_token(user_id).unwrap();
        let refresh = tokens.issue_refresh_token(user_id).unwrap();
        assert_eq!(tokens.verify_access_token(&access).unwrap(), user_id);
        assert_eq!(tokens.verify_refresh_token(&refresh).unwrap(), user_id);
    }

    #[test]
    fn tokens_issued_back_to_back_differ() {
        let tokens = issuer();
        let user_id = Uuid::new_v4();
        let a = tokens.issue_refresh_token(user_id).unwrap();
        let b = tokens.issue_refresh_token(user_id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let tokens = issuer();
        let user_id = Uuid::new_v4();
        let access = tokens.issue_access_token(user_id).unwrap();
        let refresh = tokens.issue_refresh_token(user_id).unwrap();
        assert!(matches!(
            tokens.verify_refresh_token(&access),
            Err(AppError::InvalidToken(_))
        ));
        assert!(matches!(
            tokens.verify_access_token(&refresh),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = issuer();
        let refresh = tokens.issue_refresh_token(Uuid::new_v4()).unwrap();
        let mut parts: Vec<&str> = refresh.split('.').collect();
        let forged_payload = parts[1].chars().rev().collect::<String>();
        parts[1] = &forged_payload;
        let forged = parts.join(".");
        assert!(matches!(
            tokens.verify_refresh_token(&forged),
            Err(AppError::InvalidToken(_))
        ));

        let other = tokens.issue_refresh_token(Uuid::new_v4()).unwrap();
        let other_sig = other.rsplit('.').next().unwrap();
        let (signed_part, _) = refresh.rsplit_once('.').unwrap();
        let spliced = format!("{}.{}", signed_part, other_sig);
        assert!(tokens.verify_refresh_token(&spliced).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = TokenIssuer::new("x", "y", Duration::minutes(15), Duration::days(10));
        let refresh = other.issue_refresh_token(Uuid::new_v4()).unwrap();
        assert!(issuer().verify_refresh_token(&refresh).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let expired = TokenIssuer::new(
            "test-access-secret",
            "test-refresh-secret",
            Duration::minutes(15),
            Duration::seconds(-10),
        );
        let refresh = expired.issue_refresh_token(Uuid::new_v4()).unwrap();
        match issuer().verify_refresh_token(&refresh) {
            Err(AppError::InvalidToken(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("expected expiry failure, got {:?}", other),
        }
    }

    #[test]
    fn lifetime_past_calendar_range_is_an_error() {
        let far = TokenIssuer::new(
            "test-access-secret",
            "test-refresh-secret",
            Duration::days(365 * 300_000),
            Duration::days(10),
        );
        assert!(matches!(
            far.issue_access_token(Uuid::new_v4()),
            Err(AppError::Internal(_))
        ));
    }
}
