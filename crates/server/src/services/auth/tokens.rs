//! Signed bearer tokens.
//!
//! Access and refresh tokens are HS256 JWTs carrying the user id in `sub`
//! and the token kind in `typ`, so a refresh token is never accepted where
//! an access token is required and vice versa.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use bazaar_core::UserId;

use super::AuthError;
use crate::config::AuthConfig;

/// Which kind of token a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// An access token and a refresh token issued together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer from auth configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    /// Issue a token of the given kind.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenCreation` if signing fails.
    pub fn issue(&self, user_id: UserId, kind: TokenKind) -> Result<String, AuthError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            typ: kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Issue an access token and a refresh token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenCreation` if signing fails.
    pub fn issue_pair(&self, user_id: UserId) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(user_id, TokenKind::Access)?,
            refresh_token: self.issue(user_id, TokenKind::Refresh)?,
        })
    }

    /// Verify a token and return the user id it was issued to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` for expired tokens and
    /// `AuthError::InvalidToken` for anything else that does not verify,
    /// including a token of the wrong kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<UserId, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?
            .claims;

        if claims.typ != expected {
            return Err(AuthError::InvalidToken);
        }

        claims.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn issuer(access_days: i64) -> TokenIssuer {
        TokenIssuer::new(&AuthConfig {
            jwt_secret: SecretString::from("k9Qz2Lm7Xv4Rt8Wp1Hs6Jd3Nf5Bc0Ga"),
            access_token_ttl: chrono::Duration::days(access_days),
            refresh_token_ttl: chrono::Duration::days(30),
        })
    }

    #[test]
    fn test_access_token_roundtrip() {
        let issuer = issuer(30);
        let token = issuer.issue(UserId::new(42), TokenKind::Access).unwrap();
        assert_eq!(
            issuer.verify(&token, TokenKind::Access).unwrap(),
            UserId::new(42)
        );
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let issuer = issuer(30);
        let pair = issuer.issue_pair(UserId::new(1)).unwrap();
        assert!(matches!(
            issuer.verify(&pair.refresh_token, TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            issuer.verify(&pair.access_token, TokenKind::Refresh),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer(-1);
        let token = issuer.issue(UserId::new(1), TokenKind::Access).unwrap();
        assert!(matches!(
            issuer.verify(&token, TokenKind::Access),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let other = TokenIssuer::new(&AuthConfig {
            jwt_secret: SecretString::from("Zx8Vb3Nm6Qw1Er4Ty7Ui0Op2As5Df9Gh"),
            access_token_ttl: chrono::Duration::days(1),
            refresh_token_ttl: chrono::Duration::days(1),
        });
        let token = other.issue(UserId::new(1), TokenKind::Access).unwrap();
        assert!(matches!(
            issuer(30).verify(&token, TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            issuer(30).verify("not.a.jwt", TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
    }
}
