use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::time::Duration;

use crate::config::TokenConfig;
use crate::models::IdentityContext;

/// Short-lived RS256 tokens minted for an identity.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: Option<EncodingKey>,
    decoding_key: Option<DecodingKey>,
    kid: String,
    ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub org_id: String,
    pub username: String,
    pub is_org_admin: bool,
}

impl TokenIssuer {
    /// Keys are PEM strings. An empty private key leaves issuing disabled.
    pub fn new(config: &TokenConfig) -> Result<Self, AppError> {
        let encoding_key = if config.private_key.trim().is_empty() {
            tracing::warn!("TOKEN_PRIVATE_KEY not set; token issuing disabled");
            None
        } else {
            Some(
                EncodingKey::from_rsa_pem(config.private_key.as_bytes()).map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Failed to parse private key: {}", e))
                })?,
            )
        };

        let decoding_key = if config.public_key.trim().is_empty() {
            None
        } else {
            Some(
                DecodingKey::from_rsa_pem(config.public_key.as_bytes()).map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Failed to parse public key: {}", e))
                })?,
            )
        };

        let issuer = Self {
            encoding_key,
            decoding_key,
            kid: config.kid.clone(),
            ttl: config.ttl,
        };
        issuer.check_key_pair()?;

        Ok(issuer)
    }

    /// With both keys configured, a freshly issued token must verify.
    fn check_key_pair(&self) -> Result<(), AppError> {
        if self.encoding_key.is_none() || self.decoding_key.is_none() {
            return Ok(());
        }

        let token = self.issue(&IdentityContext::system("keycheck", "keycheck"))?;
        self.verify(&token).map(|_| ()).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_PUBLIC_KEY does not match TOKEN_PRIVATE_KEY: {}",
                e.message()
            ))
        })
    }

    pub fn issue(&self, identity: &IdentityContext) -> Result<String, AppError> {
        let key = self.encoding_key.as_ref().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("token signing key not configured"))
        })?;

        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            exp: now + self.ttl.as_secs() as i64,
            iat: now,
            nbf: now,
            org_id: identity.org_id.clone(),
            username: identity.username.clone(),
            is_org_admin: identity.is_org_admin,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());

        encode(&header, &claims, key)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    /// Verify a token issued by this service.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AppError> {
        let key = self.decoding_key.as_ref().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("token public key not configured"))
        })?;

        let validation = Validation::new(Algorithm::RS256);
        decode::<TokenClaims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("invalid token: {}", e)))
    }
}
