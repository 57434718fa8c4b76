//! JWT Token Handler
//! Mission: Mint and validate the access/refresh token pair

use crate::auth::models::{Claims, TokenPairResponse, TokenUse, User};
use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

/// JWT Handler for token operations
pub struct JwtHandler {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key and the default lifetimes
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            access_ttl: Duration::minutes(5),
            refresh_ttl: Duration::hours(24),
        }
    }

    /// Create a handler with explicit token lifetimes
    pub fn with_lifetimes(secret: String, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Generate an access/refresh pair for a user
    pub fn generate_pair(&self, user: &User) -> Result<TokenPairResponse> {
        debug!(
            "Generating token pair for user {} ({})",
            user.username, user.id
        );

        let access = self.mint(
            &user.id.to_string(),
            &user.username,
            user.is_admin,
            TokenUse::Access,
            self.access_ttl,
        )?;
        let refresh = self.mint(
            &user.id.to_string(),
            &user.username,
            user.is_admin,
            TokenUse::Refresh,
            self.refresh_ttl,
        )?;

        Ok(TokenPairResponse { access, refresh })
    }

    /// Mint a fresh access token from a valid refresh token
    pub fn refresh_access(&self, refresh_token: &str) -> Result<String> {
        let claims = self.validate_refresh(refresh_token)?;

        debug!("Refreshing access token for user {}", claims.username);

        self.mint(
            &claims.sub,
            &claims.username,
            claims.is_admin,
            TokenUse::Access,
            self.access_ttl,
        )
    }

    /// Validate an access token and extract claims
    pub fn validate_access(&self, token: &str) -> Result<Claims> {
        let claims = self.validate(token)?;
        if claims.token_use != TokenUse::Access {
            bail!("Token is not an access token");
        }

        debug!("Validated access token for user {}", claims.username);

        Ok(claims)
    }

    /// Validate a refresh token and extract claims
    pub fn validate_refresh(&self, token: &str) -> Result<Claims> {
        let claims = self.validate(token)?;
        if claims.token_use != TokenUse::Refresh {
            bail!("Token is not a refresh token");
        }
        Ok(claims)
    }

    fn mint(
        &self,
        sub: &str,
        username: &str,
        is_admin: bool,
        token_use: TokenUse,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(ttl)
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let claims = Claims {
            sub: sub.to_string(),
            username: username.to_string(),
            is_admin,
            token_use,
            exp: expiration,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to generate JWT")
    }

    fn validate(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0; // expiry is exact, no clock-skew allowance

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .context("Invalid or expired token")?;

        Ok(decoded.claims)
    }
}
