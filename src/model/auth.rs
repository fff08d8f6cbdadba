use std::ops::Deref;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{self, Status},
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::logging;

use super::Address;

/// Prefix of the `Authorization` header value.
pub const BEARER_PREFIX: &str = "Bearer ";

/// An authentication token naming the identity a caller acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "sub")]
    pub address: Address,
}

impl AuthToken {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    #[allow(clippy::missing_panics_doc)]
    /// Sign this token, valid for the configured lifetime.
    pub fn encode(self, config: &Config) -> String {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings")
    }

    /// Verify and decode a signed token.
    pub fn decode(token: &str, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|token_data: TokenData<Claims>| token_data.claims.token)?;
        Ok(token)
    }

    /// Sign this token and wrap it in an `Authorization` header.
    pub fn into_header(self, config: &Config) -> http::Header<'static> {
        http::Header::new("Authorization", format!("{BEARER_PREFIX}{}", self.encode(config)))
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// The authenticated identity on whose behalf a request acts.
///
/// This is deliberately not checked against the registry: whether the
/// identity may do anything is the contract's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(Address);

impl Deref for Caller {
    type Target = Address;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = Error;

    /// Get the caller from a bearer token in the `Authorization` header.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let header = match req.headers().get_one("Authorization") {
            Some(header) => header,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Status(Status::Unauthorized, "Missing bearer token".to_string()),
                ))
            }
        };
        let raw_token = match header.strip_prefix(BEARER_PREFIX) {
            Some(token) => token.trim(),
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Status(
                        Status::Unauthorized,
                        "Authorization is not a bearer token".to_string(),
                    ),
                ))
            }
        };

        match AuthToken::decode(raw_token, config) {
            Ok(token) => {
                let caller = Caller(token.address);
                logging::tag_caller(req, caller);
                Outcome::Success(caller)
            }
            Err(e) => Outcome::Failure((e.status(), e)),
        }
    }
}
