//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs issued elsewhere; this service only validates them.
//! The decoding key travels as a request extension so the extractors work
//! with any router state.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use common::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Seller,
    Admin,
    Superadmin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

/// Signing material for one secret.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }

    /// Signs a token valid for `ttl`.
    pub fn issue(
        &self,
        user: UserId,
        email: &str,
        role: Role,
        ttl: chrono::Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: user,
            email: email.to_string(),
            role,
            exp: (Utc::now() + ttl).timestamp().max(0) as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }
}

/// Any authenticated caller.
#[derive(Debug, Clone)]
pub struct Principal(pub Claims);

impl Principal {
    pub fn id(&self) -> UserId {
        self.0.sub
    }

    pub fn is_admin(&self) -> bool {
        self.0.role.is_admin()
    }

    /// True if the caller may read data belonging to `email`.
    pub fn can_view(&self, email: &str) -> bool {
        self.is_admin() || self.0.email.eq_ignore_ascii_case(email)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let keys = parts
            .extensions
            .get::<Arc<JwtKeys>>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("authentication is not configured".to_string()))?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                metrics::counter!("auth_rejections_total", "reason" => "missing").increment(1);
                ApiError::Unauthorized("Authentication required".to_string())
            })?;

        let claims = keys.verify(token).map_err(|e| {
            metrics::counter!("auth_rejections_total", "reason" => "invalid").increment(1);
            tracing::debug!(error = %e, "rejected bearer token");
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })?;
        Ok(Principal(claims))
    }
}

/// An authenticated admin or superadmin.
#[derive(Debug, Clone)]
pub struct AdminPrincipal(pub Principal);

impl AdminPrincipal {
    pub fn id(&self) -> UserId {
        self.0.id()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AdminPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            metrics::counter!("auth_rejections_total", "reason" => "forbidden").increment(1);
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminPrincipal(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let keys = JwtKeys::new("secret");
        let user = UserId::new();
        let token = keys
            .issue(user, "a@shop.test", Role::Admin, chrono::Duration::minutes(5))
            .unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn wrong_secret_and_expired_tokens_fail() {
        let keys = JwtKeys::new("secret");
        let other = JwtKeys::new("other");
        let token = other
            .issue(UserId::new(), "a@shop.test", Role::Customer, chrono::Duration::minutes(5))
            .unwrap();
        assert!(keys.verify(&token).is_err());

        let expired = keys
            .issue(UserId::new(), "a@shop.test", Role::Customer, chrono::Duration::hours(-1))
            .unwrap();
        assert!(keys.verify(&expired).is_err());
    }

    #[test]
    fn customers_only_see_their_own_email() {
        let customer = Principal(Claims {
            sub: UserId::new(),
            email: "Jane@Shop.test".to_string(),
            role: Role::Customer,
            exp: 0,
        });
        assert!(customer.can_view("jane@shop.test"));
        assert!(!customer.can_view("john@shop.test"));

        let admin = Principal(Claims {
            role: Role::Superadmin,
            ..customer.0.clone()
        });
        assert!(admin.can_view("john@shop.test"));
    }
}
