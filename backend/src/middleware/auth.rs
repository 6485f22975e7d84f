//! Authentication middleware
//!
//! JWT authentication and role checks for inventory operations. Tokens are
//! issued by the platform's identity service; this module only verifies them.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Platform roles carried in the token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    SuperAdmin,
    Admin,
    StockManager,
    Other(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        match value {
            "superAdmin" => Role::SuperAdmin,
            "admin" => Role::Admin,
            "stockManager" => Role::StockManager,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::SuperAdmin => "superAdmin",
            Role::Admin => "admin",
            Role::StockManager => "stockManager",
            Role::Other(name) => name,
        }
    }

    /// Admin tier or stock tier
    pub fn can_manage_stock(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin | Role::StockManager)
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub company_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
    pub company_id: String,
    pub shop_id: Option<String>,
}

impl AuthUser {
    /// Only the admin and stock tiers may change stock
    pub fn require_stock_manager(&self) -> AppResult<()> {
        if self.role.can_manage_stock() {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }

    /// Super admins act across companies; everyone else stays in their own
    pub fn ensure_company(&self, company_id: &str) -> AppResult<()> {
        if self.role == Role::SuperAdmin || self.company_id == company_id {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }

    /// Shop the token is scoped to
    pub fn require_shop(&self) -> AppResult<&str> {
        self.shop_id.as_deref().ok_or_else(|| AppError::Validation {
            field: "shop_id".to_string(),
            message: "Token is not scoped to a shop".to_string(),
        })
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: Role::parse(&claims.role),
            company_id: claims.company_id,
            shop_id: claims.shop_id,
        }
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid Authorization header".into()))?;

    let claims = decode_jwt(token, &state.config.jwt.secret)?;
    request.extensions_mut().insert(AuthUser::from(claims));

    Ok(next.run(request).await)
}

/// Decode and validate JWT token
pub fn decode_jwt(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: "UserID-1".to_string(),
            role,
            company_id: "CompanyID-1".to_string(),
            shop_id: None,
        }
    }

    #[test]
    fn test_role_names() {
        assert_eq!(Role::parse("stockManager"), Role::StockManager);
        assert_eq!(Role::parse("cashier"), Role::Other("cashier".to_string()));
        assert_eq!(Role::parse("superAdmin").as_str(), "superAdmin");
    }

    #[test]
    fn test_stock_tiers() {
        assert!(user(Role::Admin).require_stock_manager().is_ok());
        assert!(user(Role::StockManager).require_stock_manager().is_ok());
        assert!(user(Role::Other("cashier".into()))
            .require_stock_manager()
            .is_err());
    }

    #[test]
    fn test_company_scope() {
        assert!(user(Role::Admin).ensure_company("CompanyID-1").is_ok());
        assert!(user(Role::Admin).ensure_company("CompanyID-2").is_err());
        assert!(user(Role::SuperAdmin).ensure_company("CompanyID-2").is_ok());
    }

    #[test]
    fn test_missing_shop_scope() {
        assert!(matches!(
            user(Role::Admin).require_shop(),
            Err(AppError::Validation { .. })
        ));
    }
}
