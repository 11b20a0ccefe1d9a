/// Authentication endpoints
///
/// Thin adapters over the orchestrators: parse the body, call the service,
/// map the outcome to a status code.
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register a user with their own account
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Rotate the refresh token, get a new access token
/// - `POST /v1/auth/logout` - Revoke a refresh token
/// - `GET /v1/auth/me` - Claims of the presented access token

use std::net::SocketAddr;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use latchkey_shared::{
    auth::jwt::Claims,
    models::{
        account::{Account, AccountPlan, AccountStatus},
        membership::MembershipRole,
        refresh_token::DeviceInfo,
        user::User,
    },
    service::{AuthError, RegisterParams, Session, TokenPair},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Register request
///
/// Missing fields default to empty and are reported by validation.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub account_name: Option<String>,
}

/// Login request
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh and logout request
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Public view of a user
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.public_id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
        }
    }
}

/// Public view of an account
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: AccountPlan,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.public_id,
            name: account.name,
            slug: account.slug,
            plan: account.plan,
            status: account.status,
            created_at: account.created_at,
        }
    }
}

/// Token pair as returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.expires_in,
        }
    }
}

/// Login and register response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: UserResponse,
    pub account: AccountResponse,
    pub role: MembershipRole,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            user: session.user.into(),
            account: session.account.into(),
            role: session.role,
            tokens: session.tokens.into(),
        }
    }
}

/// Device metadata from the request
///
/// The IP address is the peer address of the connection; forwarded headers
/// are not trusted.
fn device_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> DeviceInfo {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());
    let ip_address = peer.map(|addr| addr.ip().to_string());

    DeviceInfo::new(user_agent, ip_address.as_deref())
}

/// Register a new user
///
/// ```text
/// POST /v1/auth/register
/// {"email": "ada@example.com", "password": "Secret123!", "name": "Ada"}
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed, messages in `details`
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let session = state
        .registration
        .register(RegisterParams {
            email: req.email,
            password: req.password,
            name: req.name,
            account_name: req.account_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Login with email and password
///
/// # Errors
///
/// - `401 Unauthorized`: `Invalid email or password` or `No account found`
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let device = device_info(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    let session = state.auth.login(&req.email, &req.password, device).await?;

    Ok(Json(session.into()))
}

/// Exchange a refresh token for a new token pair
///
/// # Errors
///
/// - `401 Unauthorized`: `Invalid refresh token`, `Token expired` or `Token revoked`
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let pair = state.auth.refresh(&req.refresh_token).await?;

    Ok(Json(pair.into()))
}

/// Revoke a refresh token
///
/// # Errors
///
/// - `400 Bad Request`: `Invalid refresh token`
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> ApiResult<StatusCode> {
    match state.auth.logout(&req.refresh_token).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(AuthError::InvalidToken) => Err(ApiError::BadRequest(
            AuthError::InvalidToken.to_string(),
        )),
        Err(err) => Err(err.into()),
    }
}

/// Claims of the presented access token
pub async fn me(Extension(claims): Extension<Claims>) -> Json<Claims> {
    Json(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_device_info_from_request() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.4.0"));
        let peer: SocketAddr = "203.0.113.9:52100".parse().unwrap();

        let device = device_info(&headers, Some(peer));

        assert_eq!(device.user_agent.as_deref(), Some("curl/8.4.0"));
        assert_eq!(device.ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_device_info_without_metadata() {
        assert_eq!(device_info(&HeaderMap::new(), None), DeviceInfo::default());
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let req: RegisterRequest = serde_json::from_str("{}").unwrap();
        assert!(req.email.is_empty());
        assert!(req.account_name.is_none());

        let req: RefreshTokenRequest = serde_json::from_str("{}").unwrap();
        assert!(req.refresh_token.is_empty());
    }
}
