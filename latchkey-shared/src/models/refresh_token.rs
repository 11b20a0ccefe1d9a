/// Refresh token model and database operations
///
/// A refresh token row never holds the secret itself, only its SHA-256 hex
/// digest. Rows are created at login, registration and rotation; afterwards
/// only `revoked_at` and `last_used_at` ever change.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE refresh_tokens (
///     id BIGSERIAL PRIMARY KEY,
///     public_id UUID NOT NULL DEFAULT gen_random_uuid(),
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     jti VARCHAR(64) NOT NULL,
///     token_digest VARCHAR(64) NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL,
///     revoked_at TIMESTAMPTZ,
///     last_used_at TIMESTAMPTZ,
///     device_info JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT refresh_tokens_jti_key UNIQUE (jti),
///     CONSTRAINT refresh_tokens_token_digest_key UNIQUE (token_digest)
/// );
/// ```

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgExecutor;
use uuid::Uuid;

/// Longest user agent kept in device metadata, in characters
pub const MAX_USER_AGENT_CHARS: usize = 512;

/// Client metadata captured when a refresh token is issued
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl DeviceInfo {
    /// Builds bounded device metadata from untrusted request values
    ///
    /// The user agent is truncated to [`MAX_USER_AGENT_CHARS`]; the IP address
    /// is dropped unless it parses as IPv4 or IPv6.
    ///
    /// ```
    /// use latchkey_shared::models::refresh_token::DeviceInfo;
    ///
    /// let device = DeviceInfo::new(Some("curl/8.0"), Some("not an ip"));
    /// assert_eq!(device.user_agent.as_deref(), Some("curl/8.0"));
    /// assert_eq!(device.ip_address, None);
    /// ```
    pub fn new(user_agent: Option<&str>, ip_address: Option<&str>) -> Self {
        let user_agent = user_agent
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .map(|ua| ua.chars().take(MAX_USER_AGENT_CHARS).collect());

        let ip_address = ip_address
            .map(str::trim)
            .and_then(|ip| ip.parse::<IpAddr>().ok())
            .map(|ip| ip.to_string());

        Self {
            user_agent,
            ip_address,
        }
    }
}

/// Lifecycle state of a refresh token at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Expired,
    Revoked,
}

/// Refresh token model
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    /// Internal row ID
    pub id: i64,

    /// External identifier (UUID v7)
    pub public_id: Uuid,

    /// Owning user (internal ID)
    pub user_id: i64,

    /// Unique token identifier (UUID v4, hyphenated)
    pub jti: String,

    /// SHA-256 hex digest of the secret
    pub token_digest: String,

    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,

    /// When the token was revoked, if it was
    pub revoked_at: Option<DateTime<Utc>>,

    /// When the token was last presented for rotation
    pub last_used_at: Option<DateTime<Utc>>,

    /// Device metadata recorded at issuance
    pub device_info: Json<DeviceInfo>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a refresh token row
#[derive(Debug, Clone)]
pub struct CreateRefreshToken {
    pub user_id: i64,
    pub jti: String,
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
    pub device_info: DeviceInfo,
}

const COLUMNS: &str = "id, public_id, user_id, jti, token_digest, expires_at, revoked_at, \
                       last_used_at, device_info, created_at, updated_at";

impl RefreshToken {
    /// Checks if the expiry has been reached
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Checks if the token has been revoked
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Checks if the token can still be used
    pub fn is_active(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }

    /// Current lifecycle state
    ///
    /// Expiry is reported ahead of revocation.
    pub fn state(&self) -> TokenState {
        if self.is_expired() {
            TokenState::Expired
        } else if self.is_revoked() {
            TokenState::Revoked
        } else {
            TokenState::Active
        }
    }

    /// Inserts a new refresh token row
    pub async fn create<'e, E>(
        executor: E,
        data: CreateRefreshToken,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, RefreshToken>(&format!(
            "INSERT INTO refresh_tokens
                 (public_id, user_id, jti, token_digest, expires_at, device_info)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(data.user_id)
        .bind(data.jti)
        .bind(data.token_digest)
        .bind(data.expires_at)
        .bind(Json(data.device_info))
        .fetch_one(executor)
        .await
    }

    /// Finds a token by the digest of its secret
    pub async fn find_by_digest<'e, E>(
        executor: E,
        token_digest: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {COLUMNS} FROM refresh_tokens WHERE token_digest = $1"
        ))
        .bind(token_digest)
        .fetch_optional(executor)
        .await
    }

    /// Revokes a token
    ///
    /// An existing `revoked_at` is preserved, so revoking twice is harmless.
    /// Returns the row as it is after the update.
    pub async fn revoke<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, RefreshToken>(&format!(
            "UPDATE refresh_tokens
             SET revoked_at = COALESCE(revoked_at, NOW()), updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Revokes a token only if it is still active, stamping `last_used_at`
    ///
    /// Returns `false` if another caller revoked it first or it has expired.
    /// This is the compare-and-swap that makes rotation single-use.
    pub async fn consume<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW(), last_used_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_in: Duration, revoked: bool) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: 1,
            public_id: Uuid::now_v7(),
            user_id: 1,
            jti: Uuid::new_v4().to_string(),
            token_digest: "0".repeat(64),
            expires_at: now + expires_in,
            revoked_at: revoked.then_some(now),
            last_used_at: None,
            device_info: Json(DeviceInfo::default()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_token_state() {
        assert_eq!(token(Duration::days(1), false).state(), TokenState::Active);
        assert_eq!(token(Duration::days(1), true).state(), TokenState::Revoked);
        assert_eq!(token(Duration::seconds(-1), false).state(), TokenState::Expired);
        assert_eq!(token(Duration::seconds(-1), true).state(), TokenState::Expired);
    }

    #[test]
    fn test_is_active() {
        assert!(token(Duration::days(30), false).is_active());
        assert!(!token(Duration::days(30), true).is_active());
        assert!(!token(Duration::seconds(-1), false).is_active());
    }

    #[test]
    fn test_device_info_truncates_user_agent() {
        let long = "x".repeat(2000);
        let device = DeviceInfo::new(Some(&long), None);

        assert_eq!(
            device.user_agent.map(|ua| ua.chars().count()),
            Some(MAX_USER_AGENT_CHARS)
        );
    }

    #[test]
    fn test_device_info_ip_address() {
        assert_eq!(
            DeviceInfo::new(None, Some("203.0.113.7")).ip_address.as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(
            DeviceInfo::new(None, Some(" ::1 ")).ip_address.as_deref(),
            Some("::1")
        );
        assert_eq!(DeviceInfo::new(None, Some("localhost")).ip_address, None);
        assert_eq!(DeviceInfo::new(None, Some("")).ip_address, None);
    }

    #[test]
    fn test_device_info_json_omits_missing_fields() {
        let json = serde_json::to_string(&DeviceInfo::default()).unwrap();
        assert_eq!(json, "{}");

        let device: DeviceInfo = serde_json::from_str("{}").unwrap();
        assert_eq!(device, DeviceInfo::default());
    }
}
