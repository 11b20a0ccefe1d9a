/// Refresh token secrets and their persistence
///
/// A refresh token is an opaque secret handed to the client once. The server
/// keeps only its SHA-256 digest, so a database leak does not leak usable
/// tokens.
///
/// # Format
///
/// 32 bytes from the OS RNG, URL-safe base64 without padding (43 characters).
///
/// # Lifecycle
///
/// - Issued at login, registration and rotation, valid for 30 days
/// - Looked up by digest
/// - Revoked at logout (idempotent) or consumed by rotation (single-use)

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    refresh_token::{CreateRefreshToken, DeviceInfo, RefreshToken},
    user::User,
};
use crate::store::{AuthStore, StoreResult};

/// Refresh token lifetime in days
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Number of random bytes in a secret
const SECRET_BYTES: usize = 32;

/// Generates a new refresh token secret
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest of a secret, as stored in `token_digest`
pub fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Builds a fresh secret and the row that records it
///
/// Returns `(secret, row)`. The secret is only ever returned to the client.
pub fn build(user_id: i64, device_info: DeviceInfo) -> (String, CreateRefreshToken) {
    let secret = generate_secret();

    let row = CreateRefreshToken {
        user_id,
        jti: Uuid::new_v4().to_string(),
        token_digest: digest(&secret),
        expires_at: Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS),
        device_info,
    };

    (secret, row)
}

/// Issues, finds, revokes and rotates refresh tokens on top of an [`AuthStore`]
#[derive(Clone)]
pub struct RefreshTokenStore {
    store: Arc<dyn AuthStore>,
}

impl RefreshTokenStore {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Issues a new token for a user
    ///
    /// Returns the raw secret together with the persisted row.
    pub async fn issue(
        &self,
        user: &User,
        device_info: DeviceInfo,
    ) -> StoreResult<(String, RefreshToken)> {
        let (secret, row) = build(user.id, device_info);
        let token = self.store.create_refresh_token(row).await?;

        debug!(user_id = user.id, jti = %token.jti, "Refresh token issued");
        Ok((secret, token))
    }

    /// Finds the row for a raw secret
    pub async fn lookup(&self, secret: &str) -> StoreResult<Option<RefreshToken>> {
        self.store.find_refresh_token(&digest(secret)).await
    }

    /// Revokes a token, keeping an earlier revocation time if there is one
    pub async fn revoke(&self, token: &RefreshToken) -> StoreResult<Option<RefreshToken>> {
        let revoked = self.store.revoke_refresh_token(token.id).await?;

        debug!(user_id = token.user_id, jti = %token.jti, "Refresh token revoked");
        Ok(revoked)
    }

    /// Consumes an active token and issues its replacement with the same device metadata
    ///
    /// Returns `None` if the token was no longer active when the swap ran.
    pub async fn rotate(&self, token: &RefreshToken) -> StoreResult<Option<(String, RefreshToken)>> {
        let (secret, row) = build(token.user_id, token.device_info.0.clone());

        let replacement = self.store.rotate_refresh_token(token.id, row).await?;

        Ok(replacement.map(|replacement| {
            debug!(
                user_id = token.user_id,
                old_jti = %token.jti,
                new_jti = %replacement.jti,
                "Refresh token rotated"
            );
            (secret, replacement)
        }))
    }
}

impl std::fmt::Debug for RefreshTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenStore").finish_non_exhaustive()
    }
}
