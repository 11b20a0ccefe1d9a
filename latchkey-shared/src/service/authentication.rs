/// Login, refresh and logout
///
/// # Login
///
/// Unknown email and wrong password are indistinguishable to the caller:
/// same error, and both paths run one Argon2 verification. A user without an
/// active membership cannot log in.
///
/// # Refresh
///
/// The presented token must be active. Rotation consumes it with a
/// compare-and-swap and inserts the replacement in the same unit of work; of
/// two concurrent refreshes with one token exactly one succeeds and the
/// other sees `TokenRevoked`.
///
/// # Logout
///
/// Revokes the presented token. Logging out with an already revoked or
/// expired token still succeeds.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{AuthError, AuthResult, Session, TokenPair};
use crate::auth::{
    jwt::{AccessTokenCodec, ACCESS_TOKEN_TTL_SECONDS},
    password,
    refresh_token::RefreshTokenStore,
};
use crate::models::{
    account::Account,
    membership::MembershipRole,
    refresh_token::{DeviceInfo, RefreshToken, TokenState},
    user::User,
};
use crate::store::AuthStore;

/// Authentication orchestrator
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    codec: AccessTokenCodec,
    refresh_tokens: RefreshTokenStore,
}

impl AuthService {
    /// Builds the orchestrator; also computes the dummy hash used for
    /// unknown-email logins so the first one is not slower than the rest
    pub fn new(store: Arc<dyn AuthStore>, codec: AccessTokenCodec) -> Self {
        password::prime_dummy_hash();

        Self {
            refresh_tokens: RefreshTokenStore::new(store.clone()),
            store,
            codec,
        }
    }

    /// Codec used for access tokens
    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    pub(crate) fn store(&self) -> &Arc<dyn AuthStore> {
        &self.store
    }

    /// Verifies credentials and opens a session in the user's primary account
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidCredentials` for an unknown email or wrong password
    /// - `AuthError::NoAccount` if the user has no active membership
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_info: DeviceInfo,
    ) -> AuthResult<Session> {
        let email = User::normalize_email(email);
        let candidate = password.to_owned();

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => {
                let stored_hash = user.password_hash.clone();
                let verified =
                    tokio::task::spawn_blocking(move || password::verify(&stored_hash, &candidate))
                        .await?;

                if !verified {
                    warn!(user_id = user.id, "Login rejected: wrong password");
                    return Err(AuthError::InvalidCredentials);
                }
                user
            }
            None => {
                tokio::task::spawn_blocking(move || password::verify_dummy(&candidate)).await?;

                warn!("Login rejected: unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let Some((account, membership)) = self.store.primary_account(user.id).await? else {
            warn!(user_id = user.id, "Login rejected: no active membership");
            return Err(AuthError::NoAccount);
        };

        let session = self
            .issue_session(user, account, membership.role, device_info)
            .await?;

        info!(
            user_id = session.user.id,
            account_id = session.account.id,
            "User logged in"
        );
        Ok(session)
    }

    /// Exchanges an active refresh token for a new token pair
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` if no token matches
    /// - `AuthError::TokenExpired` / `AuthError::TokenRevoked` if it is no longer active
    /// - `AuthError::NoAccount` if the user has lost every active membership
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let token = self.find_token(refresh_token).await?;
        ensure_active(&token)?;

        let user = self
            .store
            .find_user(token.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let Some((account, membership)) = self.store.primary_account(user.id).await? else {
            warn!(user_id = user.id, "Refresh rejected: no active membership");
            return Err(AuthError::NoAccount);
        };

        // Signed before the swap so a consumed token always has a successor
        let access_token = self.codec.issue(&user, &account, membership.role)?;

        let Some((secret, replacement)) = self.refresh_tokens.rotate(&token).await? else {
            // Lost a race with another refresh or a logout
            let current = self.find_token(refresh_token).await?;
            warn!(user_id = user.id, jti = %token.jti, "Refresh rejected: token consumed concurrently");

            return Err(match current.state() {
                TokenState::Expired => AuthError::TokenExpired,
                _ => AuthError::TokenRevoked,
            });
        };

        info!(
            user_id = user.id,
            old_jti = %token.jti,
            new_jti = %replacement.jti,
            "Tokens refreshed"
        );

        Ok(TokenPair {
            access_token,
            refresh_token: secret,
            expires_in: ACCESS_TOKEN_TTL_SECONDS,
        })
    }

    /// Revokes a refresh token
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` if no token matches
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        let token = self.find_token(refresh_token).await?;

        self.refresh_tokens.revoke(&token).await?;

        info!(user_id = token.user_id, jti = %token.jti, "User logged out");
        Ok(())
    }

    /// Issues an access token and a new refresh token for a member
    ///
    /// Shared by login and registration.
    pub async fn issue_session(
        &self,
        user: User,
        account: Account,
        role: MembershipRole,
        device_info: DeviceInfo,
    ) -> AuthResult<Session> {
        let access_token = self.codec.issue(&user, &account, role)?;
        let (refresh_token, record) = self.refresh_tokens.issue(&user, device_info).await?;

        debug!(user_id = user.id, jti = %record.jti, role = %role, "Session issued");

        Ok(Session {
            user,
            account,
            role,
            tokens: TokenPair {
                access_token,
                refresh_token,
                expires_in: ACCESS_TOKEN_TTL_SECONDS,
            },
        })
    }

    async fn find_token(&self, refresh_token: &str) -> AuthResult<RefreshToken> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        match self.refresh_tokens.lookup(refresh_token).await? {
            Some(token) => Ok(token),
            None => {
                debug!("Refresh token not found");
                Err(AuthError::InvalidToken)
            }
        }
    }
}

fn ensure_active(token: &RefreshToken) -> AuthResult<()> {
    match token.state() {
        TokenState::Active => Ok(()),
        TokenState::Expired => {
            warn!(user_id = token.user_id, jti = %token.jti, "Refresh rejected: token expired");
            Err(AuthError::TokenExpired)
        }
        TokenState::Revoked => {
            warn!(user_id = token.user_id, jti = %token.jti, "Refresh rejected: token revoked");
            Err(AuthError::TokenRevoked)
        }
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_new_primes_dummy_hash() {
        let _auth = AuthService::new(
            Arc::new(MemoryStore::new()),
            AccessTokenCodec::new("unit-test-secret-that-is-32-bytes!"),
        );

        assert!(password::dummy_hash_ready());
    }
}
