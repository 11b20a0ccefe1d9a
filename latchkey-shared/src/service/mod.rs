/// Login, registration, refresh and logout
///
/// Orchestrators combine the primitives in [`crate::auth`] with an
/// [`AuthStore`](crate::store::AuthStore). Each call is one unit of work and
/// returns either a payload or an [`AuthError`]. Callers map rejections to
/// their transport; internal variants are failures of the system itself.

pub mod authentication;
pub mod registration;

pub use authentication::AuthService;
pub use registration::{RegisterParams, RegistrationService};

use crate::auth::{jwt::JwtError, password::PasswordError};
use crate::models::{account::Account, membership::MembershipRole, user::User};
use crate::store::StoreError;

/// Error type for orchestrator calls
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Input rejected; carries full messages such as `"Email is invalid"`
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No account found")]
    NoAccount,

    #[error("Invalid refresh token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    /// A blocking hashing task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(messages) => AuthError::Validation(messages),
            other => AuthError::Store(other),
        }
    }
}

impl AuthError {
    /// True for outcomes caused by the caller's input rather than a system failure
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            AuthError::Store(_) | AuthError::Token(_) | AuthError::Password(_) | AuthError::Task(_)
        )
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Access and refresh token handed to a client
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Result of a login or registration
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub account: Account,
    pub role: MembershipRole,
    pub tokens: TokenPair,
}
