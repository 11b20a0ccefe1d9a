/// Persistence boundary for the authentication core
///
/// The orchestrators only talk to [`AuthStore`]. Two backends implement it:
///
/// - [`postgres::PgStore`]: production backend on a sqlx pool; multi-row
///   writes run in one transaction
/// - [`memory::MemoryStore`]: in-process backend with the same uniqueness
///   and atomicity rules, used by tests and local tooling
///
/// Every method is one unit of work. A failure inside a multi-row write
/// leaves no partial state behind.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::{
    account::{Account, CreateAccount},
    membership::Membership,
    refresh_token::{CreateRefreshToken, RefreshToken},
    user::{CreateUser, User},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Message for a duplicate user email
pub const EMAIL_TAKEN: &str = "Email has already been taken";

/// Message for a duplicate account slug
pub const SLUG_TAKEN: &str = "Slug has already been taken";

/// Message for a duplicate (user, account) membership
pub const ALREADY_MEMBER: &str = "User already a member of this account";

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A write was rejected by a uniqueness rule; carries full messages
    #[error("Validation failed: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Input for the registration write
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub user: CreateUser,

    /// `slug` is the base candidate; the store picks the first free suffix
    pub account: CreateAccount,
}

/// Rows created by a successful registration
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub account: Account,
    pub membership: Membership,
}

/// Storage operations needed by login, registration, refresh and logout
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Finds a user by email (normalised by the store)
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Finds a user by internal ID
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;

    /// Finds the user's primary account and the membership granting it
    ///
    /// The primary account is the one of the earliest-created active
    /// membership, ties broken by membership ID.
    async fn primary_account(&self, user_id: i64) -> StoreResult<Option<(Account, Membership)>>;

    /// Creates user, account and owner membership in one unit of work
    ///
    /// The account slug is disambiguated against existing slugs. Uniqueness
    /// failures surface as [`StoreError::Invalid`] and leave nothing behind.
    async fn register(&self, registration: NewRegistration) -> StoreResult<Registration>;

    /// Persists a new refresh token row
    async fn create_refresh_token(&self, token: CreateRefreshToken) -> StoreResult<RefreshToken>;

    /// Finds a refresh token by the digest of its secret
    async fn find_refresh_token(&self, token_digest: &str) -> StoreResult<Option<RefreshToken>>;

    /// Sets `revoked_at` if unset and returns the updated row
    async fn revoke_refresh_token(&self, id: i64) -> StoreResult<Option<RefreshToken>>;

    /// Consumes an active token and inserts its replacement in one unit of work
    ///
    /// Returns `None` without writing anything if the token is no longer
    /// active, i.e. a concurrent caller rotated or revoked it first or it
    /// has expired.
    async fn rotate_refresh_token(
        &self,
        id: i64,
        replacement: CreateRefreshToken,
    ) -> StoreResult<Option<RefreshToken>>;

    /// Checks that the backend is reachable
    async fn ping(&self) -> StoreResult<()>;
}
