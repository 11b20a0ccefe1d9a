/// PostgreSQL backend for [`AuthStore`]

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use super::{
    AuthStore, NewRegistration, Registration, StoreError, StoreResult, ALREADY_MEMBER,
    EMAIL_TAKEN, SLUG_TAKEN,
};
use crate::db::pool::health_check;
use crate::models::{
    account::{Account, CreateAccount},
    membership::{CreateMembership, Membership},
    refresh_token::{CreateRefreshToken, RefreshToken},
    user::{CreateUser, User},
};

/// Store backed by a sqlx connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps unique violations on known constraints to validation messages
fn translate(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = match db_err.constraint() {
                Some("users_email_key") => Some(EMAIL_TAKEN),
                Some("accounts_slug_key") => Some(SLUG_TAKEN),
                Some("account_memberships_user_account_key") => Some(ALREADY_MEMBER),
                _ => None,
            };

            if let Some(message) = message {
                return StoreError::Invalid(vec![message.to_string()]);
            }
        }
    }

    StoreError::Database(err)
}

/// First free slug among `base`, `base-1`, `base-2`, ...
async fn free_slug(conn: &mut PgConnection, base: &str) -> Result<String, sqlx::Error> {
    let mut n = 0;
    loop {
        let candidate = Account::slug_candidate(base, n);
        if !Account::slug_exists(&mut *conn, &candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

async fn insert_registration(
    conn: &mut PgConnection,
    user: CreateUser,
    account: CreateAccount,
) -> StoreResult<Registration> {
    let user = User::create(&mut *conn, user).await.map_err(translate)?;

    let slug = free_slug(&mut *conn, &account.slug).await?;
    let account = Account::create(&mut *conn, CreateAccount { slug, ..account })
        .await
        .map_err(translate)?;

    let membership = Membership::create(&mut *conn, CreateMembership::owner(user.id, account.id))
        .await
        .map_err(translate)?;

    Ok(Registration {
        user,
        account,
        membership,
    })
}

#[async_trait]
impl AuthStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn primary_account(&self, user_id: i64) -> StoreResult<Option<(Account, Membership)>> {
        Ok(Membership::find_primary(&self.pool, user_id).await?)
    }

    async fn register(&self, registration: NewRegistration) -> StoreResult<Registration> {
        let mut tx = self.pool.begin().await?;

        // Dropping the transaction on error rolls it back
        let created = insert_registration(&mut tx, registration.user, registration.account).await?;

        tx.commit().await?;

        debug!(
            user_id = created.user.id,
            account_id = created.account.id,
            slug = %created.account.slug,
            "Registration committed"
        );
        Ok(created)
    }

    async fn create_refresh_token(&self, token: CreateRefreshToken) -> StoreResult<RefreshToken> {
        Ok(RefreshToken::create(&self.pool, token).await?)
    }

    async fn find_refresh_token(&self, token_digest: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(RefreshToken::find_by_digest(&self.pool, token_digest).await?)
    }

    async fn revoke_refresh_token(&self, id: i64) -> StoreResult<Option<RefreshToken>> {
        Ok(RefreshToken::revoke(&self.pool, id).await?)
    }

    async fn rotate_refresh_token(
        &self,
        id: i64,
        replacement: CreateRefreshToken,
    ) -> StoreResult<Option<RefreshToken>> {
        let mut tx = self.pool.begin().await?;

        if !RefreshToken::consume(&mut *tx, id).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        let created = RefreshToken::create(&mut *tx, replacement).await?;
        tx.commit().await?;

        Ok(Some(created))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(health_check(&self.pool).await?)
    }
}
