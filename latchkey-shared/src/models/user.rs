/// User model and database operations
///
/// A user is an identity: a unique email, a display name and an Argon2id
/// password hash. Users reach accounts through memberships and own their
/// refresh tokens; deleting a user cascades to both.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     public_id UUID NOT NULL DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT users_email_key UNIQUE (email),
///     CONSTRAINT users_public_id_key UNIQUE (public_id)
/// );
/// ```
///
/// Emails are normalised (trimmed, lowercased) before they are stored or
/// looked up, which is what makes the unique index case-insensitive.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::Validate;

use super::validate_column_width;

/// User model
#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Internal row ID, never exposed
    #[serde(skip_serializing)]
    pub id: i64,

    /// External identifier (UUID v7)
    pub public_id: Uuid,

    /// Normalised email address
    pub email: String,

    /// Display name
    pub name: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// When the user was created
    pub created_at: DateTime<Utc>,

    /// When the user was last updated
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("public_id", &self.public_id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Input for creating a new user
///
/// `email` must already be normalised with [`User::normalize_email`].
#[derive(Debug, Clone, Validate)]
pub struct CreateUser {
    /// Email address
    #[validate(
        length(min = 1, message = "can't be blank"),
        email(message = "is invalid"),
        custom(function = "validate_column_width")
    )]
    pub email: String,

    /// Display name
    #[validate(
        length(min = 2, message = "is too short (minimum is 2 characters)"),
        custom(function = "validate_column_width")
    )]
    pub name: String,

    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,
}

const COLUMNS: &str = "id, public_id, email, name, password_hash, created_at, updated_at";

impl User {
    /// Normalises an email for storage and lookup
    ///
    /// ```
    /// use latchkey_shared::models::user::User;
    ///
    /// assert_eq!(User::normalize_email("  Ada@Example.COM "), "ada@example.com");
    /// ```
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Returns a unique violation on `users_email_key` if the email is taken
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (public_id, email, name, password_hash)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(data.email)
        .bind(data.name)
        .bind(data.password_hash)
        .fetch_one(executor)
        .await
    }

    /// Finds a user by internal ID
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by email
    ///
    /// The argument is normalised before the lookup.
    pub async fn find_by_email<'e, E>(
        executor: E,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
            .bind(Self::normalize_email(email))
            .fetch_optional(executor)
            .await
    }

    /// Deletes a user, cascading to memberships and refresh tokens
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
