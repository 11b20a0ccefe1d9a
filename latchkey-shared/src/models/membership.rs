/// Account membership model and database operations
///
/// A membership ties a user to an account with a role and a status. There is
/// at most one membership per (user, account) pair.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE membership_role AS ENUM ('owner', 'admin', 'editor', 'author', 'viewer');
/// CREATE TYPE membership_status AS ENUM ('invited', 'active', 'suspended');
///
/// CREATE TABLE account_memberships (
///     id BIGSERIAL PRIMARY KEY,
///     public_id UUID NOT NULL DEFAULT gen_random_uuid(),
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     account_id BIGINT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     role membership_role NOT NULL DEFAULT 'viewer',
///     status membership_status NOT NULL DEFAULT 'active',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT account_memberships_user_account_key UNIQUE (user_id, account_id)
/// );
/// ```
///
/// # Roles
///
/// - **owner**: Full control, billing, delete account
/// - **admin**: Manage users and content
/// - **editor**: Publish, and edit anyone's content
/// - **author**: Write own content; publishing needs an editor
/// - **viewer**: Read-only access
///
/// # Primary account
///
/// A user's primary account is the account of their earliest-created active
/// membership, ties broken by row ID. Tokens issued at login are scoped to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::account::Account;

/// RBAC roles for account memberships
///
/// Variants are declared from least to most privileged so that the derived
/// `Ord` follows the hierarchy: `Owner > Admin > Editor > Author > Viewer`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "membership_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    /// Read-only access
    Viewer,

    /// Can write own content, cannot publish
    Author,

    /// Can publish and edit all content
    Editor,

    /// Can manage users and content
    Admin,

    /// Full control: billing, delete account, manage all users
    Owner,
}

impl MembershipRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Owner => "owner",
            MembershipRole::Admin => "admin",
            MembershipRole::Editor => "editor",
            MembershipRole::Author => "author",
            MembershipRole::Viewer => "viewer",
        }
    }

    /// Checks if this role is at or above the required role
    pub fn at_least(&self, required: MembershipRole) -> bool {
        *self >= required
    }

    /// Can invite, suspend and change the role of other members
    pub fn can_manage_users(&self) -> bool {
        self.at_least(MembershipRole::Admin)
    }

    /// Can publish content (editors and above)
    pub fn can_publish(&self) -> bool {
        self.at_least(MembershipRole::Editor)
    }
}

impl std::fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Invited,
    Active,
    Suspended,
}

/// Membership model representing a user-account relationship with role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    /// Internal row ID
    #[serde(skip_serializing)]
    pub id: i64,

    /// External identifier (UUID v7)
    pub public_id: Uuid,

    /// Member user (internal ID)
    #[serde(skip_serializing)]
    pub user_id: i64,

    /// Account (internal ID)
    #[serde(skip_serializing)]
    pub account_id: i64,

    /// Role within the account
    pub role: MembershipRole,

    /// Membership status
    pub status: MembershipStatus,

    /// When the membership was created
    pub created_at: DateTime<Utc>,

    /// When the membership was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new membership
#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub user_id: i64,
    pub account_id: i64,
    pub role: MembershipRole,
    pub status: MembershipStatus,
}

impl CreateMembership {
    /// An active owner membership, as created at registration
    pub fn owner(user_id: i64, account_id: i64) -> Self {
        Self {
            user_id,
            account_id,
            role: MembershipRole::Owner,
            status: MembershipStatus::Active,
        }
    }
}

const COLUMNS: &str = "id, public_id, user_id, account_id, role, status, created_at, updated_at";

impl Membership {
    /// Checks if the membership grants access
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// Creates a new membership
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pair already exists (`account_memberships_user_account_key`)
    /// - User or account doesn't exist (foreign key violation)
    pub async fn create<'e, E>(executor: E, data: CreateMembership) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(&format!(
            "INSERT INTO account_memberships (public_id, user_id, account_id, role, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(data.user_id)
        .bind(data.account_id)
        .bind(data.role)
        .bind(data.status)
        .fetch_one(executor)
        .await
    }

    /// Finds a user's primary account together with the membership granting it
    ///
    /// Only active memberships count. Returns `None` if the user has none.
    pub async fn find_primary<'e, E>(
        executor: E,
        user_id: i64,
    ) -> Result<Option<(Account, Membership)>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, PrimaryRow>(
            r#"
            SELECT
                m.id, m.public_id, m.user_id, m.account_id, m.role, m.status,
                m.created_at, m.updated_at,
                a.public_id AS account_public_id, a.name AS account_name,
                a.slug AS account_slug, a.status AS account_status,
                a.plan AS account_plan, a.created_at AS account_created_at,
                a.updated_at AS account_updated_at
            FROM account_memberships m
            JOIN accounts a ON a.id = m.account_id
            WHERE m.user_id = $1 AND m.status = 'active'
            ORDER BY m.created_at ASC, m.id ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(row.map(PrimaryRow::split))
    }
}

#[derive(sqlx::FromRow)]
struct PrimaryRow {
    #[sqlx(flatten)]
    membership: Membership,
    account_public_id: Uuid,
    account_name: String,
    account_slug: String,
    account_status: super::account::AccountStatus,
    account_plan: super::account::AccountPlan,
    account_created_at: DateTime<Utc>,
    account_updated_at: DateTime<Utc>,
}

impl PrimaryRow {
    fn split(self) -> (Account, Membership) {
        let account = Account {
            id: self.membership.account_id,
            public_id: self.account_public_id,
            name: self.account_name,
            slug: self.account_slug,
            status: self.account_status,
            plan: self.account_plan,
            created_at: self.account_created_at,
            updated_at: self.account_updated_at,
        };

        (account, self.membership)
    }
}
