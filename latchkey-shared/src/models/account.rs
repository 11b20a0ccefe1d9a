/// Account model and database operations
///
/// Accounts are the tenant boundary. Each has a unique URL slug derived from
/// its name, a lifecycle status and a billing plan. Users reach accounts
/// through [`super::membership::Membership`].
///
/// # Schema
///
/// ```sql
/// CREATE TYPE account_status AS ENUM ('active', 'suspended', 'deleted');
/// CREATE TYPE account_plan AS ENUM ('free', 'pro', 'team');
///
/// CREATE TABLE accounts (
///     id BIGSERIAL PRIMARY KEY,
///     public_id UUID NOT NULL DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     slug VARCHAR(255) NOT NULL,
///     status account_status NOT NULL DEFAULT 'active',
///     plan account_plan NOT NULL DEFAULT 'free',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT accounts_slug_key UNIQUE (slug)
/// );
/// ```
///
/// # Slugs
///
/// ```
/// use latchkey_shared::models::account::Account;
///
/// assert_eq!(Account::slugify("Ada's Account"), "ada-s-account");
/// assert_eq!(Account::slugify("  Acme -- Corp  "), "acme-corp");
/// assert_eq!(Account::slugify("Café Société"), "cafe-societe");
/// ```
///
/// A slug that is already taken is disambiguated with a numeric suffix:
/// `acme`, `acme-1`, `acme-2`, ... Base slugs are capped at
/// [`MAX_SLUG_CHARS`] so a suffixed slug still fits its column.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validate_column_width;

/// Longest base slug produced by [`Account::slugify`]
pub const MAX_SLUG_CHARS: usize = 240;

/// Lifecycle status of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    Deleted,
}

/// Billing plan of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountPlan {
    /// Default plan for new registrations
    #[default]
    Free,
    Pro,
    Team,
}

/// Account model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Internal row ID, never exposed
    #[serde(skip_serializing)]
    pub id: i64,

    /// External identifier (UUID v7)
    pub public_id: Uuid,

    /// Display name
    pub name: String,

    /// Unique URL slug
    pub slug: String,

    /// Lifecycle status
    pub status: AccountStatus,

    /// Billing plan
    pub plan: AccountPlan,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new account
///
/// `slug` is the candidate produced by [`Account::slugify`]; the store
/// appends a suffix if it is already taken.
#[derive(Debug, Clone, Validate)]
pub struct CreateAccount {
    /// Display name
    #[validate(
        length(min = 2, message = "is too short (minimum is 2 characters)"),
        custom(function = "validate_column_width")
    )]
    pub name: String,

    /// URL slug
    #[validate(
        length(min = 1, message = "can't be blank"),
        custom(function = "validate_slug_format")
    )]
    pub slug: String,

    pub status: AccountStatus,

    pub plan: AccountPlan,
}

impl CreateAccount {
    /// Builds the input for a new active account, deriving the slug from the name
    pub fn new(name: &str, plan: AccountPlan) -> Self {
        Self {
            name: name.to_string(),
            slug: Account::slugify(name),
            status: AccountStatus::Active,
            plan,
        }
    }
}

/// Checks a slug against `^[a-z0-9-]+$`
fn validate_slug_format(slug: &str) -> Result<(), ValidationError> {
    let well_formed = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if well_formed {
        Ok(())
    } else {
        let mut error = ValidationError::new("slug_format");
        error.message = Some(Cow::from(
            "only lowercase letters, numbers, and hyphens",
        ));
        Err(error)
    }
}

/// ASCII spelling of a lowercase accented Latin letter
fn fold_latin(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'ł' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'œ' => "oe",
        'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ß' => "ss",
        'ť' | 'ţ' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

const COLUMNS: &str = "id, public_id, name, slug, status, plan, created_at, updated_at";

impl Account {
    /// Derives a URL slug from a display name
    ///
    /// Lowercases, folds accented Latin letters to ASCII (`é` -> `e`,
    /// `ß` -> `ss`), turns every run of other characters into a single hyphen
    /// and trims hyphens from both ends. Underscores are left in place and
    /// later fail the slug format check. The result is at most
    /// [`MAX_SLUG_CHARS`] long.
    pub fn slugify(name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        let mut pending_separator = false;

        for c in name.chars().flat_map(char::to_lowercase) {
            let mut buf = [0u8; 4];
            let piece: &str = if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c.encode_utf8(&mut buf)
            } else if let Some(folded) = fold_latin(c) {
                folded
            } else {
                pending_separator = true;
                continue;
            };

            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push_str(piece);
        }

        slug.truncate(MAX_SLUG_CHARS);
        while slug.ends_with('-') {
            slug.pop();
        }

        slug
    }

    /// Returns the `n`th slug candidate for a base slug
    ///
    /// Candidate 0 is the base itself; candidate `n` is `base-n`.
    pub fn slug_candidate(base: &str, n: u32) -> String {
        if n == 0 {
            base.to_string()
        } else {
            format!("{}-{}", base, n)
        }
    }

    /// Inserts a new account with exactly the given slug
    ///
    /// # Errors
    ///
    /// Returns a unique violation on `accounts_slug_key` if the slug is taken
    pub async fn create<'e, E>(executor: E, data: CreateAccount) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (public_id, name, slug, status, plan)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(data.name)
        .bind(data.slug)
        .bind(data.status)
        .bind(data.plan)
        .fetch_one(executor)
        .await
    }

    /// Checks whether a slug is already in use
    pub async fn slug_exists<'e, E>(executor: E, slug: &str) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE slug = $1)")
            .bind(slug)
            .fetch_one(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        let cases = [
            ("Ada's Account", "ada-s-account"),
            ("Test Account", "test-account"),
            ("ACME", "acme"),
            ("  leading and trailing  ", "leading-and-trailing"),
            ("multiple   spaces---and-dashes", "multiple-spaces-and-dashes"),
            ("Café Société", "cafe-societe"),
            ("Ærøskøbing Straße", "aeroskobing-strasse"),
            ("Łódź", "lodz"),
            ("北京 Office", "office"),
            ("Plan 9", "plan-9"),
            ("!!!", ""),
        ];

        for (name, expected) in cases {
            assert_eq!(Account::slugify(name), expected, "slugify({:?})", name);
        }
    }

    #[test]
    fn test_slugify_caps_length() {
        let slug = Account::slugify(&"a".repeat(300));
        assert_eq!(slug.len(), MAX_SLUG_CHARS);

        // No dangling separator after the cut
        let name = format!("{} b", "a".repeat(MAX_SLUG_CHARS));
        assert_eq!(Account::slugify(&name), "a".repeat(MAX_SLUG_CHARS));
    }

    #[test]
    fn test_slug_candidates() {
        assert_eq!(Account::slug_candidate("acme", 0), "acme");
        assert_eq!(Account::slug_candidate("acme", 1), "acme-1");
        assert_eq!(Account::slug_candidate("acme", 12), "acme-12");
    }

    #[test]
    fn test_create_account_validation() {
        assert!(CreateAccount::new("Ada's Account", AccountPlan::Free)
            .validate()
            .is_ok());

        // Too short
        assert!(CreateAccount::new("A", AccountPlan::Free).validate().is_err());

        // Wider than the column
        assert!(CreateAccount::new(&"x".repeat(255), AccountPlan::Free)
            .validate()
            .is_ok());
        assert!(CreateAccount::new(&"x".repeat(256), AccountPlan::Free)
            .validate()
            .is_err());

        // Slugifies to nothing
        assert!(CreateAccount::new("!!!", AccountPlan::Free).validate().is_err());

        // Underscores survive slugify but not the format check
        assert!(CreateAccount::new("my_shop", AccountPlan::Free)
            .validate()
            .is_err());
    }

    #[test]
    fn test_slug_format() {
        assert!(validate_slug_format("test-slug-1").is_ok());
        assert!(validate_slug_format("Test Slug").is_err());
        assert!(validate_slug_format("").is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(AccountStatus::default(), AccountStatus::Active);
        assert_eq!(AccountPlan::default(), AccountPlan::Free);
    }
}
