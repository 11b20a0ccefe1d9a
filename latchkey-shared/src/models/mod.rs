/// Database models for Latchkey
///
/// Each model owns its SQL. Query functions take any `PgExecutor`, so the
/// same code runs against the pool or inside a transaction.
///
/// # Models
///
/// - `user`: Identities and password hashes
/// - `account`: Tenants with slug, status and plan
/// - `membership`: User-account relationships with roles
/// - `refresh_token`: Digests of issued refresh tokens
///
/// # Example
///
/// ```no_run
/// use latchkey_shared::models::user::User;
/// use latchkey_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// if let Some(user) = User::find_by_email(&pool, "Ada@Example.com").await? {
///     println!("found {}", user.public_id);
/// }
/// # Ok(())
/// # }
/// ```

pub mod account;
pub mod membership;
pub mod refresh_token;
pub mod user;

use std::borrow::Cow;

use validator::{ValidationError, ValidationErrors};

/// Width of the `VARCHAR` columns holding emails, names and slugs
pub const MAX_COLUMN_CHARS: usize = 255;

/// Rejects text that does not fit a `VARCHAR(255)` column
pub(crate) fn validate_column_width(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() <= MAX_COLUMN_CHARS {
        return Ok(());
    }

    let mut error = ValidationError::new("too_long");
    error.message = Some(Cow::from("is too long (maximum is 255 characters)"));
    Err(error)
}

/// Flattens validation errors into full, human-readable messages
///
/// Each message is the humanised field name followed by the error message,
/// e.g. `"Name is too short (minimum is 2 characters)"`. Fields are sorted
/// so the output is stable.
pub fn full_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<(String, Vec<String>)> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages = errors
                .iter()
                .map(|error| match &error.message {
                    Some(message) => message.to_string(),
                    None => "is invalid".to_string(),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect();

    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, messages)| {
            let attribute = humanize(&field);
            messages
                .into_iter()
                .map(move |message| format!("{} {}", attribute, message))
        })
        .collect()
}

/// Turns a field name into an attribute label: `account_name` -> `Account name`
pub fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
