/// Registration orchestrator
///
/// Creates a user, their own account and an active owner membership in one
/// unit of work, then opens a session exactly like a login would.
///
/// Validation runs entity by entity: if the user is invalid, its messages
/// are returned and the account is not looked at.

use tracing::{info, warn};
use validator::Validate;

use super::{AuthError, AuthResult, AuthService, Session};
use crate::auth::password;
use crate::models::{
    account::{AccountPlan, CreateAccount},
    full_messages,
    refresh_token::DeviceInfo,
    user::{CreateUser, User},
};
use crate::store::{NewRegistration, EMAIL_TAKEN};

/// Registration input
#[derive(Clone)]
pub struct RegisterParams {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Defaults to `"<name>'s Account"` when absent or blank
    pub account_name: Option<String>,
}

impl std::fmt::Debug for RegisterParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterParams")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .field("account_name", &self.account_name)
            .finish()
    }
}

/// Registration orchestrator
#[derive(Debug, Clone)]
pub struct RegistrationService {
    auth: AuthService,
}

impl RegistrationService {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    /// Registers a new user with their own account
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` with the messages of the first invalid
    ///   entity, including uniqueness failures detected at insert time
    pub async fn register(&self, params: RegisterParams) -> AuthResult<Session> {
        let email = User::normalize_email(&params.email);
        let name = params.name.trim().to_string();

        let user_messages = self.user_messages(&email, &name, &params.password).await?;
        if !user_messages.is_empty() {
            warn!(messages = ?user_messages, "Registration rejected: invalid user");
            return Err(AuthError::Validation(user_messages));
        }

        let account_name = params
            .account_name
            .as_deref()
            .map(str::trim)
            .filter(|account_name| !account_name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}'s Account", name));

        let account = CreateAccount::new(&account_name, AccountPlan::Free);
        if let Err(errors) = account.validate() {
            let messages = full_messages(&errors);
            warn!(messages = ?messages, "Registration rejected: invalid account");
            return Err(AuthError::Validation(messages));
        }

        let plaintext = params.password;
        let password_hash =
            tokio::task::spawn_blocking(move || password::hash_password(&plaintext)).await??;

        let registration = self
            .auth
            .store()
            .register(NewRegistration {
                user: CreateUser {
                    email,
                    name,
                    password_hash,
                },
                account,
            })
            .await?;

        info!(
            user_id = registration.user.id,
            account_id = registration.account.id,
            slug = %registration.account.slug,
            "User registered"
        );

        self.auth
            .issue_session(
                registration.user,
                registration.account,
                registration.membership.role,
                DeviceInfo::default(),
            )
            .await
    }

    /// Validation messages for the user entity, in attribute order
    async fn user_messages(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> AuthResult<Vec<String>> {
        let candidate = CreateUser {
            email: email.to_string(),
            name: name.to_string(),
            password_hash: String::new(),
        };

        let mut messages = match candidate.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => full_messages(&errors),
        };

        let email_well_formed = !messages.iter().any(|m| m.starts_with("Email "));
        if email_well_formed && self.auth.store().find_user_by_email(email).await?.is_some() {
            // Email sorts first among the user's attributes
            messages.insert(0, EMAIL_TAKEN.to_string());
        }

        if let Err(fragment) = password::validate_password_strength(password) {
            messages.push(format!("Password {}", fragment));
        }

        Ok(messages)
    }
}
