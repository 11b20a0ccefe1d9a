/// In-memory backend for [`AuthStore`]
///
/// Mirrors the Postgres schema's rules: unique emails, slugs, digests and
/// (user, account) pairs, IDs allocated from 1 per table, and all-or-nothing
/// multi-row writes. Each operation runs under a single mutex acquisition and
/// never awaits while holding it.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use super::{
    AuthStore, NewRegistration, Registration, StoreError, StoreResult, ALREADY_MEMBER,
    EMAIL_TAKEN, SLUG_TAKEN,
};
use crate::models::{
    account::{Account, CreateAccount},
    membership::{CreateMembership, Membership},
    refresh_token::{CreateRefreshToken, RefreshToken},
    user::{CreateUser, User},
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    accounts: Vec<Account>,
    memberships: Vec<Membership>,
    refresh_tokens: Vec<RefreshToken>,
    last_user_id: i64,
    last_account_id: i64,
    last_membership_id: i64,
    last_refresh_token_id: i64,
}

impl Tables {
    fn email_taken(&self, email: &str) -> bool {
        self.users.iter().any(|u| u.email == email)
    }

    fn slug_taken(&self, slug: &str) -> bool {
        self.accounts.iter().any(|a| a.slug == slug)
    }

    fn is_member(&self, user_id: i64, account_id: i64) -> bool {
        self.memberships
            .iter()
            .any(|m| m.user_id == user_id && m.account_id == account_id)
    }

    fn build_user(&self, data: CreateUser) -> User {
        let now = Utc::now();
        User {
            id: self.last_user_id + 1,
            public_id: Uuid::now_v7(),
            email: User::normalize_email(&data.email),
            name: data.name,
            password_hash: data.password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    fn build_account(&self, data: CreateAccount) -> Account {
        let now = Utc::now();
        Account {
            id: self.last_account_id + 1,
            public_id: Uuid::now_v7(),
            name: data.name,
            slug: data.slug,
            status: data.status,
            plan: data.plan,
            created_at: now,
            updated_at: now,
        }
    }

    fn build_membership(&self, data: CreateMembership) -> Membership {
        let now = Utc::now();
        Membership {
            id: self.last_membership_id + 1,
            public_id: Uuid::now_v7(),
            user_id: data.user_id,
            account_id: data.account_id,
            role: data.role,
            status: data.status,
            created_at: now,
            updated_at: now,
        }
    }

    fn push_user(&mut self, user: User) {
        self.last_user_id = user.id;
        self.users.push(user);
    }

    fn push_account(&mut self, account: Account) {
        self.last_account_id = account.id;
        self.accounts.push(account);
    }

    fn push_membership(&mut self, membership: Membership) {
        self.last_membership_id = membership.id;
        self.memberships.push(membership);
    }

    fn insert_refresh_token(&mut self, data: CreateRefreshToken) -> StoreResult<RefreshToken> {
        if self
            .refresh_tokens
            .iter()
            .any(|t| t.jti == data.jti || t.token_digest == data.token_digest)
        {
            return Err(StoreError::Invalid(vec![
                "Refresh token has already been issued".to_string(),
            ]));
        }

        let now = Utc::now();
        let token = RefreshToken {
            id: self.last_refresh_token_id + 1,
            public_id: Uuid::now_v7(),
            user_id: data.user_id,
            jti: data.jti,
            token_digest: data.token_digest,
            expires_at: data.expires_at,
            revoked_at: None,
            last_used_at: None,
            device_info: Json(data.device_info),
            created_at: now,
            updated_at: now,
        };

        self.last_refresh_token_id = token.id;
        self.refresh_tokens.push(token.clone());
        Ok(token)
    }

    fn refresh_token_mut(&mut self, id: i64) -> Option<&mut RefreshToken> {
        self.refresh_tokens.iter_mut().find(|t| t.id == id)
    }
}

/// Store holding every table in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock never leaves a half-applied write
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a user directly
    pub fn insert_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut tables = self.lock();
        let user = tables.build_user(data);
        if tables.email_taken(&user.email) {
            return Err(StoreError::Invalid(vec![EMAIL_TAKEN.to_string()]));
        }

        tables.push_user(user.clone());
        Ok(user)
    }

    /// Inserts an account with exactly the given slug
    pub fn insert_account(&self, data: CreateAccount) -> StoreResult<Account> {
        let mut tables = self.lock();
        if tables.slug_taken(&data.slug) {
            return Err(StoreError::Invalid(vec![SLUG_TAKEN.to_string()]));
        }

        let account = tables.build_account(data);
        tables.push_account(account.clone());
        Ok(account)
    }

    /// Inserts a membership directly
    ///
    /// Only the (user, account) uniqueness rule is checked; the referenced
    /// rows need not exist yet.
    pub fn insert_membership(&self, data: CreateMembership) -> StoreResult<Membership> {
        let mut tables = self.lock();
        if tables.is_member(data.user_id, data.account_id) {
            return Err(StoreError::Invalid(vec![ALREADY_MEMBER.to_string()]));
        }

        let membership = tables.build_membership(data);
        tables.push_membership(membership.clone());
        Ok(membership)
    }

    /// All refresh tokens of a user, oldest first
    pub fn refresh_tokens_for(&self, user_id: i64) -> Vec<RefreshToken> {
        self.lock()
            .refresh_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn count_users(&self) -> usize {
        self.lock().users.len()
    }

    pub fn count_accounts(&self) -> usize {
        self.lock().accounts.len()
    }

    pub fn count_memberships(&self) -> usize {
        self.lock().memberships.len()
    }

    pub fn count_refresh_tokens(&self) -> usize {
        self.lock().refresh_tokens.len()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = User::normalize_email(email);
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn primary_account(&self, user_id: i64) -> StoreResult<Option<(Account, Membership)>> {
        let tables = self.lock();

        let membership = tables
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id && m.is_active())
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(membership.and_then(|membership| {
            tables
                .accounts
                .iter()
                .find(|a| a.id == membership.account_id)
                .map(|account| (account.clone(), membership.clone()))
        }))
    }

    async fn register(&self, registration: NewRegistration) -> StoreResult<Registration> {
        let mut tables = self.lock();

        // Stage every row, check every rule, then apply
        let user = tables.build_user(registration.user);
        if tables.email_taken(&user.email) {
            return Err(StoreError::Invalid(vec![EMAIL_TAKEN.to_string()]));
        }

        let mut n = 0;
        let slug = loop {
            let candidate = Account::slug_candidate(&registration.account.slug, n);
            if !tables.slug_taken(&candidate) {
                break candidate;
            }
            n += 1;
        };
        let account = tables.build_account(CreateAccount {
            slug,
            ..registration.account
        });

        if tables.is_member(user.id, account.id) {
            return Err(StoreError::Invalid(vec![ALREADY_MEMBER.to_string()]));
        }
        let membership = tables.build_membership(CreateMembership::owner(user.id, account.id));

        tables.push_user(user.clone());
        tables.push_account(account.clone());
        tables.push_membership(membership.clone());

        Ok(Registration {
            user,
            account,
            membership,
        })
    }

    async fn create_refresh_token(&self, token: CreateRefreshToken) -> StoreResult<RefreshToken> {
        self.lock().insert_refresh_token(token)
    }

    async fn find_refresh_token(&self, token_digest: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(self
            .lock()
            .refresh_tokens
            .iter()
            .find(|t| t.token_digest == token_digest)
            .cloned())
    }

    async fn revoke_refresh_token(&self, id: i64) -> StoreResult<Option<RefreshToken>> {
        let mut tables = self.lock();

        Ok(tables.refresh_token_mut(id).map(|token| {
            if token.revoked_at.is_none() {
                let now = Utc::now();
                token.revoked_at = Some(now);
                token.updated_at = now;
            }
            token.clone()
        }))
    }

    async fn rotate_refresh_token(
        &self,
        id: i64,
        replacement: CreateRefreshToken,
    ) -> StoreResult<Option<RefreshToken>> {
        let mut tables = self.lock();

        let active = tables
            .refresh_tokens
            .iter()
            .any(|t| t.id == id && t.is_active());
        if !active {
            return Ok(None);
        }

        let created = tables.insert_refresh_token(replacement)?;

        if let Some(token) = tables.refresh_token_mut(id) {
            let now = Utc::now();
            token.revoked_at = Some(now);
            token.last_used_at = Some(now);
            token.updated_at = now;
        }

        Ok(Some(created))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::AccountPlan;
    use crate::models::membership::{MembershipRole, MembershipStatus};
    use crate::models::refresh_token::DeviceInfo;
    use chrono::Duration;

    fn create_user(email: &str) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            name: "Ada".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn registration(email: &str, account_name: &str) -> NewRegistration {
        NewRegistration {
            user: create_user(email),
            account: CreateAccount::new(account_name, AccountPlan::Free),
        }
    }

    fn refresh_token(user_id: i64, digest: &str) -> CreateRefreshToken {
        CreateRefreshToken {
            user_id,
            jti: Uuid::new_v4().to_string(),
            token_digest: digest.to_string(),
            expires_at: Utc::now() + Duration::days(30),
            device_info: DeviceInfo::default(),
        }
    }

    #[tokio::test]
    async fn test_register_creates_all_three_rows() {
        let store = MemoryStore::new();
        let created = store
            .register(registration("ada@example.com", "Ada's Account"))
            .await
            .unwrap();

        assert_eq!(created.user.id, 1);
        assert_eq!(created.account.slug, "ada-s-account");
        assert_eq!(created.membership.user_id, created.user.id);
        assert_eq!(created.membership.account_id, created.account.id);
        assert_eq!(created.membership.role, MembershipRole::Owner);
        assert_eq!(store.count_memberships(), 1);
    }

    #[tokio::test]
    async fn test_register_disambiguates_slug() {
        let store = MemoryStore::new();
        store.register(registration("a@example.com", "Acme")).await.unwrap();
        let second = store.register(registration("b@example.com", "Acme")).await.unwrap();
        let third = store.register(registration("c@example.com", "Acme")).await.unwrap();

        assert_eq!(second.account.slug, "acme-1");
        assert_eq!(third.account.slug, "acme-2");
    }

    #[tokio::test]
    async fn test_register_duplicate_email_writes_nothing() {
        let store = MemoryStore::new();
        store.register(registration("ada@example.com", "Ada")).await.unwrap();

        let result = store.register(registration("ADA@example.com ", "Other")).await;

        match result {
            Err(StoreError::Invalid(messages)) => assert_eq!(messages, vec![EMAIL_TAKEN]),
            other => panic!("expected duplicate email, got {:?}", other),
        }
        assert_eq!(store.count_users(), 1);
        assert_eq!(store.count_accounts(), 1);
    }

    #[tokio::test]
    async fn test_primary_account_is_earliest_active_membership() {
        let store = MemoryStore::new();
        let user = store.insert_user(create_user("ada@example.com")).unwrap();
        let first = store
            .insert_account(CreateAccount::new("First", AccountPlan::Free))
            .unwrap();
        let second = store
            .insert_account(CreateAccount::new("Second", AccountPlan::Free))
            .unwrap();

        store
            .insert_membership(CreateMembership {
                user_id: user.id,
                account_id: first.id,
                role: MembershipRole::Owner,
                status: MembershipStatus::Suspended,
            })
            .unwrap();
        store
            .insert_membership(CreateMembership {
                user_id: user.id,
                account_id: second.id,
                role: MembershipRole::Editor,
                status: MembershipStatus::Active,
            })
            .unwrap();

        let (account, membership) = store.primary_account(user.id).await.unwrap().unwrap();
        assert_eq!(account.id, second.id);
        assert_eq!(membership.role, MembershipRole::Editor);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = MemoryStore::new();
        let token = store.create_refresh_token(refresh_token(1, "d1")).await.unwrap();

        let first = store.revoke_refresh_token(token.id).await.unwrap().unwrap();
        let second = store.revoke_refresh_token(token.id).await.unwrap().unwrap();

        assert!(first.revoked_at.is_some());
        assert_eq!(first.revoked_at, second.revoked_at);
    }

    #[tokio::test]
    async fn test_rotate_is_single_use() {
        let store = MemoryStore::new();
        let token = store.create_refresh_token(refresh_token(1, "d1")).await.unwrap();

        let rotated = store
            .rotate_refresh_token(token.id, refresh_token(1, "d2"))
            .await
            .unwrap();
        assert!(rotated.is_some());

        let again = store
            .rotate_refresh_token(token.id, refresh_token(1, "d3"))
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(store.count_refresh_tokens(), 2);

        let old = store.find_refresh_token("d1").await.unwrap().unwrap();
        assert!(old.is_revoked());
        assert!(old.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_rotate_expired_token_writes_nothing() {
        let store = MemoryStore::new();
        let mut expired = refresh_token(1, "d1");
        expired.expires_at = Utc::now() - Duration::seconds(1);
        let token = store.create_refresh_token(expired).await.unwrap();

        let rotated = store
            .rotate_refresh_token(token.id, refresh_token(1, "d2"))
            .await
            .unwrap();

        assert!(rotated.is_none());
        assert_eq!(store.count_refresh_tokens(), 1);
    }
}
