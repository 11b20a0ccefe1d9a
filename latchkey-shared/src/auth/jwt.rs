/// Access token encoding and decoding
///
/// Access tokens are HS256-signed JWTs carrying the identity, tenant and role of
/// the caller. They are short-lived (30 minutes) and never stored server-side.
///
/// # Claims
///
/// - `sub`: public ID of the user
/// - `account_id`: public ID of the account the token is scoped to
/// - `email`: user's normalised email
/// - `role`: the user's membership role in that account
/// - `iat` / `exp`: issued-at and expiry (Unix seconds), `exp - iat == 1800`
///
/// # Decoding
///
/// Signature and algorithm are checked before anything else. A correctly signed
/// token whose expiry has been reached decodes to [`JwtError::Expired`]; every
/// other failure is [`JwtError::Malformed`].
///
/// # Example
///
/// ```
/// use latchkey_shared::auth::jwt::{AccessTokenCodec, Claims};
/// use latchkey_shared::models::membership::MembershipRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = AccessTokenCodec::new("a-secret-of-at-least-thirty-two-bytes!");
///
/// let claims = Claims::new(Uuid::now_v7(), Uuid::now_v7(), "ada@example.com", MembershipRole::Owner);
/// let token = codec.encode(&claims)?;
///
/// let decoded = codec.decode(&token)?;
/// assert_eq!(decoded.sub, claims.sub);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{account::Account, membership::MembershipRole, user::User};

/// Access token lifetime in seconds
pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 1800;

/// Error type for access token operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to sign a token
    #[error("Failed to create token: {0}")]
    Encode(String),

    /// Signature is valid but the expiry has been reached
    #[error("Token has expired")]
    Expired,

    /// Tampered, truncated, wrongly signed or otherwise undecodable token
    #[error("Invalid token")]
    Malformed(String),
}

/// Access token claim set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user public ID
    pub sub: Uuid,

    /// Account public ID
    pub account_id: Uuid,

    /// User email
    pub email: String,

    /// Membership role in `account_id`
    pub role: MembershipRole,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Creates claims issued now with the standard 30 minute lifetime
    pub fn new(sub: Uuid, account_id: Uuid, email: &str, role: MembershipRole) -> Self {
        Self::with_expiration(
            sub,
            account_id,
            email,
            role,
            Duration::seconds(ACCESS_TOKEN_TTL_SECONDS),
        )
    }

    /// Creates claims with a custom lifetime
    ///
    /// Negative durations produce an already-expired claim set, which is how
    /// tests exercise the expiry path.
    pub fn with_expiration(
        sub: Uuid,
        account_id: Uuid,
        email: &str,
        role: MembershipRole,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub,
            account_id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
        }
    }

    /// Builds the claim set for a user acting in an account
    pub fn for_member(user: &User, account: &Account, role: MembershipRole) -> Self {
        Self::new(user.public_id, account.public_id, &user.email, role)
    }

    /// Checks if the expiry has been reached
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs and verifies access tokens with a single symmetric secret
///
/// The secret is injected from configuration at startup; the codec is cheap
/// to clone and is shared by every request.
#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AccessTokenCodec {
    /// Creates a codec from the signing secret
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issues a fresh access token for a user acting in an account
    pub fn issue(
        &self,
        user: &User,
        account: &Account,
        role: MembershipRole,
    ) -> Result<String, JwtError> {
        self.encode(&Claims::for_member(user, account, role))
    }

    /// Signs an arbitrary claim set with HS256
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::Encode(format!("Token encoding failed: {}", e)))
    }

    /// Verifies a token and extracts its claims
    ///
    /// # Errors
    ///
    /// - `JwtError::Expired` if the signature is valid and `now >= exp`
    /// - `JwtError::Malformed` for anything else that prevents decoding
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below with `now >= exp` and no leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| JwtError::Malformed(e.to_string()))?;

        if token_data.claims.is_expired() {
            return Err(JwtError::Expired);
        }

        Ok(token_data.claims)
    }
}

impl std::fmt::Debug for AccessTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenCodec").finish_non_exhaustive()
    }
}
