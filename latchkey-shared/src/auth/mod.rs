/// Authentication primitives
///
/// # Modules
///
/// - [`password`]: Argon2id hashing, verification and strength rules
/// - [`jwt`]: Access token codec (HS256, 30 minutes)
/// - [`refresh_token`]: Refresh token secrets, digests and persistence
///
/// # Example
///
/// ```
/// use latchkey_shared::auth::password::{hash_password, verify};
/// use latchkey_shared::auth::refresh_token::{digest, generate_secret};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Secret123!")?;
/// assert!(verify(&hash, "Secret123!"));
///
/// let secret = generate_secret();
/// assert_eq!(digest(&secret).len(), 64);
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod password;
pub mod refresh_token;
