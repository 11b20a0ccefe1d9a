/// Password hashing and verification using Argon2id
///
/// Stored hashes are PHC strings, so the salt and cost parameters travel with
/// the hash and verification needs nothing else.
///
/// # Parameters
///
/// - **Algorithm**: Argon2id, version 0x13
/// - **Memory**: 64 MB (65536 KB)
/// - **Iterations**: 3 passes
/// - **Parallelism**: 4 lanes
/// - **Output**: 32-byte hash
///
/// # Example
///
/// ```
/// use latchkey_shared::auth::password::{hash_password, verify};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Secret123!")?;
///
/// assert!(verify(&hash, "Secret123!"));
/// assert!(!verify(&hash, "secret123!"));
/// # Ok(())
/// # }
/// ```

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),
}

fn argon2id() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(65536) // 64 MB
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password using Argon2id with a fresh random salt
///
/// Returns the PHC string, e.g. `$argon2id$v=19$m=65536,t=3,p=4$<salt>$<hash>`.
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2id()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a plaintext password against a stored hash
///
/// Returns `false` for a wrong password and for a hash that cannot be parsed;
/// neither case is an error to the caller. Comparison is constant-time.
pub fn verify(stored_hash: &str, plaintext: &str) -> bool {
    let parsed_hash = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!("Stored password hash could not be parsed");
            return false;
        }
    };

    // Parameters are embedded in the hash
    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed_hash) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            tracing::warn!(error = %e, "Password verification failed");
            false
        }
    }
}

/// Hash that unknown-email logins verify against
static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

fn dummy_hash() -> Option<&'static str> {
    DUMMY_HASH
        .get_or_init(|| hash_password("latchkey-dummy-password").ok())
        .as_deref()
}

/// Computes the dummy hash ahead of the first login
///
/// Otherwise the first unknown-email login would pay for a hash on top of
/// the verification.
pub fn prime_dummy_hash() {
    if dummy_hash().is_none() {
        tracing::warn!("Dummy password hash could not be computed");
    }
}

/// Burns one verification against a fixed hash
///
/// Used when no user matches a login email, so that the unknown-email path
/// costs the same as the wrong-password path.
pub fn verify_dummy(plaintext: &str) {
    if let Some(hash) = dummy_hash() {
        let _ = verify(hash, plaintext);
    }
}

#[cfg(test)]
pub(crate) fn dummy_hash_ready() -> bool {
    DUMMY_HASH.get().is_some()
}

/// Validates password strength
///
/// A password must be at least 8 characters long and contain an uppercase
/// letter, a lowercase letter, a digit and a special character. The error is
/// a message fragment meant to follow the field name ("Password ...").
///
/// # Example
///
/// ```
/// use latchkey_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("Secret123!").is_ok());
/// assert!(validate_password_strength("Sh0rt!").is_err());
/// assert!(validate_password_strength("Password123").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("is too short (minimum is 8 characters)".to_string());
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("must contain at least one uppercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("must contain at least one lowercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_numeric()) {
        return Err("must contain at least one digit".to_string());
    }

    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err("must contain at least one special character".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        let hash1 = hash_password("same_password").expect("Hash 1 should succeed");
        let hash2 = hash_password("same_password").expect("Hash 2 should succeed");

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_correct_and_incorrect() {
        let hash = hash_password("correct_password").expect("Hash should succeed");

        assert!(verify(&hash, "correct_password"));
        assert!(!verify(&hash, "wrong_password"));
        assert!(!verify(&hash, ""));
    }

    #[test]
    fn test_verify_malformed_hash_is_false() {
        assert!(!verify("invalid_hash", "password"));
        assert!(!verify("$argon2id$invalid", "password"));
        assert!(!verify("", "password"));
    }

    #[test]
    fn test_verify_unicode_password() {
        let password = "unicode-密码-パスワード";
        let hash = hash_password(password).expect("Hash should succeed");
        assert!(verify(&hash, password));
    }

    #[test]
    fn test_prime_dummy_hash() {
        prime_dummy_hash();

        assert!(dummy_hash_ready());
        let hash = dummy_hash().expect("Dummy hash should be computed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(!verify(hash, "Secret123!"));
    }

    #[test]
    fn test_validate_password_strength_valid() {
        for password in ["Secret123!", "MyP@ssw0rd!", "C0mpl3x#Pwd"] {
            assert!(
                validate_password_strength(password).is_ok(),
                "Password '{}' should be valid",
                password
            );
        }
    }

    #[test]
    fn test_validate_password_strength_failures() {
        let cases = [
            ("Sh0rt!", "minimum is 8 characters"),
            ("lowercase1!", "uppercase letter"),
            ("UPPERCASE1!", "lowercase letter"),
            ("NoDigits!", "digit"),
            ("NoSpecial123", "special character"),
        ];

        for (password, expected) in cases {
            let err = validate_password_strength(password).unwrap_err();
            assert!(err.contains(expected), "{}: {}", password, err);
        }
    }
}
