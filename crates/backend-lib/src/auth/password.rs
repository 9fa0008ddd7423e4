// ============================
// ems-backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use argon2::Argon2;
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Params, Scrypt,
};
use zeroize::Zeroize;

/// scrypt cost parameters accepted by [`hash_password_with_params`]
pub use scrypt::Params as HashParams;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 10;

/// Password complexity requirements
#[derive(Debug, Clone)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

/// Hash a password using scrypt with the crate's recommended parameters
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt.hash_password(plain.as_bytes(), &salt)?.to_string();
    Ok(hash)
}

/// Hash a password using explicit scrypt parameters.
///
/// Verification reads the parameters back out of the PHC string, so hashes
/// made here verify with [`verify_password`] like any other.
pub fn hash_password_with_params(plain: &str, params: Params) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)?
        .to_string();
    Ok(hash)
}

/// Verify a password against a PHC hash.
///
/// Accepts scrypt hashes (what [`hash_password`] produces) and argon2 hashes
/// (accounts imported from elsewhere). An unparseable hash never verifies.
/// That includes bcrypt (`$2a$`/`$2b$`) hashes; such accounts need a new
/// password set from the command line. The digest comparison inside both
/// crates is constant-time.
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    parsed_hash
        .verify_password(&[&Scrypt, &Argon2::default()], plain.as_bytes())
        .is_ok()
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    if password.chars().count() < requirements.min_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(char::is_uppercase) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(char::is_lowercase) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}

/// Securely hash a password and zeroize the original
pub fn hash_password_secure(plain: &mut String) -> anyhow::Result<String> {
    let hash = hash_password(plain);
    plain.zeroize();
    hash
}

#[cfg(test)]
pub(crate) fn fast_params() -> Params {
    // Cheap parameters so tests don't spend seconds per hash
    Params::new(4, 8, 1, Params::RECOMMENDED_LEN).unwrap()
}
