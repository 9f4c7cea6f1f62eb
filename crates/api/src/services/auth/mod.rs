//! Authentication service.
//!
//! Email and password accounts, hashed with Argon2id.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use sqlx::PgPool;

use andes_core::{Email, Rut, UserRole};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length, to bound hashing cost.
const MAX_PASSWORD_LENGTH: usize = 128;

const MAX_NAME_LENGTH: usize = 200;

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub rut: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a customer account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::InvalidRut` or
    /// `AuthError::InvalidName` for malformed input.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        self.create_user(
            &registration.email,
            &registration.full_name,
            registration.rut.as_deref(),
            &registration.password,
            UserRole::Customer,
        )
        .await
    }

    /// Create an account with an explicit role.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub async fn create_user(
        &self,
        email: &str,
        full_name: &str,
        rut: Option<&str>,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let full_name = validate_name(full_name)?;
        let rut = rut
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(Rut::parse)
            .transpose()?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;

        self.users
            .create(&email, full_name, rut.as_ref(), role, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// Unknown emails, inactive accounts and wrong passwords all fail the
    /// same way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;
        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }
}

fn validate_name(full_name: &str) -> Result<&str, AuthError> {
    let name = full_name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName);
    }
    Ok(name)
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password with Argon2id and a random salt.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("cordillera-2024").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("cordillera-2024", &hash).is_ok());
        assert!(matches!(
            verify_password("cordillera-2025", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(
            hash_password("cordillera-2024").unwrap(),
            hash_password("cordillera-2024").unwrap()
        );
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("whatever1", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length() {
        assert!(matches!(
            validate_password("corta"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("ochochar").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_name_is_trimmed() {
        assert_eq!(validate_name("  Ana Pérez ").unwrap(), "Ana Pérez");
        assert!(matches!(validate_name("   "), Err(AuthError::InvalidName)));
    }
}
