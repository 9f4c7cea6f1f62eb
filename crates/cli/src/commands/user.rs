//! User account commands.
//!
//! ```bash
//! andes-cli user create -e admin@andes.cl -n "Administración" -r admin
//! ```

use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;

use andes_api::services::auth::{AuthError, AuthService};
use andes_core::UserRole;

use super::{ConnectError, connect};

const GENERATED_PASSWORD_LENGTH: usize = 20;

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Invalid role: {0}. Valid roles: customer, staff, admin")]
    InvalidRole(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a user with an explicit role.
///
/// # Errors
///
/// Returns `UserError::InvalidRole` for an unknown role, or the validation
/// and conflict errors of [`AuthService::create_user`].
pub async fn create(
    email: &str,
    name: &str,
    role: &str,
    password: Option<String>,
) -> Result<(), UserError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;

    let generated = password.is_none();
    let password = password.unwrap_or_else(generate_password);

    let pool = connect().await?;
    let user = AuthService::new(&pool)
        .create_user(email, name, None, &password, role)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "User created");
    if generated {
        tracing::info!("Generated password (shown once): {password}");
    }
    Ok(())
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_password() {
        let a = generate_password();
        let b = generate_password();
        assert_eq!(a.len(), GENERATED_PASSWORD_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
