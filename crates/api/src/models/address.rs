//! Shipping address model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use andes_core::{AddressId, UserId};

use crate::error::AppError;

const MAX_FIELD_LENGTH: usize = 200;

/// A saved shipping address.
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub recipient: String,
    pub phone: String,
    pub street: String,
    pub number: String,
    pub apartment: Option<String>,
    pub commune: String,
    pub city: String,
    pub region_code: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Address fields as submitted by a client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddressInput {
    pub recipient: String,
    pub phone: String,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub apartment: Option<String>,
    pub commune: String,
    pub city: String,
    pub region_code: String,
}

impl AddressInput {
    /// Trim every field, uppercase the region code and reject blanks.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` naming the first invalid field.
    pub fn normalized(self) -> Result<Self, AppError> {
        Ok(Self {
            recipient: required("recipient", &self.recipient)?,
            phone: required("phone", &self.phone)?,
            street: required("street", &self.street)?,
            number: required("number", &self.number)?,
            apartment: self
                .apartment
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            commune: required("commune", &self.commune)?,
            city: required("city", &self.city)?,
            region_code: required("region_code", &self.region_code)?.to_ascii_uppercase(),
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "{field} must be at most {MAX_FIELD_LENGTH} characters"
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            recipient: " Ana Pérez ".to_string(),
            phone: "+56 9 1234 5678".to_string(),
            street: "Av. Providencia".to_string(),
            number: "1234".to_string(),
            apartment: Some("  ".to_string()),
            commune: "Providencia".to_string(),
            city: "Santiago".to_string(),
            region_code: " rm ".to_string(),
        }
    }

    #[test]
    fn test_normalized_trims_and_uppercases() {
        let address = input().normalized().unwrap();
        assert_eq!(address.recipient, "Ana Pérez");
        assert_eq!(address.region_code, "RM");
        assert_eq!(address.apartment, None);
    }

    #[test]
    fn test_blank_required_field() {
        let mut bad = input();
        bad.commune = "   ".to_string();
        let err = bad.normalized().unwrap_err();
        assert_eq!(err.to_string(), "Bad request: commune is required");
    }
}
