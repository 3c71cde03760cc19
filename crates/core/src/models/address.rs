//! Saved postal addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AddressId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub additional_phone: Option<String>,
    pub street: String,
    pub additional_info: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address fields as submitted by the buyer for create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub additional_phone: Option<String>,
    pub street: String,
    #[serde(default)]
    pub additional_info: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// Trim every field and turn blank optional fields into `None`.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn optional(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        }

        Self {
            first_name: self.first_name.trim().to_owned(),
            last_name: self.last_name.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            additional_phone: optional(self.additional_phone),
            street: self.street.trim().to_owned(),
            additional_info: optional(self.additional_info),
            city: self.city.trim().to_owned(),
            state: self.state.trim().to_owned(),
            country: self.country.trim().to_owned(),
            zip: optional(self.zip),
            is_default: self.is_default,
        }
    }

    /// Check field presence and lengths. Returns every problem found.
    ///
    /// # Errors
    ///
    /// Returns the list of human-readable validation messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        required(&mut errors, "First name", &self.first_name, 50);
        required(&mut errors, "Last name", &self.last_name, 50);
        if !is_valid_phone(&self.phone) {
            errors.push("Phone number must be 11 digits starting with 0".to_owned());
        }
        if let Some(phone) = &self.additional_phone
            && !is_valid_phone(phone)
        {
            errors.push("Additional phone number must be 11 digits starting with 0".to_owned());
        }
        required(&mut errors, "Street address", &self.street, 255);
        optional_max(&mut errors, "Additional info", self.additional_info.as_deref(), 255);
        required(&mut errors, "City", &self.city, 100);
        required(&mut errors, "State", &self.state, 100);
        required(&mut errors, "Country", &self.country, 100);
        optional_max(&mut errors, "Zip code", self.zip.as_deref(), 20);

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn required(errors: &mut Vec<String>, label: &str, value: &str, max: usize) {
    if value.is_empty() {
        errors.push(format!("{label} is required"));
    } else if value.chars().count() > max {
        errors.push(format!("{label} must be at most {max} characters"));
    }
}

fn optional_max(errors: &mut Vec<String>, label: &str, value: Option<&str>, max: usize) {
    if let Some(value) = value
        && value.chars().count() > max
    {
        errors.push(format!("{label} must be at most {max} characters"));
    }
}

fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 11 && phone.starts_with('0') && phone.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AddressInput {
        AddressInput {
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            phone: "08012345678".into(),
            street: "12 Marina Road".into(),
            city: "Lagos".into(),
            state: "Lagos".into(),
            country: "Nigeria".into(),
            ..AddressInput::default()
        }
    }

    #[test]
    fn test_valid_address_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_phone_rules() {
        let mut input = valid();
        input.phone = "8012345678".into();
        assert!(input.validate().is_err());

        input.phone = "0801234567a".into();
        assert!(input.validate().is_err());

        let mut input = valid();
        input.additional_phone = Some("123".into());
        let errors = input.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Additional phone"));
    }

    #[test]
    fn test_reports_all_problems() {
        let input = AddressInput {
            first_name: "x".repeat(51),
            zip: Some("1".repeat(21)),
            ..valid()
        };
        let errors = input.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_normalized_drops_blank_optionals() {
        let input = AddressInput {
            first_name: "  Ada ".into(),
            additional_info: Some("   ".into()),
            ..valid()
        }
        .normalized();
        assert_eq!(input.first_name, "Ada");
        assert_eq!(input.additional_info, None);
    }
}
