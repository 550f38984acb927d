//! Non-interactive subcommands.

use color_eyre::Result;
use registration::{
    FieldId, FieldValue, FormData, HttpApi, MemoryStorage, RegistrationWizard, Validator,
};
use tracing::info;

use crate::config::Config;

/// Print the department list, one per line. Falls back to the built-in list
/// when the backend cannot be reached.
pub async fn departments(config: Config) -> Result<()> {
    let api = HttpApi::new(config.backend)?;
    let mut wizard = RegistrationWizard::new(api, MemoryStorage::new());
    let list = wizard.load_departments().await?;
    info!(count = list.len(), "departments listed");
    for department in list {
        println!("{department}");
    }
    Ok(())
}

/// Outcome of validating one value from the command line.
pub fn check_message(field: FieldId, value: &str, password: Option<&str>) -> String {
    let validator = Validator::new();
    let mut form = FormData::default();
    if let Some(password) = password {
        form.password = password.to_string();
    }
    let value = if field.is_flag() {
        let mut scratch = FormData::default();
        scratch.set(field, value.into());
        FieldValue::Flag(scratch.get(field).is_truthy())
    } else {
        FieldValue::Text(value)
    };
    validator.validate(field, value, Some(&form))
}

/// Validate `value` as `field` and print the verdict. Returns whether the
/// value passed.
pub fn check(field: FieldId, value: &str, password: Option<&str>) -> bool {
    let message = check_message(field, value, password);
    if message.is_empty() {
        println!("{field}: ok");
        true
    } else {
        println!("{field}: {message}");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn checks_single_values() {
        assert_eq!(check_message(FieldId::RoomNumber, "204", None), "");
        assert_eq!(
            check_message(FieldId::RoomNumber, "2040", None),
            "Room number must be exactly 3 digits"
        );
    }

    #[test]
    fn flags_accept_text() {
        assert_eq!(check_message(FieldId::AgreeRules, "yes", None), "");
        assert_eq!(
            check_message(FieldId::AgreeRules, "no", None),
            "You must agree to follow the hostel rules"
        );
    }

    #[test]
    fn confirmation_uses_password_flag() {
        assert_eq!(
            check_message(FieldId::ConfirmPassword, "Abcd123!", Some("Abcd123!")),
            ""
        );
        assert_eq!(
            check_message(FieldId::ConfirmPassword, "Abcd123!", None),
            "Passwords do not match"
        );
    }

    #[test]
    fn check_reports_the_verdict() {
        assert!(check(FieldId::OtpCode, "424242", None));
        assert!(!check(FieldId::OtpCode, "4242", None));
    }
}
