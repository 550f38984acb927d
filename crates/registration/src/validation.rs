//! Field validation rules and the per-field error/touched bookkeeping.
//!
//! `Validator::validate` is a pure function of `(field, value, form)` plus the
//! calendar year captured when the validator was built. An empty string means
//! the value is valid; anything else is the message to show under the field.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

use crate::field::{FieldId, FieldValue, FormData};

pub const MIN_AGE: i32 = 15;
pub const MAX_AGE: i32 = 30;
pub const PASSWORD_SPECIALS: &str = "@$!%*?&";

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z\s]+$").expect("static regex");
    static ref CONTACT_RE: Regex = Regex::new(r"^[6-9][0-9]{9}$").expect("static regex");
    static ref REGISTRATION_RE: Regex = Regex::new(r"^[0-9]{8,15}$").expect("static regex");
    static ref ROLL_RE: Regex = Regex::new(r"^[A-Za-z0-9]{6,12}$").expect("static regex");
    static ref ROOM_RE: Regex = Regex::new(r"^[0-9]{3}$").expect("static regex");
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex");
    static ref OTP_RE: Regex = Regex::new(r"^[0-9]{6}$").expect("static regex");
}

/// Field validator. Cheap to copy; holds only the reference year for age checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    current_year: i32,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Validator pinned to the current local year.
    pub fn new() -> Self {
        Self::for_year(Local::now().year())
    }

    pub fn for_year(current_year: i32) -> Self {
        Self { current_year }
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    /// Validate `value` as the content of `field`.
    ///
    /// `form` is only consulted by `confirmPassword`; without it the
    /// confirmation is compared against an empty password and never matches.
    pub fn validate(&self, field: FieldId, value: FieldValue<'_>, form: Option<&FormData>) -> String {
        let text = value.as_text();
        let message = match field {
            FieldId::FullName => person_name(text, "Full name"),
            FieldId::FatherName => person_name(text, "Father/Guardian name"),
            FieldId::Dob => self.date_of_birth(text),
            FieldId::BloodGroup => required(text, "Blood group"),
            FieldId::StudentContact => contact(text, "Student contact number"),
            FieldId::ParentContact => contact(text, "Parent/Guardian contact number"),
            FieldId::Address => address(text),
            FieldId::Department => required(text, "Department"),
            FieldId::AcademicYear => required(text, "Academic year"),
            FieldId::RegistrationNumber => registration_number(text),
            FieldId::RollNumber => roll_number(text),
            FieldId::RoomNumber => room_number(text),
            FieldId::EmailId => email(text),
            FieldId::Password => password(text),
            FieldId::ConfirmPassword => {
                confirm_password(text, form.map(|f| f.password.as_str()).unwrap_or_default())
            }
            FieldId::OtpCode => otp_code(text),
            FieldId::Photo => photo(text),
            FieldId::AgreeTerms => agreement(value, "You must accept the terms and conditions"),
            FieldId::AgreePrivacy => agreement(value, "You must accept the privacy policy"),
            FieldId::AgreeRules => agreement(value, "You must agree to follow the hostel rules"),
        };
        message.unwrap_or_default()
    }

    /// String-keyed entry point. Unknown field ids pass without error.
    pub fn validate_named(&self, field: &str, value: FieldValue<'_>, form: Option<&FormData>) -> String {
        match FieldId::from_str(field) {
            Ok(id) => self.validate(id, value, form),
            Err(_) => String::new(),
        }
    }

    /// Validate the value currently stored in `form` for `field`.
    pub fn validate_in(&self, field: FieldId, form: &FormData) -> String {
        self.validate(field, form.get(field), Some(form))
    }

    fn date_of_birth(&self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return Some("Date of birth is required".into());
        }
        let Some(birth_year) = parse_birth_year(text.trim()) else {
            return Some("Enter a valid date of birth (YYYY-MM-DD)".into());
        };
        let age = self.current_year - birth_year;
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return Some(format!("Age must be between {MIN_AGE} and {MAX_AGE} years"));
        }
        None
    }
}

fn parse_birth_year(text: &str) -> Option<i32> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|d| d.year())
        .ok()
}

fn required(text: &str, label: &str) -> Option<String> {
    text.trim()
        .is_empty()
        .then(|| format!("{label} is required"))
}

fn person_name(text: &str, label: &str) -> Option<String> {
    required(text, label)
        .or_else(|| {
            (text.trim().chars().count() < 3)
                .then(|| format!("{label} must be at least 3 characters"))
        })
        .or_else(|| {
            (!NAME_RE.is_match(text)).then(|| format!("{label} can only contain letters and spaces"))
        })
}

fn contact(text: &str, label: &str) -> Option<String> {
    required(text, label).or_else(|| {
        (!CONTACT_RE.is_match(text))
            .then(|| "Enter a valid 10-digit mobile number starting with 6-9".to_string())
    })
}

fn address(text: &str) -> Option<String> {
    required(text, "Address").or_else(|| {
        (text.trim().chars().count() < 10)
            .then(|| "Address must be at least 10 characters".to_string())
    })
}

fn registration_number(text: &str) -> Option<String> {
    required(text, "Registration number").or_else(|| {
        (!REGISTRATION_RE.is_match(text))
            .then(|| "Registration number must be 8 to 15 digits".to_string())
    })
}

fn roll_number(text: &str) -> Option<String> {
    required(text, "Roll number").or_else(|| {
        let shaped = ROLL_RE.is_match(text)
            && text.chars().any(|c| c.is_ascii_alphabetic())
            && text.chars().any(|c| c.is_ascii_digit());
        (!shaped).then(|| {
            "Roll number must be 6 to 12 letters and digits, with at least one of each".to_string()
        })
    })
}

fn room_number(text: &str) -> Option<String> {
    required(text, "Room number").or_else(|| {
        (!ROOM_RE.is_match(text)).then(|| "Room number must be exactly 3 digits".to_string())
    })
}

fn email(text: &str) -> Option<String> {
    (!text.is_empty() && !EMAIL_RE.is_match(text))
        .then(|| "Enter a valid email address".to_string())
}

fn password(text: &str) -> Option<String> {
    if text.is_empty() {
        return Some("Password is required".into());
    }
    let len = text.chars().count();
    if !(8..=20).contains(&len) {
        return Some("Password must be 8 to 20 characters".into());
    }
    let strong = text.chars().any(|c| c.is_ascii_lowercase())
        && text.chars().any(|c| c.is_ascii_uppercase())
        && text.chars().any(|c| c.is_ascii_digit())
        && text.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    (!strong).then(|| {
        format!(
            "Password needs an uppercase letter, a lowercase letter, a number and one of {PASSWORD_SPECIALS}"
        )
    })
}

fn confirm_password(text: &str, password: &str) -> Option<String> {
    if text.is_empty() {
        return Some("Please confirm your password".into());
    }
    (text != password).then(|| "Passwords do not match".to_string())
}

fn otp_code(text: &str) -> Option<String> {
    (!text.is_empty() && !OTP_RE.is_match(text))
        .then(|| "Verification code must be exactly 6 digits".to_string())
}

fn photo(text: &str) -> Option<String> {
    if text.is_empty() {
        return Some("Profile photo is required".into());
    }
    (!text.starts_with("data:image/")).then(|| "Profile photo must be an image".to_string())
}

fn agreement(value: FieldValue<'_>, message: &str) -> Option<String> {
    (!value.is_truthy()).then(|| message.to_string())
}

/// Per-field error messages and touched flags.
///
/// Entries appear the first time a field is validated or touched and are
/// never removed; a field that became valid keeps an empty message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationState {
    errors: BTreeMap<FieldId, String>,
    touched: BTreeMap<FieldId, bool>,
}

impl ValidationState {
    pub fn set_error(&mut self, field: FieldId, message: impl Into<String>) {
        self.errors.insert(field, message.into());
    }

    pub fn touch(&mut self, field: FieldId) {
        self.touched.insert(field, true);
    }

    /// Current message for `field`; empty when valid or never validated.
    pub fn error(&self, field: FieldId) -> &str {
        self.errors.get(&field).map(String::as_str).unwrap_or_default()
    }

    pub fn has_error(&self, field: FieldId) -> bool {
        !self.error(field).is_empty()
    }

    pub fn is_touched(&self, field: FieldId) -> bool {
        self.touched.get(&field).copied().unwrap_or(false)
    }

    /// Fields that currently carry a non-empty message.
    pub fn failing(&self) -> impl Iterator<Item = (FieldId, &str)> {
        self.errors
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(f, m)| (*f, m.as_str()))
    }

    pub fn errors(&self) -> &BTreeMap<FieldId, String> {
        &self.errors
    }

    pub fn touched(&self) -> &BTreeMap<FieldId, bool> {
        &self.touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn v() -> Validator {
        Validator::for_year(2026)
    }

    fn check(field: FieldId, value: &str) -> String {
        v().validate(field, FieldValue::Text(value), None)
    }

    #[test]
    fn validation_is_repeatable() {
        let mut form = FormData::default();
        form.password = "Abcd123!".into();
        form.confirm_password = "Abcd123?".into();
        for id in FieldId::iter() {
            let first = v().validate_in(id, &form);
            let second = v().validate_in(id, &form);
            assert_eq!(first, second, "{id} changed between calls");
        }
    }

    #[test]
    fn names_need_three_letters() {
        assert_eq!(check(FieldId::FullName, ""), "Full name is required");
        assert_eq!(check(FieldId::FullName, " ab "), "Full name must be at least 3 characters");
        assert_eq!(
            check(FieldId::FatherName, "R2D2 Senior"),
            "Father/Guardian name can only contain letters and spaces"
        );
        assert_eq!(check(FieldId::FullName, "Asha Rao"), "");
    }

    #[test]
    fn age_is_year_difference_only() {
        assert_eq!(check(FieldId::Dob, "2011-12-31"), "");
        assert_eq!(check(FieldId::Dob, "1996-01-01"), "");
        assert_eq!(check(FieldId::Dob, "2012-01-01"), "Age must be between 15 and 30 years");
        assert_eq!(check(FieldId::Dob, "1995-06-15"), "Age must be between 15 and 30 years");
        assert_eq!(check(FieldId::Dob, "15/06/2004"), "Enter a valid date of birth (YYYY-MM-DD)");
        assert_eq!(check(FieldId::Dob, ""), "Date of birth is required");
    }

    #[test]
    fn contacts_are_indian_mobile_numbers() {
        assert_eq!(check(FieldId::StudentContact, "9876543210"), "");
        assert_eq!(check(FieldId::ParentContact, "6000000000"), "");
        assert!(!check(FieldId::StudentContact, "5876543210").is_empty());
        assert!(!check(FieldId::StudentContact, "98765 43210").is_empty());
        assert!(!check(FieldId::StudentContact, "987654321").is_empty());
    }

    #[test]
    fn address_needs_ten_characters_after_trim() {
        assert_eq!(check(FieldId::Address, "   Room 1    "), "Address must be at least 10 characters");
        assert_eq!(check(FieldId::Address, "12 Lake Road"), "");
    }

    #[test]
    fn registration_and_roll_numbers() {
        assert_eq!(check(FieldId::RegistrationNumber, "12345678"), "");
        assert!(!check(FieldId::RegistrationNumber, "1234567").is_empty());
        assert!(!check(FieldId::RegistrationNumber, "1234567890123456").is_empty());
        assert_eq!(check(FieldId::RollNumber, "CS21A7"), "");
        assert!(!check(FieldId::RollNumber, "123456").is_empty());
        assert!(!check(FieldId::RollNumber, "ABCDEF").is_empty());
        assert!(!check(FieldId::RollNumber, "CS-217").is_empty());
        assert!(!check(FieldId::RollNumber, "A1234567890BC").is_empty());
    }

    #[test]
    fn room_number_must_be_three_digits() {
        assert_eq!(check(FieldId::RoomNumber, "12A"), "Room number must be exactly 3 digits");
        assert_eq!(check(FieldId::RoomNumber, "1234"), "Room number must be exactly 3 digits");
        assert_eq!(check(FieldId::RoomNumber, "204"), "");
    }

    #[test]
    fn email_and_otp_may_be_empty() {
        assert_eq!(check(FieldId::EmailId, ""), "");
        assert_eq!(check(FieldId::EmailId, "student@college.edu"), "");
        assert_eq!(check(FieldId::EmailId, "student@college"), "Enter a valid email address");
        assert_eq!(check(FieldId::EmailId, "stu dent@college.edu"), "Enter a valid email address");
        assert_eq!(check(FieldId::OtpCode, ""), "");
        assert_eq!(check(FieldId::OtpCode, "123456"), "");
        assert!(!check(FieldId::OtpCode, "12345").is_empty());
        assert!(!check(FieldId::OtpCode, "12a456").is_empty());
    }

    #[test]
    fn password_strength() {
        assert!(!check(FieldId::Password, "abcd1234").is_empty());
        assert_eq!(check(FieldId::Password, "Abcd123!"), "");
        assert_eq!(check(FieldId::Password, "Ab1!"), "Password must be 8 to 20 characters");
        assert_eq!(
            check(FieldId::Password, "Abcdefgh1234567890!!x"),
            "Password must be 8 to 20 characters"
        );
        assert!(!check(FieldId::Password, "ABCD123!").is_empty());
        assert!(!check(FieldId::Password, "Abcd123#").is_empty());
    }

    #[test]
    fn confirmation_matches_password_of_form() {
        let mut form = FormData::default();
        form.password = "Abcd123!".into();
        assert_eq!(
            v().validate(FieldId::ConfirmPassword, FieldValue::Text("Abcd123!"), Some(&form)),
            ""
        );
        assert_eq!(
            v().validate(FieldId::ConfirmPassword, FieldValue::Text("Abcd123?"), Some(&form)),
            "Passwords do not match"
        );
        // no form: compared against an empty password
        assert_eq!(
            v().validate(FieldId::ConfirmPassword, FieldValue::Text("Abcd123!"), None),
            "Passwords do not match"
        );
    }

    #[test]
    fn confirmation_valid_iff_equal() {
        let samples = ["", "Abcd123!", "abcd123!", "Xyz98765@"];
        for pw in samples {
            for confirm in samples {
                let mut form = FormData::default();
                form.password = pw.into();
                form.confirm_password = confirm.into();
                let valid = v().validate_in(FieldId::ConfirmPassword, &form).is_empty();
                assert_eq!(valid, !confirm.is_empty() && confirm == pw, "{pw:?} / {confirm:?}");
            }
        }
    }

    #[test]
    fn photo_and_agreements() {
        assert_eq!(check(FieldId::Photo, ""), "Profile photo is required");
        assert_eq!(check(FieldId::Photo, "data:text/plain;base64,AA=="), "Profile photo must be an image");
        assert_eq!(check(FieldId::Photo, "data:image/png;base64,AA=="), "");
        assert_eq!(v().validate(FieldId::AgreeRules, FieldValue::Flag(true), None), "");
        assert_eq!(
            v().validate(FieldId::AgreeRules, FieldValue::Flag(false), None),
            "You must agree to follow the hostel rules"
        );
    }

    #[test]
    fn unknown_field_names_pass() {
        assert_eq!(v().validate_named("nickname", FieldValue::Text(""), None), "");
        assert_eq!(
            v().validate_named("roomNumber", FieldValue::Text("12A"), None),
            "Room number must be exactly 3 digits"
        );
    }

    #[test]
    fn state_keeps_cleared_entries() {
        let mut state = ValidationState::default();
        state.set_error(FieldId::RoomNumber, "Room number must be exactly 3 digits");
        state.touch(FieldId::RoomNumber);
        state.set_error(FieldId::RoomNumber, "");
        assert!(state.is_touched(FieldId::RoomNumber));
        assert!(!state.has_error(FieldId::RoomNumber));
        assert!(state.errors().contains_key(&FieldId::RoomNumber));
        assert_eq!(state.failing().count(), 0);
    }
}
