//! Registration form fields.
//!
//! - `FieldId`: closed set of field identifiers (camelCase wire names)
//! - `FieldKind`: which input widget a host should render for a field
//! - `FieldValue` / `RawInput`: read and write views of a single value
//! - `FormData`: the full set of values entered by the student
//!
//! Agreement flags are stored as `bool`, everything else as `String`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Identifier of a single registration field.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum FieldId {
    EmailId,
    OtpCode,
    FullName,
    FatherName,
    Dob,
    BloodGroup,
    StudentContact,
    ParentContact,
    Address,
    Department,
    AcademicYear,
    RegistrationNumber,
    RollNumber,
    RoomNumber,
    Password,
    ConfirmPassword,
    Photo,
    AgreeTerms,
    AgreePrivacy,
    AgreeRules,
}

/// Input widget family of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Secret,
    /// `YYYY-MM-DD`
    Date,
    /// One of a fixed option list (see [`FieldId::options`]); departments are loaded remotely.
    Choice,
    Checkbox,
    /// Filesystem path in the host, data-URI in the form.
    Photo,
}

pub const BLOOD_GROUPS: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];
pub const ACADEMIC_YEARS: &[&str] = &["1st Year", "2nd Year", "3rd Year", "4th Year"];

impl FieldId {
    pub fn label(self) -> &'static str {
        match self {
            FieldId::EmailId => "Email",
            FieldId::OtpCode => "Verification code",
            FieldId::FullName => "Full name",
            FieldId::FatherName => "Father/Guardian name",
            FieldId::Dob => "Date of birth",
            FieldId::BloodGroup => "Blood group",
            FieldId::StudentContact => "Student contact",
            FieldId::ParentContact => "Parent/Guardian contact",
            FieldId::Address => "Address",
            FieldId::Department => "Department",
            FieldId::AcademicYear => "Academic year",
            FieldId::RegistrationNumber => "Registration number",
            FieldId::RollNumber => "Roll number",
            FieldId::RoomNumber => "Room number",
            FieldId::Password => "Password",
            FieldId::ConfirmPassword => "Confirm password",
            FieldId::Photo => "Profile photo",
            FieldId::AgreeTerms => "I accept the terms and conditions",
            FieldId::AgreePrivacy => "I accept the privacy policy",
            FieldId::AgreeRules => "I will follow the hostel rules",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            FieldId::Password | FieldId::ConfirmPassword => FieldKind::Secret,
            FieldId::Dob => FieldKind::Date,
            FieldId::BloodGroup | FieldId::Department | FieldId::AcademicYear => FieldKind::Choice,
            FieldId::AgreeTerms | FieldId::AgreePrivacy | FieldId::AgreeRules => {
                FieldKind::Checkbox
            }
            FieldId::Photo => FieldKind::Photo,
            _ => FieldKind::Text,
        }
    }

    pub fn is_flag(self) -> bool {
        self.kind() == FieldKind::Checkbox
    }

    /// Static option list for choice fields. Departments come from the backend.
    pub fn options(self) -> &'static [&'static str] {
        match self {
            FieldId::BloodGroup => BLOOD_GROUPS,
            FieldId::AcademicYear => ACADEMIC_YEARS,
            _ => &[],
        }
    }

    /// Other fields whose validity depends on this field's value.
    ///
    /// `confirmPassword` is checked against `password`, so a password edit
    /// re-checks the confirmation; a confirmation edit re-checks itself.
    pub fn dependents(self) -> &'static [FieldId] {
        match self {
            FieldId::Password => &[FieldId::ConfirmPassword],
            _ => &[],
        }
    }
}

/// Borrowed view of one stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Flag(bool),
}

impl<'a> FieldValue<'a> {
    pub fn as_text(&self) -> &'a str {
        match self {
            FieldValue::Text(s) => s,
            FieldValue::Flag(true) => "true",
            FieldValue::Flag(false) => "",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Flag(b) => *b,
        }
    }
}

/// Input as delivered by a host widget, before coercion to the field's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    Text(String),
    Checked(bool),
}

impl From<&str> for RawInput {
    fn from(value: &str) -> Self {
        RawInput::Text(value.to_string())
    }
}

impl From<String> for RawInput {
    fn from(value: String) -> Self {
        RawInput::Text(value)
    }
}

impl From<bool> for RawInput {
    fn from(value: bool) -> Self {
        RawInput::Checked(value)
    }
}

fn text_to_flag(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "yes" | "1" | "checked"
    )
}

/// All values entered into the registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    pub email_id: String,
    pub otp_code: String,
    pub full_name: String,
    pub father_name: String,
    pub dob: String,
    pub blood_group: String,
    pub student_contact: String,
    pub parent_contact: String,
    pub address: String,
    pub department: String,
    pub academic_year: String,
    pub registration_number: String,
    pub roll_number: String,
    pub room_number: String,
    pub password: String,
    pub confirm_password: String,
    pub photo: String,
    pub agree_terms: bool,
    pub agree_privacy: bool,
    pub agree_rules: bool,
}

impl FormData {
    pub fn get(&self, id: FieldId) -> FieldValue<'_> {
        match id {
            FieldId::AgreeTerms => FieldValue::Flag(self.agree_terms),
            FieldId::AgreePrivacy => FieldValue::Flag(self.agree_privacy),
            FieldId::AgreeRules => FieldValue::Flag(self.agree_rules),
            _ => FieldValue::Text(self.text_slot(id).map(String::as_str).unwrap_or_default()),
        }
    }

    /// Write a value, coercing checkbox/text input to the field's type.
    pub fn set(&mut self, id: FieldId, raw: RawInput) {
        if let Some(flag) = self.flag_slot_mut(id) {
            *flag = match raw {
                RawInput::Checked(b) => b,
                RawInput::Text(s) => text_to_flag(&s),
            };
        } else if let Some(slot) = self.text_slot_mut(id) {
            *slot = match raw {
                RawInput::Text(s) => s,
                RawInput::Checked(b) => b.to_string(),
            };
        }
    }

    fn flag_slot_mut(&mut self, id: FieldId) -> Option<&mut bool> {
        match id {
            FieldId::AgreeTerms => Some(&mut self.agree_terms),
            FieldId::AgreePrivacy => Some(&mut self.agree_privacy),
            FieldId::AgreeRules => Some(&mut self.agree_rules),
            _ => None,
        }
    }

    fn text_slot(&self, id: FieldId) -> Option<&String> {
        Some(match id {
            FieldId::EmailId => &self.email_id,
            FieldId::OtpCode => &self.otp_code,
            FieldId::FullName => &self.full_name,
            FieldId::FatherName => &self.father_name,
            FieldId::Dob => &self.dob,
            FieldId::BloodGroup => &self.blood_group,
            FieldId::StudentContact => &self.student_contact,
            FieldId::ParentContact => &self.parent_contact,
            FieldId::Address => &self.address,
            FieldId::Department => &self.department,
            FieldId::AcademicYear => &self.academic_year,
            FieldId::RegistrationNumber => &self.registration_number,
            FieldId::RollNumber => &self.roll_number,
            FieldId::RoomNumber => &self.room_number,
            FieldId::Password => &self.password,
            FieldId::ConfirmPassword => &self.confirm_password,
            FieldId::Photo => &self.photo,
            FieldId::AgreeTerms | FieldId::AgreePrivacy | FieldId::AgreeRules => return None,
        })
    }

    fn text_slot_mut(&mut self, id: FieldId) -> Option<&mut String> {
        Some(match id {
            FieldId::EmailId => &mut self.email_id,
            FieldId::OtpCode => &mut self.otp_code,
            FieldId::FullName => &mut self.full_name,
            FieldId::FatherName => &mut self.father_name,
            FieldId::Dob => &mut self.dob,
            FieldId::BloodGroup => &mut self.blood_group,
            FieldId::StudentContact => &mut self.student_contact,
            FieldId::ParentContact => &mut self.parent_contact,
            FieldId::Address => &mut self.address,
            FieldId::Department => &mut self.department,
            FieldId::AcademicYear => &mut self.academic_year,
            FieldId::RegistrationNumber => &mut self.registration_number,
            FieldId::RollNumber => &mut self.roll_number,
            FieldId::RoomNumber => &mut self.room_number,
            FieldId::Password => &mut self.password,
            FieldId::ConfirmPassword => &mut self.confirm_password,
            FieldId::Photo => &mut self.photo,
            FieldId::AgreeTerms | FieldId::AgreePrivacy | FieldId::AgreeRules => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn wire_names_are_camel_case() {
        assert_eq!(FieldId::EmailId.to_string(), "emailId");
        assert_eq!(FieldId::Dob.to_string(), "dob");
        assert_eq!(FieldId::ConfirmPassword.to_string(), "confirmPassword");
        assert_eq!(FieldId::from_str("agreeRules").unwrap(), FieldId::AgreeRules);
        assert!(FieldId::from_str("nickname").is_err());
    }

    #[test]
    fn every_field_round_trips_through_form_data() {
        let mut form = FormData::default();
        for id in FieldId::iter() {
            if id.is_flag() {
                form.set(id, RawInput::Checked(true));
                assert_eq!(form.get(id), FieldValue::Flag(true));
            } else {
                form.set(id, RawInput::Text(format!("v-{id}")));
                assert_eq!(form.get(id).as_text(), format!("v-{id}"));
            }
        }
    }

    #[test]
    fn checkbox_text_is_coerced() {
        let mut form = FormData::default();
        form.set(FieldId::AgreeTerms, "on".into());
        assert!(form.agree_terms);
        form.set(FieldId::AgreeTerms, "nope".into());
        assert!(!form.agree_terms);
    }

    #[test]
    fn password_change_rechecks_confirmation() {
        assert_eq!(FieldId::Password.dependents(), &[FieldId::ConfirmPassword]);
        assert!(FieldId::ConfirmPassword.dependents().is_empty());
        assert!(FieldId::RoomNumber.dependents().is_empty());
    }
}
