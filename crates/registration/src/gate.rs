//! Wizard steps and the guards between them.

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::field::{FieldId, FormData};
use crate::validation::{ValidationState, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum Step {
    #[strum(serialize = "Email & OTP")]
    EmailVerification,
    #[strum(serialize = "Personal Details")]
    PersonalDetails,
    #[strum(serialize = "Academic Details")]
    AcademicDetails,
    #[strum(serialize = "Password & Photo")]
    PasswordPhoto,
    #[strum(serialize = "Terms & Confirmation")]
    Confirmation,
}

pub const STEP_COUNT: u8 = 5;

impl Step {
    /// 1-based position.
    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Step::iter().nth(usize::from(n.checked_sub(1)?))
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        Self::from_number(self.number() - 1)
    }

    pub fn is_last(self) -> bool {
        self == Step::Confirmation
    }

    /// Fields shown on this step, in display order.
    pub fn fields(self) -> &'static [FieldId] {
        use FieldId::*;
        match self {
            Step::EmailVerification => &[EmailId, OtpCode],
            Step::PersonalDetails => &[
                FullName,
                FatherName,
                Dob,
                BloodGroup,
                StudentContact,
                ParentContact,
                Address,
            ],
            Step::AcademicDetails => &[
                Department,
                AcademicYear,
                RegistrationNumber,
                RollNumber,
                RoomNumber,
            ],
            Step::PasswordPhoto => &[Password, ConfirmPassword, Photo],
            Step::Confirmation => &[AgreeTerms, AgreePrivacy, AgreeRules],
        }
    }

    /// Fields that must be valid to leave this step forward. The OTP code
    /// only counts once a code has been sent; the last step checks everything.
    pub fn required_fields(self, otp_sent: bool) -> Vec<FieldId> {
        match self {
            Step::EmailVerification if !otp_sent => vec![FieldId::EmailId],
            Step::Confirmation => Step::iter()
                .flat_map(|s| s.fields().iter().copied())
                .filter(|f| otp_sent || *f != FieldId::OtpCode)
                .collect(),
            _ => self.fields().to_vec(),
        }
    }
}

/// Validate `fields`, touching each and recording its message.
/// Returns whether all of them passed.
pub fn check_fields(
    fields: &[FieldId],
    form: &FormData,
    validator: &Validator,
    state: &mut ValidationState,
) -> bool {
    let mut ok = true;
    for &field in fields {
        let message = validator.validate_in(field, form);
        ok &= message.is_empty();
        state.set_error(field, message);
        state.touch(field);
    }
    ok
}

/// Whether the wizard may move on from `step` (or submit, from the last step).
/// Failing fields are marked touched with their messages stored.
pub fn can_advance(
    step: Step,
    form: &FormData,
    otp_sent: bool,
    otp_verified: bool,
    validator: &Validator,
    state: &mut ValidationState,
) -> bool {
    let fields_ok = check_fields(&step.required_fields(otp_sent), form, validator, state);
    match step {
        Step::EmailVerification | Step::Confirmation => fields_ok && otp_verified,
        _ => fields_ok,
    }
}

/// Side-effect free variant of the submit guard, for enabling the control.
pub fn submit_ready(form: &FormData, otp_verified: bool, validator: &Validator) -> bool {
    otp_verified
        && Step::Confirmation
            .required_fields(true)
            .iter()
            .all(|&f| validator.validate_in(f, form).is_empty())
}
