use std::path::PathBuf;

use registration::{CountdownTick, FieldId, RawInput};
use strum::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupResult {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Action {
    Render,
    Resize(u16, u16),
    Quit,
    ClearScreen,
    Error(String),
    /// Store new input for a field.
    Edit(FieldId, RawInput),
    /// A field lost focus.
    Blur(FieldId),
    /// Load the profile photo from a path on disk.
    LoadPhoto(PathBuf),
    SendCode,
    VerifyCode,
    Next,
    Back,
    Submit,
    RequestCancel,
    OpenPopup,
    PopupResult(PopupResult),
    ClosePopup,
    /// One second of the resend countdown elapsed.
    Countdown(CountdownTick),
    /// The wizard moved to another step, or refused an edit; widgets
    /// should reload from it.
    Refresh,
    Update,
}
