//! The registration wizard controller.
//!
//! Owns the form, its validation state, the OTP client and the current
//! step. Hosts drive it through the methods below and render from its
//! accessors; user-facing failures end up either as field errors or as the
//! pending [`Notification`], never as `Err`. `Err` is reserved for
//! [`WizardError`]: calls on a closed wizard, edits while a cancel awaits
//! confirmation, or a remote operation that is already in flight.
//!
//! Remote operations come in two forms: the `async` methods run the request
//! inline, while `start_*` plus [`RegistrationWizard::finish`] let the host
//! run it elsewhere (see [`crate::remote`]).

use std::path::Path;
use std::sync::Arc;

use strum::{Display, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::api::{
    server_text, RegisterResponse, RegistrationApi, RegistrationPayload, DEFAULT_DEPARTMENTS,
};
use crate::clock::{Clock, SystemClock};
use crate::error::{ApiResult, WizardError};
use crate::field::{FieldId, FormData, RawInput};
use crate::gate::{self, Step};
use crate::notify::Notification;
use crate::otp::{CountdownTick, EmailEdit, OtpClient, OtpFailure, OtpSession, TickSink};
use crate::photo::PhotoFile;
use crate::remote::{Dispatch, Reply, Request};
use crate::session::{SessionStorage, AUTH_TOKEN_KEY, TOKEN_KEY};
use crate::validation::{ValidationState, Validator};

pub type WizardResult<T> = Result<T, WizardError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Editing,
    /// Cancel was requested and awaits confirmation.
    ConfirmingCancel,
    /// Registration accepted by the backend.
    Submitted,
    /// Cancel confirmed; all input was discarded.
    Cancelled,
    Disposed,
}

impl Phase {
    pub fn is_closed(self) -> bool {
        matches!(self, Phase::Submitted | Phase::Cancelled | Phase::Disposed)
    }
}

/// Remote-backed controls that can be in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Control {
    SendCode,
    VerifyCode,
    Submit,
    Departments,
}

pub struct RegistrationWizard<A, S> {
    api: A,
    storage: S,
    validator: Validator,
    form: FormData,
    validation: ValidationState,
    otp: OtpClient,
    step: Step,
    phase: Phase,
    departments: Vec<String>,
    notification: Option<Notification>,
    busy: Option<Control>,
}

impl<A: RegistrationApi, S: SessionStorage> RegistrationWizard<A, S> {
    pub fn new(api: A, storage: S) -> Self {
        Self::with_clock(api, storage, Arc::new(SystemClock), Validator::new())
    }

    pub fn with_clock(api: A, storage: S, clock: Arc<dyn Clock>, validator: Validator) -> Self {
        Self {
            api,
            storage,
            validator,
            form: FormData::default(),
            validation: ValidationState::default(),
            otp: OtpClient::new(clock, validator),
            step: Step::EmailVerification,
            phase: Phase::Editing,
            departments: Vec::new(),
            notification: None,
            busy: None,
        }
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn form(&self) -> &FormData {
        &self.form
    }

    pub fn validation(&self) -> &ValidationState {
        &self.validation
    }

    /// Message to show under `field`: only once the field was touched.
    pub fn visible_error(&self, field: FieldId) -> Option<&str> {
        let message = self.validation.error(field);
        (self.validation.is_touched(field) && !message.is_empty()).then_some(message)
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn otp(&self) -> &OtpSession {
        self.otp.session()
    }

    pub fn is_verified(&self) -> bool {
        self.otp.is_verified()
    }

    pub fn can_resend(&self) -> bool {
        self.otp.can_request()
    }

    /// Department choices: the loaded list, or the fallback before loading.
    pub fn departments(&self) -> Vec<&str> {
        if self.departments.is_empty() {
            DEFAULT_DEPARTMENTS.to_vec()
        } else {
            self.departments.iter().map(String::as_str).collect()
        }
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }

    pub fn busy(&self) -> Option<Control> {
        self.busy
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Whether the submit control should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.phase.is_closed()
            && self.step.is_last()
            && self.busy.is_none()
            && gate::submit_ready(&self.form, self.otp.is_verified(), &self.validator)
    }

    /// Deliver countdown ticks through `sink` from now on.
    pub fn attach_ticks(&mut self, sink: TickSink) {
        self.otp.attach_ticks(sink);
    }

    fn notify(&mut self, notification: Notification) {
        debug!(kind = %notification.kind, message = %notification.message, "notification raised");
        self.notification = Some(notification);
    }

    fn ensure_open(&self) -> WizardResult<()> {
        if self.phase.is_closed() {
            return Err(WizardError::Closed);
        }
        Ok(())
    }

    /// Open, and not waiting for a cancel to be confirmed or dismissed.
    fn ensure_editing(&self) -> WizardResult<()> {
        self.ensure_open()?;
        if self.phase == Phase::ConfirmingCancel {
            return Err(WizardError::CancelPending);
        }
        Ok(())
    }

    fn begin(&mut self, control: Control) -> WizardResult<()> {
        self.ensure_open()?;
        if let Some(running) = self.busy {
            return Err(WizardError::Busy(running.into()));
        }
        self.busy = Some(control);
        Ok(())
    }

    fn end(&mut self) {
        self.busy = None;
    }

    fn revalidate(&mut self, field: FieldId) {
        let message = self.validator.validate_in(field, &self.form);
        self.validation.set_error(field, message);
    }

    // ---------------------------------------------------------------------
    // Field editing
    // ---------------------------------------------------------------------

    /// Store new input for `field`. Returns `false` if the edit was refused
    /// (the email address after verification).
    pub fn update_field(&mut self, field: FieldId, raw: impl Into<RawInput>) -> WizardResult<bool> {
        self.ensure_editing()?;
        let raw = raw.into();

        if field == FieldId::EmailId {
            if raw == RawInput::Text(self.form.email_id.clone()) {
                return Ok(true);
            }
            if matches!(self.busy, Some(Control::SendCode | Control::VerifyCode)) {
                self.notify(Notification::info("Wait for the verification request to finish"));
                return Ok(false);
            }
            if self.otp.email_edited() == EmailEdit::Rejected {
                self.notify(Notification::error(
                    "Email is verified and can no longer be changed",
                ));
                return Ok(false);
            }
        }

        self.form.set(field, raw);
        self.revalidate(field);
        self.validation.touch(field);
        for &dependent in field.dependents() {
            if self.validation.is_touched(dependent) {
                self.revalidate(dependent);
            }
        }
        Ok(true)
    }

    /// The field lost focus.
    pub fn blur_field(&mut self, field: FieldId) -> WizardResult<()> {
        self.ensure_editing()?;
        self.validation.touch(field);
        self.revalidate(field);
        Ok(())
    }

    /// Accept `file` as the profile photo. Returns `false` (with the reason
    /// shown under the photo field) if it was rejected.
    pub fn upload_photo(&mut self, file: &PhotoFile) -> WizardResult<bool> {
        self.ensure_editing()?;
        self.validation.touch(FieldId::Photo);
        match file.to_data_uri() {
            Ok(uri) => {
                self.form.photo = uri;
                self.revalidate(FieldId::Photo);
                debug!(name = %file.name, "photo accepted");
                Ok(true)
            }
            Err(e) => {
                warn!(name = %file.name, error = %e, "photo rejected");
                self.validation.set_error(FieldId::Photo, e.to_string());
                Ok(false)
            }
        }
    }

    /// Read a photo from disk and upload it.
    pub async fn load_photo(&mut self, path: impl AsRef<Path>) -> WizardResult<bool> {
        self.ensure_editing()?;
        match PhotoFile::load(path).await {
            Ok(file) => self.upload_photo(&file),
            Err(e) => {
                self.validation.touch(FieldId::Photo);
                self.validation.set_error(FieldId::Photo, e.to_string());
                Ok(false)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------------

    /// Move to the next step if the current one is complete.
    pub fn next(&mut self) -> WizardResult<bool> {
        self.ensure_editing()?;
        let Some(target) = self.step.next() else {
            return Ok(false);
        };
        let passed = gate::can_advance(
            self.step,
            &self.form,
            self.otp.is_sent(),
            self.otp.is_verified(),
            &self.validator,
            &mut self.validation,
        );
        if !passed {
            if self.step == Step::EmailVerification && !self.otp.is_verified() {
                self.notify(Notification::error(
                    "Please verify your email before continuing",
                ));
            }
            debug!(step = self.step.number(), "step guard failed");
            return Ok(false);
        }
        debug!(from = self.step.number(), to = target.number(), "step advanced");
        self.step = target;
        Ok(true)
    }

    /// Go back one step. Never validates.
    pub fn back(&mut self) -> WizardResult<bool> {
        self.ensure_editing()?;
        match self.step.previous() {
            Some(previous) => {
                self.step = previous;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn request_cancel(&mut self) -> WizardResult<()> {
        self.ensure_open()?;
        self.phase = Phase::ConfirmingCancel;
        Ok(())
    }

    pub fn dismiss_cancel(&mut self) -> WizardResult<()> {
        self.ensure_open()?;
        self.phase = Phase::Editing;
        Ok(())
    }

    /// Discard everything entered. Only valid after [`request_cancel`](Self::request_cancel).
    pub fn confirm_cancel(&mut self) -> WizardResult<bool> {
        self.ensure_open()?;
        if self.phase != Phase::ConfirmingCancel {
            return Ok(false);
        }
        self.discard();
        self.phase = Phase::Cancelled;
        info!("registration cancelled");
        Ok(true)
    }

    fn discard(&mut self) {
        self.form = FormData::default();
        self.validation = ValidationState::default();
        self.otp.reset();
        self.otp.dispose();
        self.step = Step::EmailVerification;
    }

    // ---------------------------------------------------------------------
    // Remote operations
    // ---------------------------------------------------------------------

    /// Request a verification code for the entered email.
    pub async fn send_code(&mut self) -> WizardResult<bool> {
        let dispatch = self.start_send_code()?;
        self.perform(dispatch).await
    }

    /// Check the entered code.
    pub async fn verify_code(&mut self) -> WizardResult<bool> {
        let dispatch = self.start_verify_code()?;
        self.perform(dispatch).await
    }

    /// Fetch the department list, falling back to the built-in one.
    pub async fn load_departments(&mut self) -> WizardResult<Vec<String>> {
        let dispatch = self.start_departments()?;
        self.perform(dispatch).await?;
        Ok(self.departments.clone())
    }

    /// Final submission. Returns whether the backend accepted it.
    pub async fn submit(&mut self) -> WizardResult<bool> {
        let dispatch = self.start_submit()?;
        self.perform(dispatch).await
    }

    async fn perform(&mut self, dispatch: Dispatch) -> WizardResult<bool> {
        match dispatch {
            Dispatch::Remote(request) => {
                let reply = request.run(&self.api).await;
                self.finish(reply)
            }
            Dispatch::Local(ok) => Ok(ok),
        }
    }

    /// First half of [`send_code`](Self::send_code): local checks, then the
    /// request to run. Marks [`Control::SendCode`] busy until [`finish`](Self::finish).
    pub fn start_send_code(&mut self) -> WizardResult<Dispatch> {
        self.ensure_editing()?;
        self.begin(Control::SendCode)?;
        let email = self.form.email_id.trim().to_string();
        if let Err(failure) = self.otp.check_request(&email) {
            self.end();
            self.code_not_sent(&email, failure);
            return Ok(Dispatch::Local(false));
        }
        Ok(Dispatch::Remote(Request::SendCode { email }))
    }

    /// First half of [`verify_code`](Self::verify_code).
    pub fn start_verify_code(&mut self) -> WizardResult<Dispatch> {
        self.ensure_editing()?;
        self.begin(Control::VerifyCode)?;
        let email = self.form.email_id.trim().to_string();
        let code = self.form.otp_code.trim().to_string();
        match self.otp.check_verify(&email, &code) {
            Ok(None) => Ok(Dispatch::Remote(Request::VerifyCode { email, code })),
            Ok(Some(message)) => {
                self.end();
                self.code_verified(message);
                Ok(Dispatch::Local(true))
            }
            Err(failure) => {
                self.end();
                self.notify(Notification::error(failure.message()));
                Ok(Dispatch::Local(false))
            }
        }
    }

    /// First half of [`load_departments`](Self::load_departments).
    pub fn start_departments(&mut self) -> WizardResult<Dispatch> {
        self.begin(Control::Departments)?;
        Ok(Dispatch::Remote(Request::Departments))
    }

    /// First half of [`submit`](Self::submit): the final gate, then the
    /// registration request.
    pub fn start_submit(&mut self) -> WizardResult<Dispatch> {
        self.ensure_editing()?;
        if let Some(running) = self.busy {
            return Err(WizardError::Busy(running.into()));
        }
        if !self.step.is_last() {
            return Ok(Dispatch::Local(false));
        }
        let ready = gate::can_advance(
            Step::Confirmation,
            &self.form,
            self.otp.is_sent(),
            self.otp.is_verified(),
            &self.validator,
            &mut self.validation,
        );
        if !ready {
            let message = if self.otp.is_verified() {
                "Please complete all required fields before submitting"
            } else {
                "Please verify your email before submitting"
            };
            self.notify(Notification::error(message));
            return Ok(Dispatch::Local(false));
        }
        let Some(payload) = RegistrationPayload::from_form(&self.form) else {
            self.notify(Notification::error("Room number must be exactly 3 digits"));
            return Ok(Dispatch::Local(false));
        };
        self.begin(Control::Submit)?;
        Ok(Dispatch::Remote(Request::Register(Box::new(payload))))
    }

    /// Apply the reply to a request from one of the `start_*` methods.
    /// Returns whether the operation succeeded. A reply for a control that is
    /// not in flight is dropped.
    pub fn finish(&mut self, reply: Reply) -> WizardResult<bool> {
        self.ensure_open()?;
        let control = reply.control();
        if self.busy != Some(control) {
            warn!(%control, "dropping reply for a request that is not in flight");
            return Ok(false);
        }
        self.end();

        match reply {
            Reply::CodeSent { email, response } => {
                match self.otp.complete_request(&email, response) {
                    Ok(sent) => {
                        self.notify(Notification::success(sent.message));
                        Ok(true)
                    }
                    Err(failure) => {
                        self.code_not_sent(&email, failure);
                        Ok(false)
                    }
                }
            }
            Reply::Verified(response) => match self.otp.complete_verify(response) {
                Ok(message) => {
                    self.code_verified(message);
                    Ok(true)
                }
                Err(failure) => {
                    self.notify(Notification::error(failure.message()));
                    Ok(false)
                }
            },
            Reply::Departments(fetched) => {
                self.departments = match fetched {
                    Ok(list) if !list.is_empty() => list,
                    Ok(_) => {
                        warn!("backend returned no departments, using defaults");
                        default_departments()
                    }
                    Err(e) => {
                        warn!(error = %e, "department list unavailable, using defaults");
                        default_departments()
                    }
                };
                Ok(true)
            }
            Reply::Registered { email, response } => self.registered(&email, response),
        }
    }

    fn code_not_sent(&mut self, email: &str, failure: OtpFailure) {
        if let OtpFailure::Invalid(message) = &failure {
            self.validation.touch(FieldId::EmailId);
            if email.is_empty() {
                self.validation.set_error(FieldId::EmailId, message.clone());
            } else {
                self.revalidate(FieldId::EmailId);
            }
        }
        self.notify(Notification::error(failure.message()));
    }

    fn code_verified(&mut self, message: String) {
        self.validation.set_error(FieldId::OtpCode, "");
        self.notify(Notification::success(message));
    }

    fn registered(
        &mut self,
        email: &str,
        response: ApiResult<RegisterResponse>,
    ) -> WizardResult<bool> {
        match response {
            Ok(r) if r.success => {
                if let Some(token) = r.token.as_deref().filter(|t| !t.is_empty()) {
                    self.store_token(token);
                }
                let message = server_text(&None, &r.message)
                    .unwrap_or_else(|| "Registration successful".to_string());
                info!(%email, "registration submitted");
                self.discard();
                self.phase = Phase::Submitted;
                self.notify(Notification::success(message));
                Ok(true)
            }
            Ok(r) => {
                let message = server_text(&r.error, &r.message)
                    .unwrap_or_else(|| "Registration failed. Please try again.".to_string());
                warn!(%message, "registration refused");
                self.notify(Notification::error(message));
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "registration request failed");
                self.notify(Notification::error(
                    e.user_message("Registration failed. Please try again."),
                ));
                Ok(false)
            }
        }
    }

    fn store_token(&mut self, token: &str) {
        for key in [AUTH_TOKEN_KEY, TOKEN_KEY] {
            if let Err(e) = self.storage.set(key, token) {
                warn!(key, error = %e, "could not persist session token");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Countdown and lifecycle
    // ---------------------------------------------------------------------

    /// Advance the resend countdown by one second.
    pub fn tick(&mut self) -> WizardResult<u32> {
        self.ensure_open()?;
        Ok(self.otp.tick())
    }

    /// Apply a tick delivered by the countdown task.
    pub fn apply_tick(&mut self, tick: CountdownTick) -> WizardResult<bool> {
        self.ensure_open()?;
        Ok(self.otp.apply_tick(tick))
    }

    /// Stop timers and close the wizard. Idempotent.
    pub fn dispose(&mut self) {
        self.otp.dispose();
        self.busy = None;
        if !self.phase.is_closed() {
            self.phase = Phase::Disposed;
        }
    }
}

fn default_departments() -> Vec<String> {
    DEFAULT_DEPARTMENTS.iter().map(|d| d.to_string()).collect()
}
