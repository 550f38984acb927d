//! Email verification sub-protocol: request a code, count down until a
//! resend is allowed, verify the code.
//!
//! Local precondition failures never reach the network and come back as
//! [`OtpFailure::Invalid`]; anything the backend refuses (or a transport
//! failure) comes back as [`OtpFailure::Remote`]. Neither kind changes the
//! `sent`/`verified` flags.

pub mod countdown;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{server_text, RegistrationApi, SendCodeResponse, VerifyResponse};
use crate::error::ApiResult;
use crate::clock::Clock;
use crate::field::{FieldId, FieldValue};
use crate::validation::Validator;

pub use countdown::{Countdown, CountdownTick, TickSink};

/// Resend delay used when the server does not announce an expiry.
pub const DEFAULT_RESEND_SECS: u32 = 60;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OtpFailure {
    /// Rejected before any request was made.
    #[error("{0}")]
    Invalid(String),
    /// Refused by the backend or lost in transit.
    #[error("{0}")]
    Remote(String),
}

impl OtpFailure {
    pub fn message(&self) -> &str {
        match self {
            OtpFailure::Invalid(m) | OtpFailure::Remote(m) => m,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, OtpFailure::Remote(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSent {
    pub message: String,
    pub resend_seconds: u32,
}

/// Outcome of an edit to the email field as seen by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailEdit {
    /// Edit allowed; any previous send was forgotten.
    Accepted,
    /// Address already verified; the edit must be dropped.
    Rejected,
}

/// Protocol state visible to the wizard and its host.
#[derive(Debug, Default)]
pub struct OtpSession {
    pub sent: bool,
    pub verified: bool,
    pub last_sent_message: String,
    countdown: Countdown,
}

impl OtpSession {
    pub fn resend_countdown_seconds(&self) -> u32 {
        self.countdown.remaining()
    }
}

/// Client side of the send/verify exchange.
pub struct OtpClient {
    session: OtpSession,
    clock: Arc<dyn Clock>,
    validator: Validator,
}

impl std::fmt::Debug for OtpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpClient")
            .field("session", &self.session)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl OtpClient {
    pub fn new(clock: Arc<dyn Clock>, validator: Validator) -> Self {
        Self {
            session: OtpSession::default(),
            clock,
            validator,
        }
    }

    pub fn session(&self) -> &OtpSession {
        &self.session
    }

    pub fn is_verified(&self) -> bool {
        self.session.verified
    }

    pub fn is_sent(&self) -> bool {
        self.session.sent
    }

    /// Route countdown ticks through `sink` (see [`countdown`]).
    pub fn attach_ticks(&mut self, sink: TickSink) {
        self.session.countdown.attach(sink);
    }

    /// Whether a (re)send may be requested right now.
    pub fn can_request(&self) -> bool {
        !self.session.verified && !self.session.countdown.is_running()
    }

    /// Ask the backend to email a fresh code to `email`.
    pub async fn request_code<A: RegistrationApi>(
        &mut self,
        api: &A,
        email: &str,
    ) -> Result<CodeSent, OtpFailure> {
        self.check_request(email)?;
        let response = api.send_code(email).await;
        self.complete_request(email, response)
    }

    /// Local preconditions of [`request_code`](Self::request_code).
    pub fn check_request(&self, email: &str) -> Result<(), OtpFailure> {
        if self.session.verified {
            return Err(OtpFailure::Invalid("Email is already verified".into()));
        }
        if email.trim().is_empty() {
            return Err(OtpFailure::Invalid("Email is required".into()));
        }
        let problem = self
            .validator
            .validate(FieldId::EmailId, FieldValue::Text(email), None);
        if !problem.is_empty() {
            return Err(OtpFailure::Invalid(problem));
        }
        let remaining = self.session.countdown.remaining();
        if remaining > 0 {
            return Err(OtpFailure::Invalid(format!(
                "You can request a new code in {remaining}s"
            )));
        }
        Ok(())
    }

    /// Apply the backend's answer to a send request for `email`.
    pub fn complete_request(
        &mut self,
        email: &str,
        response: ApiResult<SendCodeResponse>,
    ) -> Result<CodeSent, OtpFailure> {
        let response = response.map_err(|e| {
            warn!(error = %e, "send code failed");
            OtpFailure::Remote(e.user_message("Failed to send verification code"))
        })?;
        if !response.success {
            let message = server_text(&response.error, &response.message)
                .unwrap_or_else(|| "Failed to send verification code".into());
            warn!(%message, "backend refused to send code");
            return Err(OtpFailure::Remote(message));
        }

        let resend_seconds = response
            .expiringtime
            .as_ref()
            .and_then(|e| e.as_millis())
            .map(|expiry| self.seconds_until(expiry))
            .unwrap_or(DEFAULT_RESEND_SECS);
        let message = server_text(&None, &response.message)
            .unwrap_or_else(|| format!("Verification code sent to {email}"));

        self.session.sent = true;
        self.session.last_sent_message = message.clone();
        self.session.countdown.start(resend_seconds);
        info!(resend_seconds, "verification code sent");
        Ok(CodeSent {
            message,
            resend_seconds,
        })
    }

    /// `max(0, floor((expiry - now) / 1000))`
    fn seconds_until(&self, expiry_millis: i64) -> u32 {
        let left = expiry_millis
            .saturating_sub(self.clock.now_millis())
            .max(0)
            / 1000;
        u32::try_from(left).unwrap_or(u32::MAX)
    }

    /// Check `code` against the backend.
    pub async fn verify_code<A: RegistrationApi>(
        &mut self,
        api: &A,
        email: &str,
        code: &str,
    ) -> Result<String, OtpFailure> {
        if let Some(done) = self.check_verify(email, code)? {
            return Ok(done);
        }
        let response = api.verify_email(email, code).await;
        self.complete_verify(response)
    }

    /// Local preconditions of [`verify_code`](Self::verify_code).
    /// `Ok(Some(_))` means the address is already verified and no request
    /// is needed.
    pub fn check_verify(&self, email: &str, code: &str) -> Result<Option<String>, OtpFailure> {
        if self.session.verified {
            return Ok(Some("Email already verified".into()));
        }
        if email.trim().is_empty() {
            return Err(OtpFailure::Invalid("Email is required".into()));
        }
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpFailure::Invalid(
                "Enter the 6-digit code sent to your email".into(),
            ));
        }
        if !self.session.sent {
            return Err(OtpFailure::Invalid("Request a verification code first".into()));
        }
        Ok(None)
    }

    /// Apply the backend's answer to a verify request.
    pub fn complete_verify(
        &mut self,
        response: ApiResult<VerifyResponse>,
    ) -> Result<String, OtpFailure> {
        let response = response.map_err(|e| {
            warn!(error = %e, "verify code failed");
            OtpFailure::Remote(e.user_message("Verification failed. Please try again."))
        })?;
        if !response.success {
            let message = server_text(&response.error, &response.message)
                .unwrap_or_else(|| "Invalid or expired code".into());
            return Err(OtpFailure::Remote(message));
        }

        self.session.verified = true;
        self.session.last_sent_message.clear();
        self.session.countdown.cancel();
        info!("email verified");
        Ok(server_text(&None, &response.message).unwrap_or_else(|| "Email verified".into()))
    }

    /// React to an edit of the email field.
    pub fn email_edited(&mut self) -> EmailEdit {
        if self.session.verified {
            debug!("email edit rejected: address already verified");
            return EmailEdit::Rejected;
        }
        self.reset();
        EmailEdit::Accepted
    }

    /// Forget any sent code and stop the countdown (verification is kept only
    /// by [`email_edited`](Self::email_edited)'s guard, not here).
    pub fn reset(&mut self) {
        self.session.sent = false;
        self.session.verified = false;
        self.session.last_sent_message.clear();
        self.session.countdown.cancel();
    }

    pub fn tick(&mut self) -> u32 {
        self.session.countdown.tick()
    }

    pub fn apply_tick(&mut self, tick: CountdownTick) -> bool {
        self.session.countdown.apply(tick)
    }

    /// Stop timers and drop the tick sink.
    pub fn dispose(&mut self) {
        self.session.countdown.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Expiry, RegisterResponse, RegistrationPayload};
    use crate::clock::FixedClock;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const NOW: i64 = 1_760_000_000_000;

    #[derive(Default)]
    struct ScriptedApi {
        send: Mutex<Vec<ApiResult<SendCodeResponse>>>,
        verify: Mutex<Vec<ApiResult<VerifyResponse>>>,
        calls: AtomicUsize,
    }

    impl ScriptedApi {
        fn sends(self, r: ApiResult<SendCodeResponse>) -> Self {
            self.send.lock().unwrap().push(r);
            self
        }
        fn verifies(self, r: ApiResult<VerifyResponse>) -> Self {
            self.verify.lock().unwrap().push(r);
            self
        }
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RegistrationApi for ScriptedApi {
        async fn send_code(&self, _email: &str) -> ApiResult<SendCodeResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.send.lock().unwrap().remove(0)
        }
        async fn verify_email(&self, _email: &str, _code: &str) -> ApiResult<VerifyResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verify.lock().unwrap().remove(0)
        }
        async fn register(&self, _p: &RegistrationPayload) -> ApiResult<RegisterResponse> {
            unimplemented!("not used by the OTP client")
        }
        async fn departments(&self) -> ApiResult<Vec<String>> {
            unimplemented!("not used by the OTP client")
        }
    }

    fn client() -> OtpClient {
        OtpClient::new(Arc::new(FixedClock::at(NOW)), Validator::for_year(2026))
    }

    fn sent_ok(expiry: Option<Expiry>) -> ApiResult<SendCodeResponse> {
        Ok(SendCodeResponse {
            success: true,
            message: Some("OTP sent".into()),
            error: None,
            expiringtime: expiry,
        })
    }

    #[tokio::test]
    async fn invalid_email_never_hits_the_network() {
        let api = ScriptedApi::default();
        let mut otp = client();
        let err = otp.request_code(&api, "").await.unwrap_err();
        assert_eq!(err, OtpFailure::Invalid("Email is required".into()));
        let err = otp.request_code(&api, "not-an-email").await.unwrap_err();
        assert!(!err.is_remote());
        assert_eq!(api.calls(), 0);
        assert!(!otp.is_sent());
    }

    #[tokio::test]
    async fn expiry_sets_the_resend_countdown() {
        let api = ScriptedApi::default().sends(sent_ok(Some(Expiry::Millis(NOW + 90_000))));
        let mut otp = client();
        let sent = otp.request_code(&api, "asha@college.edu").await.unwrap();
        assert_eq!(sent.resend_seconds, 90);
        assert_eq!(otp.session().resend_countdown_seconds(), 90);
        assert!(otp.is_sent());
        assert!(!otp.can_request());

        for _ in 0..89 {
            otp.tick();
        }
        assert!(!otp.can_request());
        assert_eq!(otp.tick(), 0);
        assert!(otp.can_request());
        assert_eq!(otp.tick(), 0);
    }

    #[tokio::test]
    async fn missing_or_past_expiry() {
        let api = ScriptedApi::default()
            .sends(sent_ok(None))
            .sends(sent_ok(Some(Expiry::Millis(NOW - 5_000))));
        let mut otp = client();
        let sent = otp.request_code(&api, "asha@college.edu").await.unwrap();
        assert_eq!(sent.resend_seconds, DEFAULT_RESEND_SECS);

        otp.reset();
        let sent = otp.request_code(&api, "asha@college.edu").await.unwrap();
        assert_eq!(sent.resend_seconds, 0);
        assert!(otp.can_request());
    }

    #[tokio::test]
    async fn extreme_expiry_does_not_overflow() {
        let api = ScriptedApi::default()
            .sends(sent_ok(Some(Expiry::Millis(i64::MIN))))
            .sends(sent_ok(Some(Expiry::Millis(i64::MAX))));
        let mut otp = client();
        let sent = otp.request_code(&api, "asha@college.edu").await.unwrap();
        assert_eq!(sent.resend_seconds, 0);
        assert!(otp.is_sent());
        assert!(otp.can_request());

        otp.reset();
        let sent = otp.request_code(&api, "asha@college.edu").await.unwrap();
        assert_eq!(sent.resend_seconds, u32::MAX);
    }

    #[test]
    fn replies_apply_without_the_network() {
        let mut otp = client();
        otp.check_request("asha@college.edu").unwrap();
        let sent = otp
            .complete_request("asha@college.edu", sent_ok(Some(Expiry::Millis(NOW + 30_000))))
            .unwrap();
        assert_eq!(sent.resend_seconds, 30);
        assert!(otp.check_request("asha@college.edu").is_err());

        assert_eq!(otp.check_verify("asha@college.edu", "424242"), Ok(None));
        otp.complete_verify(Ok(VerifyResponse {
            success: true,
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(
            otp.check_verify("asha@college.edu", "424242"),
            Ok(Some("Email already verified".into()))
        );
    }

    #[tokio::test]
    async fn resend_is_blocked_while_counting() {
        let api = ScriptedApi::default().sends(sent_ok(None));
        let mut otp = client();
        otp.request_code(&api, "asha@college.edu").await.unwrap();
        let err = otp.request_code(&api, "asha@college.edu").await.unwrap_err();
        assert_eq!(err, OtpFailure::Invalid("You can request a new code in 60s".into()));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn remote_failures_keep_flags() {
        let api = ScriptedApi::default()
            .sends(Ok(SendCodeResponse {
                success: false,
                error: Some("Email already registered".into()),
                ..Default::default()
            }))
            .sends(Err(ApiError::Rejected {
                status: 500,
                message: None,
            }));
        let mut otp = client();
        let err = otp.request_code(&api, "asha@college.edu").await.unwrap_err();
        assert_eq!(err, OtpFailure::Remote("Email already registered".into()));
        let err = otp.request_code(&api, "asha@college.edu").await.unwrap_err();
        assert_eq!(err, OtpFailure::Remote("Failed to send verification code".into()));
        assert!(!otp.is_sent());
        assert!(!otp.is_verified());
    }

    #[tokio::test]
    async fn verify_requires_six_digits_and_a_sent_code() {
        let api = ScriptedApi::default();
        let mut otp = client();
        let err = otp.verify_code(&api, "asha@college.edu", "12345").await.unwrap_err();
        assert!(!err.is_remote());
        let err = otp.verify_code(&api, "", "123456").await.unwrap_err();
        assert!(!err.is_remote());
        let err = otp.verify_code(&api, "asha@college.edu", "123456").await.unwrap_err();
        assert_eq!(err, OtpFailure::Invalid("Request a verification code first".into()));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn successful_verify_locks_the_email() {
        let api = ScriptedApi::default()
            .sends(sent_ok(None))
            .verifies(Ok(VerifyResponse {
                success: false,
                message: Some("Invalid OTP".into()),
                error: None,
            }))
            .verifies(Ok(VerifyResponse {
                success: true,
                message: Some("Email verified successfully".into()),
                error: None,
            }));
        let mut otp = client();
        otp.request_code(&api, "asha@college.edu").await.unwrap();

        let err = otp.verify_code(&api, "asha@college.edu", "000000").await.unwrap_err();
        assert_eq!(err, OtpFailure::Remote("Invalid OTP".into()));
        assert!(otp.is_sent());
        assert!(!otp.is_verified());

        let msg = otp.verify_code(&api, "asha@college.edu", "424242").await.unwrap();
        assert_eq!(msg, "Email verified successfully");
        assert!(otp.is_verified());
        assert!(otp.session().last_sent_message.is_empty());
        assert_eq!(otp.session().resend_countdown_seconds(), 0);

        assert_eq!(otp.email_edited(), EmailEdit::Rejected);
        assert!(otp.is_verified());
    }

    #[tokio::test]
    async fn editing_unverified_email_resets_protocol() {
        let api = ScriptedApi::default().sends(sent_ok(None));
        let mut otp = client();
        otp.request_code(&api, "asha@college.edu").await.unwrap();
        assert_eq!(otp.email_edited(), EmailEdit::Accepted);
        assert!(!otp.is_sent());
        assert!(!otp.is_verified());
        assert_eq!(otp.session().resend_countdown_seconds(), 0);
    }
}
