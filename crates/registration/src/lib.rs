//! Core of the hostel registration wizard.
//!
//! A five-step form whose first step is gated on email ownership: the
//! student requests a one-time code, waits out the resend countdown if
//! needed, and verifies it before any other step unlocks. Everything here is
//! host-agnostic; the terminal front-end lives in the `wizard` crate.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod field;
pub mod gate;
pub mod notify;
pub mod otp;
pub mod photo;
pub mod remote;
pub mod session;
pub mod validation;
pub mod wizard;

pub use api::{HttpApi, RegistrationApi, RegistrationPayload, DEFAULT_DEPARTMENTS};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BackendConfig, Endpoints};
pub use error::{ApiError, PhotoError, StorageError, WizardError};
pub use field::{FieldId, FieldKind, FieldValue, FormData, RawInput};
pub use gate::Step;
pub use notify::{Notification, NotificationKind};
pub use otp::{CountdownTick, OtpSession, TickSink};
pub use photo::{PhotoFile, MAX_PHOTO_BYTES};
pub use remote::{Dispatch, Reply, Request};
pub use session::{FileStorage, MemoryStorage, SessionStorage, AUTH_TOKEN_KEY, TOKEN_KEY};
pub use validation::{ValidationState, Validator};
pub use wizard::{Control, Phase, RegistrationWizard, WizardResult};
