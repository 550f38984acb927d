//! Backend calls the wizard hands out to its host.
//!
//! A remote operation is split in three: the wizard checks its local
//! preconditions and returns a [`Request`], the host runs it wherever it likes
//! (inline, or on a spawned task with a cloned client), and the resulting
//! [`Reply`] goes back through [`RegistrationWizard::finish`]. The wizard stays
//! usable while a request is out; only the control that started it is busy.
//!
//! [`RegistrationWizard::finish`]: crate::wizard::RegistrationWizard::finish

use crate::api::{
    RegisterResponse, RegistrationApi, RegistrationPayload, SendCodeResponse, VerifyResponse,
};
use crate::error::ApiResult;
use crate::wizard::Control;

/// A backend call ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    SendCode { email: String },
    VerifyCode { email: String, code: String },
    Register(Box<RegistrationPayload>),
    Departments,
}

impl Request {
    pub fn control(&self) -> Control {
        match self {
            Request::SendCode { .. } => Control::SendCode,
            Request::VerifyCode { .. } => Control::VerifyCode,
            Request::Register(_) => Control::Submit,
            Request::Departments => Control::Departments,
        }
    }

    /// Perform the call. Never touches wizard state.
    pub async fn run<A: RegistrationApi>(self, api: &A) -> Reply {
        match self {
            Request::SendCode { email } => {
                let response = api.send_code(&email).await;
                Reply::CodeSent { email, response }
            }
            Request::VerifyCode { email, code } => {
                Reply::Verified(api.verify_email(&email, &code).await)
            }
            Request::Register(payload) => Reply::Registered {
                email: payload.email.clone(),
                response: api.register(&payload).await,
            },
            Request::Departments => Reply::Departments(api.departments().await),
        }
    }
}

/// What the backend said to a [`Request`].
#[derive(Debug)]
pub enum Reply {
    CodeSent {
        email: String,
        response: ApiResult<SendCodeResponse>,
    },
    Verified(ApiResult<VerifyResponse>),
    Registered {
        email: String,
        response: ApiResult<RegisterResponse>,
    },
    Departments(ApiResult<Vec<String>>),
}

impl Reply {
    pub fn control(&self) -> Control {
        match self {
            Reply::CodeSent { .. } => Control::SendCode,
            Reply::Verified(_) => Control::VerifyCode,
            Reply::Registered { .. } => Control::Submit,
            Reply::Departments(_) => Control::Departments,
        }
    }
}

/// Result of starting a remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Preconditions passed; run the request and hand back its reply.
    Remote(Request),
    /// Settled without the network. Carries whether it succeeded.
    Local(bool),
}
