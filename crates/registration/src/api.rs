//! Backend client for the registration flow.
//!
//! The wizard talks to the backend only through [`RegistrationApi`], so tests
//! and alternative transports can stand in for [`HttpApi`].
//!
//! Wire shapes:
//! - `POST {send_code}`     `{email}`        -> `{success, message|error, expiringtime?}`
//! - `POST {verify_email}`  `{email, code}`  -> `{success, message}`
//! - `POST {register}`      payload          -> `{success, message, token?}`
//! - `GET  {departments}`                    -> `["..."]` or `{departments: ["..."]}`

use std::time::Duration;

use chrono::DateTime;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::config::BackendConfig;
use crate::error::{ApiError, ApiResult};
use crate::field::FormData;

/// Departments offered when the backend list cannot be fetched.
pub const DEFAULT_DEPARTMENTS: &[&str] = &["ME", "Computer science", "ECE"];

/// Operations the registration wizard needs from the backend.
#[allow(async_fn_in_trait)]
pub trait RegistrationApi {
    async fn send_code(&self, email: &str) -> ApiResult<SendCodeResponse>;
    async fn verify_email(&self, email: &str, code: &str) -> ApiResult<VerifyResponse>;
    async fn register(&self, payload: &RegistrationPayload) -> ApiResult<RegisterResponse>;
    async fn departments(&self) -> ApiResult<Vec<String>>;
}

/// Expiry of an issued code: epoch milliseconds (integer or fractional), or a
/// timestamp string. Any other JSON value is kept so the response still
/// decodes; it simply yields no expiry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Expiry {
    Millis(i64),
    Fractional(f64),
    Text(String),
    Other(Value),
}

impl Expiry {
    /// Epoch milliseconds, if the value can be interpreted.
    pub fn as_millis(&self) -> Option<i64> {
        match self {
            Expiry::Millis(ms) => Some(*ms),
            Expiry::Fractional(ms) => floor_millis(*ms),
            Expiry::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(floor_millis))
                    .or_else(|| {
                        DateTime::parse_from_rfc3339(s)
                            .map(|dt| dt.timestamp_millis())
                            .ok()
                    })
            }
            Expiry::Other(_) => None,
        }
    }
}

/// Saturating float to integer milliseconds.
fn floor_millis(ms: f64) -> Option<i64> {
    ms.is_finite().then(|| ms.floor() as i64)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendCodeResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    pub expiringtime: Option<Expiry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    pub token: Option<String>,
}

/// Pick the most specific text a response carries.
pub(crate) fn server_text(error: &Option<String>, message: &Option<String>) -> Option<String> {
    error
        .as_deref()
        .or(message.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Body of the final registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationPayload {
    pub name: String,
    pub father_guardian_name: String,
    pub dob: String,
    pub blood_group: String,
    pub student_contact_number: String,
    pub parent_guardian_contact_number: String,
    pub address: String,
    pub department: String,
    pub academic_year: String,
    pub registration_number: String,
    pub roll_number: String,
    pub room_number: u32,
    pub email: String,
    pub password: String,
    pub profile_photo: String,
    pub status: String,
    pub approved_by: String,
}

impl RegistrationPayload {
    /// Map a validated form to the backend payload.
    ///
    /// Returns `None` if the room number is not numeric, which cannot happen
    /// for a form that passed the final gate.
    pub fn from_form(form: &FormData) -> Option<Self> {
        Some(Self {
            name: form.full_name.trim().to_string(),
            father_guardian_name: form.father_name.trim().to_string(),
            dob: form.dob.trim().to_string(),
            blood_group: form.blood_group.clone(),
            student_contact_number: form.student_contact.clone(),
            parent_guardian_contact_number: form.parent_contact.clone(),
            address: form.address.trim().to_string(),
            department: form.department.clone(),
            academic_year: form.academic_year.clone(),
            registration_number: form.registration_number.clone(),
            roll_number: form.roll_number.clone(),
            room_number: form.room_number.parse().ok()?,
            email: form.email_id.clone(),
            password: form.password.clone(),
            profile_photo: form.photo.clone(),
            status: "pending".to_string(),
            approved_by: "Admin".to_string(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DepartmentList {
    Plain(Vec<String>),
    Wrapped { departments: Vec<String> },
}

/// `reqwest`-backed implementation of [`RegistrationApi`].
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    config: BackendConfig,
}

impl HttpApi {
    pub fn new(config: BackendConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ApiError::Network)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> ApiResult<T> {
        let url = self.url(path);
        debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(ApiError::Network)?;
        decode(response).await
    }
}

/// Turn a response into `T`, or into `ApiError::Rejected` carrying the
/// server's `error`/`message` text for non-success statuses.
async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(ApiError::Network)?;
    if !status.is_success() {
        let message = serde_json::from_slice::<Value>(&bytes).ok().and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|k| v.get(k).and_then(Value::as_str).map(str::to_string))
        });
        warn!(status = status.as_u16(), ?message, "backend rejected request");
        return Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

impl RegistrationApi for HttpApi {
    #[instrument(skip(self))]
    async fn send_code(&self, email: &str) -> ApiResult<SendCodeResponse> {
        self.post(&self.config.endpoints.send_code, &json!({ "email": email }))
            .await
    }

    #[instrument(skip(self, code))]
    async fn verify_email(&self, email: &str, code: &str) -> ApiResult<VerifyResponse> {
        self.post(
            &self.config.endpoints.verify_email,
            &json!({ "email": email, "code": code }),
        )
        .await
    }

    #[instrument(skip_all, fields(email = %payload.email))]
    async fn register(&self, payload: &RegistrationPayload) -> ApiResult<RegisterResponse> {
        self.post(&self.config.endpoints.register, payload).await
    }

    #[instrument(skip(self))]
    async fn departments(&self) -> ApiResult<Vec<String>> {
        let url = self.url(&self.config.endpoints.departments);
        debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ApiError::Network)?;
        let list: DepartmentList = decode(response).await?;
        Ok(match list {
            DepartmentList::Plain(v) | DepartmentList::Wrapped { departments: v } => v,
        })
    }
}
