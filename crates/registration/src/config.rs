//! Backend connection settings.
//!
//! Plain serde structs with defaults; loading them from files and the
//! environment is the host's job.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL every endpoint path is joined onto.
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub endpoints: Endpoints,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            endpoints: Endpoints::default(),
        }
    }
}

/// Endpoint paths relative to `base_url`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub send_code: String,
    pub verify_email: String,
    pub register: String,
    pub departments: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            send_code: "/sendcode".into(),
            verify_email: "/verifyemail".into(),
            register: "/register".into(),
            departments: "/departments".into(),
        }
    }
}
