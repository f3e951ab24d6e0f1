//! Sankhya gateway configuration.
//!
//! Login credentials are static per deployment and are sent as plain headers on
//! the login exchange only. They are never logged.

use std::env;
use std::time::Duration;

use crate::services::erp::sankhya_client::{Result, SankhyaError};

pub const DEFAULT_BASE_URL: &str = "https://api.sandbox.sankhya.com.br";
const GATEWAY_SERVICE_PATH: &str = "/gateway/v1/mge/service.sbr";

#[derive(Clone)]
pub struct SankhyaConfig {
    pub base_url: String,
    pub token: String,
    pub app_key: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

// Manual impl so credentials never end up in a `{:?}` log line.
impl std::fmt::Debug for SankhyaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SankhyaConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SankhyaConfig {
    pub fn from_env() -> Result<Self> {
        let required = |key: &str| {
            env::var(key)
                .map_err(|_| SankhyaError::Config(format!("Missing required environment variable: {}", key)))
        };

        let timeout_secs = env::var("SANKHYA_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        Ok(Self {
            base_url: env::var("SANKHYA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            token: required("SANKHYA_TOKEN")?,
            app_key: required("SANKHYA_APPKEY")?,
            username: required("SANKHYA_USERNAME")?,
            password: required("SANKHYA_PASSWORD")?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(SankhyaError::Config("base_url is required".to_string()));
        }
        if self.token.is_empty() {
            return Err(SankhyaError::Config("token is required".to_string()));
        }
        if self.app_key.is_empty() {
            return Err(SankhyaError::Config("app_key is required".to_string()));
        }
        if self.username.is_empty() {
            return Err(SankhyaError::Config("username is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(SankhyaError::Config("password is required".to_string()));
        }
        Ok(())
    }

    pub fn login_url(&self) -> String {
        format!("{}/login", self.base_url.trim_end_matches('/'))
    }

    /// URL of a gateway service, e.g. `DatasetSP.save`.
    pub fn service_url(&self, service_name: &str) -> String {
        format!(
            "{}{}?serviceName={}&outputType=json",
            self.base_url.trim_end_matches('/'),
            GATEWAY_SERVICE_PATH,
            service_name
        )
    }
}
