// Sankhya gateway client (partners)
// Login with static credential headers, bearer token cached until the gateway
// answers 401, partner listing through CRUDServiceProvider.loadRecords and
// create/update through DatasetSP.save

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::{header::CONTENT_TYPE, Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::entity_mapping::{
    map_partners, FIELD_ACTIVE, FIELD_CITY_CODE, FIELD_CODE, FIELD_NAME, FIELD_PERSON_TYPE,
    FIELD_TAX_ID,
};
use crate::config::SankhyaConfig;
use crate::models::{PartnerPage, PartnerRecord};
use crate::utils::log_sanitizer::{mask_tax_id, redact_sensitive, sanitize_for_log};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum SankhyaError {
    #[error("Sankhya authentication failed. Check the login headers.")]
    Authentication,

    #[error("Session expired. Try again.")]
    SessionExpired,

    #[error("Failed to communicate with the Sankhya API")]
    Communication,

    #[error("Unexpected Sankhya response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, SankhyaError>;

// ============================================================================
// Protocol constants
// ============================================================================

pub const LOAD_RECORDS_SERVICE: &str = "CRUDServiceProvider.loadRecords";
pub const DATASET_SAVE_SERVICE: &str = "DatasetSP.save";
pub const PARTNER_ENTITY: &str = "Parceiro";

/// Only partners flagged as customers are listed.
pub const CUSTOMER_CRITERIA: &str = "CLIENTE = 'S'";

const PARTNER_FIELDSET: [&str; 6] = [
    FIELD_CODE,
    FIELD_NAME,
    FIELD_TAX_ID,
    FIELD_CITY_CODE,
    FIELD_ACTIVE,
    FIELD_PERSON_TYPE,
];

/// Column order expected by DatasetSP.save. `values` keys are 1-based
/// positions into this list (position 0 is the primary key).
const SAVE_FIELD_ORDER: [&str; 6] = [
    FIELD_CODE,
    FIELD_NAME,
    FIELD_ACTIVE,
    FIELD_PERSON_TYPE,
    FIELD_TAX_ID,
    FIELD_CITY_CODE,
];

// ============================================================================
// Data Models - Gateway Requests
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRecordsRequest {
    pub request_body: LoadRecordsBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRecordsBody {
    pub data_set: DataSet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSet {
    pub root_entity: String,
    pub include_presentation_fields: String,
    pub offset_page: String,
    pub limit: String,
    pub criteria: Criteria,
    pub entity: EntityFieldset,
}

#[derive(Debug, Serialize)]
pub struct Criteria {
    pub expression: TextValue,
}

/// Sankhya wraps scalar text nodes as `{"$": "..."}`.
#[derive(Debug, Serialize)]
pub struct TextValue {
    #[serde(rename = "$")]
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct EntityFieldset {
    pub fieldset: FieldList,
}

#[derive(Debug, Serialize)]
pub struct FieldList {
    pub list: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSaveRequest {
    pub service_name: String,
    pub request_body: DatasetSaveBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSaveBody {
    pub entity_name: String,
    pub stand_alone: bool,
    pub fields: Vec<String>,
    pub records: Vec<DatasetRecord>,
}

#[derive(Debug, Serialize)]
pub struct DatasetRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pk: Option<BTreeMap<String, String>>,
    pub values: BTreeMap<String, String>,
}

// ============================================================================
// Request builders
// ============================================================================

/// Zero-based row offset of a 1-based page.
pub fn page_offset(page: u32, page_size: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(page_size)
}

/// Filter expression for the partner listing.
///
/// A non-blank search term adds a substring match on name, tax id or code.
/// Single quotes are doubled so the term cannot close the string literal.
pub fn partner_criteria(search_term: &str) -> String {
    if search_term.trim().is_empty() {
        return CUSTOMER_CRITERIA.to_string();
    }

    let term = search_term.replace('\'', "''");
    format!(
        "{} AND ({} LIKE '%{term}%' OR {} LIKE '%{term}%' OR {} LIKE '%{term}%')",
        CUSTOMER_CRITERIA,
        FIELD_NAME,
        FIELD_TAX_ID,
        FIELD_CODE,
        term = term
    )
}

pub fn load_partners_request(page: u32, page_size: u32, search_term: &str) -> LoadRecordsRequest {
    LoadRecordsRequest {
        request_body: LoadRecordsBody {
            data_set: DataSet {
                root_entity: PARTNER_ENTITY.to_string(),
                include_presentation_fields: "N".to_string(),
                offset_page: page_offset(page, page_size).to_string(),
                limit: page_size.to_string(),
                criteria: Criteria {
                    expression: TextValue {
                        value: partner_criteria(search_term),
                    },
                },
                entity: EntityFieldset {
                    fieldset: FieldList {
                        list: PARTNER_FIELDSET.join(", "),
                    },
                },
            },
        },
    }
}

/// DatasetSP.save body for one partner. The `pk` block is only present for
/// updates; without it the gateway assigns a new code.
///
/// Expects a normalized record (see [`PartnerRecord::normalized`]).
pub fn save_partner_request(record: &PartnerRecord) -> DatasetSaveRequest {
    let person_type = record
        .person_type
        .unwrap_or_else(|| record.derived_person_type());

    let pk = record
        .code
        .as_ref()
        .map(|code| BTreeMap::from([(FIELD_CODE.to_string(), code.clone())]));

    let values = BTreeMap::from([
        ("1".to_string(), record.name.clone()),
        ("2".to_string(), record.active.as_wire().to_string()),
        ("3".to_string(), person_type.as_wire().to_string()),
        ("4".to_string(), record.tax_id.clone()),
        ("5".to_string(), record.city_code.clone()),
    ]);

    DatasetSaveRequest {
        service_name: DATASET_SAVE_SERVICE.to_string(),
        request_body: DatasetSaveBody {
            entity_name: PARTNER_ENTITY.to_string(),
            stand_alone: false,
            fields: SAVE_FIELD_ORDER.iter().map(|f| f.to_string()).collect(),
            records: vec![DatasetRecord { pk, values }],
        },
    }
}

/// `entities.total` arrives as a string; numbers are accepted too.
fn reported_total(entities: &Value) -> Option<u64> {
    match entities.get("total")? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Bearer token from a login response: `bearerToken`, else `token`.
pub fn extract_bearer_token(body: &Value) -> Option<String> {
    ["bearerToken", "token"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Token Cache
// ============================================================================

/// Owns the Sankhya bearer token.
///
/// The token has no known expiry; it stays cached until an authenticated call
/// is rejected with 401. Acquisition holds the cache lock, so concurrent first
/// callers wait for one login instead of each performing their own.
pub struct SankhyaAuthenticator {
    http_client: Client,
    config: SankhyaConfig,
    token_cache: Mutex<Option<String>>,
}

impl SankhyaAuthenticator {
    pub fn new(config: SankhyaConfig, http_client: Client) -> Self {
        Self {
            http_client,
            config,
            token_cache: Mutex::new(None),
        }
    }

    /// Cached token, or a fresh one from the login endpoint.
    pub async fn ensure_token(&self) -> Result<String> {
        let mut cache = self.token_cache.lock().await;

        if let Some(token) = cache.as_ref() {
            return Ok(token.clone());
        }

        let token = self.login().await?;
        debug!(token = %redact_sensitive(&token), "Cached new Sankhya bearer token");
        *cache = Some(token.clone());

        Ok(token)
    }

    /// Drop the cached token if it is still the one that was rejected.
    /// A token refreshed by a concurrent call in the meantime is kept.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cache = self.token_cache.lock().await;
        if cache.as_deref() == Some(rejected) {
            *cache = None;
            info!("Sankhya bearer token invalidated");
        }
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub async fn has_token(&self) -> bool {
        self.token_cache.lock().await.is_some()
    }

    async fn login(&self) -> Result<String> {
        let url = self.config.login_url();

        let response = self
            .http_client
            .post(&url)
            .header("token", &self.config.token)
            .header("appkey", &self.config.app_key)
            .header("username", &self.config.username)
            .header("password", &self.config.password)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %sanitize_for_log(&e.to_string()), "Sankhya login request failed");
                SankhyaError::Authentication
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_else(|e| e.to_string());
            error!(
                url = %url,
                status = status.as_u16(),
                details = %sanitize_for_log(&details),
                "Sankhya login rejected"
            );
            return Err(SankhyaError::Authentication);
        }

        let body: Value = response.json().await.map_err(|e| {
            error!(url = %url, error = %sanitize_for_log(&e.to_string()), "Sankhya login response is not JSON");
            SankhyaError::Authentication
        })?;

        extract_bearer_token(&body).ok_or_else(|| {
            let keys: Vec<&str> = body
                .as_object()
                .map(|o| o.keys().map(String::as_str).collect())
                .unwrap_or_default();
            error!(url = %url, response_keys = ?keys, "Token not found in Sankhya login response");
            SankhyaError::Authentication
        })
    }
}

// ============================================================================
// Sankhya Client
// ============================================================================

fn build_http_client(config: &SankhyaConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| SankhyaError::Config(format!("Failed to build HTTP client: {}", e)))
}

pub struct SankhyaClient {
    config: SankhyaConfig,
    http_client: Client,
    auth: Arc<SankhyaAuthenticator>,
}

impl SankhyaClient {
    /// Create a client with its own token cache.
    pub fn new(config: SankhyaConfig) -> Result<Self> {
        config.validate()?;

        let http_client = build_http_client(&config)?;
        let auth = Arc::new(SankhyaAuthenticator::new(config.clone(), http_client.clone()));

        Ok(Self {
            config,
            http_client,
            auth,
        })
    }

    /// Create a client sharing an existing token cache. Requests go through
    /// the authenticator's HTTP client, so both share one connection pool.
    pub fn with_authenticator(config: SankhyaConfig, auth: Arc<SankhyaAuthenticator>) -> Result<Self> {
        config.validate()?;

        let http_client = auth.http_client().clone();

        Ok(Self {
            config,
            http_client,
            auth,
        })
    }

    pub fn authenticator(&self) -> &Arc<SankhyaAuthenticator> {
        &self.auth
    }

    // ========================================================================
    // Authenticated requests
    // ========================================================================

    /// Send an authenticated JSON request and return the parsed body.
    ///
    /// A 401 clears the cached token and yields `SessionExpired`; the caller
    /// is expected to retry the whole operation. Failure details are logged
    /// here and not carried by the returned error.
    pub async fn call<T: Serialize + ?Sized>(&self, url: &str, method: Method, payload: &T) -> Result<Value> {
        let token = self.auth.ensure_token().await?;

        let response = self
            .http_client
            .request(method.clone(), url)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!(
                    method = %method,
                    url = %url,
                    details = %sanitize_for_log(&e.to_string()),
                    "Sankhya request failed"
                );
                SankhyaError::Communication
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_else(|e| e.to_string());
            error!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                details = %sanitize_for_log(&details),
                "Sankhya request failed"
            );

            if status == StatusCode::UNAUTHORIZED {
                self.auth.invalidate(&token).await;
                return Err(SankhyaError::SessionExpired);
            }
            return Err(SankhyaError::Communication);
        }

        response.json::<Value>().await.map_err(|e| {
            error!(
                method = %method,
                url = %url,
                details = %sanitize_for_log(&e.to_string()),
                "Sankhya response body is not JSON"
            );
            SankhyaError::MalformedResponse("response body is not JSON".to_string())
        })
    }

    // ========================================================================
    // Partner Operations
    // ========================================================================

    /// List customer partners, one page at a time. `page` is 1-based.
    pub async fn list_partners(&self, page: u32, page_size: u32, search_term: &str) -> Result<PartnerPage> {
        if page == 0 {
            return Err(SankhyaError::Validation("page must be at least 1".to_string()));
        }
        if page_size == 0 {
            return Err(SankhyaError::Validation("page size must be at least 1".to_string()));
        }

        let request = load_partners_request(page, page_size, search_term);
        let response = self
            .call(&self.config.service_url(LOAD_RECORDS_SERVICE), Method::POST, &request)
            .await?;

        let entities = response
            .pointer("/responseBody/entities")
            .filter(|entities| entities.get("entity").is_some_and(Value::is_array))
            .ok_or_else(|| {
                let found = response.pointer("/responseBody/entities").map(Value::to_string);
                error!(
                    entities = %sanitize_for_log(found.as_deref().unwrap_or("missing")),
                    "Unexpected Sankhya entities structure"
                );
                SankhyaError::MalformedResponse("response does not contain the partner list".to_string())
            })?;

        let partners = map_partners(entities)?;
        let reported = reported_total(entities);
        let total = reported.unwrap_or(partners.len() as u64);
        let total_pages = reported.map_or(1, |total| total.div_ceil(u64::from(page_size)));

        debug!(page, page_size, total, returned = partners.len(), "Loaded Sankhya partners");

        Ok(PartnerPage {
            partners,
            total,
            page,
            page_size,
            total_pages,
        })
    }

    /// Create (no code) or update (code present) a partner.
    ///
    /// The person type is always recomputed from the tax id. Returns the raw
    /// gateway response.
    pub async fn save_partner(&self, record: &PartnerRecord) -> Result<Value> {
        let record = record.normalized();
        let operation = if record.is_update() { "update" } else { "create" };
        let person_type = record.derived_person_type();
        let request = save_partner_request(&record);

        info!(
            operation,
            code = record.code.as_deref().unwrap_or(""),
            name = %sanitize_for_log(&record.name),
            tax_id = %mask_tax_id(&record.tax_id),
            city_code = %sanitize_for_log(&record.city_code),
            active = record.active.as_wire(),
            person_type = person_type.as_wire(),
            "Sending partner save request to Sankhya"
        );

        match self
            .call(&self.config.service_url(DATASET_SAVE_SERVICE), Method::POST, &request)
            .await
        {
            Ok(response) => {
                info!(
                    operation,
                    code = record.code.as_deref().unwrap_or(""),
                    name = %sanitize_for_log(&record.name),
                    "Partner saved in Sankhya"
                );
                debug!(response = %sanitize_for_log(&response.to_string()), "Sankhya save response");
                Ok(response)
            }
            Err(e) => {
                warn!(
                    operation,
                    error = %e,
                    code = record.code.as_deref().unwrap_or(""),
                    name = %sanitize_for_log(&record.name),
                    tax_id = %mask_tax_id(&record.tax_id),
                    city_code = %sanitize_for_log(&record.city_code),
                    "Failed to save partner in Sankhya"
                );
                Err(e)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
