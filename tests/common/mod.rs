// Mock Sankhya gateway for integration tests
// Serves /login and the service.sbr dispatcher on an ephemeral port and
// records every gateway call for assertions
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use sankhya_partners::config::SankhyaConfig;

pub const LOGIN_TOKEN: &str = "static-token";
pub const APP_KEY: &str = "app-key";
pub const USERNAME: &str = "integration@example.com";
pub const PASSWORD: &str = "Integration123!";

// ============================================================================
// Mock Data Structures
// ============================================================================

#[derive(Debug, Clone)]
pub struct MockPartner {
    pub code: Option<&'static str>,
    pub name: &'static str,
    pub tax_id: &'static str,
    pub city_code: &'static str,
    pub active: &'static str,
    pub person_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub service_name: String,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
    pub body: Value,
}

#[derive(Debug, Default)]
pub struct MockSankhyaState {
    pub partners: Vec<MockPartner>,
    pub report_total: bool,
    pub login_count: usize,
    pub reject_login: bool,
    /// Replaces the default `{"bearerToken": ...}` login body.
    pub login_body: Option<Value>,
    /// Replaces the generated loadRecords body.
    pub load_body: Option<Value>,
    /// Status returned (once) by the next gateway call.
    pub fail_next_call: Option<StatusCode>,
    pub valid_token: Option<String>,
    pub calls: Vec<RecordedCall>,
}

impl MockSankhyaState {
    /// Forget the issued token so the next gateway call gets a 401.
    pub fn expire_session(&mut self) {
        self.valid_token = None;
    }

    pub fn calls_to(&self, service_name: &str) -> Vec<&RecordedCall> {
        self.calls
            .iter()
            .filter(|c| c.service_name == service_name)
            .collect()
    }

    /// Body of the first call made to `service_name`, or `Value::Null`.
    pub fn first_body(&self, service_name: &str) -> Value {
        self.calls
            .iter()
            .find(|c| c.service_name == service_name)
            .map(|c| c.body.clone())
            .unwrap_or(Value::Null)
    }
}

pub type SharedState = Arc<RwLock<MockSankhyaState>>;

fn wrap(value: Option<&str>) -> Value {
    match value {
        Some(v) => json!({ "$": v }),
        None => json!({}),
    }
}

fn load_records_body(state: &MockSankhyaState) -> Value {
    let rows: Vec<Value> = state
        .partners
        .iter()
        .map(|p| {
            json!({
                "f0": wrap(p.code),
                "f1": wrap(Some(p.name)),
                "f2": wrap(Some(p.tax_id)),
                "f3": wrap(Some(p.city_code)),
                "f4": wrap(Some(p.active)),
                "f5": wrap(Some(p.person_type)),
            })
        })
        .collect();

    let mut entities = json!({
        "metadata": {
            "fields": {
                "field": [
                    { "name": "CODPARC" },
                    { "name": "NOMEPARC" },
                    { "name": "CGC_CPF" },
                    { "name": "CODCID" },
                    { "name": "ATIVO" },
                    { "name": "TIPPESSOA" }
                ]
            }
        },
        "entity": rows
    });

    if state.report_total {
        entities["total"] = json!(state.partners.len().to_string());
    }

    json!({
        "serviceName": "CRUDServiceProvider.loadRecords",
        "status": "1",
        "responseBody": { "entities": entities }
    })
}

// ============================================================================
// Mock Endpoints
// ============================================================================

async fn login(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let mut state = state.write().await;

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let credentials_ok = header("token") == LOGIN_TOKEN
        && header("appkey") == APP_KEY
        && header("username") == USERNAME
        && header("password") == PASSWORD;

    if state.reject_login || !credentials_ok {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "codigo": "401", "descricao": "Invalid credentials" } })),
        );
    }

    state.login_count += 1;
    let token = format!("bearer-{}", state.login_count);
    state.valid_token = Some(token.clone());

    let body = state
        .login_body
        .clone()
        .unwrap_or_else(|| json!({ "bearerToken": token }));

    // An overridden body issues whatever token it carries.
    let issued = ["bearerToken", "token"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string);
    state.valid_token = issued;

    (StatusCode::OK, Json(body))
}

async fn service(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut state = state.write().await;

    let service_name = params.get("serviceName").cloned().unwrap_or_default();
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state.calls.push(RecordedCall {
        service_name: service_name.clone(),
        authorization: authorization.clone(),
        user_agent,
        body,
    });

    let expected = state.valid_token.as_ref().map(|t| format!("Bearer {}", t));
    if expected.is_none() || authorization != expected {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "3", "statusMessage": "Não autorizado." })),
        );
    }

    if let Some(status) = state.fail_next_call.take() {
        return (
            status,
            Json(json!({ "status": "0", "statusMessage": "Erro interno" })),
        );
    }

    match service_name.as_str() {
        "CRUDServiceProvider.loadRecords" => {
            let body = state
                .load_body
                .clone()
                .unwrap_or_else(|| load_records_body(&state));
            (StatusCode::OK, Json(body))
        }
        "DatasetSP.save" => (
            StatusCode::OK,
            Json(json!({
                "serviceName": "DatasetSP.save",
                "status": "1",
                "responseBody": { "total": "1", "result": [["101"]] }
            })),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "0", "statusMessage": "Serviço não encontrado" })),
        ),
    }
}

// ============================================================================
// Server Setup
// ============================================================================

pub fn create_sankhya_mock_server(state: SharedState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/gateway/v1/mge/service.sbr", post(service))
        .with_state(state)
}

pub fn sample_partners() -> Vec<MockPartner> {
    vec![
        MockPartner {
            code: Some("10"),
            name: "Acme",
            tax_id: "12345678000199",
            city_code: "1510",
            active: "S",
            person_type: "J",
        },
        MockPartner {
            code: Some("11"),
            name: "Maria Silva",
            tax_id: "12345678901",
            city_code: "2020",
            active: "N",
            person_type: "F",
        },
    ]
}

pub async fn start_mock_sankhya() -> (String, SharedState) {
    let state = Arc::new(RwLock::new(MockSankhyaState {
        partners: sample_partners(),
        report_total: true,
        ..Default::default()
    }));

    let app = create_sankhya_mock_server(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

pub fn test_config(base_url: &str) -> SankhyaConfig {
    SankhyaConfig {
        base_url: base_url.to_string(),
        token: LOGIN_TOKEN.to_string(),
        app_key: APP_KEY.to_string(),
        username: USERNAME.to_string(),
        password: PASSWORD.to_string(),
        timeout: Duration::from_secs(5),
    }
}
