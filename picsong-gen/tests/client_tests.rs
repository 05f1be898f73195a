//! Upstream Client Integration Tests
//!
//! Runs the analysis, synthesis and token clients against a local axum
//! server standing in for the cloud endpoints.

mod helpers;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use helpers::{generate_test_wav, PNG_BYTES};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use picsong_common::config::{AppConfig, ConfigOverrides, TomlConfig};
use picsong_gen::services::token_source::AssertionClaims;
use picsong_gen::services::{
    AnalysisError, GeminiAnalyzer, LyriaSynthesizer, MusicAnalyzer, MusicSynthesizer,
    ServiceAccountKey, ServiceAccountTokenSource, StaticToken, SynthesisError, TokenError,
    TokenSource,
};

const PRIVATE_KEY_PEM: &str = include_str!("fixtures/test_key.pem");
const PUBLIC_KEY_PEM: &str = include_str!("fixtures/test_key.pub.pem");

/// Request as seen by the fake upstream
#[derive(Debug, Clone)]
struct Captured {
    path: String,
    authorization: Option<String>,
    body: Bytes,
}

type CaptureLog = Arc<Mutex<Vec<Captured>>>;

/// Serve a fixed reply on every path; returns the base URL and request log
async fn spawn_upstream(status: StatusCode, reply: Value) -> (String, CaptureLog) {
    let log: CaptureLog = Arc::new(Mutex::new(Vec::new()));
    let handler_log = log.clone();

    let router = Router::new().fallback(move |uri: Uri, headers: HeaderMap, body: Bytes| {
        let log = handler_log.clone();
        let reply = reply.clone();
        async move {
            log.lock().unwrap().push(Captured {
                path: uri.path().to_string(),
                authorization: headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                body,
            });
            (status, axum::Json(reply)).into_response()
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}", addr), log)
}

fn test_config(api_endpoint: &str) -> AppConfig {
    let overrides = ConfigOverrides {
        project_id: Some("demo".to_string()),
        ..Default::default()
    };
    let toml = TomlConfig {
        api_endpoint: Some(format!("{}/", api_endpoint)),
        request_timeout_secs: Some(5),
        ..Default::default()
    };
    AppConfig::resolve(overrides, toml)
}

fn static_token() -> Arc<dyn TokenSource> {
    Arc::new(StaticToken::new("test-token"))
}

fn captured(log: &CaptureLog) -> Vec<Captured> {
    log.lock().unwrap().clone()
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_analysis_request_and_reply() {
    let reply = json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": " calm piano\n" }] } }]
    });
    let (base, log) = spawn_upstream(StatusCode::OK, reply).await;
    let analyzer = GeminiAnalyzer::new(&test_config(&base), static_token()).unwrap();

    let text = analyzer.analyze(PNG_BYTES, "image/png").await.unwrap();
    assert_eq!(text, "calm piano");

    let requests = captured(&log);
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(
        request.path,
        "/v1/projects/demo/locations/us-central1/publishers/google/models/gemini-2.0-flash:generateContent"
    );
    assert_eq!(request.authorization.as_deref(), Some("Bearer test-token"));

    let body: Value = serde_json::from_slice(&request.body).unwrap();
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
    assert_eq!(
        parts[0]["inlineData"]["data"],
        general_purpose::STANDARD.encode(PNG_BYTES)
    );
    assert!(parts[1]["text"].as_str().unwrap().contains("music"));
}

#[tokio::test]
async fn test_analysis_without_candidates() {
    let (base, _log) = spawn_upstream(StatusCode::OK, json!({ "candidates": [] })).await;
    let analyzer = GeminiAnalyzer::new(&test_config(&base), static_token()).unwrap();

    let result = analyzer.analyze(PNG_BYTES, "image/png").await;
    assert!(matches!(result, Err(AnalysisError::NoCandidates)));
}

#[tokio::test]
async fn test_analysis_api_error() {
    let reply = json!({ "error": { "code": 403, "message": "Permission denied" } });
    let (base, _log) = spawn_upstream(StatusCode::FORBIDDEN, reply).await;
    let analyzer = GeminiAnalyzer::new(&test_config(&base), static_token()).unwrap();

    match analyzer.analyze(PNG_BYTES, "image/png").await {
        Err(AnalysisError::ApiError(status, body)) => {
            assert_eq!(status, 403);
            assert!(body.contains("Permission denied"));
        }
        other => panic!("Expected ApiError, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_synthesis_request_and_reply() {
    let wav = generate_test_wav(20);
    let reply = json!({
        "predictions": [{ "bytesBase64Encoded": general_purpose::STANDARD.encode(&wav), "mimeType": "audio/wav" }]
    });
    let (base, log) = spawn_upstream(StatusCode::OK, reply).await;
    let synthesizer = LyriaSynthesizer::new(&test_config(&base), static_token()).unwrap();

    let audio = synthesizer.synthesize("calm piano").await.unwrap();
    assert_eq!(audio, wav);

    let requests = captured(&log);
    assert_eq!(requests.len(), 1);
    assert!(requests[0].path.ends_with("/models/lyria-002:predict"));

    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["instances"][0]["prompt"], "calm piano");
}

#[tokio::test]
async fn test_synthesis_empty_payload() {
    let (base, _log) = spawn_upstream(StatusCode::OK, json!({ "predictions": [] })).await;
    let synthesizer = LyriaSynthesizer::new(&test_config(&base), static_token()).unwrap();

    let result = synthesizer.synthesize("calm piano").await;
    assert!(matches!(result, Err(SynthesisError::EmptyAudio)));
}

#[tokio::test]
async fn test_synthesis_api_error() {
    let reply = json!({ "error": { "code": 500, "message": "Internal" } });
    let (base, _log) = spawn_upstream(StatusCode::INTERNAL_SERVER_ERROR, reply).await;
    let synthesizer = LyriaSynthesizer::new(&test_config(&base), static_token()).unwrap();

    let result = synthesizer.synthesize("calm piano").await;
    assert!(matches!(result, Err(SynthesisError::ApiError(500, _))));
}

#[tokio::test]
async fn test_synthesis_unreachable_endpoint() {
    // Nothing listens on the discard port
    let synthesizer = LyriaSynthesizer::new(&test_config("http://127.0.0.1:9"), static_token()).unwrap();

    let result = synthesizer.synthesize("calm piano").await;
    assert!(matches!(result, Err(SynthesisError::NetworkError(_))));
}

// ---------------------------------------------------------------------------
// Service-account token exchange
// ---------------------------------------------------------------------------

fn service_account_key(token_uri: &str) -> ServiceAccountKey {
    let json = json!({
        "type": "service_account",
        "project_id": "demo",
        "private_key_id": "kid-1",
        "private_key": PRIVATE_KEY_PEM,
        "client_email": "picsong@demo.iam.gserviceaccount.com",
        "token_uri": token_uri
    });
    ServiceAccountKey::from_json(&json.to_string()).unwrap()
}

/// Value of a form field, still percent-encoded
fn form_field<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    body.split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[tokio::test]
async fn test_token_exchange_and_cache() {
    let reply = json!({ "access_token": "ya29.test", "expires_in": 3600, "token_type": "Bearer" });
    let (base, log) = spawn_upstream(StatusCode::OK, reply).await;
    let token_uri = format!("{}/token", base);

    let source =
        ServiceAccountTokenSource::new(service_account_key(&token_uri), Duration::from_secs(5)).unwrap();

    assert_eq!(source.access_token().await.unwrap(), "ya29.test");
    assert_eq!(source.access_token().await.unwrap(), "ya29.test");

    // Second call served from cache
    let requests = captured(&log);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/token");

    let body = String::from_utf8(requests[0].body.to_vec()).unwrap();
    assert_eq!(
        form_field(&body, "grant_type"),
        Some("urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer")
    );

    let assertion = form_field(&body, "assertion").unwrap();
    let header = jsonwebtoken::decode_header(assertion).unwrap();
    assert_eq!(header.alg, Algorithm::RS256);
    assert_eq!(header.kid.as_deref(), Some("kid-1"));

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[token_uri.as_str()]);
    let decoded = jsonwebtoken::decode::<AssertionClaims>(
        assertion,
        &DecodingKey::from_rsa_pem(PUBLIC_KEY_PEM.as_bytes()).unwrap(),
        &validation,
    )
    .unwrap();
    assert_eq!(decoded.claims.iss, "picsong@demo.iam.gserviceaccount.com");
    assert_eq!(decoded.claims.scope, "https://www.googleapis.com/auth/cloud-platform");
    assert_eq!(decoded.claims.exp - decoded.claims.iat, 3600);
}

#[tokio::test]
async fn test_token_endpoint_rejection() {
    let reply = json!({ "error": "invalid_grant", "error_description": "Invalid JWT Signature." });
    let (base, _log) = spawn_upstream(StatusCode::BAD_REQUEST, reply).await;

    let source = ServiceAccountTokenSource::new(
        service_account_key(&format!("{}/token", base)),
        Duration::from_secs(5),
    )
    .unwrap();

    match source.access_token().await {
        Err(TokenError::Api(status, body)) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_token_failure_surfaces_as_auth_error() {
    let (token_base, _token_log) =
        spawn_upstream(StatusCode::UNAUTHORIZED, json!({ "error": "unauthorized_client" })).await;
    let (api_base, api_log) = spawn_upstream(StatusCode::OK, json!({ "candidates": [] })).await;

    let source = ServiceAccountTokenSource::new(
        service_account_key(&format!("{}/token", token_base)),
        Duration::from_secs(5),
    )
    .unwrap();
    let analyzer = GeminiAnalyzer::new(&test_config(&api_base), Arc::new(source)).unwrap();

    let result = analyzer.analyze(PNG_BYTES, "image/png").await;
    assert!(matches!(result, Err(AnalysisError::AuthError(_))));
    assert!(captured(&api_log).is_empty());
}
