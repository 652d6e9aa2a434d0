use super::load_existing_config as load_existing_config_impl;
use super::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert!(!config.server.host.is_empty());
    assert!(config.server.port > 0);
    assert!(!config.server.embedding_model.is_empty());
    assert!(config.server.batch_size > 0);
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn load_existing_config_falls_back_on_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join(crate::config::CONFIG_FILE_NAME),
        "[server]\nport = 0\n",
    )
    .expect("writes config");

    let config = load_existing_config_impl(temp_dir.path()).expect("falls back to defaults");
    assert_eq!(config.server, ServerConfig::default());
}

#[test]
fn unreachable_server_fails_connection_test() {
    let server = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..ServerConfig::default()
    };
    assert!(test_server_connection(&server).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_test_reports_missing_chat_model() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "test-embedder", "object": "model"}],
        })))
        .mount(&mock)
        .await;

    let address = mock.address();
    let server = ServerConfig {
        host: address.ip().to_string(),
        port: address.port(),
        embedding_model: "test-embedder".to_string(),
        chat_model: "test-chat".to_string(),
        ..ServerConfig::default()
    };
    let result = tokio::task::spawn_blocking(move || test_server_connection(&server))
        .await
        .expect("task completes");

    let error = result.expect_err("unloaded chat model must be reported");
    assert!(format!("{:#}", error).contains("test-chat"));
}

#[test]
fn non_empty_validation() {
    assert!(non_empty(&"model".to_string()).is_ok());
    assert!(non_empty(&"   ".to_string()).is_err());
}
