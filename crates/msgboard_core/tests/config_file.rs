use msgboard_core::{ConfigError, MessageClient, ServiceConfig};
use std::io::Write;

#[test]
fn from_file_reads_json_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "service_base_url": "http://localhost:8080", "request_timeout_ms": 2500 }}"#
    )
    .unwrap();

    let config = ServiceConfig::from_file(file.path()).unwrap();
    assert_eq!(config.service_base_url, "http://localhost:8080");
    assert_eq!(config.request_timeout_ms, 2500);
    assert_eq!(config.messages_url(), "http://localhost:8080/api/messages");
}

#[test]
fn from_file_defaults_timeout() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "service_base_url": "https://chat.example.com" }}"#).unwrap();

    let config = ServiceConfig::from_file(file.path()).unwrap();
    assert_eq!(config.request_timeout_ms, 30_000);
}

#[test]
fn from_file_reports_parse_and_validation_errors() {
    let mut garbage = tempfile::NamedTempFile::new().unwrap();
    write!(garbage, "service_base_url = nope").unwrap();
    let err = ServiceConfig::from_file(garbage.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));

    let mut bad_url = tempfile::NamedTempFile::new().unwrap();
    write!(bad_url, r#"{{ "service_base_url": "file:///tmp" }}"#).unwrap();
    let err = ServiceConfig::from_file(bad_url.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl(_)));

    let missing = ServiceConfig::from_file("/definitely/not/here.json").unwrap_err();
    assert!(matches!(missing, ConfigError::Io(_)));
}

#[test]
fn client_url_is_base_plus_messages_path() {
    let config = ServiceConfig::new("http://localhost:8080");
    let client = MessageClient::connect(&config).unwrap();

    assert_eq!(client.url(), "http://localhost:8080/api/messages");
    assert_eq!(client.name(), "message");
    assert_eq!(client.algebra().id_prop(), "id");
    assert_eq!(
        client.transport().resource_url().as_str(),
        "http://localhost:8080/api/messages"
    );
}

#[test]
fn client_rejects_invalid_config() {
    let err = MessageClient::connect(&ServiceConfig::new("localhost")).err();
    assert!(err.is_some());
}
