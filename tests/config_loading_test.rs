//! Config loading integration tests: files, directories, environment and
//! typed access through the service

use anyhow::Result;
use scg_config::{Config, ConfigError, KeyType, LayeredProvider, Provider, Value};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_load_all_supported_extensions() -> Result<()> {
    let cases = [
        ("yaml", "app:\n  name: scg\n"),
        ("yml", "app:\n  name: scg\n"),
        ("json", r#"{"app": {"name": "scg"}}"#),
    ];

    for (ext, content) in cases {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join(format!("config.{}", ext));
        fs::write(&path, content)?;

        let config = Config::new();
        config.file_loader().load_from_file(&path)?;
        config.reload()?;

        assert_eq!(
            config.get("app.name", KeyType::String)?,
            Value::from("scg"),
            "extension {}",
            ext
        );
    }
    Ok(())
}

#[test]
fn test_unsupported_extension() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "name = 'x'")?;

    let config = Config::new();
    let err = config.file_loader().load_from_file(&path).unwrap_err();
    let ConfigError::ReadConfigFile { source, .. } = err else {
        panic!("expected ReadConfigFile");
    };
    assert!(matches!(*source, ConfigError::UnsupportedFormat { .. }));
    Ok(())
}

#[test]
fn test_directory_env_and_override_precedence() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(
        temp_dir.path().join("00-base.yaml"),
        r#"
app:
  name: base
  debug: false
server:
  port: 80
  read_timeout: 5s
  hosts: [a.example.com, b.example.com]
"#,
    )?;
    fs::write(
        temp_dir.path().join("10-prod.json"),
        r#"{"app": {"name": "prod"}, "server": {"port": 443}}"#,
    )?;

    let config = Config::new();
    config.file_loader().load_from_directory(temp_dir.path())?;

    std::env::set_var("SCGLOADTEST_APP_DEBUG", "true");
    config.env_loader().load_from_env("scgloadtest")?;
    std::env::remove_var("SCGLOADTEST_APP_DEBUG");

    config.provider().set("server.port", Value::Int(8443));
    config.reload()?;

    let getter = config.getter();
    assert_eq!(getter.get_string("app.name"), "prod");
    assert!(getter.get_bool("app.debug"));
    assert_eq!(getter.get_uint32("server.port"), 8443);
    // durations are only produced by typed sources, never parsed from text
    assert_eq!(getter.get_duration("server.read_timeout"), Duration::ZERO);
    assert_eq!(getter.get_string("server.read_timeout"), "5s");
    assert_eq!(
        getter.get_string_slice("server.hosts"),
        vec!["a.example.com", "b.example.com"]
    );
    assert_eq!(getter.get_string("server.hosts.1"), "b.example.com");
    assert_eq!(getter.get_string("SERVER.HOSTS.0"), "a.example.com");
    assert_eq!(config.provider().config_file(), Some(temp_dir.path().join("00-base.yaml")));
    Ok(())
}

#[test]
fn test_path_and_flat_errors_through_service() {
    let provider = Arc::new(LayeredProvider::new());
    provider
        .merge_config_map(
            [(
                "limits".to_string(),
                Value::Map([("max".to_string(), Value::from("9876543210"))].into()),
            )]
            .into(),
        )
        .unwrap();
    let config = Config::builder().with_provider(provider).build();

    assert_eq!(
        config.get("limits.max", KeyType::Int64).unwrap(),
        Value::Int64(9_876_543_210)
    );
    assert!(matches!(
        config.get("limits.max", KeyType::Int32).unwrap_err(),
        ConfigError::WrongType { .. }
    ));
    assert!(matches!(
        config.get("limits", KeyType::Int).unwrap_err(),
        ConfigError::Coercion(_)
    ));
    assert!(config.has("limits.max"));
    assert!(!config.has("limits.max.deeper"));
    assert!(!config.has("limits."));
}

#[test]
fn test_typed_lookup_by_name() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("svc.yaml");
    fs::write(
        &path,
        r#"
service:
  id: 1336301d-4e85-4b76-a2f7-a2fc8ec10888
  endpoint: https://api.example.com/v1
  started: 2024-03-01T12:00:00Z
  ratio: 0.75
"#,
    )?;

    let config = Config::new();
    config.file_loader().load_from_file(&path)?;
    config.reload()?;

    let getter = config.getter();
    assert!(matches!(getter.get_by_name("service.id", "uuid")?, Value::Uuid(_)));
    assert!(matches!(getter.get_by_name("service.endpoint", "url")?, Value::Url(_)));
    assert!(matches!(
        getter.get_by_name("service.started", "time").unwrap_err(),
        ConfigError::WrongType { .. }
    ));
    assert_eq!(getter.get_by_name("service.ratio", "float32")?, Value::Float32(0.75));
    assert!(matches!(
        getter.get_by_name("service.ratio", "complex128").unwrap_err(),
        ConfigError::UnknownType(_)
    ));
    Ok(())
}
