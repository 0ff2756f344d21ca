//! Integration tests for tenantry-config

use std::io::Write;
use tenantry_config::*;

fn temp_file(name: &str, content: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("tenantry-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_from_toml_file() {
    let path = temp_file(
        "tenancy.toml",
        r#"
            [tenancy]
            default_schema = "shared"
            excluded_schemas = ["audit"]
        "#,
    );

    let config = TenancyConfig::from_file(&path).unwrap();
    assert_eq!(config.default_schema, "shared");
    assert_eq!(config.excluded_schemas, vec!["audit".to_string()]);
    assert!(!config.auto_create);
}

#[test]
fn test_from_json_file() {
    let path = temp_file(
        "tenancy.json",
        r#"{"auto_create": true, "database_url": "postgres://localhost/app"}"#,
    );

    let config = TenancyConfig::from_file(&path).unwrap();
    assert!(config.auto_create);
    assert_eq!(config.default_schema, DEFAULT_SCHEMA);
}

#[test]
fn test_invalid_url_in_file_rejected() {
    let path = temp_file("bad.json", r#"{"database_url": "mysql://localhost"}"#);
    assert!(matches!(
        TenancyConfig::from_file(&path),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_dotenv_file_loader() {
    let path = temp_file(
        "tenancy.env",
        "TENANTRY_DEFAULT_SCHEMA=from_file\nTENANTRY_AUTO_CREATE=1\n",
    );

    let env = EnvLoader::from_dotenv_file(Some(ENV_PREFIX), &path).unwrap();
    let config = TenancyConfig::from_loader(&env).unwrap();
    assert_eq!(config.default_schema, "from_file");
    assert!(config.auto_create);
}

#[test]
fn test_missing_file_is_io_error() {
    let result = TenancyConfig::from_file("/definitely/not/here/tenancy.toml");
    assert!(matches!(result, Err(ConfigError::IoError(_))));
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::InvalidValue {
        key: "TENANTRY_AUTO_CREATE".to_string(),
        value: "maybe".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Invalid value for TENANTRY_AUTO_CREATE: 'maybe'"
    );
}
