//! Tests for configuration and secrets loading from disk.

use std::io::Write;

use streamyyy_net::{Config, NetError, Secrets};
use tempfile::{NamedTempFile, TempDir};

#[test]
fn load_explicit_path() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [client]
        base_url = "https://api.streamyyy.com/v1"

        [retry]
        max_retries = 1
        "#
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(
        config.client.base_url.as_deref(),
        Some("https://api.streamyyy.com/v1")
    );
    assert_eq!(config.retry_config().max_retries, 1);
}

#[test]
fn missing_explicit_path_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
    assert!(matches!(err, NetError::Configuration(_)));
    let err = Config::load_or_default(Some(&dir.path().join("nope.toml"))).unwrap_err();
    assert!(matches!(err, NetError::Configuration(_)));
}

#[test]
fn unparseable_file_names_the_path() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[retry]\nmax_retries = \"three\"").unwrap();

    let err = Config::load(Some(file.path())).unwrap_err();
    let NetError::Configuration(message) = err else {
        panic!("expected configuration error");
    };
    assert!(message.contains("Failed to parse config file"));
}

#[test]
fn config_builds_a_working_client() {
    let config = Config::from_toml(
        r#"
        [client]
        base_url = "https://api.streamyyy.com/v1"
        "#,
    )
    .unwrap();
    let client = config.client_builder().unwrap().build().unwrap();
    assert_eq!(
        client.base_url().map(|u| u.as_str()),
        Some("https://api.streamyyy.com/v1")
    );
}

#[test]
fn invalid_base_url_in_config_fails_at_build() {
    let config = Config::from_toml(
        r#"
        [client]
        base_url = "not a url"
        "#,
    )
    .unwrap();
    let err = config.client_builder().unwrap().build().unwrap_err();
    assert!(matches!(err, NetError::InvalidUrl(_)));
}

#[cfg(unix)]
#[test]
fn secrets_with_open_permissions_are_rejected() {
    use std::os::unix::fs::PermissionsExt;

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"api_token = "tok""#).unwrap();
    std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

    let err = Secrets::load_from(file.path()).unwrap_err();
    let NetError::Configuration(message) = err else {
        panic!("expected configuration error");
    };
    assert!(message.contains("insecure permissions"));
}

#[cfg(unix)]
#[test]
fn secrets_with_owner_only_permissions_load() {
    use std::os::unix::fs::PermissionsExt;

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"api_token = "tok-600""#).unwrap();
    std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();

    let secrets = Secrets::load_from(file.path()).unwrap();
    assert_eq!(secrets.api_token(), Some("tok-600".to_string()));
}

#[tokio::test]
async fn secrets_act_as_credential_provider() {
    use streamyyy_net::CredentialProvider;

    let secrets: Secrets = toml::from_str(r#"api_token = "from-file""#).unwrap();
    assert_eq!(secrets.bearer_token().await, Some("from-file".to_string()));
}
