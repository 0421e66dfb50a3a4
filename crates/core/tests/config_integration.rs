//! opgate.toml 통합 설정 테스트
//!
//! - opgate.toml.example 파싱 테스트
//! - 환경변수 우선순위 테스트
//! - 파일 로딩 / 누락 파일 처리 테스트

use std::env;

use serial_test::serial;

use opgate_core::config::{DEFAULT_PASSES, OpgateConfig};
use opgate_core::error::{ConfigError, OpgateError};

// =============================================================================
// opgate.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../opgate.toml.example");
    let config = OpgateConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert!(config.general.passes.is_empty());
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../opgate.toml.example");
    let config = OpgateConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_selects_default_passes() {
    let content = include_str!("../../../opgate.toml.example");
    let config = OpgateConfig::parse(content).expect("should parse");
    assert_eq!(config.selection().names(), DEFAULT_PASSES);
}

#[test]
fn example_config_leaves_required_values_empty() {
    let content = include_str!("../../../opgate.toml.example");
    let config = OpgateConfig::parse(content).expect("should parse");

    assert!(config.require_object_store().is_err());
    assert!(config.require_operator_image().is_err());
    assert!(config.require_e2e().is_err());
    assert!(config.require_upgrade_images().is_err());
}

#[test]
fn example_config_has_verify_defaults() {
    let content = include_str!("../../../opgate.toml.example");
    let config = OpgateConfig::parse(content).expect("should parse");

    assert_eq!(config.verify.optional_tools, vec!["gosimple", "unused"]);
    assert_eq!(config.verify.license_header_lines, 3);
    assert_eq!(
        config.verify.codegen_command,
        vec!["hack/k8s/codegen/verify-generated.sh"]
    );
}

// =============================================================================
// 파일 로딩
// =============================================================================

#[tokio::test]
async fn load_missing_file_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = OpgateConfig::load(dir.path().join("absent.toml"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OpgateError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
#[serial]
async fn load_or_default_tolerates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = OpgateConfig::load_or_default(dir.path().join("absent.toml"))
        .await
        .expect("missing file should fall back to defaults");
    assert_eq!(config.unit.cover_mode, "count");
}

#[tokio::test]
#[serial]
async fn load_reads_file_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("opgate.toml");
    std::fs::write(
        &path,
        r#"
[general]
log_level = "loud"
"#,
    )
    .unwrap();

    let err = OpgateConfig::load(&path).await.unwrap_err();
    assert!(err.to_string().contains("general.log_level"));
}

// =============================================================================
// 환경변수 오버라이드
// =============================================================================

#[test]
#[serial]
fn env_override_wins_over_file_value() {
    let toml_str = r#"
[operator]
image = "from-file:1"
"#;

    // SAFETY: serial 테스트: 설정 후 정리합니다
    unsafe {
        env::set_var("OPGATE_OPERATOR_IMAGE", "from-env:2");
    }

    let mut config = OpgateConfig::parse(toml_str).expect("should parse");
    config.apply_env_overrides();
    assert_eq!(config.operator.image, "from-env:2");

    // SAFETY: 테스트 정리
    unsafe {
        env::remove_var("OPGATE_OPERATOR_IMAGE");
    }
}

#[test]
#[serial]
fn passes_shorthand_sets_selection() {
    // SAFETY: serial 테스트: 설정 후 정리합니다
    unsafe {
        env::set_var("OPGATE_PASSES", "unit, build,");
    }

    let mut config = OpgateConfig::default();
    config.apply_env_overrides();
    assert_eq!(config.selection().names(), ["unit", "build"]);

    // SAFETY: 테스트 정리
    unsafe {
        env::remove_var("OPGATE_PASSES");
    }
}

#[test]
#[serial]
fn kubeconfig_falls_back_to_standard_variable() {
    // SAFETY: serial 테스트: 설정 후 정리합니다
    unsafe {
        env::remove_var("OPGATE_CLUSTER_KUBECONFIG");
        env::set_var("KUBECONFIG", "/tmp/kind.kubeconfig");
    }

    let mut config = OpgateConfig::default();
    config.apply_env_overrides();
    assert_eq!(config.cluster.kubeconfig, "/tmp/kind.kubeconfig");

    // 파일 값이 있으면 KUBECONFIG는 무시됩니다
    let mut config = OpgateConfig::parse(
        r#"
[cluster]
kubeconfig = "/etc/opgate/kubeconfig"
"#,
    )
    .unwrap();
    config.apply_env_overrides();
    assert_eq!(config.cluster.kubeconfig, "/etc/opgate/kubeconfig");

    // SAFETY: 테스트 정리
    unsafe {
        env::remove_var("KUBECONFIG");
    }
}

#[test]
#[serial]
fn unparsable_numeric_override_is_ignored() {
    // SAFETY: serial 테스트: 설정 후 정리합니다
    unsafe {
        env::set_var("OPGATE_OBJECT_STORE_PORT", "not-a-port");
    }

    let mut config = OpgateConfig::default();
    config.apply_env_overrides();
    assert_eq!(config.object_store.port, 9000);

    // SAFETY: 테스트 정리
    unsafe {
        env::remove_var("OPGATE_OBJECT_STORE_PORT");
    }
}

#[test]
#[serial]
fn credentials_from_env_satisfy_requirement() {
    // SAFETY: serial 테스트: 설정 후 정리합니다
    unsafe {
        env::set_var("OPGATE_OBJECT_STORE_ACCESS_KEY", "minio");
        env::set_var("OPGATE_OBJECT_STORE_SECRET_KEY", "minio123");
    }

    let mut config = OpgateConfig::default();
    config.apply_env_overrides();
    config
        .require_object_store()
        .expect("credentials should come from env");

    // SAFETY: 테스트 정리
    unsafe {
        env::remove_var("OPGATE_OBJECT_STORE_ACCESS_KEY");
        env::remove_var("OPGATE_OBJECT_STORE_SECRET_KEY");
    }
}
