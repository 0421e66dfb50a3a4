//! 프로비저닝 에러 타입
//!
//! [`ProvisionError`]는 의존 서비스 기동 과정에서 발생하는 모든 에러를 표현합니다.
//! `From<ProvisionError> for OpgateError` 변환이 구현되어 있어
//! 패스 본문에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use opgate_core::config::env_key;
use opgate_core::error::{ConfigError, OpgateError};

/// 프로비저닝 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// 필수 설정(자격 증명 등) 누락: 기동 시도 전에 발생
    #[error("missing required config '{field}'")]
    MissingConfig {
        /// `section.field` 형식의 설정 이름
        field: String,
    },

    /// 컨테이너 런타임을 사용할 수 없음
    #[error("container runtime unavailable: {0}")]
    MissingCapability(String),

    /// 런타임 API 호출 실패
    #[error("container runtime error: {0}")]
    Runtime(String),

    /// 최초 사용 준비(버킷 생성 등) 실패
    #[error("first-use setup failed for '{service}': {reason}")]
    Setup {
        /// 대상 서비스 이름
        service: String,
        /// 실패 사유
        reason: String,
    },
}

impl From<ProvisionError> for OpgateError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::MissingConfig { field } => {
                let env = match field.split_once('.') {
                    Some((section, name)) => env_key(section, name),
                    None => env_key("object_store", &field),
                };
                OpgateError::Config(ConfigError::MissingValue { field, env })
            }
            ProvisionError::MissingCapability(reason) => OpgateError::MissingCapability {
                capability: "container runtime".to_owned(),
                reason,
            },
            ProvisionError::Runtime(_) | ProvisionError::Setup { .. } => {
                OpgateError::Provision(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_becomes_configuration_error() {
        let err: OpgateError = ProvisionError::MissingConfig {
            field: "object_store.secret_key".to_owned(),
        }
        .into();
        match err {
            OpgateError::Config(ConfigError::MissingValue { field, env }) => {
                assert_eq!(field, "object_store.secret_key");
                assert_eq!(env, "OPGATE_OBJECT_STORE_SECRET_KEY");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn missing_capability_keeps_reason() {
        let err: OpgateError =
            ProvisionError::MissingCapability("socket not found".to_owned()).into();
        assert!(matches!(
            err,
            OpgateError::MissingCapability { ref reason, .. } if reason == "socket not found"
        ));
    }

    #[test]
    fn setup_failure_becomes_provision_error() {
        let err: OpgateError = ProvisionError::Setup {
            service: "opgate-minio".to_owned(),
            reason: "mc exited with 1".to_owned(),
        }
        .into();
        match err {
            OpgateError::Provision(msg) => {
                assert!(msg.contains("opgate-minio"));
                assert!(msg.contains("mc exited with 1"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn runtime_error_display() {
        let err = ProvisionError::Runtime("pull failed".to_owned());
        assert_eq!(err.to_string(), "container runtime error: pull failed");
    }
}
