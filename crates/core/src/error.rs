//! 에러 타입: 오케스트레이터 에러 분류
//!
//! [`OpgateError`]는 모든 패스가 반환하는 최상위 에러입니다.
//! 각 variant는 하나의 실패 등급에 대응하며, CLI는 이 등급을 기준으로
//! 종료 코드를 결정합니다.

/// Opgate 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum OpgateError {
    /// 필수 설정 누락 또는 잘못된 설정 (사전 검사, 재시도 없음)
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 필요한 외부 도구/런타임을 사용할 수 없음
    #[error("missing capability '{capability}': {reason}")]
    MissingCapability { capability: String, reason: String },

    /// 포맷/vet/라이선스 검사에서 부적합 항목 발견
    #[error("verification step '{step}' found {} issue(s)", findings.len())]
    Verification { step: String, findings: Vec<String> },

    /// 빌드 단계 실패
    #[error("build step '{step}' failed: {reason}")]
    Build { step: String, reason: String },

    /// 테스트 실패 (테스트 러너의 종료 코드 포함)
    #[error("tests failed in '{step}'{}", status.map(|s| format!(" (exit status {s})")).unwrap_or_default())]
    Test { step: String, status: Option<i32> },

    /// 의존 서비스 기동 실패
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// 권한 부여 준비 실패
    #[error("authorization setup failed: {0}")]
    Setup(String),

    /// 외부 시그널로 중단됨
    #[error("interrupted by {signal}")]
    Interrupted { signal: String },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 패스 실행에 필요한 값이 비어 있음
    #[error("required value '{field}' is not set (set {env})")]
    MissingValue { field: String, env: String },

    /// 등록되지 않은 패스 이름
    #[error("unknown pass '{name}' (known passes: {})", known.join(", "))]
    UnknownPass { name: String, known: Vec<String> },

    /// 동일한 이름의 패스가 이미 등록됨
    #[error("pass '{name}' is already registered")]
    DuplicatePass { name: String },

    /// 선택된 패스가 하나도 없음
    #[error("pass selection is empty")]
    EmptySelection,
}
