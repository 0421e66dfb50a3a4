//! 권한 부여 에러 타입
//!
//! 모든 변형은 `OpgateError::Setup`으로 변환됩니다. 권한 없이 e2e를
//! 진행하면 잘못된 성공 결과가 나올 수 있으므로 패스를 중단합니다.

use opgate_core::error::OpgateError;

/// 권한 부여 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// 클러스터 클라이언트 생성 실패
    #[error("failed to build cluster client: {0}")]
    Client(String),

    /// RBAC API 그룹 조회 실패
    #[error("failed to probe authorization api: {0}")]
    Probe(String),

    /// 개별 API 호출 실패
    #[error("{operation} failed: {reason}")]
    Api {
        /// 수행하려던 작업 (예: `create ClusterRole opgate-e2e-ns`)
        operation: String,
        /// 실패 사유
        reason: String,
    },

    /// 권한 생성 실패: 본문은 실행되지 않음
    #[error("authorization setup failed: {0}")]
    Setup(String),

    /// 권한 해제 실패 (본문이 완료된 경우에만 반환)
    #[error("failed to release authorization grant: {}", .0.join("; "))]
    Teardown(Vec<String>),
}

impl From<AuthzError> for OpgateError {
    fn from(err: AuthzError) -> Self {
        OpgateError::Setup(err.to_string())
    }
}
