//! 커버리지 에러 타입

use opgate_core::error::OpgateError;

/// 커버리지 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    /// 테스트 도구가 없음: 집계 중단
    #[error("required tool '{tool}' is unavailable: {reason}")]
    MissingCapability {
        /// 도구 이름
        tool: String,
        /// 사유
        reason: String,
    },

    /// 패키지 목록 조회 실패
    #[error("listing packages for '{pattern}' failed with status {status:?}")]
    List {
        /// 조회 패턴
        pattern: String,
        /// 종료 코드
        status: Option<i32>,
    },

    /// 하나 이상의 패키지 테스트 실패
    #[error("tests failed in {} package(s): {}", .packages.len(), .packages.join(", "))]
    TestsFailed {
        /// 실패한 패키지 (사전순)
        packages: Vec<String>,
        /// 첫 번째 실패의 종료 코드
        status: Option<i32>,
    },

    /// 보고서 업로드 실패 (경고로만 기록)
    #[error("coverage upload failed: {0}")]
    Upload(String),

    /// 인터럽트로 중단
    #[error("interrupted by {signal}")]
    Interrupted {
        /// 시그널 이름
        signal: String,
    },

    /// 프로파일/보고서 파일 I/O 에러
    #[error("coverage i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoverageError {
    /// 명령 실행기 에러를 커버리지 에러로 변환합니다.
    pub fn from_command(err: OpgateError) -> Self {
        match err {
            OpgateError::MissingCapability { capability, reason } => Self::MissingCapability {
                tool: capability,
                reason,
            },
            OpgateError::Interrupted { signal } => Self::Interrupted { signal },
            OpgateError::Io(e) => Self::Io(e),
            other => Self::Io(std::io::Error::other(other.to_string())),
        }
    }
}

impl From<CoverageError> for OpgateError {
    fn from(err: CoverageError) -> Self {
        match err {
            CoverageError::MissingCapability { tool, reason } => OpgateError::MissingCapability {
                capability: tool,
                reason,
            },
            CoverageError::List { pattern, status } => OpgateError::Test {
                step: format!("go list {pattern}"),
                status,
            },
            CoverageError::TestsFailed { packages, status } => OpgateError::Test {
                step: format!("unit tests ({})", packages.join(", ")),
                status,
            },
            CoverageError::Interrupted { signal } => OpgateError::Interrupted { signal },
            CoverageError::Io(e) => OpgateError::Io(e),
            CoverageError::Upload(reason) => OpgateError::Io(std::io::Error::other(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tests_failed_keeps_first_status() {
        let err: OpgateError = CoverageError::TestsFailed {
            packages: vec!["./pkg/a".to_owned(), "./pkg/c".to_owned()],
            status: Some(2),
        }
        .into();
        match err {
            OpgateError::Test { step, status } => {
                assert_eq!(status, Some(2));
                assert!(step.contains("./pkg/a, ./pkg/c"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn command_errors_keep_their_class() {
        let missing = CoverageError::from_command(OpgateError::MissingCapability {
            capability: "go".to_owned(),
            reason: "command not found".to_owned(),
        });
        assert!(matches!(missing, CoverageError::MissingCapability { ref tool, .. } if tool == "go"));

        let interrupted = CoverageError::from_command(OpgateError::Interrupted {
            signal: "SIGINT".to_owned(),
        });
        assert!(matches!(
            OpgateError::from(interrupted),
            OpgateError::Interrupted { .. }
        ));
    }

    #[test]
    fn display_lists_failed_packages() {
        let err = CoverageError::TestsFailed {
            packages: vec!["a".to_owned(), "b".to_owned()],
            status: Some(1),
        };
        assert_eq!(err.to_string(), "tests failed in 2 package(s): a, b");
    }
}
