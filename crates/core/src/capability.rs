//! 외부 도구 가용성 검사
//!
//! 도구 설치는 이 크레이트의 역할이 아닙니다 (`cargo run -p xtask -- install-tools` 참고).
//! 여기서는 실행 전에 도구가 있는지만 확인하고, 요구 수준에 따라
//! 세 가지 결과 중 하나를 반환합니다.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::OpgateError;

/// 도구가 얼마나 필요한지
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// 없으면 해당 단계가 실패해야 함
    Required,
    /// 없으면 경고 후 건너뜀
    Optional,
}

/// 가용성 검사 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// 사용 가능 (실행 파일 경로)
    Available(PathBuf),
    /// 없지만 선택 도구이므로 건너뜀
    Skip { tool: String },
    /// 없고 필수 도구이므로 실패
    Fatal { tool: String },
}

impl Capability {
    /// 결과를 에러로 변환합니다. `Skip`은 `Ok(None)`입니다.
    pub fn into_result(self) -> Result<Option<PathBuf>, OpgateError> {
        match self {
            Self::Available(path) => Ok(Some(path)),
            Self::Skip { .. } => Ok(None),
            Self::Fatal { tool } => Err(OpgateError::MissingCapability {
                capability: tool,
                reason: "not found in PATH".to_owned(),
            }),
        }
    }
}

/// 도구의 가용성을 확인합니다.
pub fn probe_tool(tool: &str, requirement: Requirement) -> Capability {
    match find_in_path(tool) {
        Some(path) => {
            debug!(tool, path = %path.display(), "tool available");
            Capability::Available(path)
        }
        None if requirement == Requirement::Optional => {
            warn!(tool, "optional tool not installed, skipping");
            Capability::Skip {
                tool: tool.to_owned(),
            }
        }
        None => Capability::Fatal {
            tool: tool.to_owned(),
        },
    }
}

/// `PATH`에서 실행 파일을 찾습니다.
///
/// 경로 구분자가 포함된 이름은 그 경로 자체를 확인합니다.
pub fn find_in_path(tool: &str) -> Option<PathBuf> {
    if tool.is_empty() {
        return None;
    }
    if tool.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(tool);
        return is_executable(&path).then_some(path);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING: &str = "opgate-definitely-not-installed";

    #[cfg(unix)]
    #[test]
    fn finds_shell_in_path() {
        assert!(find_in_path("sh").is_some());
        assert!(matches!(
            probe_tool("sh", Requirement::Required),
            Capability::Available(_)
        ));
    }

    #[test]
    fn missing_optional_tool_is_skipped() {
        let capability = probe_tool(MISSING, Requirement::Optional);
        assert_eq!(
            capability,
            Capability::Skip {
                tool: MISSING.to_owned()
            }
        );
        assert_eq!(capability.into_result().unwrap(), None);
    }

    #[test]
    fn missing_required_tool_is_fatal() {
        let capability = probe_tool(MISSING, Requirement::Required);
        let err = capability.into_result().unwrap_err();
        assert!(matches!(
            err,
            OpgateError::MissingCapability { ref capability, .. } if capability == MISSING
        ));
    }

    #[test]
    fn empty_name_is_never_found() {
        assert!(find_in_path("").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn explicit_path_must_be_executable() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        assert!(find_in_path(script.to_str().unwrap()).is_none());

        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(find_in_path(script.to_str().unwrap()), Some(script));
    }
}
