//! 커버리지 보고서 업로드 (best-effort)

use std::future::Future;
use std::path::Path;

use tracing::{info, warn};

use opgate_core::process::{CommandRunner, CommandSpec};

use crate::error::CoverageError;

/// 보고서 업로드 대상
pub trait ReportUploader: Send + Sync {
    fn upload(&self, report: &Path) -> impl Future<Output = Result<(), CoverageError>> + Send;
}

/// 설정된 명령에 보고서 경로를 마지막 인자로 붙여 실행하는 업로더
pub struct CommandUploader {
    commands: CommandRunner,
    argv: Vec<String>,
}

impl CommandUploader {
    /// 명령이 비어 있으면 `None`입니다.
    pub fn from_argv(commands: CommandRunner, argv: &[String]) -> Option<Self> {
        if argv.iter().all(|a| a.trim().is_empty()) {
            return None;
        }
        Some(Self {
            commands,
            argv: argv.to_vec(),
        })
    }

    fn command(&self, report: &Path) -> Option<CommandSpec> {
        CommandSpec::from_argv(&self.argv).map(|spec| spec.arg(report.display().to_string()))
    }
}

impl ReportUploader for CommandUploader {
    async fn upload(&self, report: &Path) -> Result<(), CoverageError> {
        let spec = self
            .command(report)
            .ok_or_else(|| CoverageError::Upload("empty upload command".to_owned()))?;
        let output = self
            .commands
            .run(&spec)
            .await
            .map_err(|e| CoverageError::Upload(e.to_string()))?;
        if output.success() {
            Ok(())
        } else {
            Err(CoverageError::Upload(format!(
                "`{spec}` exited with status {:?}",
                output.status
            )))
        }
    }
}

/// 업로드를 시도하고 결과와 무관하게 실행을 계속합니다.
///
/// 업로더가 없으면 건너뜁니다. 성공 여부를 반환합니다.
pub async fn upload_best_effort<U: ReportUploader>(uploader: Option<&U>, report: &Path) -> bool {
    let Some(uploader) = uploader else {
        info!("no coverage upload command configured, skipping upload");
        return false;
    };
    match uploader.upload(report).await {
        Ok(()) => {
            info!(report = %report.display(), "coverage report uploaded");
            true
        }
        Err(e) => {
            warn!(error = %e, "coverage upload failed, continuing");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opgate_core::signal::Interrupt;

    fn commands() -> CommandRunner {
        CommandRunner::new(".", Interrupt::new())
    }

    #[test]
    fn empty_argv_means_no_uploader() {
        assert!(CommandUploader::from_argv(commands(), &[]).is_none());
        assert!(CommandUploader::from_argv(commands(), &[" ".to_owned()]).is_none());
    }

    #[test]
    fn report_path_is_last_argument() {
        let uploader =
            CommandUploader::from_argv(commands(), &["codecov".to_owned(), "-f".to_owned()])
                .unwrap();
        let spec = uploader.command(Path::new("coverage.txt")).unwrap();
        assert_eq!(spec.to_string(), "codecov -f coverage.txt");
    }

    #[tokio::test]
    async fn missing_uploader_tool_does_not_fail() {
        let uploader =
            CommandUploader::from_argv(commands(), &["opgate-no-such-uploader".to_owned()])
                .unwrap();
        assert!(!upload_best_effort(Some(&uploader), Path::new("coverage.txt")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_upload_is_swallowed() {
        let uploader =
            CommandUploader::from_argv(commands(), &["false".to_owned()]).unwrap();
        assert!(!upload_best_effort(Some(&uploader), Path::new("coverage.txt")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_upload() {
        let uploader = CommandUploader::from_argv(commands(), &["true".to_owned()]).unwrap();
        assert!(upload_best_effort(Some(&uploader), Path::new("coverage.txt")).await);
    }

    #[tokio::test]
    async fn no_uploader_skips() {
        assert!(!upload_best_effort::<CommandUploader>(None, Path::new("coverage.txt")).await);
    }
}
