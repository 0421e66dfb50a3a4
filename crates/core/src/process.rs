//! 외부 명령 실행: 인터럽트 가능한 프로세스 대기
//!
//! 포맷 검사기, 빌더, `go test` 등 외부 도구는 모두 [`CommandRunner`]를
//! 통해 실행합니다. 실행은 항상 순차적이며, 인터럽트가 발생하면 자식
//! 프로세스를 종료하고 [`OpgateError::Interrupted`]를 반환합니다.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::debug;

use crate::error::OpgateError;
use crate::signal::Interrupt;

/// 실행할 명령 명세
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
    capture: bool,
}

impl CommandSpec {
    /// 프로그램 이름으로 명세를 생성합니다.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            capture: false,
        }
    }

    /// `["prog", "arg", ...]` 형태의 설정 값에서 명세를 생성합니다.
    ///
    /// 빈 목록이면 `None`을 반환합니다.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone()).args(args.iter().cloned()))
    }

    /// 인자를 하나 추가합니다.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// 인자를 여러 개 추가합니다.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 환경변수를 추가합니다.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// 작업 디렉토리를 지정합니다 (기본: 러너의 작업 디렉토리).
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// 표준 출력/에러를 캡처합니다 (기본: 상속).
    pub fn capture_output(mut self) -> Self {
        self.capture = true;
        self
    }

    /// 프로그램 이름
    pub fn program(&self) -> &str {
        &self.program
    }

    /// 인자 목록
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// 추가 환경변수 목록
    pub fn envs(&self) -> &[(String, String)] {
        &self.env
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// 명령 실행 결과
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// 종료 코드 (시그널로 종료되면 `None`)
    pub status: Option<i32>,
    /// 캡처된 표준 출력 (캡처하지 않았으면 빈 문자열)
    pub stdout: String,
    /// 캡처된 표준 에러
    pub stderr: String,
}

impl CommandOutput {
    /// 종료 코드가 0인지 여부
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// 비어 있지 않은 표준 출력 줄
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// 외부 명령 실행기
///
/// 모든 명령은 `work_dir`에서 실행되며, 인터럽트 발생 시 자식 프로세스는
/// `kill_on_drop`으로 종료됩니다.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    work_dir: PathBuf,
    interrupt: Interrupt,
}

impl CommandRunner {
    /// 새 실행기를 생성합니다.
    pub fn new(work_dir: impl Into<PathBuf>, interrupt: Interrupt) -> Self {
        Self {
            work_dir: work_dir.into(),
            interrupt,
        }
    }

    /// 기본 작업 디렉토리
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// 공유 인터럽트 핸들
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// 명령을 실행하고 종료될 때까지 기다립니다.
    ///
    /// 0이 아닌 종료 코드는 에러가 아니라 [`CommandOutput::status`]로
    /// 전달됩니다. 실패 등급은 호출자가 결정합니다.
    ///
    /// # Errors
    ///
    /// - 프로그램을 찾을 수 없으면 [`OpgateError::MissingCapability`]
    /// - 작업 디렉토리가 없으면 디렉토리를 명시한 [`OpgateError::Io`]
    /// - 인터럽트가 발생하면 [`OpgateError::Interrupted`]
    /// - 그 외 spawn/대기 실패는 [`OpgateError::Io`]
    pub async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, OpgateError> {
        if self.interrupt.is_triggered() {
            return Err(self.interrupt.error());
        }

        let dir = spec.current_dir.as_deref().unwrap_or(&self.work_dir);
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if spec.capture {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        debug!(command = %spec, dir = %dir.display(), "spawning command");
        let child = match cmd.spawn() {
            Ok(child) => child,
            // a missing working directory also surfaces as NotFound
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let dir_exists = tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir());
                if !dir_exists {
                    return Err(OpgateError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("working directory '{}' does not exist", dir.display()),
                    )));
                }
                return Err(OpgateError::MissingCapability {
                    capability: spec.program.clone(),
                    reason: format!("command not found: {e}"),
                });
            }
            Err(e) => return Err(OpgateError::Io(e)),
        };

        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = self.interrupt.triggered() => {
                debug!(command = %spec, "command interrupted, child killed");
                return Err(self.interrupt.error());
            }
        };

        let result = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = %spec, status = ?result.status, "command finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> CommandRunner {
        CommandRunner::new(".", Interrupt::new())
    }

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("go").args(["vet", "./pkg/..."]);
        assert_eq!(spec.to_string(), "go vet ./pkg/...");
    }

    #[test]
    fn from_argv_splits_program() {
        let argv = vec!["hack/build".to_owned(), "--push".to_owned()];
        let spec = CommandSpec::from_argv(&argv).unwrap();
        assert_eq!(spec.program(), "hack/build");
        assert_eq!(spec.arguments(), ["--push"]);
        assert!(CommandSpec::from_argv(&[]).is_none());
    }

    #[test]
    fn stdout_lines_skip_blank_lines() {
        let output = CommandOutput {
            status: Some(0),
            stdout: "a.go\n\n  b.go  \n".to_owned(),
            stderr: String::new(),
        };
        assert_eq!(output.stdout_lines(), vec!["a.go", "b.go"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_status() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo hello; exit 3"])
            .capture_output();
        let output = runner().run(&spec).await.unwrap();
        assert_eq!(output.status, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passes_environment() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf %s \"$OPGATE_TEST_VALUE\""])
            .env("OPGATE_TEST_VALUE", "42")
            .capture_output();
        let output = runner().run(&spec).await.unwrap();
        assert_eq!(output.stdout, "42");
    }

    #[tokio::test]
    async fn missing_program_is_missing_capability() {
        let spec = CommandSpec::new("opgate-definitely-not-installed");
        let err = runner().run(&spec).await.unwrap_err();
        assert!(matches!(err, OpgateError::MissingCapability { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_work_dir_is_not_reported_as_missing_tool() {
        let runner = CommandRunner::new("/nonexistent/opgate-work-dir", Interrupt::new());
        let err = runner
            .run(&CommandSpec::new("sh").args(["-c", "true"]))
            .await
            .unwrap_err();
        match err {
            OpgateError::Io(e) => {
                assert!(e.to_string().contains("/nonexistent/opgate-work-dir"), "got {e}");
            }
            other => panic!("expected io error naming the directory, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn interrupt_kills_running_command() {
        let interrupt = Interrupt::new();
        let runner = CommandRunner::new(".", interrupt.clone());
        let spec = CommandSpec::new("sleep").arg("30");

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            interrupt.trigger("SIGINT");
        });

        let err = runner.run(&spec).await.unwrap_err();
        trigger.await.unwrap();
        assert!(matches!(err, OpgateError::Interrupted { .. }));
    }

    #[tokio::test]
    async fn already_interrupted_runner_does_not_spawn() {
        let interrupt = Interrupt::new();
        interrupt.trigger("SIGTERM");
        let runner = CommandRunner::new(".", interrupt);
        let err = runner
            .run(&CommandSpec::new("opgate-definitely-not-installed"))
            .await
            .unwrap_err();
        assert!(matches!(err, OpgateError::Interrupted { .. }));
    }
}
