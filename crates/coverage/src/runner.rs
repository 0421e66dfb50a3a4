//! 패키지 테스트 실행기
//!
//! [`PackageTestRunner`]는 패키지 목록 조회와 패키지 단위 테스트 실행을
//! 추상화합니다. [`GoTestRunner`]는 `go list` / `go test`를 사용합니다.

use std::future::Future;
use std::path::Path;

use tracing::debug;

use opgate_core::process::{CommandRunner, CommandSpec};

use crate::error::CoverageError;
use crate::report::CoverMode;

/// 패키지 테스트 종료 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestStatus {
    /// 종료 코드 (시그널 종료면 `None`)
    pub code: Option<i32>,
}

impl TestStatus {
    pub fn passed() -> Self {
        Self { code: Some(0) }
    }

    pub fn failed(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 패키지 단위 테스트 실행 추상화
pub trait PackageTestRunner: Send + Sync {
    /// 패턴에 해당하는 패키지 목록을 반환합니다.
    fn list_packages(
        &self,
        pattern: &str,
    ) -> impl Future<Output = Result<Vec<String>, CoverageError>> + Send;

    /// 한 패키지의 테스트를 실행하고 프로파일을 `profile`에 씁니다.
    ///
    /// 테스트 실패는 `Ok(TestStatus)`로, 도구 부재 등 인프라 실패는 `Err`로
    /// 반환해야 합니다.
    fn run_package(
        &self,
        package: &str,
        profile: &Path,
        mode: CoverMode,
    ) -> impl Future<Output = Result<TestStatus, CoverageError>> + Send;
}

/// `go` 도구 기반 실행기
pub struct GoTestRunner {
    commands: CommandRunner,
    program: String,
    test_args: Vec<String>,
    env: Vec<(String, String)>,
}

impl GoTestRunner {
    pub fn new(commands: CommandRunner) -> Self {
        Self {
            commands,
            program: "go".to_owned(),
            test_args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// `go` 대신 사용할 실행 파일을 지정합니다.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// `go test`에 추가로 전달할 인자
    pub fn with_test_args(mut self, args: Vec<String>) -> Self {
        self.test_args = args;
        self
    }

    /// 테스트 프로세스에 전달할 환경변수를 추가합니다.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// `go test` 명령을 구성합니다.
    pub fn test_command(&self, package: &str, profile: &Path, mode: CoverMode) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.program)
            .arg("test")
            .arg(format!("-covermode={mode}"))
            .arg(format!("-coverprofile={}", profile.display()))
            .args(self.test_args.iter().cloned())
            .arg(package);
        for (key, value) in &self.env {
            spec = spec.env(key, value);
        }
        spec
    }
}

impl PackageTestRunner for GoTestRunner {
    async fn list_packages(&self, pattern: &str) -> Result<Vec<String>, CoverageError> {
        let spec = CommandSpec::new(&self.program)
            .args(["list", pattern])
            .capture_output();
        let output = self
            .commands
            .run(&spec)
            .await
            .map_err(CoverageError::from_command)?;
        if !output.success() {
            return Err(CoverageError::List {
                pattern: pattern.to_owned(),
                status: output.status,
            });
        }
        let packages = output.stdout_lines();
        debug!(pattern, count = packages.len(), "packages listed");
        Ok(packages)
    }

    async fn run_package(
        &self,
        package: &str,
        profile: &Path,
        mode: CoverMode,
    ) -> Result<TestStatus, CoverageError> {
        let spec = self.test_command(package, profile, mode);
        let output = self
            .commands
            .run(&spec)
            .await
            .map_err(CoverageError::from_command)?;
        Ok(TestStatus {
            code: output.status,
        })
    }
}
