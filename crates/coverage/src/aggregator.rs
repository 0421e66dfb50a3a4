//! 커버리지 집계기
//!
//! 패키지를 사전순으로 하나씩 테스트하고 프로파일을 하나의 보고서로
//! 병합합니다. 테스트 실패는 모아서 보고하고 나머지 패키지를 계속 진행합니다.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CoverageError;
use crate::report::{CoverMode, CoverageReport};
use crate::runner::PackageTestRunner;

/// 실패한 패키지
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageFailure {
    /// 패키지 식별자
    pub package: String,
    /// 테스트 종료 코드
    pub status: Option<i32>,
}

/// 집계 결과
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    /// 병합된 보고서 (실패가 있어도 완전함)
    pub report: CoverageReport,
    /// 실패한 패키지 (실행 순서)
    pub failures: Vec<PackageFailure>,
    /// 실행한 패키지 (사전순, 중복 제거)
    pub packages: Vec<String>,
}

impl AggregateOutcome {
    /// 모든 패키지가 통과했는지 여부
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// 실패가 있으면 `CoverageError::TestsFailed`를 반환합니다.
    ///
    /// 종료 코드는 첫 번째 실패의 것을 사용합니다.
    pub fn ensure_passed(&self) -> Result<(), CoverageError> {
        match self.failures.first() {
            None => Ok(()),
            Some(first) => Err(CoverageError::TestsFailed {
                packages: self.failures.iter().map(|f| f.package.clone()).collect(),
                status: first.status,
            }),
        }
    }
}

/// 커버리지 집계기
pub struct CoverageAggregator<R: PackageTestRunner> {
    runner: R,
    mode: CoverMode,
    profile_path: PathBuf,
}

impl<R: PackageTestRunner> CoverageAggregator<R> {
    /// 새 집계기를 생성합니다.
    ///
    /// `profile_path`는 패키지별 임시 프로파일 경로로, 패키지마다 재사용됩니다.
    pub fn new(runner: R, mode: CoverMode, profile_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            mode,
            profile_path: profile_path.into(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn profile_path(&self) -> &Path {
        &self.profile_path
    }

    /// 패키지 목록을 실행하고 보고서를 병합합니다.
    ///
    /// # Errors
    ///
    /// 테스트 도구 부재, 인터럽트, 프로파일 I/O 실패 시 즉시 중단합니다.
    /// 테스트 실패는 에러가 아니라 [`AggregateOutcome::failures`]에 기록됩니다.
    pub async fn aggregate(&self, packages: &[String]) -> Result<AggregateOutcome, CoverageError> {
        let ordered: BTreeSet<&str> = packages
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();

        self.remove_profile().await?;

        let mut report = CoverageReport::new(self.mode);
        let mut failures = Vec::new();

        for package in &ordered {
            debug!(package, "running package tests");
            let status = self
                .runner
                .run_package(package, &self.profile_path, self.mode)
                .await?;

            if !status.success() {
                warn!(package, status = ?status.code, "package tests failed");
                failures.push(PackageFailure {
                    package: (*package).to_owned(),
                    status: status.code,
                });
            }

            let merged = self.merge_profile(&mut report).await?;
            debug!(package, lines = merged, "profile merged");
        }

        info!(
            packages = ordered.len(),
            failed = failures.len(),
            lines = report.len(),
            "coverage aggregation finished"
        );

        Ok(AggregateOutcome {
            report,
            failures,
            packages: ordered.into_iter().map(str::to_owned).collect(),
        })
    }

    /// 프로파일이 있으면 병합하고 즉시 삭제합니다. 없으면 0입니다.
    async fn merge_profile(&self, report: &mut CoverageReport) -> Result<usize, CoverageError> {
        let contents = match tokio::fs::read_to_string(&self.profile_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let merged = report.merge_profile(&contents);
        self.remove_profile().await?;
        Ok(merged)
    }

    async fn remove_profile(&self) -> Result<(), CoverageError> {
        match tokio::fs::remove_file(&self.profile_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::TestStatus;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 패키지별 (프로파일 본문, 종료 코드)를 돌려주는 실행기
    struct ScriptedRunner {
        profiles: HashMap<String, (Option<String>, i32)>,
        order: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(entries: &[(&str, Option<&str>, i32)]) -> Self {
            Self {
                profiles: entries
                    .iter()
                    .map(|(p, body, code)| ((*p).to_owned(), (body.map(str::to_owned), *code)))
                    .collect(),
                order: Mutex::new(Vec::new()),
            }
        }
    }

    impl PackageTestRunner for ScriptedRunner {
        async fn list_packages(&self, _pattern: &str) -> Result<Vec<String>, CoverageError> {
            Ok(self.profiles.keys().cloned().collect())
        }

        async fn run_package(
            &self,
            package: &str,
            profile: &Path,
            mode: CoverMode,
        ) -> Result<TestStatus, CoverageError> {
            self.order.lock().unwrap().push(package.to_owned());
            let (body, code) = self.profiles.get(package).cloned().unwrap_or((None, 0));
            if let Some(body) = body {
                tokio::fs::write(profile, format!("mode: {mode}\n{body}")).await?;
            }
            Ok(TestStatus { code: Some(code) })
        }
    }

    fn aggregator(runner: ScriptedRunner, dir: &Path) -> CoverageAggregator<ScriptedRunner> {
        CoverageAggregator::new(runner, CoverMode::Count, dir.join("profile.cov"))
    }

    #[tokio::test]
    async fn packages_run_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let agg = aggregator(ScriptedRunner::new(&[]), dir.path());
        let packages = vec![
            "./pkg/c".to_owned(),
            "./pkg/a".to_owned(),
            "./pkg/c".to_owned(),
            "  ".to_owned(),
            "./pkg/b".to_owned(),
        ];
        let outcome = agg.aggregate(&packages).await.unwrap();

        assert_eq!(outcome.packages, vec!["./pkg/a", "./pkg/b", "./pkg/c"]);
        assert_eq!(
            *agg.runner().order.lock().unwrap(),
            vec!["./pkg/a", "./pkg/b", "./pkg/c"]
        );
        assert!(outcome.passed());
    }

    #[tokio::test]
    async fn stale_profile_is_removed_first() {
        let dir = tempfile::tempdir().unwrap();
        let agg = aggregator(ScriptedRunner::new(&[("./pkg/a", None, 0)]), dir.path());
        tokio::fs::write(agg.profile_path(), "mode: count\nstale.go:1.1,1.2 1 1\n")
            .await
            .unwrap();

        let outcome = agg.aggregate(&["./pkg/a".to_owned()]).await.unwrap();
        assert!(outcome.report.is_empty());
        assert!(!agg.profile_path().exists());
    }

    #[tokio::test]
    async fn ensure_passed_reports_every_failure() {
        let dir = tempfile::tempdir().unwrap();
        let agg = aggregator(
            ScriptedRunner::new(&[
                ("./pkg/a", Some("a.go:1.1,1.2 1 1\n"), 2),
                ("./pkg/b", Some("b.go:1.1,1.2 1 1\n"), 0),
                ("./pkg/c", None, 1),
            ]),
            dir.path(),
        );
        let packages: Vec<String> = ["./pkg/a", "./pkg/b", "./pkg/c"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let outcome = agg.aggregate(&packages).await.unwrap();

        assert_eq!(outcome.report.len(), 2);
        match outcome.ensure_passed().unwrap_err() {
            CoverageError::TestsFailed { packages, status } => {
                assert_eq!(packages, vec!["./pkg/a", "./pkg/c"]);
                assert_eq!(status, Some(2));
            }
            other => panic!("unexpected: {other}"),
        }
    }
}
