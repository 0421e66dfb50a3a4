//! 누적 커버리지 보고서
//!
//! 보고서는 `mode: <mode>` 헤더 한 줄과 병합된 프로파일 줄로 구성됩니다.
//! 패키지별 프로파일은 각자 헤더를 갖고 있으므로 첫 줄을 버리고 병합합니다.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoverageError;

/// 커버리지 측정 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverMode {
    Set,
    #[default]
    Count,
    Atomic,
}

impl CoverMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Count => "count",
            Self::Atomic => "atomic",
        }
    }
}

impl fmt::Display for CoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoverMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "set" => Ok(Self::Set),
            "count" => Ok(Self::Count),
            "atomic" => Ok(Self::Atomic),
            other => Err(format!("unknown cover mode '{other}'")),
        }
    }
}

/// 누적 커버리지 보고서
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageReport {
    mode: CoverMode,
    lines: Vec<String>,
}

impl CoverageReport {
    /// 헤더만 있는 빈 보고서
    pub fn new(mode: CoverMode) -> Self {
        Self {
            mode,
            lines: Vec::new(),
        }
    }

    pub fn mode(&self) -> CoverMode {
        self.mode
    }

    /// 헤더 줄 (`mode: count`)
    pub fn header(&self) -> String {
        format!("mode: {}", self.mode)
    }

    /// 병합된 프로파일 줄 (헤더 제외)
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 병합된 줄 수
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 패키지 프로파일을 병합하고 추가된 줄 수를 반환합니다.
    ///
    /// 첫 줄(프로파일 헤더)은 버리고 빈 줄은 건너뜁니다.
    pub fn merge_profile(&mut self, profile: &str) -> usize {
        let before = self.lines.len();
        self.lines.extend(
            profile
                .lines()
                .skip(1)
                .filter(|line| !line.trim().is_empty())
                .map(str::to_owned),
        );
        self.lines.len() - before
    }

    /// 보고서 전체를 텍스트로 만듭니다. 항상 개행으로 끝납니다.
    pub fn render(&self) -> String {
        let mut out = self.header();
        out.push('\n');
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// 보고서를 파일에 씁니다. 기존 파일은 덮어씁니다.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<(), CoverageError> {
        tokio::fs::write(path.as_ref(), self.render()).await?;
        Ok(())
    }
}
