//! 설정 관리: opgate.toml 파싱 및 런타임 설정
//!
//! [`OpgateConfig`]는 모든 패스의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`OPGATE_OPERATOR_IMAGE=quay.io/example/operator:dev` 형식)
//! 3. 설정 파일 (`opgate.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! 필수 값은 로딩 시점이 아니라 각 패스가 실행되기 직전에
//! `require_*` 메서드로 검사합니다. 단위 테스트 패스만 실행할 때
//! 클러스터 설정을 요구하지 않기 위함입니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), opgate_core::error::OpgateError> {
//! use opgate_core::config::OpgateConfig;
//!
//! let config = OpgateConfig::load("opgate.toml").await?;
//! config.require_object_store()?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, OpgateError};
use crate::pass::PassSelection;

/// 선택 목록이 없을 때 실행하는 기본 패스 순서
pub const DEFAULT_PASSES: [&str; 5] = ["format-verify", "build", "e2e-fast", "e2e-slow", "unit"];

/// 환경변수 접두사
pub const ENV_PREFIX: &str = "OPGATE";

/// Opgate 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpgateConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 오퍼레이터 이미지 설정
    #[serde(default)]
    pub operator: OperatorConfig,
    /// 대상 클러스터 설정
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// 오브젝트 스토리지 에뮬레이터 설정
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    /// e2e 패스 설정
    #[serde(default)]
    pub e2e: E2eConfig,
    /// 단위 테스트 / 커버리지 설정
    #[serde(default)]
    pub unit: UnitConfig,
    /// 검증 패스 설정
    #[serde(default)]
    pub verify: VerifyConfig,
    /// 빌드 패스 설정
    #[serde(default)]
    pub build: BuildConfig,
}

impl OpgateConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, OpgateError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에서 시작하여 로드합니다.
    ///
    /// 사용자가 `--config`를 명시하지 않은 경우에 사용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, OpgateError> {
        let path = path.as_ref();
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(OpgateError::Config(ConfigError::FileNotFound { .. })) => {
                tracing::debug!(path = %path.display(), "config file absent, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, OpgateError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OpgateError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                OpgateError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, OpgateError> {
        toml::from_str(toml_str).map_err(|e| {
            OpgateError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `OPGATE_{SECTION}_{FIELD}`
    /// 예: `OPGATE_CLUSTER_NAMESPACE=e2e`
    ///
    /// 추가 단축 규칙:
    /// - `OPGATE_PASSES`는 `OPGATE_GENERAL_PASSES`와 같습니다.
    /// - `cluster.kubeconfig`가 비어 있으면 `KUBECONFIG`를 사용합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "OPGATE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "OPGATE_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.work_dir, "OPGATE_GENERAL_WORK_DIR");
        override_csv(&mut self.general.passes, "OPGATE_GENERAL_PASSES");
        override_csv(&mut self.general.passes, "OPGATE_PASSES");

        // Operator
        override_string(&mut self.operator.image, "OPGATE_OPERATOR_IMAGE");
        override_string(&mut self.operator.upgrade_from, "OPGATE_OPERATOR_UPGRADE_FROM");
        override_string(&mut self.operator.upgrade_to, "OPGATE_OPERATOR_UPGRADE_TO");

        // Cluster
        override_string(&mut self.cluster.kubeconfig, "OPGATE_CLUSTER_KUBECONFIG");
        if self.cluster.kubeconfig.is_empty() {
            override_string(&mut self.cluster.kubeconfig, "KUBECONFIG");
        }
        override_string(&mut self.cluster.context, "OPGATE_CLUSTER_CONTEXT");
        override_string(&mut self.cluster.namespace, "OPGATE_CLUSTER_NAMESPACE");

        // Object store
        override_string(
            &mut self.object_store.access_key,
            "OPGATE_OBJECT_STORE_ACCESS_KEY",
        );
        override_string(
            &mut self.object_store.secret_key,
            "OPGATE_OBJECT_STORE_SECRET_KEY",
        );
        override_string(&mut self.object_store.bucket, "OPGATE_OBJECT_STORE_BUCKET");
        override_string(&mut self.object_store.image, "OPGATE_OBJECT_STORE_IMAGE");
        override_string(
            &mut self.object_store.client_image,
            "OPGATE_OBJECT_STORE_CLIENT_IMAGE",
        );
        override_string(
            &mut self.object_store.container_name,
            "OPGATE_OBJECT_STORE_CONTAINER_NAME",
        );
        override_u16(&mut self.object_store.port, "OPGATE_OBJECT_STORE_PORT");
        override_u64(
            &mut self.object_store.settle_secs,
            "OPGATE_OBJECT_STORE_SETTLE_SECS",
        );

        // E2E
        override_string(&mut self.e2e.bucket, "OPGATE_E2E_BUCKET");
        override_string(&mut self.e2e.timeout, "OPGATE_E2E_TIMEOUT");
        override_string(&mut self.e2e.run_filter, "OPGATE_E2E_RUN_FILTER");

        // Unit
        override_string(&mut self.unit.package_pattern, "OPGATE_UNIT_PACKAGE_PATTERN");
        override_string(&mut self.unit.cover_mode, "OPGATE_UNIT_COVER_MODE");
        override_string(&mut self.unit.coverage_file, "OPGATE_UNIT_COVERAGE_FILE");
        override_csv(&mut self.unit.upload_command, "OPGATE_UNIT_UPLOAD_COMMAND");

        // Verify
        override_csv(&mut self.verify.optional_tools, "OPGATE_VERIFY_OPTIONAL_TOOLS");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 필수 값의 존재 여부는 검사하지 않습니다 (`require_*` 참고).
    pub fn validate(&self) -> Result<(), OpgateError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        let valid_modes = ["set", "count", "atomic"];
        if !valid_modes.contains(&self.unit.cover_mode.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "unit.cover_mode".to_owned(),
                reason: format!("must be one of: {}", valid_modes.join(", ")),
            }
            .into());
        }

        if self.object_store.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "object_store.port".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.object_store.settle_secs > MAX_SETTLE_SECS {
            return Err(ConfigError::InvalidValue {
                field: "object_store.settle_secs".to_owned(),
                reason: format!("must be 0-{MAX_SETTLE_SECS}"),
            }
            .into());
        }

        if self.verify.license_header_lines == 0 {
            return Err(ConfigError::InvalidValue {
                field: "verify.license_header_lines".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.unit.coverage_file == self.unit.profile_file {
            return Err(ConfigError::InvalidValue {
                field: "unit.profile_file".to_owned(),
                reason: "must differ from unit.coverage_file".to_owned(),
            }
            .into());
        }

        Ok(())
    }

    /// 실행할 패스 선택 목록을 반환합니다.
    pub fn selection(&self) -> PassSelection {
        if self.general.passes.is_empty() {
            PassSelection::default()
        } else {
            PassSelection::new(self.general.passes.clone())
        }
    }

    /// 단위 테스트 패스가 요구하는 오브젝트 스토리지 자격 증명을 검사합니다.
    pub fn require_object_store(&self) -> Result<(), ConfigError> {
        require("object_store", "access_key", &self.object_store.access_key)?;
        require("object_store", "secret_key", &self.object_store.secret_key)?;
        require("object_store", "bucket", &self.object_store.bucket)
    }

    /// 빌드/e2e 패스가 요구하는 오퍼레이터 이미지를 검사합니다.
    pub fn require_operator_image(&self) -> Result<(), ConfigError> {
        require("operator", "image", &self.operator.image)
    }

    /// e2e 패스가 요구하는 클러스터/버킷 설정을 검사합니다.
    pub fn require_e2e(&self) -> Result<(), ConfigError> {
        require("e2e", "bucket", &self.e2e.bucket)?;
        require("cluster", "kubeconfig", &self.cluster.kubeconfig)?;
        require("cluster", "namespace", &self.cluster.namespace)?;
        self.require_operator_image()
    }

    /// 업그레이드 테스트가 요구하는 from/to 이미지를 검사합니다.
    pub fn require_upgrade_images(&self) -> Result<(), ConfigError> {
        require("operator", "upgrade_from", &self.operator.upgrade_from)?;
        require("operator", "upgrade_to", &self.operator.upgrade_to)
    }
}

/// settle 대기 상한 (초)
const MAX_SETTLE_SECS: u64 = 60;

fn require(section: &str, field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingValue {
            field: format!("{section}.{field}"),
            env: env_key(section, field),
        });
    }
    Ok(())
}

/// 설정 필드에 대응하는 환경변수 이름을 만듭니다.
pub fn env_key(section: &str, field: &str) -> String {
    format!(
        "{ENV_PREFIX}_{}_{}",
        section.to_uppercase(),
        field.to_uppercase()
    )
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 대상 저장소 루트 (외부 명령의 작업 디렉토리)
    pub work_dir: String,
    /// 실행할 패스 목록 (비어 있으면 [`DEFAULT_PASSES`])
    pub passes: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            work_dir: ".".to_owned(),
            passes: Vec::new(),
        }
    }
}

/// 오퍼레이터 이미지 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// 빌드 및 e2e 대상 이미지
    pub image: String,
    /// 업그레이드 테스트 시작 이미지
    pub upgrade_from: String,
    /// 업그레이드 테스트 목표 이미지
    pub upgrade_to: String,
}

/// 대상 클러스터 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// kubeconfig 경로
    pub kubeconfig: String,
    /// kubeconfig 컨텍스트 (비어 있으면 current-context)
    pub context: String,
    /// 테스트 네임스페이스
    pub namespace: String,
}

/// 오브젝트 스토리지 에뮬레이터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    /// 액세스 키
    pub access_key: String,
    /// 시크릿 키
    pub secret_key: String,
    /// 최초 기동 시 생성할 기본 버킷
    pub bucket: String,
    /// 에뮬레이터 이미지
    pub image: String,
    /// 버킷 생성에 사용하는 클라이언트 이미지
    pub client_image: String,
    /// 컨테이너 이름
    pub container_name: String,
    /// 호스트에 노출할 포트
    pub port: u16,
    /// 기동 후 대기 시간 (초)
    pub settle_secs: u64,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            bucket: "opgate-test".to_owned(),
            image: "minio/minio:latest".to_owned(),
            client_image: "minio/mc:latest".to_owned(),
            container_name: "opgate-minio".to_owned(),
            port: 9000,
            settle_secs: 5,
        }
    }
}

/// e2e 패스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct E2eConfig {
    /// 백업 테스트 대상 버킷
    pub bucket: String,
    /// 빠른 e2e 테스트 패키지
    pub fast_package: String,
    /// 느린 e2e 테스트 패키지
    pub slow_package: String,
    /// 업그레이드 테스트 패키지
    pub upgrade_package: String,
    /// `go test -timeout` 값
    pub timeout: String,
    /// `go test -run` 필터 (비어 있으면 전체)
    pub run_filter: String,
    /// 레이스 디텍터 사용 여부
    pub race: bool,
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            fast_package: "./test/e2e/".to_owned(),
            slow_package: "./test/e2e/e2eslow".to_owned(),
            upgrade_package: "./test/e2e/upgradetest/".to_owned(),
            timeout: "30m".to_owned(),
            run_filter: String::new(),
            race: true,
        }
    }
}

/// 단위 테스트 / 커버리지 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// `go list`에 전달할 패키지 패턴
    pub package_pattern: String,
    /// 커버리지 모드 (set, count, atomic)
    pub cover_mode: String,
    /// 누적 커버리지 리포트 파일
    pub coverage_file: String,
    /// 패키지별 임시 프로파일 파일
    pub profile_file: String,
    /// `go test`에 추가로 전달할 인자
    pub test_args: Vec<String>,
    /// 리포트 업로드 명령 (비어 있으면 업로드하지 않음)
    pub upload_command: Vec<String>,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            package_pattern: "./pkg/...".to_owned(),
            cover_mode: "count".to_owned(),
            coverage_file: "coverage.txt".to_owned(),
            profile_file: "profile.cov".to_owned(),
            test_args: Vec::new(),
            upload_command: Vec::new(),
        }
    }
}

/// 검증 패스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// gofmt 및 라이선스 검사 대상 디렉토리
    pub source_dirs: Vec<String>,
    /// go vet 및 선택 분석 도구 대상 패키지
    pub packages: Vec<String>,
    /// 설치되어 있을 때만 실행하는 분석 도구
    pub optional_tools: Vec<String>,
    /// 라이선스 마커를 찾을 파일 앞부분 줄 수
    pub license_header_lines: usize,
    /// 라이선스/생성 코드 마커
    pub license_markers: Vec<String>,
    /// 코드 생성 검증 명령 (비어 있으면 생략)
    pub codegen_command: Vec<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            source_dirs: vec!["cmd".to_owned(), "pkg".to_owned(), "test".to_owned()],
            packages: vec![
                "./cmd/...".to_owned(),
                "./pkg/...".to_owned(),
                "./test/...".to_owned(),
            ],
            optional_tools: vec!["gosimple".to_owned(), "unused".to_owned()],
            license_header_lines: 3,
            license_markers: vec![
                "Copyright".to_owned(),
                "generated".to_owned(),
                "GENERATED".to_owned(),
            ],
            codegen_command: vec!["hack/k8s/codegen/verify-generated.sh".to_owned()],
        }
    }
}

/// 빌드 패스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// 오퍼레이터 이미지 빌드 명령
    pub operator_command: Vec<String>,
    /// 백업 컴포넌트 빌드 명령
    pub backup_command: Vec<String>,
    /// 복원 컴포넌트 빌드 명령
    pub restore_command: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            operator_command: vec!["hack/build/operator/build".to_owned()],
            backup_command: vec!["hack/build/backup-operator/build".to_owned()],
            restore_command: vec!["hack/build/restore-operator/build".to_owned()],
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
