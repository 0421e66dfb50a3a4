//! 실행 단위 서비스 레지스트리
//!
//! 한 번의 실행 동안 이미 준비된 서비스를 기억합니다. 패스가 여러 번
//! 같은 서비스를 요청해도 런타임을 다시 조회하지 않습니다.

use std::collections::BTreeMap;

use serde::Serialize;

/// 서비스 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    /// 실행 중
    Running,
    /// 실행 중이 아님
    Absent,
}

/// 준비된 서비스에 대한 핸들
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHandle {
    /// 서비스 식별 레이블 (이미지 참조)
    pub label: String,
    /// 컨테이너 이름
    pub name: String,
    /// 호스트 엔드포인트 (`127.0.0.1:port`)
    pub endpoint: String,
    /// 컨테이너 ID
    pub container_id: String,
    /// 현재 상태
    pub state: ServiceState,
    /// 이번 실행에서 새로 기동했는지 여부
    pub started_here: bool,
}

impl ServiceHandle {
    pub fn is_running(&self) -> bool {
        self.state == ServiceState::Running
    }
}

/// 레이블별 서비스 핸들 저장소
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, ServiceHandle>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 레이블로 핸들을 조회합니다.
    pub fn get(&self, label: &str) -> Option<&ServiceHandle> {
        self.services.get(label)
    }

    /// 실행 중으로 기록된 핸들만 반환합니다.
    pub fn running(&self, label: &str) -> Option<&ServiceHandle> {
        self.get(label).filter(|h| h.is_running())
    }

    /// 핸들을 기록합니다. 같은 레이블의 이전 기록은 대체됩니다.
    pub fn record(&mut self, handle: ServiceHandle) {
        self.services.insert(handle.label.clone(), handle);
    }

    /// 서비스를 실행 중이 아닌 것으로 표시합니다.
    pub fn mark_absent(&mut self, label: &str) {
        if let Some(handle) = self.services.get_mut(label) {
            handle.state = ServiceState::Absent;
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// 레이블 순으로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceHandle> {
        self.services.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(label: &str) -> ServiceHandle {
        ServiceHandle {
            label: label.to_owned(),
            name: "opgate-minio".to_owned(),
            endpoint: "127.0.0.1:9000".to_owned(),
            container_id: "abc".to_owned(),
            state: ServiceState::Running,
            started_here: true,
        }
    }

    #[test]
    fn empty_registry_has_nothing_running() {
        let registry = ServiceRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.running("minio/minio:latest").is_none());
    }

    #[test]
    fn record_and_lookup() {
        let mut registry = ServiceRegistry::new();
        registry.record(handle("minio/minio:latest"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.running("minio/minio:latest").unwrap().endpoint,
            "127.0.0.1:9000"
        );
    }

    #[test]
    fn absent_service_is_not_running() {
        let mut registry = ServiceRegistry::new();
        registry.record(handle("minio/minio:latest"));
        registry.mark_absent("minio/minio:latest");
        assert!(registry.get("minio/minio:latest").is_some());
        assert!(registry.running("minio/minio:latest").is_none());
    }

    #[test]
    fn record_replaces_previous_handle() {
        let mut registry = ServiceRegistry::new();
        registry.record(handle("x"));
        let mut newer = handle("x");
        newer.container_id = "def".to_owned();
        registry.record(newer);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("x").unwrap().container_id, "def");
    }

    #[test]
    fn handle_serializes_state_lowercase() {
        let json = serde_json::to_string(&handle("x")).unwrap();
        assert!(json.contains(r#""state":"running""#));
    }
}
