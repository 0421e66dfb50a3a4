//! 권한 부여 명세와 해제 가드
//!
//! [`GrantSpec`]은 생성할 `ClusterRole`/`ClusterRoleBinding`을 기술하고,
//! [`GrantGuard`]는 생성에 성공한 객체를 기억했다가 정확히 한 번 삭제합니다.

use std::collections::BTreeMap;

use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{error, info};

use crate::api::AuthorizationApi;
use crate::error::AuthzError;

/// 이 크레이트가 만든 객체에 붙는 레이블
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// 실행 ID 레이블
pub const RUN_ID_LABEL: &str = "opgate.io/run-id";

/// 바인딩 대상 서비스 어카운트
const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// 생성할 권한 명세
#[derive(Debug, Clone, PartialEq)]
pub struct GrantSpec {
    /// `ClusterRole` 이름
    pub role_name: String,
    /// `ClusterRoleBinding` 이름
    pub binding_name: String,
    /// 테스트 네임스페이스
    pub namespace: String,
    /// 바인딩할 서비스 어카운트
    pub service_account: String,
    /// 실행 ID (레이블로만 사용)
    pub run_id: String,
    /// 부여할 규칙
    pub rules: Vec<PolicyRule>,
}

impl GrantSpec {
    /// 네임스페이스용 기본 권한 명세를 생성합니다.
    ///
    /// 객체 이름은 네임스페이스에서 결정되므로 중단된 이전 실행의 잔여물과
    /// 이름이 같고, 생성 시 409로 채택됩니다.
    pub fn for_namespace(namespace: &str, run_id: &str) -> Self {
        let name = format!("opgate-e2e-{namespace}");
        Self {
            role_name: name.clone(),
            binding_name: name,
            namespace: namespace.to_owned(),
            service_account: DEFAULT_SERVICE_ACCOUNT.to_owned(),
            run_id: run_id.to_owned(),
            rules: operator_test_rules(),
        }
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (MANAGED_BY_LABEL.to_owned(), "opgate".to_owned()),
            (RUN_ID_LABEL.to_owned(), self.run_id.clone()),
        ])
    }

    pub fn cluster_role(&self) -> ClusterRole {
        ClusterRole {
            metadata: ObjectMeta {
                name: Some(self.role_name.clone()),
                labels: Some(self.labels()),
                ..Default::default()
            },
            rules: Some(self.rules.clone()),
            ..Default::default()
        }
    }

    pub fn cluster_role_binding(&self) -> ClusterRoleBinding {
        ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some(self.binding_name.clone()),
                labels: Some(self.labels()),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_owned(),
                kind: "ClusterRole".to_owned(),
                name: self.role_name.clone(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_owned(),
                name: self.service_account.clone(),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            }]),
        }
    }
}

fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    let owned = |items: &[&str]| items.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>();
    PolicyRule {
        api_groups: Some(owned(api_groups)),
        resources: Some(owned(resources)),
        verbs: owned(verbs),
        ..Default::default()
    }
}

/// 오퍼레이터 e2e 실행에 필요한 최소 규칙
pub fn operator_test_rules() -> Vec<PolicyRule> {
    vec![
        rule(
            &["etcd.database.coreos.com"],
            &["etcdclusters", "etcdbackups", "etcdrestores"],
            &["*"],
        ),
        rule(&["apiextensions.k8s.io"], &["customresourcedefinitions"], &["*"]),
        rule(&["storage.k8s.io"], &["storageclasses"], &["*"]),
        rule(
            &[""],
            &[
                "pods",
                "services",
                "endpoints",
                "persistentvolumeclaims",
                "events",
            ],
            &["*"],
        ),
        rule(&["apps"], &["deployments"], &["*"]),
        rule(&[""], &["secrets"], &["get"]),
    ]
}

/// 생성된 권한의 해제 가드
///
/// 역할이 생성된 직후 무장되며, [`release`](Self::release)가 바인딩과 역할을
/// 각각 정확히 한 번 삭제합니다. 해제 없이 drop되면 남은 객체 이름을 에러로
/// 기록합니다.
pub struct GrantGuard<'a, A: AuthorizationApi> {
    api: &'a A,
    role: Option<String>,
    binding: Option<String>,
}

impl<'a, A: AuthorizationApi> GrantGuard<'a, A> {
    /// 생성된 역할에 대해 가드를 무장합니다.
    pub fn armed(api: &'a A, role: impl Into<String>) -> Self {
        Self {
            api,
            role: Some(role.into()),
            binding: None,
        }
    }

    /// 생성된 바인딩을 해제 대상에 추가합니다.
    pub fn track_binding(&mut self, binding: impl Into<String>) {
        self.binding = Some(binding.into());
    }

    /// 아직 해제되지 않은 객체가 있는지 여부
    pub fn is_armed(&self) -> bool {
        self.role.is_some() || self.binding.is_some()
    }

    /// 바인딩, 역할 순으로 삭제합니다.
    ///
    /// 한쪽이 실패해도 다른 쪽 삭제는 시도합니다. 실패는 에러 로그로 남기고
    /// `AuthzError::Teardown`으로 모아 반환합니다.
    pub async fn release(mut self) -> Result<(), AuthzError> {
        let mut failures = Vec::new();

        if let Some(binding) = self.binding.take() {
            match self.api.delete_binding(&binding).await {
                Ok(()) => info!(binding = %binding, "cluster role binding deleted"),
                Err(e) => {
                    error!(binding = %binding, error = %e, "failed to delete cluster role binding");
                    failures.push(e.to_string());
                }
            }
        }

        if let Some(role) = self.role.take() {
            match self.api.delete_role(&role).await {
                Ok(()) => info!(role = %role, "cluster role deleted"),
                Err(e) => {
                    error!(role = %role, error = %e, "failed to delete cluster role");
                    failures.push(e.to_string());
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AuthzError::Teardown(failures))
        }
    }
}

impl<A: AuthorizationApi> Drop for GrantGuard<'_, A> {
    fn drop(&mut self) {
        if self.is_armed() {
            error!(
                role = self.role.as_deref().unwrap_or("-"),
                binding = self.binding.as_deref().unwrap_or("-"),
                "authorization grant dropped without release, objects left in cluster"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> GrantSpec {
        GrantSpec::for_namespace("e2e-test", "run-1")
    }

    #[test]
    fn names_derive_from_namespace() {
        let grant = spec();
        assert_eq!(grant.role_name, "opgate-e2e-e2e-test");
        assert_eq!(grant.binding_name, "opgate-e2e-e2e-test");
        assert_eq!(grant.service_account, "default");
    }

    #[test]
    fn binding_targets_default_service_account_in_namespace() {
        let binding = spec().cluster_role_binding();
        assert_eq!(binding.role_ref.kind, "ClusterRole");
        assert_eq!(binding.role_ref.name, "opgate-e2e-e2e-test");

        let subjects = binding.subjects.unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].kind, "ServiceAccount");
        assert_eq!(subjects[0].name, "default");
        assert_eq!(subjects[0].namespace.as_deref(), Some("e2e-test"));
    }

    #[test]
    fn objects_carry_run_id_label() {
        let role = spec().cluster_role();
        let labels = role.metadata.labels.unwrap();
        assert_eq!(labels.get(RUN_ID_LABEL).map(String::as_str), Some("run-1"));
        assert_eq!(
            labels.get(MANAGED_BY_LABEL).map(String::as_str),
            Some("opgate")
        );
    }

    #[test]
    fn rules_cover_operator_resources() {
        let rules = operator_test_rules();
        assert!(rules.iter().any(|r| {
            r.resources
                .as_ref()
                .is_some_and(|res| res.iter().any(|x| x == "etcdclusters"))
        }));
        // secrets are read-only
        let secrets = rules
            .iter()
            .find(|r| {
                r.resources
                    .as_ref()
                    .is_some_and(|res| res == &vec!["secrets".to_owned()])
            })
            .unwrap();
        assert_eq!(secrets.verbs, vec!["get"]);
    }
}
