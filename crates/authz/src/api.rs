//! Kubernetes authorization API abstraction.
//!
//! [`AuthorizationApi`] covers the handful of calls the scope needs: the RBAC
//! discovery probe and create/delete for the role and binding. Production code
//! uses [`KubeAuthorizationApi`]; tests provide their own implementation.

use std::future::Future;
use std::path::Path;

use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::error::AuthzError;
use crate::grant::GrantSpec;

/// API group whose presence means the cluster enforces RBAC.
pub const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

/// Field manager name for server-side apply.
pub const FIELD_MANAGER: &str = "opgate";

/// Result of a create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The object was created by this call
    Created,
    /// The object already existed (HTTP 409); it was re-applied with the
    /// current rules and is now owned by this run
    Adopted,
}

/// Apply parameters used when a leftover object is taken over.
///
/// Forced so that fields owned by another manager are overwritten too.
pub fn reapply_params() -> PatchParams {
    PatchParams::apply(FIELD_MANAGER).force()
}

/// Operations the authorization scope performs against a cluster.
pub trait AuthorizationApi: Send + Sync {
    /// Whether the cluster serves the RBAC API group.
    fn authorization_enabled(&self) -> impl Future<Output = Result<bool, AuthzError>> + Send;

    /// Creates the grant's `ClusterRole`.
    fn create_role(
        &self,
        grant: &GrantSpec,
    ) -> impl Future<Output = Result<Applied, AuthzError>> + Send;

    /// Creates the grant's `ClusterRoleBinding`.
    fn create_binding(
        &self,
        grant: &GrantSpec,
    ) -> impl Future<Output = Result<Applied, AuthzError>> + Send;

    /// Deletes a `ClusterRoleBinding`. A missing object is not an error.
    fn delete_binding(&self, name: &str) -> impl Future<Output = Result<(), AuthzError>> + Send;

    /// Deletes a `ClusterRole`. A missing object is not an error.
    fn delete_role(&self, name: &str) -> impl Future<Output = Result<(), AuthzError>> + Send;
}

/// [`AuthorizationApi`] backed by a `kube` client.
#[derive(Clone)]
pub struct KubeAuthorizationApi {
    client: Client,
}

impl KubeAuthorizationApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from a kubeconfig file and an optional context.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::Client` if the file cannot be read or the
    /// resulting configuration is unusable.
    pub async fn connect(kubeconfig: &Path, context: Option<&str>) -> Result<Self, AuthzError> {
        let kubeconfig_file = Kubeconfig::read_from(kubeconfig).map_err(|e| {
            AuthzError::Client(format!(
                "failed to read kubeconfig {}: {e}",
                kubeconfig.display()
            ))
        })?;
        let options = KubeConfigOptions {
            context: context.map(str::to_owned),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig_file, &options)
            .await
            .map_err(|e| AuthzError::Client(format!("failed to load kubeconfig: {e}")))?;
        let client = Client::try_from(config)
            .map_err(|e| AuthzError::Client(format!("failed to create client: {e}")))?;
        Ok(Self::new(client))
    }
}

fn api_error(operation: String, err: &kube::Error) -> AuthzError {
    AuthzError::Api {
        operation,
        reason: err.to_string(),
    }
}

impl AuthorizationApi for KubeAuthorizationApi {
    async fn authorization_enabled(&self) -> Result<bool, AuthzError> {
        let groups = self
            .client
            .list_api_groups()
            .await
            .map_err(|e| AuthzError::Probe(e.to_string()))?;
        Ok(groups.groups.iter().any(|g| g.name == RBAC_GROUP))
    }

    async fn create_role(&self, grant: &GrantSpec) -> Result<Applied, AuthzError> {
        let api: Api<ClusterRole> = Api::all(self.client.clone());
        match api.create(&PostParams::default(), &grant.cluster_role()).await {
            Ok(_) => Ok(Applied::Created),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!(role = %grant.role_name, "cluster role already exists, re-applying");
                api.patch(
                    &grant.role_name,
                    &reapply_params(),
                    &Patch::Apply(&grant.cluster_role()),
                )
                .await
                .map_err(|e| api_error(format!("re-apply ClusterRole {}", grant.role_name), &e))?;
                Ok(Applied::Adopted)
            }
            Err(e) => Err(api_error(
                format!("create ClusterRole {}", grant.role_name),
                &e,
            )),
        }
    }

    async fn create_binding(&self, grant: &GrantSpec) -> Result<Applied, AuthzError> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        match api
            .create(&PostParams::default(), &grant.cluster_role_binding())
            .await
        {
            Ok(_) => Ok(Applied::Created),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!(binding = %grant.binding_name, "cluster role binding already exists, re-applying");
                api.patch(
                    &grant.binding_name,
                    &reapply_params(),
                    &Patch::Apply(&grant.cluster_role_binding()),
                )
                .await
                .map_err(|e| {
                    api_error(format!("re-apply ClusterRoleBinding {}", grant.binding_name), &e)
                })?;
                Ok(Applied::Adopted)
            }
            Err(e) => Err(api_error(
                format!("create ClusterRoleBinding {}", grant.binding_name),
                &e,
            )),
        }
    }

    async fn delete_binding(&self, name: &str) -> Result<(), AuthzError> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(api_error(format!("delete ClusterRoleBinding {name}"), &e)),
        }
    }

    async fn delete_role(&self, name: &str) -> Result<(), AuthzError> {
        let api: Api<ClusterRole> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(api_error(format!("delete ClusterRole {name}"), &e)),
        }
    }
}
