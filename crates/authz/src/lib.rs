#![doc = include_str!("../README.md")]

pub mod api;
pub mod error;
pub mod grant;
pub mod scope;

pub use api::{
    Applied, AuthorizationApi, FIELD_MANAGER, KubeAuthorizationApi, RBAC_GROUP, reapply_params,
};
pub use error::AuthzError;
pub use grant::{GrantGuard, GrantSpec};
pub use scope::{AuthorizationScope, ScopeOutcome, with_authorization};
