//! 权限领域
//!
//! 角色、数据权限范围、资源码注册表与授权数据仓储

mod catalog;
mod repository;
mod resource;
mod role;
mod scope;

pub use catalog::register_core_resources;
pub use repository::{GrantRepository, PermissionRepository};
pub use resource::{
    ANONYMOUS_CODE, AUTHENTICATED_CODE, AccessRequirement, HttpMethod, ResourceDefinition,
    ResourceRegistry, ResourceRegistryBuilder, code_grants,
};
pub use role::{Role, RoleId, RoleStatus, RoleType};
pub use scope::DataScope;
