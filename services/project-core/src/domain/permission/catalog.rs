use super::{HttpMethod, ResourceDefinition, ResourceRegistryBuilder};

/// 项目管理核心的资源码
///
/// 系统管理类资源挂在 `system` 之下，`user` 本身是保留码，不可注册。
pub fn register_core_resources(builder: ResourceRegistryBuilder) -> ResourceRegistryBuilder {
    builder
        .register(ResourceDefinition::new("system", "系统"))
        .crud("system:department", "部门")
        .crud("system:role", "角色")
        .register(
            ResourceDefinition::new("system:role:dispatchResources", "角色授权")
                .with_methods([HttpMethod::Put, HttpMethod::Post]),
        )
        .crud("system:user", "用户")
        .register(
            ResourceDefinition::new("system:user:dispatchRoles", "用户角色分配")
                .with_methods([HttpMethod::Put, HttpMethod::Post]),
        )
        .crud("project", "项目")
        .crud("project:module", "项目模块")
        .register(
            ResourceDefinition::new("project:module:status", "模块状态变更")
                .with_methods([HttpMethod::Put]),
        )
        .crud("project:requirement", "项目需求")
        .register(
            ResourceDefinition::new("project:requirement:status", "需求状态变更")
                .with_methods([HttpMethod::Put]),
        )
        .crud("project:task", "项目任务")
        .crud("project:issue", "项目问题")
        .register(
            ResourceDefinition::new("project:issue:status", "问题状态变更")
                .with_methods([HttpMethod::Put]),
        )
}
