//! 资源码注册表
//!
//! 资源码形如 `project`、`project:add`、`projectTask:member:list`，冒号分隔层级。
//! 授予父级资源码即覆盖其所有子级资源码。注册表在启动时由各功能模块一次性构建，
//! 之后只读。

use pm_common::normalize_code;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ProjectError;

/// 无需登录即可访问
pub const ANONYMOUS_CODE: &str = "anon";
/// 登录即可访问
pub const AUTHENTICATED_CODE: &str = "user";

const SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported http method {}", other)),
        }
    }
}

/// 请求所需的访问级别
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequirement {
    Anonymous,
    Authenticated,
    Resource(String),
}

impl AccessRequirement {
    pub fn parse(code: &str) -> Self {
        let code = normalize_code(code);
        match code.as_str() {
            "" | ANONYMOUS_CODE => Self::Anonymous,
            AUTHENTICATED_CODE => Self::Authenticated,
            _ => Self::Resource(code),
        }
    }
}

/// `granted` 是否覆盖 `requested`，两者须已归一化
pub fn code_grants(granted: &str, requested: &str) -> bool {
    if granted.is_empty() {
        return false;
    }
    match requested.strip_prefix(granted) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// 单个资源定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDefinition {
    pub code: String,
    pub name: String,
    pub methods: Vec<HttpMethod>,
}

impl ResourceDefinition {
    pub fn new(code: &str, name: impl Into<String>) -> Self {
        Self {
            code: normalize_code(code),
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_methods(mut self, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.methods.extend(methods);
        self.methods.sort();
        self.methods.dedup();
        self
    }

    pub fn parent_code(&self) -> Option<&str> {
        self.code.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
    }
}

/// 注册表构建器
#[derive(Debug, Default)]
pub struct ResourceRegistryBuilder {
    definitions: Vec<ResourceDefinition>,
}

impl ResourceRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, definition: ResourceDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// 注册一组标准的增删改查资源码：`base` 及 `base:add|delete|update|list|instance`
    pub fn crud(self, base: &str, name: &str) -> Self {
        self.register(ResourceDefinition::new(base, name).with_methods([HttpMethod::Get]))
            .register(
                ResourceDefinition::new(&format!("{}:add", base), format!("{}新增", name))
                    .with_methods([HttpMethod::Post]),
            )
            .register(
                ResourceDefinition::new(&format!("{}:delete", base), format!("{}删除", name))
                    .with_methods([HttpMethod::Delete, HttpMethod::Post]),
            )
            .register(
                ResourceDefinition::new(&format!("{}:update", base), format!("{}修改", name))
                    .with_methods([HttpMethod::Put, HttpMethod::Post]),
            )
            .register(
                ResourceDefinition::new(&format!("{}:list", base), format!("{}列表", name))
                    .with_methods([HttpMethod::Get]),
            )
            .register(
                ResourceDefinition::new(&format!("{}:instance", base), format!("{}详情", name))
                    .with_methods([HttpMethod::Get]),
            )
    }

    pub fn build(self) -> Result<ResourceRegistry, ProjectError> {
        let mut definitions = BTreeMap::new();
        for definition in self.definitions {
            let code = definition.code.clone();
            if code.is_empty()
                || code == ANONYMOUS_CODE
                || code == AUTHENTICATED_CODE
                || code.split(SEPARATOR).any(str::is_empty)
            {
                return Err(ProjectError::InvalidResourceCode(code));
            }
            if definitions.insert(code.clone(), definition).is_some() {
                return Err(ProjectError::DuplicateResource(code));
            }
        }
        Ok(ResourceRegistry { definitions })
    }
}

/// 只读资源码注册表
#[derive(Debug, Default, Clone)]
pub struct ResourceRegistry {
    definitions: BTreeMap<String, ResourceDefinition>,
}

impl ResourceRegistry {
    pub fn builder() -> ResourceRegistryBuilder {
        ResourceRegistryBuilder::new()
    }

    pub fn get(&self, code: &str) -> Option<&ResourceDefinition> {
        self.definitions.get(&normalize_code(code))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// 资源是否接受该 HTTP 方法，未声明方法的资源接受任意方法
    pub fn allows(&self, code: &str, method: HttpMethod) -> bool {
        self.get(code)
            .is_some_and(|d| d.methods.is_empty() || d.methods.contains(&method))
    }

    /// 以 `code` 为前缀的全部资源（含自身）
    pub fn descendants<'a>(&'a self, code: &str) -> impl Iterator<Item = &'a ResourceDefinition> {
        let code = normalize_code(code);
        self.definitions
            .values()
            .filter(move |d| code_grants(&code, &d.code))
    }

    /// 校验待授予的资源码，返回归一化且去重后的列表
    pub fn validate_codes(&self, codes: &[String]) -> Result<Vec<String>, ProjectError> {
        let mut normalized: Vec<String> = Vec::with_capacity(codes.len());
        for raw in codes {
            let code = normalize_code(raw);
            if !self.definitions.contains_key(&code) {
                return Err(ProjectError::UnknownResource(raw.clone()));
            }
            if !normalized.contains(&code) {
                normalized.push(code);
            }
        }
        Ok(normalized)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
