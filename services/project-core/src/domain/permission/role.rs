use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use super::DataScope;

/// 角色 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
pub struct RoleId(pub i64);

impl std::str::FromStr for RoleId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// 角色类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum RoleType {
    SuperAdmin = -1,
    Normal = 1,
    /// 项目内角色
    Project = 2,
}

impl RoleType {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            -1 => Some(Self::SuperAdmin),
            1 => Some(Self::Normal),
            2 => Some(Self::Project),
            _ => None,
        }
    }
}

/// 角色状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum RoleStatus {
    Normal = 1,
    Disabled = 2,
}

impl RoleStatus {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// 角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub role_type: RoleType,
    pub data_scope: DataScope,
    pub status: RoleStatus,
    /// 新用户默认授予
    pub is_default: bool,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<String>, data_scope: DataScope) -> Self {
        Self {
            id,
            name: name.into(),
            role_type: RoleType::Normal,
            data_scope,
            status: RoleStatus::Normal,
            is_default: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == RoleStatus::Normal
    }
}
