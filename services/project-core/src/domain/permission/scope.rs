use serde::{Deserialize, Serialize};
use std::fmt;

/// 数据权限范围
///
/// 数值越小范围越大，多角色取最小值即为并集意义上的最宽范围。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i16)]
pub enum DataScope {
    /// 全部数据
    All = 1,
    /// 本部门及下级部门
    DeptAndSub = 2,
    /// 仅本部门
    Dept = 3,
    /// 仅本人
    SelfOnly = 4,
}

impl DataScope {
    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::All),
            2 => Some(Self::DeptAndSub),
            3 => Some(Self::Dept),
            4 => Some(Self::SelfOnly),
            _ => None,
        }
    }

    /// 多个角色范围合并，没有角色时退化为仅本人
    pub fn widest<I: IntoIterator<Item = DataScope>>(scopes: I) -> DataScope {
        scopes.into_iter().min().unwrap_or(DataScope::SelfOnly)
    }
}

impl fmt::Display for DataScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::DeptAndSub => "dept_and_sub",
            Self::Dept => "dept",
            Self::SelfOnly => "self",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widest_prefers_smallest_code() {
        let scope = DataScope::widest([DataScope::SelfOnly, DataScope::Dept]);
        assert_eq!(scope, DataScope::Dept);

        let scope = DataScope::widest([DataScope::Dept, DataScope::All, DataScope::SelfOnly]);
        assert_eq!(scope, DataScope::All);
    }

    #[test]
    fn test_widest_without_roles_is_self() {
        assert_eq!(DataScope::widest([]), DataScope::SelfOnly);
    }

    #[test]
    fn test_code_mapping() {
        for scope in [
            DataScope::All,
            DataScope::DeptAndSub,
            DataScope::Dept,
            DataScope::SelfOnly,
        ] {
            assert_eq!(DataScope::from_code(scope.code()), Some(scope));
        }
        assert_eq!(DataScope::from_code(0), None);
    }
}
