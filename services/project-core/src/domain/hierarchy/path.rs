//! 路径计算，纯函数

use super::NodeKind;
use crate::error::ProjectError;

const SEPARATOR: char = '/';

/// 名称非空且不含分隔符
pub fn validate_name(kind: NodeKind, name: &str) -> Result<(), ProjectError> {
    if name.trim().is_empty() {
        return Err(ProjectError::NameRequired(kind));
    }
    if name.contains(SEPARATOR) {
        return Err(ProjectError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// 在 `base` 下拼接子路径，`base` 为 None 时为根路径
pub fn child_path(base: Option<&str>, name: &str) -> String {
    match base {
        Some(base) => format!("{}{}{}", base, SEPARATOR, name),
        None => format!("{}{}", SEPARATOR, name),
    }
}

/// `path` 等于 `ancestor` 或位于其下
pub fn is_within(path: &str, ancestor: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// 把 `path` 的 `old_prefix` 部分替换为 `new_prefix`，不在该前缀下时返回 None
pub fn rebase_path(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if !is_within(path, old_prefix) {
        return None;
    }
    Some(format!("{}{}", new_prefix, &path[old_prefix.len()..]))
}

/// 全部真祖先路径，由近根到近叶：`/A/B/C` → `["/A", "/A/B"]`
pub fn ancestor_paths(path: &str) -> Vec<String> {
    path.match_indices(SEPARATOR)
        .map(|(idx, _)| idx)
        .filter(|&idx| idx > 0)
        .map(|idx| path[..idx].to_string())
        .collect()
}
