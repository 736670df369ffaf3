//! 通用工具函数

use chrono::Utc;

/// 当前时间的毫秒时间戳
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 规范化资源码：去除首尾空白并转为小写
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}
