// ==========================================
// 物料分拣系统 - 操作员身份
// ==========================================

use serde::{Deserialize, Serialize};

/// 当前会话操作员
///
/// `username` 写入 confirmed_by / substitution.operator / record.operator，
/// `display_name` 仅用于展示。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub username: String,
    pub display_name: String,
}

impl Operator {
    /// 以用户名创建操作员，展示名默认为大写用户名
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        let display_name = username.to_uppercase();
        Self {
            username,
            display_name,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}
