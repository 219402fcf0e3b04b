// ==========================================
// 物料分拣系统 - 操作日志领域模型
// ==========================================
// 用途: 生命周期迁移的审计追踪（创建 / 重开 / 完成 / 归档 / 删除 / 导入）
// 对齐: action_log 表
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    // ===== 主键 =====
    pub action_id: String,
    pub order_id: Option<String>, // 关联工单（导入类操作为 None）
    pub action_type: String,      // 存储为字符串
    pub action_ts: DateTime<Utc>,
    pub actor: String,

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

impl ActionLog {
    /// 创建新的操作日志（action_id 自动生成）
    pub fn new(
        action_type: ActionType,
        order_id: Option<&str>,
        actor: &str,
        action_ts: DateTime<Utc>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.map(str::to_string),
            action_type: action_type.as_str().to_string(),
            action_ts,
            actor: actor.to_string(),
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateSeparation,  // 新建分拣记录
    ReopenSeparation,  // 重开部分完成的记录
    FinalizeTotal,     // 全部完成
    FinalizePartial,   // 部分完成
    ArchiveSeparation, // 归档到历史
    RemoveSeparation,  // 删除活动记录
    ImportCatalog,     // 导入物料目录
    ImportOrders,      // 导入工单
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateSeparation => "CREATE_SEPARATION",
            ActionType::ReopenSeparation => "REOPEN_SEPARATION",
            ActionType::FinalizeTotal => "FINALIZE_TOTAL",
            ActionType::FinalizePartial => "FINALIZE_PARTIAL",
            ActionType::ArchiveSeparation => "ARCHIVE_SEPARATION",
            ActionType::RemoveSeparation => "REMOVE_SEPARATION",
            ActionType::ImportCatalog => "IMPORT_CATALOG",
            ActionType::ImportOrders => "IMPORT_ORDERS",
        }
    }
}
