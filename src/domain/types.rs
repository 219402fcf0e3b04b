// ==========================================
// 物料分拣系统 - 领域类型定义
// ==========================================
// 依据: 分拣记录生命周期 (NoRecord → Active → FinishedTotal | FinishedPartial)
// ==========================================

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 完成模式 (Finalize Mode)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalizeMode {
    #[default]
    None,    // 进行中
    Total,   // 全部完成（归档）
    Partial, // 部分完成（可重开）
}

impl FinalizeMode {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeMode::None => "NONE",
            FinalizeMode::Total => "TOTAL",
            FinalizeMode::Partial => "PARTIAL",
        }
    }

    /// 从数据库字符串解析，未知值按 NONE 处理
    pub fn parse(s: &str) -> FinalizeMode {
        match s.trim().to_uppercase().as_str() {
            "TOTAL" => FinalizeMode::Total,
            "PARTIAL" | "PARCIAL" => FinalizeMode::Partial,
            _ => FinalizeMode::None,
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, FinalizeMode::None)
    }
}

impl fmt::Display for FinalizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 工单分拣状态 (列表视图用)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSeparationStatus {
    NotStarted, // 无分拣记录
    InProgress, // 存在进行中的记录
    Partial,    // 存在已部分完成的记录
}

impl OrderSeparationStatus {
    /// i18n 键
    pub fn i18n_key(&self) -> &'static str {
        match self {
            OrderSeparationStatus::NotStarted => "separation.status.not_started",
            OrderSeparationStatus::InProgress => "separation.status.in_progress",
            OrderSeparationStatus::Partial => "separation.status.partial",
        }
    }
}

impl fmt::Display for OrderSeparationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSeparationStatus::NotStarted => write!(f, "NOT_STARTED"),
            OrderSeparationStatus::InProgress => write!(f, "IN_PROGRESS"),
            OrderSeparationStatus::Partial => write!(f, "PARTIAL"),
        }
    }
}

/// 当前时间戳（截断到微秒，保证写库后再读取可精确比较）
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
