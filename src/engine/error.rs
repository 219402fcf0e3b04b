// ==========================================
// 物料分拣系统 - 引擎层错误类型
// ==========================================

use crate::domain::FinalizeMode;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 分拣引擎错误
#[derive(Error, Debug)]
pub enum SeparationError {
    // ===== 业务错误 =====
    #[error("工单不存在: order_id={0}")]
    OrderNotFound(String),

    #[error("工单无进行中的分拣记录: order_id={0}")]
    NoActiveSeparation(String),

    #[error("物料行索引越界: order_id={order_id}, index={index}, len={len}")]
    ItemIndexOutOfRange {
        order_id: String,
        index: usize,
        len: usize,
    },

    #[error("完成模式与记录状态不符: order_id={order_id}, requested={requested}, derived={derived}")]
    FinalizeModeMismatch {
        order_id: String,
        requested: FinalizeMode,
        derived: FinalizeMode,
    },

    #[error("替代料不在允许列表中: base_code={base_code}, alt_code={alt_code}")]
    AlternativeNotAllowed { base_code: String, alt_code: String },

    // ===== 并发控制 =====
    #[error("工单锁获取失败: {0}")]
    LockPoisoned(String),

    // ===== 数据访问 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type SeparationResult<T> = Result<T, SeparationError>;
