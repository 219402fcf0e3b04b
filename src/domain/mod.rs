// ==========================================
// 物料分拣系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod catalog;
pub mod operator;
pub mod order;
pub mod separation;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use catalog::{AlternativesMap, CatalogItem};
pub use operator::Operator;
pub use order::{Order, RequiredItem};
pub use separation::{
    ChecklistItem, ItemProgress, SeparationEvent, SeparationRecord, SeparationSummary,
    SubstitutionEvent,
};
pub use types::{timestamp_now, FinalizeMode, OrderSeparationStatus};
