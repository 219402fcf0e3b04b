// ==========================================
// 物料分拣系统 - 仓储接口
// ==========================================
// 引擎层只依赖这些 trait，不直接依赖 SQLite 实现
// ==========================================

use crate::domain::{AlternativesMap, CatalogItem, Order, SeparationRecord};
use crate::repository::error::RepositoryResult;

/// 工单数据来源（外部系统，只读）
pub trait OrderSource: Send + Sync {
    fn find_order(&self, order_id: &str) -> RepositoryResult<Option<Order>>;

    fn list_orders(&self) -> RepositoryResult<Vec<Order>>;
}

/// 物料目录与替代料来源（参考数据，只读）
pub trait CatalogSource: Send + Sync {
    fn find_item(&self, code: &str) -> RepositoryResult<Option<CatalogItem>>;

    fn list_items(&self) -> RepositoryResult<Vec<CatalogItem>>;

    fn alternatives(&self) -> RepositoryResult<AlternativesMap>;
}

/// 活动分拣记录存储（进行中 + 已部分完成）
pub trait SeparationStore: Send + Sync {
    /// 查询工单进行中的记录（finished_at IS NULL）
    fn find_active(&self, order_id: &str) -> RepositoryResult<Option<SeparationRecord>>;

    /// 查询工单已部分完成的记录（按 finished_at 降序）
    fn find_finished_partials(&self, order_id: &str) -> RepositoryResult<Vec<SeparationRecord>>;

    /// 查询工单的全部记录
    fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<SeparationRecord>>;

    fn list_all(&self) -> RepositoryResult<Vec<SeparationRecord>>;

    fn insert(&self, record: &SeparationRecord) -> RepositoryResult<()>;

    /// 乐观锁更新，返回新 revision
    fn update(&self, record: &SeparationRecord) -> RepositoryResult<i64>;

    /// 删除工单的全部记录（含已完成的），返回删除行数
    fn delete_by_order(&self, order_id: &str) -> RepositoryResult<usize>;
}

/// 历史归档写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWrite {
    Inserted,
    Replaced, // 同一 (order_id, finished_at) 已存在，覆盖写入
}

/// 历史归档存储（只追加，按 order_id + finished_at 唯一）
pub trait HistoryStore: Send + Sync {
    fn upsert(&self, record: &SeparationRecord) -> RepositoryResult<HistoryWrite>;

    /// 归档并删除该工单的活动记录，两者同一事务提交，返回 (写入结果, 删除行数)
    fn archive_and_remove(
        &self,
        record: &SeparationRecord,
    ) -> RepositoryResult<(HistoryWrite, usize)>;

    fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<SeparationRecord>>;

    fn list_all(&self) -> RepositoryResult<Vec<SeparationRecord>>;
}
