// ==========================================
// 物料分拣系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod catalog_repo;
pub mod error;
pub mod history_repo;
pub mod order_repo;
pub mod separation_repo;
pub mod traits;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use catalog_repo::CatalogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use history_repo::HistoryRepository;
pub use order_repo::OrderRepository;
pub use separation_repo::SeparationRepository;
pub use traits::{CatalogSource, HistoryStore, HistoryWrite, OrderSource, SeparationStore};
