// ==========================================
// 物料分拣系统 - 引擎层
// ==========================================
// 职责: 分拣记录生命周期与物料行核算
// 红线: Engine 不拼 SQL，只通过仓储 trait 访问数据
// ==========================================

pub mod archive;
pub mod checklist_builder;
pub mod error;
pub mod item_reconciler;
pub mod lifecycle;
pub mod order_lock;
pub mod substitution;

// 重导出核心引擎
pub use archive::{ArchiveTransition, FinalizeOutcome};
pub use checklist_builder::{ChecklistBuilder, ChecklistDefaults};
pub use error::{SeparationError, SeparationResult};
pub use item_reconciler::{parse_quantity_input, ItemReconciler, ReconcileOutcome};
pub use lifecycle::{EnsureOutcome, EnsureResult, ItemUpdate, SeparationLifecycle};
pub use order_lock::{OrderLockRegistry, OrderScope};
pub use substitution::SubstitutionRegistrar;
