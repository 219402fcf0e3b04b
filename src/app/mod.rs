// ==========================================
// 物料分拣系统 - 应用层
// ==========================================
// 职责: 组装仓储、引擎与 API，供命令行调用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
