// ==========================================
// 物料分拣系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行与应用层调用
// ==========================================

pub mod error;
pub mod query_api;
pub mod report_api;
pub mod separation_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use query_api::{
    OrderRow, OrderSearchFilter, QueryApi, ReportFilter, ReportKind, ReportRow, StatusFilter,
};
pub use report_api::{ReportApi, ReportDetail, REPORT_DATETIME_FORMAT};
pub use separation_api::{ChecklistView, ItemDrawing, SaveResult, SeparationApi};
