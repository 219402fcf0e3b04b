// ==========================================
// 物料分拣系统 - 导入层
// ==========================================
// 职责: 外部参考数据导入（物料目录 / 工单）
// 支持: CSV、内置演示数据
// ==========================================

pub mod csv_loader;
pub mod demo_seed;
pub mod error;

// 重导出核心类型
pub use csv_loader::{read_csv_rows, CsvImporter, ImportSummary};
pub use demo_seed::{demo_alternatives, demo_catalog, demo_orders, seed_demo_data, DemoSeedSummary};
pub use error::{ImportError, ImportResult};
