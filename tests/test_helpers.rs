// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、演示数据写入等功能
// ==========================================

#![allow(dead_code)]

use std::error::Error;

use material_separation::app::AppState;
use material_separation::db::{init_schema, open_sqlite_connection};
use material_separation::domain::Operator;
use material_separation::importer::seed_demo_data;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 创建已写入演示数据的应用状态
pub fn create_seeded_state() -> Result<(NamedTempFile, AppState), Box<dyn Error>> {
    let (temp_file, db_path) = create_test_db()?;
    let state = AppState::new(db_path)?;
    seed_demo_data(&state.order_repo, &state.catalog_repo)?;
    Ok((temp_file, state))
}

/// 测试操作员
pub fn operator(username: &str) -> Operator {
    Operator::new(username)
}

/// 物料行在清单中的位置
pub fn item_index(record: &material_separation::SeparationRecord, code: &str) -> usize {
    record
        .items
        .iter()
        .position(|i| i.base_code == code)
        .unwrap_or_else(|| panic!("清单中没有物料 {}", code))
}

/// 在同一数据库文件上打开独立连接的分拣 / 历史 / 日志仓储（用于断言）
pub fn open_stores(
    db_path: &str,
) -> Result<
    (
        material_separation::repository::SeparationRepository,
        material_separation::repository::HistoryRepository,
        material_separation::repository::ActionLogRepository,
    ),
    Box<dyn Error>,
> {
    use std::sync::{Arc, Mutex};
    let conn = Arc::new(Mutex::new(open_sqlite_connection(db_path)?));
    Ok((
        material_separation::repository::SeparationRepository::new(conn.clone()),
        material_separation::repository::HistoryRepository::new(conn.clone()),
        material_separation::repository::ActionLogRepository::new(conn),
    ))
}
