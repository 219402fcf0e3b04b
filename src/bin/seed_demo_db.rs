// ==========================================
// 物料分拣系统 - 重置并写入演示数据库
// ==========================================
// 用法: seed_demo_db [db_path]
// 原库先备份为 <db_path>.bak.<时间戳> 再删除
// ==========================================

use chrono::Local;
use std::error::Error;
use std::fs;
use std::path::Path;

use material_separation::app::{get_default_db_path, AppState};
use material_separation::importer::seed_demo_data;
use material_separation::repository::{CatalogSource, OrderSource};

fn main() -> Result<(), Box<dyn Error>> {
    material_separation::logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    backup_and_reset_db(&db_path)?;

    let state = AppState::new(db_path.clone())?;
    let summary = seed_demo_data(&state.order_repo, &state.catalog_repo)?;

    eprintln!("Seeded {}", db_path);
    eprintln!(
        "  catalog_item={} alternatives={} production_order={}",
        state.catalog_repo.list_items()?.len(),
        summary.alternative_groups,
        state.order_repo.list_orders()?.len()
    );
    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}
