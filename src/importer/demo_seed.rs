// ==========================================
// 物料分拣系统 - 演示数据
// ==========================================
// 7 个目录条目、2 组替代料、6 张工单
// 重复执行结果一致（覆盖写入）
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{CatalogItem, Order, RequiredItem};
use crate::repository::{CatalogRepository, OrderRepository, RepositoryResult};

const DEMO_DRAWING: &str =
    "https://www.w3.org/WAI/ER/tests/xhtml/testfiles/resources/pdf/dummy.pdf";

/// 写入结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoSeedSummary {
    pub catalog_items: usize,
    pub alternative_groups: usize,
    pub orders: usize,
}

fn catalog_item(code: &str, description: &str, location: &str, drawing: bool) -> CatalogItem {
    CatalogItem {
        code: code.to_string(),
        description: description.to_string(),
        unit: "PC".to_string(),
        location: location.to_string(),
        drawing_ref: drawing.then(|| DEMO_DRAWING.to_string()),
    }
}

pub fn demo_catalog() -> Vec<CatalogItem> {
    vec![
        catalog_item("MAT-0001", "Chapa Aço 3mm", "DEP-01 / A-01", false),
        catalog_item("MAT-0002", "Parafuso M8x30", "DEP-01 / B-05", true),
        catalog_item("MAT-0003", "Porca M8", "DEP-02 / C-10", true),
        catalog_item("MAT-0004", "Arruela M8", "DEP-02 / C-11", false),
        catalog_item("MAT-0100", "Parafuso M8x32 (Alt 1)", "DEP-01 / B-06", false),
        catalog_item("MAT-0101", "Parafuso M8x35 (Alt 2)", "DEP-01 / B-07", false),
        catalog_item("MAT-0200", "Chapa Aço 2.9mm (Alt)", "DEP-01 / A-02", false),
    ]
}

/// 标准料 → 替代料（有序）
pub fn demo_alternatives() -> Vec<(String, Vec<String>)> {
    vec![
        ("MAT-0001".to_string(), vec!["MAT-0200".to_string()]),
        (
            "MAT-0002".to_string(),
            vec!["MAT-0100".to_string(), "MAT-0101".to_string()],
        ),
    ]
}

fn order(
    id: &str,
    product: &str,
    operation: &str,
    created: (i32, u32, u32),
    items: &[(&str, i64)],
) -> Order {
    Order {
        id: id.to_string(),
        product_code: format!("PROD-{}", product),
        product_desc: format!("Carroceria Modelo {}", product),
        operation: Some(operation.to_string()),
        status: "ativa".to_string(),
        created_date: NaiveDate::from_ymd_opt(created.0, created.1, created.2),
        required_items: items
            .iter()
            .map(|(code, qty)| RequiredItem::new(*code, *qty))
            .collect(),
    }
}

pub fn demo_orders() -> Vec<Order> {
    vec![
        order(
            "OP-1001",
            "AX12",
            "CORTE",
            (2025, 10, 1),
            &[("MAT-0001", 4), ("MAT-0002", 20), ("MAT-0003", 20), ("MAT-0004", 20)],
        ),
        order(
            "OP-1002",
            "BX20",
            "SOLDAGEM",
            (2025, 10, 2),
            &[("MAT-0001", 2), ("MAT-0002", 10), ("MAT-0003", 10)],
        ),
        order(
            "OP-1003",
            "CX15",
            "CORTE",
            (2025, 10, 3),
            &[("MAT-0001", 3), ("MAT-0002", 15), ("MAT-0004", 15)],
        ),
        order(
            "OP-1004",
            "DX30",
            "MONTAGEM",
            (2025, 10, 4),
            &[("MAT-0002", 25), ("MAT-0003", 25), ("MAT-0004", 25)],
        ),
        order(
            "OP-1005",
            "EX40",
            "CORTE",
            (2025, 9, 28),
            &[("MAT-0001", 5), ("MAT-0002", 30)],
        ),
        order(
            "OP-1006",
            "FX50",
            "SOLDAGEM",
            (2025, 9, 30),
            &[("MAT-0003", 15), ("MAT-0004", 15)],
        ),
    ]
}

/// 写入演示目录与工单（不触碰分拣记录）
pub fn seed_demo_data(
    orders: &OrderRepository,
    catalog: &CatalogRepository,
) -> RepositoryResult<DemoSeedSummary> {
    let catalog_items = catalog.batch_upsert_items(&demo_catalog())?;
    let alternatives = demo_alternatives();
    for (base, alts) in &alternatives {
        catalog.replace_alternatives(base, alts)?;
    }
    let written = orders.batch_upsert(&demo_orders())?;

    let summary = DemoSeedSummary {
        catalog_items,
        alternative_groups: alternatives.len(),
        orders: written,
    };
    info!(
        catalog_items = summary.catalog_items,
        orders = summary.orders,
        "演示数据已写入"
    );
    Ok(summary)
}
