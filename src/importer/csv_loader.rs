// ==========================================
// 物料分拣系统 - CSV 导入
// ==========================================
// 目录 CSV: code, description, unit, location, drawing_ref, alternatives("A|B")
// 工单 CSV: 每个 BOM 行一行
//   order_id, product_code, product_desc, operation, status, created_date,
//   item_code, quantity
// ==========================================

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::db::parse_date;
use crate::domain::{timestamp_now, ActionLog, ActionType, CatalogItem, Order, RequiredItem};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{ActionLogRepository, CatalogRepository, OrderRepository};

/// 一行原始记录（表头 → 值）
pub type RawRow = HashMap<String, String>;

const CATALOG_REQUIRED: [&str; 2] = ["code", "description"];
const ORDER_REQUIRED: [&str; 4] = ["order_id", "product_code", "item_code", "quantity"];

/// 替代料列分隔符
const ALT_SEPARATOR: char = '|';

/// 导入汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub written: usize,
    pub alternatives: usize,
}

// ==========================================
// 文件读取
// ==========================================

/// 读取 CSV 文件为原始记录；表头去空格并转小写，跳过空白行
pub fn read_csv_rows(path: &Path) -> ImportResult<(Vec<String>, Vec<RawRow>)> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    if let Some(ext) = path.extension() {
        if !ext.eq_ignore_ascii_case("csv") {
            return Err(ImportError::UnsupportedFormat(
                ext.to_string_lossy().to_string(),
            ));
        }
    }

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row = RawRow::new();
        for (col_idx, value) in record.iter().enumerate() {
            if let Some(header) = headers.get(col_idx) {
                row.insert(header.clone(), value.trim().to_string());
            }
        }
        if row.values().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok((headers, rows))
}

fn require_columns(headers: &[String], required: &[&str]) -> ImportResult<()> {
    match required.iter().find(|c| !headers.iter().any(|h| h == *c)) {
        Some(missing) => Err(ImportError::MissingColumn(missing.to_string())),
        None => Ok(()),
    }
}

fn field<'a>(row: &'a RawRow, name: &str) -> &'a str {
    row.get(name).map(String::as_str).unwrap_or("")
}

fn optional_field(row: &RawRow, name: &str) -> Option<String> {
    Some(field(row, name))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ==========================================
// 行映射
// ==========================================

/// 目录行 → (条目, 替代料编码)
pub fn map_catalog_rows(
    rows: &[RawRow],
) -> ImportResult<Vec<(CatalogItem, Vec<String>)>> {
    let mut out = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let code = field(row, "code").to_uppercase();
        if code.is_empty() {
            return Err(ImportError::FieldValueError {
                row: idx + 2,
                field: "code".to_string(),
                message: "物料编码为空".to_string(),
            });
        }
        let item = CatalogItem {
            code,
            description: field(row, "description").to_string(),
            unit: optional_field(row, "unit").unwrap_or_default(),
            location: optional_field(row, "location").unwrap_or_default(),
            drawing_ref: optional_field(row, "drawing_ref"),
        };
        let alternatives: Vec<String> = field(row, "alternatives")
            .split(ALT_SEPARATOR)
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        out.push((item, alternatives));
    }
    Ok(out)
}

/// 工单行 → 工单（按 order_id 聚合 BOM，保持首次出现顺序）
pub fn map_order_rows(rows: &[RawRow]) -> ImportResult<Vec<Order>> {
    let mut orders: Vec<Order> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (idx, row) in rows.iter().enumerate() {
        let line = idx + 2;
        let order_id = field(row, "order_id").to_uppercase();
        if order_id.is_empty() {
            return Err(ImportError::FieldValueError {
                row: line,
                field: "order_id".to_string(),
                message: "工单号为空".to_string(),
            });
        }

        let item_code = field(row, "item_code").to_uppercase();
        let quantity = field(row, "quantity")
            .parse::<i64>()
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| ImportError::FieldValueError {
                row: line,
                field: "quantity".to_string(),
                message: format!("无效的需求数量: {}", field(row, "quantity")),
            })?;

        let created_date = match optional_field(row, "created_date") {
            Some(raw) => Some(parse_date(&raw).ok_or_else(|| ImportError::FieldValueError {
                row: line,
                field: "created_date".to_string(),
                message: format!("期望 YYYY-MM-DD，实际 {}", raw),
            })?),
            None => None,
        };

        let pos = match index.get(&order_id) {
            Some(pos) => *pos,
            None => {
                orders.push(Order {
                    id: order_id.clone(),
                    product_code: field(row, "product_code").to_string(),
                    product_desc: field(row, "product_desc").to_string(),
                    operation: optional_field(row, "operation"),
                    status: optional_field(row, "status").unwrap_or_else(|| "ativa".to_string()),
                    created_date,
                    required_items: Vec::new(),
                });
                index.insert(order_id, orders.len() - 1);
                orders.len() - 1
            }
        };

        if !item_code.is_empty() {
            orders[pos]
                .required_items
                .push(RequiredItem::new(item_code, quantity));
        }
    }
    Ok(orders)
}

// ==========================================
// CsvImporter
// ==========================================
pub struct CsvImporter {
    orders: Arc<OrderRepository>,
    catalog: Arc<CatalogRepository>,
    action_log: Option<Arc<ActionLogRepository>>,
}

impl CsvImporter {
    pub fn new(orders: Arc<OrderRepository>, catalog: Arc<CatalogRepository>) -> Self {
        Self {
            orders,
            catalog,
            action_log: None,
        }
    }

    pub fn with_action_log(mut self, repo: Arc<ActionLogRepository>) -> Self {
        self.action_log = Some(repo);
        self
    }

    /// 导入物料目录（含替代料）
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn import_catalog(&self, path: &Path, actor: &str) -> ImportResult<ImportSummary> {
        let (headers, rows) = read_csv_rows(path)?;
        require_columns(&headers, &CATALOG_REQUIRED)?;
        let mapped = map_catalog_rows(&rows)?;

        let items: Vec<CatalogItem> = mapped.iter().map(|(item, _)| item.clone()).collect();
        let written = self.catalog.batch_upsert_items(&items)?;

        let mut alternatives = 0;
        if headers.iter().any(|h| h == "alternatives") {
            for (item, alts) in &mapped {
                self.catalog.replace_alternatives(&item.code, alts)?;
                alternatives += alts.len();
            }
        }

        let summary = ImportSummary {
            rows_read: rows.len(),
            written,
            alternatives,
        };
        info!(rows = summary.rows_read, written, alternatives, "物料目录导入完成");
        self.log_import(ActionType::ImportCatalog, actor, path, &summary);
        Ok(summary)
    }

    /// 导入工单（覆盖同号工单）
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn import_orders(&self, path: &Path, actor: &str) -> ImportResult<ImportSummary> {
        let (headers, rows) = read_csv_rows(path)?;
        require_columns(&headers, &ORDER_REQUIRED)?;
        let orders = map_order_rows(&rows)?;
        let written = self.orders.batch_upsert(&orders)?;

        let summary = ImportSummary {
            rows_read: rows.len(),
            written,
            alternatives: 0,
        };
        info!(rows = summary.rows_read, written, "工单导入完成");
        self.log_import(ActionType::ImportOrders, actor, path, &summary);
        Ok(summary)
    }

    fn log_import(&self, action_type: ActionType, actor: &str, path: &Path, summary: &ImportSummary) {
        let Some(repo) = &self.action_log else {
            return;
        };
        let log = ActionLog::new(action_type, None, actor, timestamp_now())
            .with_payload(json!({
                "rows_read": summary.rows_read,
                "written": summary.written,
                "alternatives": summary.alternatives,
            }))
            .with_detail(path.display().to_string());
        if let Err(e) = repo.insert(&log) {
            warn!(error = %e, action_type = action_type.as_str(), "写入导入操作日志失败");
        }
    }
}
