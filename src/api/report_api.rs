// ==========================================
// 物料分拣系统 - 报表 API
// ==========================================
// 职责: 分拣报表明细、CSV 导出
// 格式: 每个物料行一行，表头与标签按语言本地化
// ==========================================

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::query_api::{QueryApi, ReportKind};
use crate::api::separation_api::normalize_order_id;
use crate::domain::{ChecklistItem, FinalizeMode, SeparationRecord};
use crate::i18n::{t_in, t_in_with_args};
use crate::repository::{CatalogSource, HistoryStore};

/// 报表中的时间格式
pub const REPORT_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// CSV 表头 i18n 键（列顺序）
const CSV_HEADER_KEYS: [&str; 16] = [
    "report.header.order",
    "report.header.product",
    "report.header.operation",
    "report.header.operator",
    "report.header.started_at",
    "report.header.finished_at",
    "report.header.mode",
    "report.header.item_no",
    "report.header.code",
    "report.header.description",
    "report.header.quantity",
    "report.header.unit",
    "report.header.item_type",
    "report.header.status",
    "report.header.confirmed_by",
    "report.header.confirmed_at",
];

/// 报表明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDetail {
    pub record: SeparationRecord,
    pub confirmed_items: Vec<ChecklistItem>,
    pub pending_items: Vec<ChecklistItem>,
    pub substituted: usize,
}

// ==========================================
// ReportApi
// ==========================================
pub struct ReportApi {
    history: Arc<dyn HistoryStore>,
    catalog: Arc<dyn CatalogSource>,
    query: Arc<QueryApi>,
}

impl ReportApi {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        catalog: Arc<dyn CatalogSource>,
        query: Arc<QueryApi>,
    ) -> Self {
        Self {
            history,
            catalog,
            query,
        }
    }

    /// 工单最近一次全部完成的报表
    pub fn get_report(&self, order_id: &str) -> ApiResult<ReportDetail> {
        let order_id = normalize_order_id(order_id)?;
        let record = self
            .history
            .find_by_order(&order_id)?
            .into_iter()
            .max_by_key(|r| r.finished_at)
            .ok_or_else(|| ApiError::NotFound(format!("工单(id={})无归档报表", order_id)))?;

        Ok(ReportDetail {
            confirmed_items: record.confirmed_items().cloned().collect(),
            pending_items: record.pending_items().cloned().collect(),
            substituted: record.summary().substituted,
            record,
        })
    }

    /// 选取导出记录: 按报表类型取记录，再按工单号过滤（为空则全部）
    pub fn select_records(
        &self,
        kind: ReportKind,
        order_ids: &[String],
    ) -> ApiResult<Vec<SeparationRecord>> {
        let wanted: Vec<String> = order_ids
            .iter()
            .map(|id| id.trim().to_uppercase())
            .filter(|id| !id.is_empty())
            .collect();
        Ok(self
            .query
            .report_records(kind)?
            .into_iter()
            .filter(|r| wanted.is_empty() || wanted.contains(&r.order_id))
            .collect())
    }

    /// 导出 CSV
    ///
    /// # 返回
    /// - Ok(rows): 写入的数据行数（不含表头）
    pub fn export_csv<W: Write>(
        &self,
        records: &[SeparationRecord],
        writer: W,
        locale: &str,
    ) -> ApiResult<usize> {
        let catalog = self.catalog.list_items()?;
        let mut wtr = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(writer);

        let header: Vec<String> = CSV_HEADER_KEYS.iter().map(|k| t_in(locale, k)).collect();
        wtr.write_record(&header).map_err(export_error)?;

        let not_available = t_in(locale, "common.not_available");
        let mut rows = 0usize;
        for rec in records {
            let mode = match rec.finalize_mode {
                FinalizeMode::Total => t_in(locale, "report.mode.total"),
                _ => t_in(locale, "report.mode.partial"),
            };
            let base = [
                rec.order_id.clone(),
                rec.product_code.clone().unwrap_or_default(),
                rec.operation
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| not_available.clone()),
                rec.operator.clone().unwrap_or_default(),
                format_datetime(Some(&rec.started_at)),
                format_datetime(rec.finished_at.as_ref()),
                mode,
            ];

            for (idx, item) in rec.items.iter().enumerate() {
                let description = catalog
                    .iter()
                    .find(|c| c.code == item.current_code)
                    .map(|c| c.description.clone())
                    .unwrap_or_else(|| item.description.clone());
                let item_type = if item.substitution.is_some() {
                    t_in_with_args(
                        locale,
                        "report.item_type.alternative",
                        &[("base", item.base_code.as_str())],
                    )
                } else {
                    t_in(locale, "report.item_type.official")
                };
                let status = if item.confirmed {
                    t_in(locale, "report.item_status.separated")
                } else {
                    t_in(locale, "report.item_status.pending")
                };

                let mut line: Vec<String> = base.to_vec();
                line.extend([
                    (idx + 1).to_string(),
                    item.current_code.clone(),
                    description,
                    item.quantity.to_string(),
                    item.unit.clone(),
                    item_type,
                    status,
                    item.confirmed_by.clone().unwrap_or_default(),
                    format_datetime(item.confirmed_at.as_ref()),
                ]);
                wtr.write_record(&line).map_err(export_error)?;
                rows += 1;
            }
        }

        wtr.flush()
            .map_err(|e| ApiError::ExportError(e.to_string()))?;
        info!(records = records.len(), rows, locale, "CSV 导出完成");
        Ok(rows)
    }
}

fn format_datetime(ts: Option<&DateTime<Utc>>) -> String {
    ts.map(|t| t.format(REPORT_DATETIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn export_error(e: csv::Error) -> ApiError {
    ApiError::ExportError(e.to_string())
}
