// ==========================================
// 物料分拣系统 - 查询 API
// ==========================================
// 职责: 待分拣工单检索、已完成列表、报表列表
// 红线: 只读，不修改任何记录
// ==========================================

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{FinalizeMode, Order, OrderSeparationStatus, SeparationRecord};
use crate::repository::{HistoryStore, OrderSource, SeparationStore};

// ==========================================
// 过滤条件
// ==========================================

/// 待分拣工单的状态过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusFilter {
    #[default]
    All,
    /// 存在已部分完成的记录
    Partial,
    /// 无记录，或记录中没有任何已确认物料
    WithoutSeparation,
}

impl FromStr for StatusFilter {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" | "todas" => Ok(StatusFilter::All),
            "partial" | "parcial" => Ok(StatusFilter::Partial),
            "none" | "without" | "sem-separacao" => Ok(StatusFilter::WithoutSeparation),
            other => Err(ApiError::InvalidInput(format!("未知的状态过滤: {}", other))),
        }
    }
}

/// 待分拣工单检索条件（文本均为大小写不敏感子串匹配）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchFilter {
    pub order_id: Option<String>,
    pub product: Option<String>,
    pub operation: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    pub status: StatusFilter,
}

/// 报表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportKind {
    /// 历史中的全部完成记录
    Total,
    /// 已部分完成的记录
    Partial,
    #[default]
    All,
}

impl FromStr for ReportKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "total" => Ok(ReportKind::Total),
            "partial" | "parcial" => Ok(ReportKind::Partial),
            "" | "all" | "todos" => Ok(ReportKind::All),
            other => Err(ApiError::InvalidInput(format!("未知的报表类型: {}", other))),
        }
    }
}

/// 报表 / 已完成列表检索条件（日期按 finished_at 的 UTC 日期比较，含端点）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilter {
    pub kind: ReportKind,
    pub order_id: Option<String>,
    pub product: Option<String>,
    pub operation: Option<String>,
    pub finished_from: Option<NaiveDate>,
    pub finished_to: Option<NaiveDate>,
}

// ==========================================
// 结果行
// ==========================================

/// 待分拣工单行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRow {
    pub order_id: String,
    pub product_code: String,
    pub product_desc: String,
    pub operation: Option<String>,
    pub created_date: Option<NaiveDate>,
    pub status: OrderSeparationStatus,
}

/// 报表 / 已完成列表行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub order_id: String,
    pub product_code: Option<String>,
    pub product_desc: Option<String>,
    pub operation: Option<String>,
    pub finalize_mode: FinalizeMode,
    pub finished_at: Option<DateTime<Utc>>,
    pub operator: Option<String>,
    pub confirmed: usize,
    pub total: usize,
}

impl ReportRow {
    /// 进度文本，例如 "3/5"
    pub fn progress(&self) -> String {
        format!("{}/{}", self.confirmed, self.total)
    }
}

// ==========================================
// QueryApi
// ==========================================
pub struct QueryApi {
    orders: Arc<dyn OrderSource>,
    separations: Arc<dyn SeparationStore>,
    history: Arc<dyn HistoryStore>,
}

impl QueryApi {
    pub fn new(
        orders: Arc<dyn OrderSource>,
        separations: Arc<dyn SeparationStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            orders,
            separations,
            history,
        }
    }

    /// 待分拣工单检索
    ///
    /// 已在历史中全部完成的工单不出现在结果中。
    pub fn list_orders_for_separation(&self, filter: &OrderSearchFilter) -> ApiResult<Vec<OrderRow>> {
        let finalized: HashSet<String> = self
            .history
            .list_all()?
            .into_iter()
            .filter(|r| r.finalize_mode == FinalizeMode::Total)
            .map(|r| r.order_id)
            .collect();

        let mut by_order: HashMap<String, Vec<SeparationRecord>> = HashMap::new();
        for rec in self.separations.list_all()? {
            by_order.entry(rec.order_id.clone()).or_default().push(rec);
        }

        let op = normalize_text(filter.order_id.as_deref());
        let prod = normalize_text(filter.product.as_deref());
        let operation = normalize_text(filter.operation.as_deref());
        let has_range = filter.created_from.is_some() || filter.created_to.is_some();

        let rows: Vec<OrderRow> = self
            .orders
            .list_orders()?
            .into_iter()
            .filter(|o| !finalized.contains(&o.id))
            .filter(|o| contains_text(Some(&o.id), op.as_deref()))
            .filter(|o| contains_text(Some(&o.product_code), prod.as_deref()))
            .filter(|o| contains_text(o.operation.as_deref(), operation.as_deref()))
            .filter(|o| {
                if !has_range {
                    return true;
                }
                match o.created_date {
                    Some(d) => in_range(d, filter.created_from, filter.created_to),
                    None => false,
                }
            })
            .filter_map(|o| {
                let records = by_order.get(&o.id).map(Vec::as_slice).unwrap_or(&[]);
                let status = separation_status(records);
                let keep = match filter.status {
                    StatusFilter::All => true,
                    StatusFilter::Partial => status == OrderSeparationStatus::Partial,
                    StatusFilter::WithoutSeparation => records
                        .iter()
                        .all(|r| r.items.iter().all(|i| !i.confirmed)),
                };
                keep.then(|| order_row(o, status))
            })
            .collect();

        debug!(count = rows.len(), status = ?filter.status, "待分拣工单检索");
        Ok(rows)
    }

    /// 已全部完成的分拣（历史）
    pub fn list_finalized(
        &self,
        text: Option<&str>,
        finished_from: Option<NaiveDate>,
        finished_to: Option<NaiveDate>,
    ) -> ApiResult<Vec<ReportRow>> {
        let txt = normalize_text(text);
        let rows = self
            .history
            .list_all()?
            .into_iter()
            .filter(|r| r.finalize_mode == FinalizeMode::Total)
            .filter(|r| finished_in_range(r, finished_from, finished_to))
            .filter(|r| {
                txt.is_none()
                    || contains_text(Some(&r.order_id), txt.as_deref())
                    || contains_text(r.product_code.as_deref(), txt.as_deref())
            })
            .map(|r| self.report_row(&r))
            .collect::<ApiResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 报表列表
    pub fn list_reports(&self, filter: &ReportFilter) -> ApiResult<Vec<ReportRow>> {
        let records = self.report_records(filter.kind)?;

        let op = normalize_text(filter.order_id.as_deref());
        let prod = normalize_text(filter.product.as_deref());
        let operation = normalize_text(filter.operation.as_deref());

        let mut rows = Vec::new();
        for rec in records {
            if !contains_text(Some(&rec.order_id), op.as_deref()) {
                continue;
            }
            if !finished_in_range(&rec, filter.finished_from, filter.finished_to) {
                continue;
            }
            let row = self.report_row(&rec)?;
            if !contains_text(row.product_code.as_deref(), prod.as_deref())
                || !contains_text(row.operation.as_deref(), operation.as_deref())
            {
                continue;
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// 报表对应的完整记录（历史全部完成 + 已部分完成）
    pub fn report_records(&self, kind: ReportKind) -> ApiResult<Vec<SeparationRecord>> {
        let totals = || -> ApiResult<Vec<SeparationRecord>> {
            Ok(self
                .history
                .list_all()?
                .into_iter()
                .filter(|r| r.finalize_mode == FinalizeMode::Total)
                .collect())
        };
        let partials = || -> ApiResult<Vec<SeparationRecord>> {
            Ok(self
                .separations
                .list_all()?
                .into_iter()
                .filter(|r| r.finalize_mode == FinalizeMode::Partial && r.finished_at.is_some())
                .collect())
        };

        match kind {
            ReportKind::Total => totals(),
            ReportKind::Partial => partials(),
            ReportKind::All => {
                let mut all = totals()?;
                all.extend(partials()?);
                Ok(all)
            }
        }
    }

    /// 报表行: 产品 / 工序优先取工单当前值，工单不存在时取记录快照
    fn report_row(&self, rec: &SeparationRecord) -> ApiResult<ReportRow> {
        let order = self.orders.find_order(&rec.order_id)?;
        let summary = rec.summary();
        let (product_code, product_desc, operation) = match order {
            Some(o) => (Some(o.product_code), Some(o.product_desc), o.operation),
            None => (
                rec.product_code.clone(),
                rec.product_desc.clone(),
                rec.operation.clone(),
            ),
        };
        Ok(ReportRow {
            order_id: rec.order_id.clone(),
            product_code,
            product_desc,
            operation,
            finalize_mode: rec.finalize_mode,
            finished_at: rec.finished_at,
            operator: rec.operator.clone(),
            confirmed: summary.confirmed,
            total: summary.total,
        })
    }
}

// ==========================================
// 过滤工具
// ==========================================

/// 工单的分拣状态: 有已部分完成的记录 → Partial；有进行中的记录 → InProgress
pub fn separation_status(records: &[SeparationRecord]) -> OrderSeparationStatus {
    if records
        .iter()
        .any(|r| r.finalize_mode == FinalizeMode::Partial && r.finished_at.is_some())
    {
        OrderSeparationStatus::Partial
    } else if records.iter().any(|r| r.is_active()) {
        OrderSeparationStatus::InProgress
    } else {
        OrderSeparationStatus::NotStarted
    }
}

fn order_row(o: Order, status: OrderSeparationStatus) -> OrderRow {
    OrderRow {
        order_id: o.id,
        product_code: o.product_code,
        product_desc: o.product_desc,
        operation: o.operation,
        created_date: o.created_date,
        status,
    }
}

fn normalize_text(text: Option<&str>) -> Option<String> {
    text.map(|t| t.trim().to_uppercase()).filter(|t| !t.is_empty())
}

/// needle 为 None 时匹配全部；值缺失时只匹配空 needle
fn contains_text(value: Option<&str>, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(n) => value.map(|v| v.to_uppercase().contains(n)).unwrap_or(false),
    }
}

fn in_range(date: NaiveDate, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    from.map(|f| date >= f).unwrap_or(true) && to.map(|t| date <= t).unwrap_or(true)
}

fn finished_in_range(rec: &SeparationRecord, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    if from.is_none() && to.is_none() {
        return true;
    }
    rec.finished_at
        .map(|ts| in_range(ts.date_naive(), from, to))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("todas".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!("PARCIAL".parse::<StatusFilter>().unwrap(), StatusFilter::Partial);
        assert_eq!(
            "sem-separacao".parse::<StatusFilter>().unwrap(),
            StatusFilter::WithoutSeparation
        );
        assert!("???".parse::<StatusFilter>().is_err());
        assert_eq!("parcial".parse::<ReportKind>().unwrap(), ReportKind::Partial);
    }

    #[test]
    fn test_text_and_range_helpers() {
        assert!(contains_text(Some("OP-1001"), None));
        assert!(contains_text(Some("op-1001"), Some("OP-10")));
        assert!(!contains_text(None, Some("CORTE")));

        let d = |day| NaiveDate::from_ymd_opt(2025, 1, day).unwrap();
        assert!(in_range(d(10), Some(d(10)), Some(d(10))));
        assert!(!in_range(d(9), Some(d(10)), None));
        assert!(in_range(d(9), None, None));
    }
}
