// ==========================================
// 物料分拣系统 - 分拣清单 API
// ==========================================
// 职责: 分拣清单工作流（打开 / 标准料数量 / 替代料 / 保存）
// 红线: 所有修改通过 SeparationLifecycle，不直接访问存储
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{
    timestamp_now, CatalogItem, ChecklistItem, FinalizeMode, ItemProgress, Operator,
    SeparationRecord, SeparationSummary,
};
use crate::engine::{
    parse_quantity_input, ArchiveTransition, EnsureOutcome, ItemUpdate, SeparationLifecycle,
    SubstitutionRegistrar,
};
use crate::repository::{CatalogSource, HistoryWrite};

// ==========================================
// 视图对象
// ==========================================

/// 分拣清单视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistView {
    pub record: SeparationRecord,
    /// 仅 open_checklist 返回时有值
    pub outcome: Option<EnsureOutcome>,
    pub summary: SeparationSummary,
    pub progress: Vec<ItemProgress>,
}

impl ChecklistView {
    fn new(record: SeparationRecord, outcome: Option<EnsureOutcome>) -> Self {
        let summary = record.summary();
        let progress = record.items.iter().map(|i| i.progress()).collect();
        Self {
            record,
            outcome,
            summary,
            progress,
        }
    }
}

/// 物料行图纸
///
/// 按物料行当前编码查目录；目录未登记图纸时 `drawing_ref` 为 None。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDrawing {
    pub code: String,
    pub drawing_ref: Option<String>,
}

/// 保存（完成）结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResult {
    pub order_id: String,
    pub mode: FinalizeMode,
    pub pending: usize,
    pub archived: bool,
    pub replaced_history: bool,
    pub record: SeparationRecord,
}

// ==========================================
// SeparationApi
// ==========================================
pub struct SeparationApi {
    lifecycle: Arc<SeparationLifecycle>,
    archive: Arc<ArchiveTransition>,
    catalog: Arc<dyn CatalogSource>,
    registrar: SubstitutionRegistrar,
}

impl SeparationApi {
    pub fn new(
        lifecycle: Arc<SeparationLifecycle>,
        archive: Arc<ArchiveTransition>,
        catalog: Arc<dyn CatalogSource>,
    ) -> Self {
        Self {
            lifecycle,
            archive,
            catalog,
            registrar: SubstitutionRegistrar::new(),
        }
    }

    /// 打开工单的分拣清单（进行中 / 重开 / 新建）
    pub fn open_checklist(&self, order_id: &str, operator: &Operator) -> ApiResult<ChecklistView> {
        let order_id = normalize_order_id(order_id)?;
        let result = self.lifecycle.ensure(&order_id, operator, timestamp_now())?;
        info!(
            order_id = %order_id,
            outcome = ?result.outcome,
            "打开分拣清单"
        );
        Ok(ChecklistView::new(result.record, Some(result.outcome)))
    }

    /// 进行中的清单（不创建）
    pub fn get_checklist(&self, order_id: &str) -> ApiResult<Option<ChecklistView>> {
        let order_id = normalize_order_id(order_id)?;
        Ok(self
            .lifecycle
            .get_active(&order_id)?
            .map(|r| ChecklistView::new(r, None)))
    }

    /// 清单汇总
    pub fn summary(&self, order_id: &str) -> ApiResult<SeparationSummary> {
        let order_id = normalize_order_id(order_id)?;
        self.lifecycle
            .get_active(&order_id)?
            .map(|r| r.summary())
            .ok_or(ApiError::NoActiveSeparation(order_id))
    }

    /// 设定标准料数量
    ///
    /// 输入无法解析时按 0 处理；超出范围自动截断。
    pub fn set_official_quantity(
        &self,
        order_id: &str,
        index: usize,
        raw_qty: &str,
        operator: &Operator,
    ) -> ApiResult<ItemUpdate> {
        let order_id = normalize_order_id(order_id)?;
        let qty = parse_quantity_input(raw_qty).unwrap_or(0);
        debug!(order_id = %order_id, index, raw_qty, qty, "设定标准料数量");
        Ok(self
            .lifecycle
            .set_official_quantity(&order_id, index, qty, operator, timestamp_now())?)
    }

    /// 物料行的可用替代料（按目录过滤）
    pub fn list_alternatives(
        &self,
        order_id: &str,
        index: usize,
        search_text: &str,
    ) -> ApiResult<Vec<CatalogItem>> {
        let order_id = normalize_order_id(order_id)?;
        let record = self.require_active(&order_id)?;
        let item = item_at(&record, index)?;

        let catalog = self.catalog.list_items()?;
        let alternatives = self.catalog.alternatives()?;
        Ok(self.registrar.available_alternatives(
            &item.base_code,
            &catalog,
            &alternatives,
            search_text,
        ))
    }

    /// 物料行当前编码的图纸链接（实时读取目录）
    pub fn item_drawing(&self, order_id: &str, index: usize) -> ApiResult<ItemDrawing> {
        let order_id = normalize_order_id(order_id)?;
        let record = self.require_active(&order_id)?;
        let item = item_at(&record, index)?;

        let drawing_ref = self
            .catalog
            .find_item(&item.current_code)?
            .and_then(|c| c.drawing_ref);
        Ok(ItemDrawing {
            code: item.current_code.clone(),
            drawing_ref,
        })
    }

    /// 选用替代料并设定数量
    ///
    /// 替代料必须在物料行的可用替代料中；
    /// 数量输入无法解析或为负时保持当前替代料数量。
    pub fn choose_alternative(
        &self,
        order_id: &str,
        index: usize,
        alt_code: &str,
        raw_qty: &str,
        operator: &Operator,
    ) -> ApiResult<ItemUpdate> {
        let order_id = normalize_order_id(order_id)?;
        let alt_code = alt_code.trim();
        // None: 锁内沿用当前替代料数量
        let qty = parse_quantity_input(raw_qty).filter(|v| *v >= 0);

        debug!(order_id = %order_id, index, alt_code, ?qty, "选用替代料");
        Ok(self.lifecycle.set_alternative_quantity(
            &order_id,
            index,
            alt_code,
            qty,
            operator,
            timestamp_now(),
        )?)
    }

    /// 保存清单: 全部完成则归档，否则部分完成
    pub fn save(&self, order_id: &str) -> ApiResult<SaveResult> {
        let order_id = normalize_order_id(order_id)?;
        let outcome = self.archive.finalize(&order_id, None, timestamp_now())?;
        let record = outcome.record;

        Ok(SaveResult {
            order_id,
            mode: record.finalize_mode,
            pending: record.pending_count(),
            archived: outcome.history_write.is_some(),
            replaced_history: outcome.history_write == Some(HistoryWrite::Replaced),
            record,
        })
    }

    /// 删除工单的全部分拣记录
    pub fn discard(&self, order_id: &str) -> ApiResult<usize> {
        let order_id = normalize_order_id(order_id)?;
        Ok(self.lifecycle.remove(&order_id)?)
    }

    fn require_active(&self, order_id: &str) -> ApiResult<SeparationRecord> {
        self.lifecycle
            .get_active(order_id)?
            .ok_or_else(|| ApiError::NoActiveSeparation(order_id.to_string()))
    }
}

fn item_at(record: &SeparationRecord, index: usize) -> ApiResult<&ChecklistItem> {
    record.items.get(index).ok_or_else(|| {
        ApiError::InvalidInput(format!(
            "物料行索引越界: order_id={}, index={}, 共{}行",
            record.order_id,
            index,
            record.items.len()
        ))
    })
}

/// 工单号去空格并转大写，空串报错
pub(crate) fn normalize_order_id(order_id: &str) -> ApiResult<String> {
    let id = order_id.trim().to_uppercase();
    if id.is_empty() {
        return Err(ApiError::InvalidInput("工单号不能为空".to_string()));
    }
    Ok(id)
}
