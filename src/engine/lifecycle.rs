// ==========================================
// 物料分拣系统 - 分拣记录生命周期
// ==========================================
// 状态机 (按工单):
//   NoRecord → Active → FinishedTotal (归档, 终态)
//                     → FinishedPartial → Active (重开)
// 红线1: 每个工单至多一条进行中的记录
// 红线2: 所有读-改-写在工单锁内执行
// 红线3: 操作日志写入失败只告警，不影响业务
// ==========================================

use crate::domain::{
    timestamp_now, ActionLog, ActionType, CatalogItem, FinalizeMode, Operator, SeparationRecord,
};
use crate::engine::checklist_builder::{ChecklistBuilder, ChecklistDefaults};
use crate::engine::error::{SeparationError, SeparationResult};
use crate::engine::item_reconciler::{ItemReconciler, ReconcileOutcome};
use crate::engine::order_lock::{OrderLockRegistry, OrderScope};
use crate::repository::{ActionLogRepository, CatalogSource, OrderSource, SeparationStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// ensure() 的路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnsureOutcome {
    Existing, // 已有进行中的记录
    Reopened, // 重开最近一次部分完成的记录
    Created,  // 新建
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsureResult {
    pub record: SeparationRecord,
    pub outcome: EnsureOutcome,
}

/// 物料行修改结果
#[derive(Debug, Clone, Serialize)]
pub struct ItemUpdate {
    pub record: SeparationRecord,
    pub outcome: ReconcileOutcome,
}

// ==========================================
// SeparationLifecycle
// ==========================================
pub struct SeparationLifecycle {
    orders: Arc<dyn OrderSource>,
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn SeparationStore>,
    action_log_repo: Option<Arc<ActionLogRepository>>,
    locks: Arc<OrderLockRegistry>,
    builder: ChecklistBuilder,
    reconciler: ItemReconciler,
    defaults: ChecklistDefaults,
}

impl SeparationLifecycle {
    pub fn new(
        orders: Arc<dyn OrderSource>,
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn SeparationStore>,
        locks: Arc<OrderLockRegistry>,
    ) -> Self {
        Self {
            orders,
            catalog,
            store,
            action_log_repo: None,
            locks,
            builder: ChecklistBuilder::new(),
            reconciler: ItemReconciler::new(),
            defaults: ChecklistDefaults::default(),
        }
    }

    pub fn with_action_log(mut self, repo: Arc<ActionLogRepository>) -> Self {
        self.action_log_repo = Some(repo);
        self
    }

    pub fn with_defaults(mut self, defaults: ChecklistDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn locks(&self) -> &Arc<OrderLockRegistry> {
        &self.locks
    }

    pub fn orders(&self) -> &Arc<dyn OrderSource> {
        &self.orders
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 进行中的记录快照（不加锁）
    pub fn get_active(&self, order_id: &str) -> SeparationResult<Option<SeparationRecord>> {
        Ok(self.store.find_active(order_id)?)
    }

    // ==========================================
    // ensure
    // ==========================================

    /// 获取工单的进行中记录；必要时重开或新建
    ///
    /// # 错误
    /// - `OrderNotFound`: 需要新建但工单不存在（不创建任何记录）
    #[instrument(skip_all, fields(order_id = %order_id, operator = %operator.username))]
    pub fn ensure(
        &self,
        order_id: &str,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> SeparationResult<EnsureResult> {
        self.locks
            .with_order(order_id, |scope| self.ensure_locked(scope, operator, now))
    }

    pub(crate) fn ensure_locked(
        &self,
        scope: &OrderScope<'_>,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> SeparationResult<EnsureResult> {
        let order_id = scope.order_id();

        // === 步骤 1: 已有进行中的记录 ===
        if let Some(record) = self.store.find_active(order_id)? {
            debug!(order_id, separation_id = %record.separation_id, "复用进行中的分拣记录");
            return Ok(EnsureResult {
                record,
                outcome: EnsureOutcome::Existing,
            });
        }

        // === 步骤 2: 重开最近一次部分完成的记录 ===
        let latest_partial = self
            .store
            .find_finished_partials(order_id)?
            .into_iter()
            .max_by_key(|r| r.finished_at);
        if let Some(mut record) = latest_partial {
            record.finished_at = None;
            record.finalize_mode = FinalizeMode::None;
            let mut newly_locked = 0usize;
            for item in record.items.iter_mut().filter(|i| i.confirmed) {
                if !item.locked {
                    newly_locked += 1;
                }
                item.locked = true;
            }
            record.revision = self.store.update(&record)?;

            info!(
                order_id,
                separation_id = %record.separation_id,
                newly_locked,
                "重开部分完成的分拣记录"
            );
            self.log_action(
                ActionLog::new(
                    ActionType::ReopenSeparation,
                    Some(order_id),
                    &operator.username,
                    now,
                )
                .with_payload(json!({
                    "separation_id": record.separation_id,
                    "locked_items": record.items.iter().filter(|i| i.locked).count(),
                })),
            );
            return Ok(EnsureResult {
                record,
                outcome: EnsureOutcome::Reopened,
            });
        }

        // === 步骤 3: 新建 ===
        let order = self
            .orders
            .find_order(order_id)?
            .ok_or_else(|| SeparationError::OrderNotFound(order_id.to_string()))?;

        let mut catalog: HashMap<String, CatalogItem> = HashMap::new();
        for req in &order.required_items {
            if catalog.contains_key(&req.code) {
                continue;
            }
            if let Some(item) = self.catalog.find_item(&req.code)? {
                catalog.insert(req.code.clone(), item);
            }
        }
        let alternatives = self.catalog.alternatives()?;

        let items = self
            .builder
            .build(Some(&order), &catalog, &alternatives, &self.defaults)
            .ok_or_else(|| SeparationError::OrderNotFound(order_id.to_string()))?;

        let record = SeparationRecord {
            separation_id: uuid::Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            product_code: Some(order.product_code.clone()),
            product_desc: Some(order.product_desc.clone()),
            operation: order.operation.clone(),
            operator: Some(operator.username.clone()),
            started_at: now,
            finished_at: None,
            finalize_mode: FinalizeMode::None,
            items,
            history: Vec::new(),
            revision: 0,
        };
        self.store.insert(&record)?;

        info!(
            order_id,
            separation_id = %record.separation_id,
            items = record.items.len(),
            "新建分拣记录"
        );
        self.log_action(
            ActionLog::new(
                ActionType::CreateSeparation,
                Some(order_id),
                &operator.username,
                now,
            )
            .with_payload(json!({
                "separation_id": record.separation_id,
                "items": record.items.len(),
            })),
        );

        Ok(EnsureResult {
            record,
            outcome: EnsureOutcome::Created,
        })
    }

    // ==========================================
    // 物料行修改
    // ==========================================

    /// 设定标准料已分拣数量
    pub fn set_official_quantity(
        &self,
        order_id: &str,
        index: usize,
        qty: i64,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> SeparationResult<ItemUpdate> {
        self.locks.with_order(order_id, |scope| {
            self.mutate_item_locked(scope, index, |reconciler, record| {
                let item = &mut record.items[index];
                Ok(reconciler.set_official_quantity(item, qty, &operator.username, now))
            })
        })
    }

    /// 选用替代料并设定已分拣数量
    ///
    /// `qty = None` 时沿用锁内读取到的当前替代料数量；
    /// 替代料必须在映射中且存在于目录，否则返回 `AlternativeNotAllowed`。
    pub fn set_alternative_quantity(
        &self,
        order_id: &str,
        index: usize,
        alt_code: &str,
        qty: Option<i64>,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> SeparationResult<ItemUpdate> {
        self.locks.with_order(order_id, |scope| {
            self.mutate_item_locked(scope, index, |reconciler, record| {
                let SeparationRecord { items, history, .. } = record;
                let item = &mut items[index];
                if item.locked {
                    return Ok(ReconcileOutcome::IgnoredLocked);
                }
                self.ensure_alternative_allowed(&item.base_code, alt_code)?;

                let qty = qty.unwrap_or(item.attended_alt);
                Ok(reconciler.set_alternative_quantity(
                    item,
                    history,
                    alt_code,
                    qty,
                    &operator.username,
                    now,
                ))
            })
        })
    }

    fn mutate_item_locked<F>(
        &self,
        scope: &OrderScope<'_>,
        index: usize,
        apply: F,
    ) -> SeparationResult<ItemUpdate>
    where
        F: FnOnce(&ItemReconciler, &mut SeparationRecord) -> SeparationResult<ReconcileOutcome>,
    {
        let order_id = scope.order_id();
        let mut record = self.require_active(order_id)?;
        if index >= record.items.len() {
            return Err(SeparationError::ItemIndexOutOfRange {
                order_id: order_id.to_string(),
                index,
                len: record.items.len(),
            });
        }

        let before_item = record.items[index].clone();
        let before_history = record.history.len();
        let outcome = apply(&self.reconciler, &mut record)?;

        let changed =
            record.items[index] != before_item || record.history.len() != before_history;
        if changed {
            record.revision = self.store.update(&record)?;
        }

        debug!(
            order_id,
            index,
            ?outcome,
            changed,
            remaining = record.items[index].remaining(),
            "物料行数量已核算"
        );
        Ok(ItemUpdate { record, outcome })
    }

    // ==========================================
    // finalize
    // ==========================================

    /// 完成分拣记录（不归档）
    ///
    /// `requested = None` 时由记录状态派生模式；
    /// 指定的模式与派生结果不一致时返回 `FinalizeModeMismatch`。
    #[instrument(skip_all, fields(order_id = %order_id, requested = ?requested))]
    pub fn finalize(
        &self,
        order_id: &str,
        requested: Option<FinalizeMode>,
        now: DateTime<Utc>,
    ) -> SeparationResult<SeparationRecord> {
        self.locks
            .with_order(order_id, |scope| self.finalize_locked(scope, requested, now))
    }

    pub(crate) fn finalize_locked(
        &self,
        scope: &OrderScope<'_>,
        requested: Option<FinalizeMode>,
        now: DateTime<Utc>,
    ) -> SeparationResult<SeparationRecord> {
        let record = self.close_locked(scope, requested, now)?;
        self.commit_finalized(record, now)
    }

    /// 写入已完成的记录（不归档）
    pub(crate) fn commit_finalized(
        &self,
        mut record: SeparationRecord,
        now: DateTime<Utc>,
    ) -> SeparationResult<SeparationRecord> {
        record.revision = self.store.update(&record)?;

        let action_type = match record.finalize_mode {
            FinalizeMode::Total => ActionType::FinalizeTotal,
            _ => ActionType::FinalizePartial,
        };
        self.log_finalize(action_type, &record, now);
        Ok(record)
    }

    /// 在内存中完成记录（不写库）
    ///
    /// 设置 finished_at / finalize_mode，按模式锁定物料行，补齐工单快照字段。
    pub(crate) fn close_locked(
        &self,
        scope: &OrderScope<'_>,
        requested: Option<FinalizeMode>,
        now: DateTime<Utc>,
    ) -> SeparationResult<SeparationRecord> {
        let order_id = scope.order_id();
        let mut record = self.require_active(order_id)?;

        let derived = FinalizeMode::for_record(&record);
        if let Some(requested) = requested {
            if requested != derived {
                return Err(SeparationError::FinalizeModeMismatch {
                    order_id: order_id.to_string(),
                    requested,
                    derived,
                });
            }
        }

        if record.product_code.is_none() || record.product_desc.is_none() {
            if let Some(order) = self.orders.find_order(order_id)? {
                record.product_code = Some(order.product_code);
                record.product_desc = Some(order.product_desc);
                record.operation = order.operation;
            }
        }

        record.finished_at = Some(now);
        record.finalize_mode = derived;
        match derived {
            FinalizeMode::Total => record.items.iter_mut().for_each(|i| i.locked = true),
            _ => record
                .items
                .iter_mut()
                .filter(|i| i.confirmed)
                .for_each(|i| i.locked = true),
        }

        info!(
            order_id,
            separation_id = %record.separation_id,
            mode = %derived,
            pending = record.pending_count(),
            "分拣记录已完成"
        );
        Ok(record)
    }

    pub(crate) fn log_finalize(
        &self,
        action_type: ActionType,
        record: &SeparationRecord,
        now: DateTime<Utc>,
    ) {
        let summary = record.summary();
        self.log_action(
            ActionLog::new(
                action_type,
                Some(&record.order_id),
                record.operator.as_deref().unwrap_or("system"),
                now,
            )
            .with_payload(json!({
                "separation_id": record.separation_id,
                "confirmed": summary.confirmed,
                "total": summary.total,
                "substituted": summary.substituted,
            })),
        );
    }

    // ==========================================
    // remove
    // ==========================================

    /// 删除工单的全部记录（进行中与已完成）
    pub fn remove(&self, order_id: &str) -> SeparationResult<usize> {
        self.locks
            .with_order(order_id, |scope| self.remove_locked(scope, timestamp_now()))
    }

    fn remove_locked(
        &self,
        scope: &OrderScope<'_>,
        now: DateTime<Utc>,
    ) -> SeparationResult<usize> {
        let order_id = scope.order_id();
        let removed = self.store.delete_by_order(order_id)?;
        self.log_removed(order_id, removed, now);
        Ok(removed)
    }

    pub(crate) fn log_removed(&self, order_id: &str, removed: usize, now: DateTime<Utc>) {
        info!(order_id, removed, "删除分拣记录");
        if removed > 0 {
            self.log_action(
                ActionLog::new(ActionType::RemoveSeparation, Some(order_id), "system", now)
                    .with_payload(json!({ "removed": removed })),
            );
        }
    }

    // ==========================================
    // 内部工具
    // ==========================================

    /// 加载进行中的记录；工单未知返回 OrderNotFound，否则 NoActiveSeparation
    fn require_active(&self, order_id: &str) -> SeparationResult<SeparationRecord> {
        if let Some(record) = self.store.find_active(order_id)? {
            return Ok(record);
        }
        if self.orders.find_order(order_id)?.is_none() {
            return Err(SeparationError::OrderNotFound(order_id.to_string()));
        }
        Err(SeparationError::NoActiveSeparation(order_id.to_string()))
    }

    /// 替代料须在当前映射中且目录存在该编码
    fn ensure_alternative_allowed(&self, base_code: &str, alt_code: &str) -> SeparationResult<()> {
        let alternatives = self.catalog.alternatives()?;
        let listed = alternatives
            .alternatives_for(base_code)
            .iter()
            .any(|c| c == alt_code);
        if listed && self.catalog.find_item(alt_code)?.is_some() {
            return Ok(());
        }
        Err(SeparationError::AlternativeNotAllowed {
            base_code: base_code.to_string(),
            alt_code: alt_code.to_string(),
        })
    }

    /// 记录操作日志（失败只告警）
    pub(crate) fn log_action(&self, log: ActionLog) {
        if let Some(repo) = &self.action_log_repo {
            if let Err(e) = repo.insert(&log) {
                warn!(
                    error = %e,
                    action_type = %log.action_type,
                    order_id = ?log.order_id,
                    "记录操作日志失败"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::domain::{Order, RequiredItem};
    use crate::repository::{CatalogRepository, OrderRepository, SeparationRepository};
    use rusqlite::Connection;
    use std::sync::Mutex;

    struct Fixture {
        lifecycle: SeparationLifecycle,
        store: Arc<SeparationRepository>,
        action_logs: Arc<ActionLogRepository>,
    }

    fn setup() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let orders = Arc::new(OrderRepository::new(conn.clone()));
        orders
            .upsert(&Order {
                id: "OP-1001".to_string(),
                product_code: "PROD-AX12".to_string(),
                product_desc: "Conjunto Suporte AX12".to_string(),
                operation: Some("CORTE".to_string()),
                status: "ativa".to_string(),
                created_date: None,
                required_items: vec![
                    RequiredItem::new("MAT-0001", 10),
                    RequiredItem::new("MAT-0002", 24),
                ],
            })
            .unwrap();
        let catalog = Arc::new(CatalogRepository::new(conn.clone()));
        catalog
            .batch_upsert_items(&[CatalogItem {
                code: "MAT-0100".to_string(),
                description: "Parafuso M8x30 Inox".to_string(),
                unit: "PC".to_string(),
                location: "DEP-01 / B-06".to_string(),
                drawing_ref: None,
            }])
            .unwrap();
        catalog
            .replace_alternatives("MAT-0002", &["MAT-0100".to_string()])
            .unwrap();

        let store = Arc::new(SeparationRepository::new(conn.clone()));
        let action_logs = Arc::new(ActionLogRepository::new(conn));
        let lifecycle = SeparationLifecycle::new(
            orders,
            catalog,
            store.clone(),
            Arc::new(OrderLockRegistry::new()),
        )
        .with_action_log(action_logs.clone());

        Fixture {
            lifecycle,
            store,
            action_logs,
        }
    }

    fn op() -> Operator {
        Operator::new("operador")
    }

    #[test]
    fn test_ensure_creates_then_reuses() {
        let fx = setup();
        let now = timestamp_now();

        let first = fx.lifecycle.ensure("OP-1001", &op(), now).unwrap();
        assert_eq!(first.outcome, EnsureOutcome::Created);
        assert_eq!(first.record.items.len(), 2);
        assert_eq!(first.record.operator.as_deref(), Some("operador"));
        // 目录缺失 → 默认值
        assert_eq!(first.record.items[0].unit, "UN");
        assert_eq!(first.record.items[0].location, "-");
        assert_eq!(first.record.items[1].alternatives, vec!["MAT-0100"]);

        let second = fx.lifecycle.ensure("OP-1001", &op(), now).unwrap();
        assert_eq!(second.outcome, EnsureOutcome::Existing);
        assert_eq!(second.record.separation_id, first.record.separation_id);
        assert_eq!(fx.store.find_by_order("OP-1001").unwrap().len(), 1);

        let logs = fx.action_logs.find_by_order("OP-1001").unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action_type, "CREATE_SEPARATION");
    }

    #[test]
    fn test_ensure_unknown_order_creates_nothing() {
        let fx = setup();
        let err = fx
            .lifecycle
            .ensure("OP-9999", &op(), timestamp_now())
            .unwrap_err();
        assert!(matches!(err, SeparationError::OrderNotFound(_)));
        assert!(fx.store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_item_mutations_and_index_check() {
        let fx = setup();
        let now = timestamp_now();
        fx.lifecycle.ensure("OP-1001", &op(), now).unwrap();

        let upd = fx
            .lifecycle
            .set_official_quantity("OP-1001", 0, 10, &op(), now)
            .unwrap();
        assert_eq!(upd.outcome, ReconcileOutcome::Applied { confirmed: true });
        assert_eq!(upd.record.revision, 1);

        // 相同数量不重复写库
        let upd = fx
            .lifecycle
            .set_official_quantity("OP-1001", 0, 10, &op(), now)
            .unwrap();
        assert_eq!(upd.record.revision, 1);

        let err = fx
            .lifecycle
            .set_official_quantity("OP-1001", 7, 1, &op(), now)
            .unwrap_err();
        assert!(matches!(
            err,
            SeparationError::ItemIndexOutOfRange { index: 7, len: 2, .. }
        ));
    }

    #[test]
    fn test_alternative_quantity_keep_current_and_allowed_codes() {
        let fx = setup();
        let now = timestamp_now();
        fx.lifecycle.ensure("OP-1001", &op(), now).unwrap();

        let upd = fx
            .lifecycle
            .set_alternative_quantity("OP-1001", 1, "MAT-0100", Some(7), &op(), now)
            .unwrap();
        assert_eq!(upd.record.items[1].attended_alt, 7);

        // None 沿用当前数量，仍登记一次替代事件
        let upd = fx
            .lifecycle
            .set_alternative_quantity("OP-1001", 1, "MAT-0100", None, &op(), now)
            .unwrap();
        assert_eq!(upd.record.items[1].attended_alt, 7);
        assert_eq!(upd.record.history.len(), 2);

        let err = fx
            .lifecycle
            .set_alternative_quantity("OP-1001", 0, "MAT-0100", Some(1), &op(), now)
            .unwrap_err();
        assert!(matches!(
            err,
            SeparationError::AlternativeNotAllowed { ref base_code, .. } if base_code == "MAT-0001"
        ));
        let record = fx.lifecycle.get_active("OP-1001").unwrap().unwrap();
        assert_eq!(record.items[0].attended_alt, 0);
        assert_eq!(record.history.len(), 2);
    }

    #[test]
    fn test_finalize_partial_then_reopen_locks_confirmed() {
        let fx = setup();
        let now = timestamp_now();
        fx.lifecycle.ensure("OP-1001", &op(), now).unwrap();
        fx.lifecycle
            .set_official_quantity("OP-1001", 0, 10, &op(), now)
            .unwrap();
        fx.lifecycle
            .set_official_quantity("OP-1001", 1, 5, &op(), now)
            .unwrap();

        let finished = fx.lifecycle.finalize("OP-1001", None, now).unwrap();
        assert_eq!(finished.finalize_mode, FinalizeMode::Partial);
        assert!(finished.items[0].locked);
        assert!(!finished.items[1].locked);
        assert!(fx.lifecycle.get_active("OP-1001").unwrap().is_none());

        let reopened = fx.lifecycle.ensure("OP-1001", &op(), now).unwrap();
        assert_eq!(reopened.outcome, EnsureOutcome::Reopened);
        assert!(reopened.record.finished_at.is_none());
        assert_eq!(reopened.record.finalize_mode, FinalizeMode::None);
        assert!(reopened.record.items[0].locked);
        assert!(!reopened.record.items[1].locked);
        assert_eq!(reopened.record.items[1].attended_official, 5);
    }

    #[test]
    fn test_finalize_mode_mismatch_and_no_active() {
        let fx = setup();
        let now = timestamp_now();

        let err = fx.lifecycle.finalize("OP-1001", None, now).unwrap_err();
        assert!(matches!(err, SeparationError::NoActiveSeparation(_)));
        let err = fx.lifecycle.finalize("OP-9999", None, now).unwrap_err();
        assert!(matches!(err, SeparationError::OrderNotFound(_)));

        fx.lifecycle.ensure("OP-1001", &op(), now).unwrap();
        let err = fx
            .lifecycle
            .finalize("OP-1001", Some(FinalizeMode::Total), now)
            .unwrap_err();
        assert!(matches!(
            err,
            SeparationError::FinalizeModeMismatch {
                requested: FinalizeMode::Total,
                derived: FinalizeMode::Partial,
                ..
            }
        ));
        // 记录保持进行中
        assert!(fx.lifecycle.get_active("OP-1001").unwrap().is_some());
    }

    #[test]
    fn test_remove_deletes_all_records() {
        let fx = setup();
        let now = timestamp_now();
        fx.lifecycle.ensure("OP-1001", &op(), now).unwrap();
        fx.lifecycle.finalize("OP-1001", None, now).unwrap();

        assert_eq!(fx.lifecycle.remove("OP-1001").unwrap(), 1);
        assert!(fx.store.find_by_order("OP-1001").unwrap().is_empty());
        assert_eq!(fx.lifecycle.remove("OP-1001").unwrap(), 0);
    }
}
