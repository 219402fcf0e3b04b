// ==========================================
// 物料分拣系统 - 归档迁移
// ==========================================
// 职责: 全部完成的记录写入历史并从活动存储移除
// 红线: 完成 / 写历史 / 删除在同一次工单锁内执行
// 说明: TOTAL 的写历史与删除活动记录在同一事务提交，任一失败时活动记录保持进行中
// ==========================================

use crate::domain::{ActionLog, ActionType, FinalizeMode, SeparationRecord};
use crate::engine::error::SeparationResult;
use crate::engine::lifecycle::SeparationLifecycle;
use crate::repository::{HistoryStore, HistoryWrite};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

/// 完成结果
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub record: SeparationRecord,
    /// 仅 TOTAL 时为 Some
    pub history_write: Option<HistoryWrite>,
    /// 归档后删除的活动记录数
    pub removed: usize,
}

impl FinalizeOutcome {
    pub fn is_archived(&self) -> bool {
        self.history_write.is_some()
    }
}

// ==========================================
// ArchiveTransition
// ==========================================
pub struct ArchiveTransition {
    lifecycle: Arc<SeparationLifecycle>,
    history: Arc<dyn HistoryStore>,
}

impl ArchiveTransition {
    pub fn new(lifecycle: Arc<SeparationLifecycle>, history: Arc<dyn HistoryStore>) -> Self {
        Self { lifecycle, history }
    }

    /// 完成记录；TOTAL 时归档
    ///
    /// PARTIAL 只完成，不写历史、不删除。
    #[instrument(skip_all, fields(order_id = %order_id, requested = ?requested))]
    pub fn finalize(
        &self,
        order_id: &str,
        requested: Option<FinalizeMode>,
        now: DateTime<Utc>,
    ) -> SeparationResult<FinalizeOutcome> {
        self.lifecycle.locks().with_order(order_id, |scope| {
            let closed = self.lifecycle.close_locked(scope, requested, now)?;

            if closed.finalize_mode != FinalizeMode::Total {
                let record = self.lifecycle.commit_finalized(closed, now)?;
                return Ok(FinalizeOutcome {
                    record,
                    history_write: None,
                    removed: 0,
                });
            }

            let (history_write, removed) = self.history.archive_and_remove(&closed)?;
            self.lifecycle
                .log_finalize(ActionType::FinalizeTotal, &closed, now);
            self.lifecycle.log_removed(order_id, removed, now);
            info!(
                order_id,
                separation_id = %closed.separation_id,
                ?history_write,
                removed,
                "分拣记录已归档"
            );
            self.lifecycle.log_action(
                ActionLog::new(
                    ActionType::ArchiveSeparation,
                    Some(order_id),
                    closed.operator.as_deref().unwrap_or("system"),
                    now,
                )
                .with_payload(json!({
                    "separation_id": closed.separation_id,
                    "replaced": history_write == HistoryWrite::Replaced,
                })),
            );

            Ok(FinalizeOutcome {
                record: closed,
                history_write: Some(history_write),
                removed,
            })
        })
    }

    /// 全部完成并归档；仍有待分拣物料时返回 FinalizeModeMismatch
    pub fn finalize_total(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> SeparationResult<FinalizeOutcome> {
        self.finalize(order_id, Some(FinalizeMode::Total), now)
    }

    /// 重新写入一条已完成的历史记录（同键覆盖，幂等）
    pub fn archive_record(&self, record: &SeparationRecord) -> SeparationResult<HistoryWrite> {
        Ok(self.history.upsert(record)?)
    }
}
