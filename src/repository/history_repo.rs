// ==========================================
// 物料分拣系统 - 分拣历史数据仓储
// ==========================================
// 对齐: separation_history 表 (PK: order_id + finished_at)
// 红线: 历史记录只写入/覆盖同键，不做其他修改
// ==========================================

use crate::db::format_ts;
use crate::domain::SeparationRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::separation_repo::{map_raw_row, RawRecordRow};
use crate::repository::traits::{HistoryStore, HistoryWrite};
use chrono::Utc;
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// revision 列在历史表中不存在，固定为 0
const SELECT_COLUMNS: &str = r#"
    separation_id, order_id, product_code, product_desc, operation_tag,
    operator, started_at, finished_at, finalize_mode,
    items_json, history_json, 0 AS revision
"#;

// ==========================================
// HistoryRepository - 分拣历史仓储
// ==========================================
pub struct HistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl HistoryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn query_records(
        &self,
        where_clause: &str,
        order_id: Option<&str>,
    ) -> RepositoryResult<Vec<SeparationRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM separation_history {}",
            SELECT_COLUMNS, where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = match order_id {
            Some(id) => stmt
                .query_map(params![id], map_raw_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], map_raw_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        rows.into_iter().map(RawRecordRow::into_record).collect()
    }
}

/// 在事务内写入历史记录（同 order_id + finished_at 覆盖）
fn upsert_in_tx(tx: &Transaction<'_>, record: &SeparationRecord) -> RepositoryResult<HistoryWrite> {
    let finished_at = record
        .finished_at
        .as_ref()
        .ok_or_else(|| RepositoryError::FieldValueError {
            field: "finished_at".to_string(),
            message: format!("未完成的记录不能归档: order_id={}", record.order_id),
        })?;
    let finished_at = format_ts(finished_at);

    let existed: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM separation_history WHERE order_id = ?1 AND finished_at = ?2)",
        params![record.order_id, finished_at],
        |row| row.get(0),
    )?;

    tx.execute(
        r#"
        INSERT OR REPLACE INTO separation_history (
            order_id, finished_at, separation_id, product_code, product_desc,
            operation_tag, operator, started_at, finalize_mode,
            items_json, history_json, archived_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            record.order_id,
            finished_at,
            record.separation_id,
            record.product_code,
            record.product_desc,
            record.operation,
            record.operator,
            format_ts(&record.started_at),
            record.finalize_mode.as_str(),
            serde_json::to_string(&record.items)?,
            serde_json::to_string(&record.history)?,
            format_ts(&Utc::now()),
        ],
    )?;

    Ok(if existed {
        HistoryWrite::Replaced
    } else {
        HistoryWrite::Inserted
    })
}

impl HistoryStore for HistoryRepository {
    /// 写入历史记录（同 order_id + finished_at 覆盖，幂等）
    fn upsert(&self, record: &SeparationRecord) -> RepositoryResult<HistoryWrite> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let write = upsert_in_tx(&tx, record)?;
        tx.commit()?;
        Ok(write)
    }

    /// 写入历史并删除该工单的全部活动记录（同一事务）
    fn archive_and_remove(
        &self,
        record: &SeparationRecord,
    ) -> RepositoryResult<(HistoryWrite, usize)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let write = upsert_in_tx(&tx, record)?;
        let removed = tx.execute(
            "DELETE FROM separation WHERE order_id = ?1",
            params![record.order_id],
        )?;
        tx.commit()?;
        Ok((write, removed))
    }

    fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<SeparationRecord>> {
        self.query_records(
            "WHERE order_id = ?1 ORDER BY finished_at DESC",
            Some(order_id),
        )
    }

    fn list_all(&self) -> RepositoryResult<Vec<SeparationRecord>> {
        self.query_records("ORDER BY finished_at DESC", None)
    }
}
