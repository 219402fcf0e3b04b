// ==========================================
// 物料分拣系统 - 分拣记录数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 物料行与审计日志以 JSON 文本列存储
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::{FinalizeMode, SeparationRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::traits::SeparationStore;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    separation_id, order_id, product_code, product_desc, operation_tag,
    operator, started_at, finished_at, finalize_mode,
    items_json, history_json, revision
"#;

// ==========================================
// SeparationRepository - 活动分拣记录仓储
// ==========================================
pub struct SeparationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SeparationRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
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
        let sql = format!("SELECT {} FROM separation {}", SELECT_COLUMNS, where_clause);
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

impl SeparationStore for SeparationRepository {
    fn find_active(&self, order_id: &str) -> RepositoryResult<Option<SeparationRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM separation WHERE order_id = ?1 AND finished_at IS NULL",
            SELECT_COLUMNS
        );
        let raw = conn
            .query_row(&sql, params![order_id], map_raw_row)
            .optional()?;
        raw.map(RawRecordRow::into_record).transpose()
    }

    fn find_finished_partials(&self, order_id: &str) -> RepositoryResult<Vec<SeparationRecord>> {
        self.query_records(
            "WHERE order_id = ?1 AND finished_at IS NOT NULL AND finalize_mode = 'PARTIAL' \
             ORDER BY finished_at DESC",
            Some(order_id),
        )
    }

    fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<SeparationRecord>> {
        self.query_records("WHERE order_id = ?1 ORDER BY started_at ASC", Some(order_id))
    }

    fn list_all(&self) -> RepositoryResult<Vec<SeparationRecord>> {
        self.query_records("ORDER BY order_id ASC, started_at ASC", None)
    }

    fn insert(&self, record: &SeparationRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO separation (
                separation_id, order_id, product_code, product_desc, operation_tag,
                operator, started_at, finished_at, finalize_mode,
                items_json, history_json, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                record.separation_id,
                record.order_id,
                record.product_code,
                record.product_desc,
                record.operation,
                record.operator,
                format_ts(&record.started_at),
                record.finished_at.as_ref().map(format_ts),
                record.finalize_mode.as_str(),
                serde_json::to_string(&record.items)?,
                serde_json::to_string(&record.history)?,
                record.revision,
            ],
        )?;
        Ok(())
    }

    /// 更新分拣记录
    ///
    /// 使用乐观锁 (revision字段) 防止并发更新冲突
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision不匹配 (其他会话已更新)
    /// - `RepositoryError::NotFound`: 记录不存在
    fn update(&self, record: &SeparationRecord) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE separation
               SET product_code = ?1, product_desc = ?2, operation_tag = ?3,
                   operator = ?4, started_at = ?5, finished_at = ?6, finalize_mode = ?7,
                   items_json = ?8, history_json = ?9, revision = revision + 1
             WHERE separation_id = ?10 AND revision = ?11
            "#,
            params![
                record.product_code,
                record.product_desc,
                record.operation,
                record.operator,
                format_ts(&record.started_at),
                record.finished_at.as_ref().map(format_ts),
                record.finalize_mode.as_str(),
                serde_json::to_string(&record.items)?,
                serde_json::to_string(&record.history)?,
                record.separation_id,
                record.revision,
            ],
        )?;

        if rows == 1 {
            return Ok(record.revision + 1);
        }

        // 判断是记录不存在还是revision冲突
        let actual: Option<i64> = conn
            .query_row(
                "SELECT revision FROM separation WHERE separation_id = ?1",
                params![record.separation_id],
                |row| row.get(0),
            )
            .optional()?;

        match actual {
            Some(actual) => Err(RepositoryError::OptimisticLockFailure {
                separation_id: record.separation_id.clone(),
                expected: record.revision,
                actual,
            }),
            None => Err(RepositoryError::NotFound {
                entity: "Separation".to_string(),
                id: record.separation_id.clone(),
            }),
        }
    }

    fn delete_by_order(&self, order_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM separation WHERE order_id = ?1",
            params![order_id],
        )?;
        Ok(rows)
    }
}

// ==========================================
// 行映射（separation / separation_history 共用）
// ==========================================

/// 原始行（JSON 列未解析）
pub(crate) struct RawRecordRow {
    separation_id: String,
    order_id: String,
    product_code: Option<String>,
    product_desc: Option<String>,
    operation: Option<String>,
    operator: Option<String>,
    started_at: String,
    finished_at: Option<String>,
    finalize_mode: String,
    items_json: String,
    history_json: String,
    revision: i64,
}

/// 列顺序需与 SELECT_COLUMNS 一致
pub(crate) fn map_raw_row(row: &Row<'_>) -> rusqlite::Result<RawRecordRow> {
    Ok(RawRecordRow {
        separation_id: row.get(0)?,
        order_id: row.get(1)?,
        product_code: row.get(2)?,
        product_desc: row.get(3)?,
        operation: row.get(4)?,
        operator: row.get(5)?,
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        finalize_mode: row.get(8)?,
        items_json: row.get(9)?,
        history_json: row.get(10)?,
        revision: row.get(11)?,
    })
}

impl RawRecordRow {
    pub(crate) fn into_record(self) -> RepositoryResult<SeparationRecord> {
        let started_at = parse_ts(&self.started_at).ok_or_else(|| RepositoryError::FieldValueError {
            field: "started_at".to_string(),
            message: format!("无法解析时间戳: {}", self.started_at),
        })?;
        let finished_at = match self.finished_at {
            Some(s) => Some(parse_ts(&s).ok_or_else(|| RepositoryError::FieldValueError {
                field: "finished_at".to_string(),
                message: format!("无法解析时间戳: {}", s),
            })?),
            None => None,
        };

        Ok(SeparationRecord {
            separation_id: self.separation_id,
            order_id: self.order_id,
            product_code: self.product_code,
            product_desc: self.product_desc,
            operation: self.operation,
            operator: self.operator,
            started_at,
            finished_at,
            finalize_mode: FinalizeMode::parse(&self.finalize_mode),
            items: serde_json::from_str(&self.items_json)?,
            history: serde_json::from_str(&self.history_json)?,
            revision: self.revision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::domain::timestamp_now;

    fn setup_repo() -> SeparationRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        SeparationRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn make_record(id: &str, order_id: &str) -> SeparationRecord {
        SeparationRecord {
            separation_id: id.to_string(),
            order_id: order_id.to_string(),
            product_code: Some("PROD-AX12".to_string()),
            product_desc: None,
            operation: Some("CORTE".to_string()),
            operator: Some("operador".to_string()),
            started_at: timestamp_now(),
            finished_at: None,
            finalize_mode: FinalizeMode::None,
            items: vec![],
            history: vec![],
            revision: 0,
        }
    }

    #[test]
    fn test_insert_and_find_active() {
        let repo = setup_repo();
        let rec = make_record("s1", "OP-1001");
        repo.insert(&rec).unwrap();

        let found = repo.find_active("OP-1001").unwrap().unwrap();
        assert_eq!(found, rec);
        assert!(repo.find_active("OP-1002").unwrap().is_none());
    }

    #[test]
    fn test_second_active_record_rejected() {
        let repo = setup_repo();
        repo.insert(&make_record("s1", "OP-1001")).unwrap();
        let err = repo.insert(&make_record("s2", "OP-1001")).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_update_optimistic_lock() {
        let repo = setup_repo();
        let rec = make_record("s1", "OP-1001");
        repo.insert(&rec).unwrap();

        let mut first = rec.clone();
        first.operator = Some("outro".to_string());
        assert_eq!(repo.update(&first).unwrap(), 1);

        // 旧 revision 再次写入 -> 冲突
        let err = repo.update(&rec).unwrap_err();
        match err {
            RepositoryError::OptimisticLockFailure { expected, actual, .. } => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("Expected OptimisticLockFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_finished_partials_sorted_and_delete() {
        let repo = setup_repo();
        let base = timestamp_now();

        let mut older = make_record("s1", "OP-1001");
        older.finished_at = Some(base);
        older.finalize_mode = FinalizeMode::Partial;
        let mut newer = make_record("s2", "OP-1001");
        newer.finished_at = Some(base + chrono::Duration::seconds(5));
        newer.finalize_mode = FinalizeMode::Partial;
        repo.insert(&older).unwrap();
        repo.insert(&newer).unwrap();
        repo.insert(&make_record("s3", "OP-1001")).unwrap();

        let partials = repo.find_finished_partials("OP-1001").unwrap();
        assert_eq!(partials.len(), 2);
        assert_eq!(partials[0].separation_id, "s2");

        assert_eq!(repo.delete_by_order("OP-1001").unwrap(), 3);
        assert!(repo.find_by_order("OP-1001").unwrap().is_empty());
    }
}
