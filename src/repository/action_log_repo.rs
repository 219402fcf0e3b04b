// ==========================================
// 物料分拣系统 - 操作日志数据仓储
// ==========================================
// 对齐: action_log 表
// 红线: 生命周期迁移均需记录（写入失败不影响业务，由调用方告警）
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入,返回action_id
    /// - `Err(...)`: 数据库错误
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, order_id, action_type, action_ts, actor,
                payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                log.action_id,
                log.order_id,
                log.action_type,
                format_ts(&log.action_ts),
                log.actor,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按工单查询日志（时间倒序）
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, order_id, action_type, action_ts, actor, payload_json, detail
              FROM action_log
             WHERE order_id = ?1
             ORDER BY action_ts DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![order_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(action_id, order_id, action_type, ts, actor, payload, detail)| {
                    let action_ts =
                        parse_ts(&ts).ok_or_else(|| RepositoryError::FieldValueError {
                            field: "action_ts".to_string(),
                            message: format!("无法解析时间戳: {}", ts),
                        })?;
                    let payload_json = match payload {
                        Some(s) => Some(serde_json::from_str(&s)?),
                        None => None,
                    };
                    Ok(ActionLog {
                        action_id,
                        order_id,
                        action_type,
                        action_ts,
                        actor,
                        payload_json,
                        detail,
                    })
                },
            )
            .collect()
    }

    /// 统计某类操作的条数
    pub fn count_by_type(&self, action_type: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE action_type = ?1",
            params![action_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::domain::action_log::ActionType;
    use crate::domain::timestamp_now;
    use serde_json::json;

    fn setup_repo() -> ActionLogRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        ActionLogRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_insert_and_find_by_order() {
        let repo = setup_repo();
        let log = ActionLog::new(
            ActionType::CreateSeparation,
            Some("OP-1001"),
            "operador",
            timestamp_now(),
        )
        .with_payload(json!({ "items": 3 }))
        .with_detail("novo registro");

        let id = repo.insert(&log).unwrap();
        assert_eq!(id, log.action_id);

        let logs = repo.find_by_order("OP-1001").unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action_type, "CREATE_SEPARATION");
        assert_eq!(logs[0].payload_json, Some(json!({ "items": 3 })));
        assert_eq!(logs[0].action_ts, log.action_ts);

        assert!(repo.find_by_order("OP-1002").unwrap().is_empty());
    }

    #[test]
    fn test_count_by_type() {
        let repo = setup_repo();
        let now = timestamp_now();
        repo.insert(&ActionLog::new(ActionType::ImportCatalog, None, "system", now))
            .unwrap();
        repo.insert(&ActionLog::new(ActionType::ImportCatalog, None, "system", now))
            .unwrap();

        assert_eq!(repo.count_by_type("IMPORT_CATALOG").unwrap(), 2);
        assert_eq!(repo.count_by_type("IMPORT_ORDERS").unwrap(), 0);
    }
}
