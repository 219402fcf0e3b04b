// ==========================================
// 物料分拣系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::ChecklistDefaults;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 默认界面语言
pub const DEFAULT_LOCALE: &str = "pt-BR";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 打开数据库文件创建 ConfigManager
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（存在则覆盖）
    pub fn set_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 全部配置项
    pub fn list_all(&self) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM config_kv")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(pairs)
    }

    // ==========================================
    // 业务配置
    // ==========================================

    /// 清单默认值（目录缺失时使用）
    pub fn get_checklist_defaults(&self) -> RepositoryResult<ChecklistDefaults> {
        let mut defaults = ChecklistDefaults::default();
        if let Some(unit) = self
            .get_value(config_keys::CHECKLIST_DEFAULT_UNIT)?
            .filter(|v| !v.trim().is_empty())
        {
            defaults.unit = unit;
        }
        if let Some(location) = self
            .get_value(config_keys::CHECKLIST_DEFAULT_LOCATION)?
            .filter(|v| !v.trim().is_empty())
        {
            defaults.location = location;
        }
        Ok(defaults)
    }

    /// 界面语言，未配置时为 pt-BR
    pub fn get_locale(&self) -> RepositoryResult<String> {
        Ok(self
            .get_value(config_keys::UI_LOCALE)?
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string()))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 分拣清单
    pub const CHECKLIST_DEFAULT_UNIT: &str = "checklist.default_unit";
    pub const CHECKLIST_DEFAULT_LOCATION: &str = "checklist.default_location";

    // 界面
    pub const UI_LOCALE: &str = "ui.locale";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = setup();
        assert_eq!(config.get_checklist_defaults().unwrap(), ChecklistDefaults::default());
        assert_eq!(config.get_locale().unwrap(), "pt-BR");
    }

    #[test]
    fn test_set_and_override() {
        let config = setup();
        config.set_value(config_keys::CHECKLIST_DEFAULT_UNIT, "KG").unwrap();
        config.set_value(config_keys::CHECKLIST_DEFAULT_UNIT, "PC").unwrap();
        config.set_value(config_keys::UI_LOCALE, "en").unwrap();

        let defaults = config.get_checklist_defaults().unwrap();
        assert_eq!(defaults.unit, "PC");
        assert_eq!(defaults.location, "-");
        assert_eq!(config.get_locale().unwrap(), "en");
        assert_eq!(config.list_all().unwrap().len(), 2);
    }
}
