// ==========================================
// 物料分拣系统 - 物料目录数据仓储
// ==========================================
// 对齐: catalog_item / catalog_alternative 表
// ==========================================

use crate::domain::{AlternativesMap, CatalogItem};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::traits::CatalogSource;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// CatalogRepository - 物料目录仓储
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

fn map_item_row(row: &Row<'_>) -> rusqlite::Result<CatalogItem> {
    Ok(CatalogItem {
        code: row.get(0)?,
        description: row.get(1)?,
        unit: row.get(2)?,
        location: row.get(3)?,
        drawing_ref: row.get(4)?,
    })
}

impl CatalogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量写入目录条目（单事务，覆盖同编码）
    pub fn batch_upsert_items(&self, items: &[CatalogItem]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for item in items {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO catalog_item (code, description, unit, location, drawing_ref)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    item.code,
                    item.description,
                    item.unit,
                    item.location,
                    item.drawing_ref
                ],
            )?;
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }

    /// 替换某标准料的全部替代料（保持给定顺序）
    pub fn replace_alternatives(&self, base_code: &str, alt_codes: &[String]) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM catalog_alternative WHERE base_code = ?1",
            params![base_code],
        )?;
        let mut seq_no: i64 = 0;
        for alt in alt_codes {
            // 重复编码忽略
            let inserted = tx.execute(
                r#"
                INSERT OR IGNORE INTO catalog_alternative (base_code, alt_code, seq_no)
                VALUES (?1, ?2, ?3)
                "#,
                params![base_code, alt, seq_no],
            )?;
            if inserted > 0 {
                seq_no += 1;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl CatalogSource for CatalogRepository {
    fn find_item(&self, code: &str) -> RepositoryResult<Option<CatalogItem>> {
        let conn = self.get_conn()?;
        let item = conn
            .query_row(
                r#"
                SELECT code, description, unit, location, drawing_ref
                  FROM catalog_item
                 WHERE code = ?1
                "#,
                params![code],
                map_item_row,
            )
            .optional()?;
        Ok(item)
    }

    fn list_items(&self) -> RepositoryResult<Vec<CatalogItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT code, description, unit, location, drawing_ref FROM catalog_item ORDER BY code",
        )?;
        let items = stmt
            .query_map([], map_item_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn alternatives(&self) -> RepositoryResult<AlternativesMap> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT base_code, alt_code FROM catalog_alternative ORDER BY base_code, seq_no",
        )?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup_repo() -> CatalogRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        CatalogRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn item(code: &str, desc: &str) -> CatalogItem {
        CatalogItem {
            code: code.to_string(),
            description: desc.to_string(),
            unit: "PC".to_string(),
            location: "DEP-01 / A-01".to_string(),
            drawing_ref: None,
        }
    }

    #[test]
    fn test_items_upsert_and_lookup() {
        let repo = setup_repo();
        repo.batch_upsert_items(&[item("MAT-0002", "Parafuso"), item("MAT-0001", "Chapa")])
            .unwrap();

        assert_eq!(repo.find_item("MAT-0001").unwrap().unwrap().description, "Chapa");
        assert!(repo.find_item("MAT-9999").unwrap().is_none());
        assert_eq!(repo.list_items().unwrap()[0].code, "MAT-0001");
    }

    #[test]
    fn test_alternatives_keep_order() {
        let repo = setup_repo();
        repo.replace_alternatives(
            "MAT-0002",
            &["MAT-0101".to_string(), "MAT-0100".to_string(), "MAT-0101".to_string()],
        )
        .unwrap();

        let map = repo.alternatives().unwrap();
        assert_eq!(map.alternatives_for("MAT-0002"), ["MAT-0101", "MAT-0100"]);

        // 替换而非追加
        repo.replace_alternatives("MAT-0002", &["MAT-0100".to_string()])
            .unwrap();
        let map = repo.alternatives().unwrap();
        assert_eq!(map.alternatives_for("MAT-0002"), ["MAT-0100"]);
    }
}
