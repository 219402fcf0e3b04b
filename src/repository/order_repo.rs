// ==========================================
// 物料分拣系统 - 生产工单数据仓储
// ==========================================
// 对齐: production_order 表
// 约束: BOM 行以 JSON 文本列存储（保持行顺序）
// ==========================================

use crate::db::{format_date, parse_date};
use crate::domain::{Order, RequiredItem};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::traits::OrderSource;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// OrderRepository - 工单仓储
// ==========================================
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

type OrderRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
);

fn map_order_row(row: &Row<'_>) -> rusqlite::Result<OrderRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn order_from_row(raw: OrderRow) -> RepositoryResult<Order> {
    let (id, product_code, product_desc, operation, status, created_date, items_json) = raw;
    let required_items: Vec<RequiredItem> = serde_json::from_str(&items_json)?;
    Ok(Order {
        id,
        product_code,
        product_desc,
        operation,
        status,
        created_date: created_date.as_deref().and_then(parse_date),
        required_items,
    })
}

impl OrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或覆盖工单（导入 / 演示数据用）
    pub fn upsert(&self, order: &Order) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO production_order (
                order_id, product_code, product_desc, operation_tag,
                status, created_date, required_items_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                order.id,
                order.product_code,
                order.product_desc,
                order.operation,
                order.status,
                order.created_date.as_ref().map(format_date),
                serde_json::to_string(&order.required_items)?,
            ],
        )?;
        Ok(())
    }

    /// 批量写入（单事务）
    pub fn batch_upsert(&self, orders: &[Order]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for order in orders {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO production_order (
                    order_id, product_code, product_desc, operation_tag,
                    status, created_date, required_items_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    order.id,
                    order.product_code,
                    order.product_desc,
                    order.operation,
                    order.status,
                    order.created_date.as_ref().map(format_date),
                    serde_json::to_string(&order.required_items)?,
                ],
            )?;
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }
}

impl OrderSource for OrderRepository {
    fn find_order(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                r#"
                SELECT order_id, product_code, product_desc, operation_tag,
                       status, created_date, required_items_json
                  FROM production_order
                 WHERE order_id = ?1
                "#,
                params![order_id],
                map_order_row,
            )
            .optional()?;
        raw.map(order_from_row).transpose()
    }

    fn list_orders(&self) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT order_id, product_code, product_desc, operation_tag,
                   status, created_date, required_items_json
              FROM production_order
             ORDER BY order_id ASC
            "#,
        )?;
        let rows = stmt
            .query_map([], map_order_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(order_from_row).collect()
    }
}
