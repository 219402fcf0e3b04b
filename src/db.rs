// ==========================================
// 物料分拣系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表语句集中在此处（幂等）
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间戳存储格式（UTC，微秒精度，字典序 = 时间序）
pub const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// 日期存储格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS production_order (
    order_id TEXT PRIMARY KEY,
    product_code TEXT NOT NULL,
    product_desc TEXT NOT NULL,
    operation_tag TEXT,
    status TEXT NOT NULL DEFAULT 'ativa',
    created_date TEXT,
    required_items_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS catalog_item (
    code TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    unit TEXT NOT NULL,
    location TEXT NOT NULL,
    drawing_ref TEXT
);

CREATE TABLE IF NOT EXISTS catalog_alternative (
    base_code TEXT NOT NULL,
    alt_code TEXT NOT NULL,
    seq_no INTEGER NOT NULL,
    PRIMARY KEY (base_code, alt_code)
);

CREATE TABLE IF NOT EXISTS separation (
    separation_id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL,
    product_code TEXT,
    product_desc TEXT,
    operation_tag TEXT,
    operator TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    finalize_mode TEXT NOT NULL DEFAULT 'NONE'
        CHECK (finalize_mode IN ('NONE', 'TOTAL', 'PARTIAL')),
    items_json TEXT NOT NULL,
    history_json TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 0
);

-- 每个工单至多一条进行中的记录
CREATE UNIQUE INDEX IF NOT EXISTS uq_separation_active_order
    ON separation(order_id) WHERE finished_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_separation_order ON separation(order_id, finished_at);

CREATE TABLE IF NOT EXISTS separation_history (
    order_id TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    separation_id TEXT NOT NULL,
    product_code TEXT,
    product_desc TEXT,
    operation_tag TEXT,
    operator TEXT,
    started_at TEXT NOT NULL,
    finalize_mode TEXT NOT NULL,
    items_json TEXT NOT NULL,
    history_json TEXT NOT NULL,
    archived_at TEXT NOT NULL,
    PRIMARY KEY (order_id, finished_at)
);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    order_id TEXT,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    payload_json TEXT,
    detail TEXT
);
CREATE INDEX IF NOT EXISTS idx_action_log_order ON action_log(order_id, action_ts DESC);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）并登记 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// 时间格式转换
// ==========================================

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn format_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}
