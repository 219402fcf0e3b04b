// ==========================================
// 物料分拣系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::api::{QueryApi, ReportApi, SeparationApi};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{ArchiveTransition, OrderLockRegistry, SeparationLifecycle};
use crate::i18n;
use crate::importer::CsvImporter;
use crate::repository::{
    ActionLogRepository, CatalogRepository, HistoryRepository, OrderRepository,
    SeparationRepository,
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "MATERIAL_SEPARATION_DB_PATH";

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 分拣记录生命周期（持有工单锁注册表）
    pub lifecycle: Arc<SeparationLifecycle>,

    /// 分拣清单API
    pub separation_api: Arc<SeparationApi>,

    /// 检索 / 报表列表API
    pub query_api: Arc<QueryApi>,

    /// 报表明细与导出API
    pub report_api: Arc<ReportApi>,

    /// CSV 导入
    pub importer: Arc<CsvImporter>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 参考数据仓储（演示数据 / 导入用）
    pub order_repo: Arc<OrderRepository>,
    pub catalog_repo: Arc<CatalogRepository>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化 schema
    /// 2. 初始化所有Repository与引擎
    /// 3. 按配置设置界面语言
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let order_repo = Arc::new(OrderRepository::new(conn.clone()));
        let catalog_repo = Arc::new(CatalogRepository::new(conn.clone()));
        let separation_repo = Arc::new(SeparationRepository::new(conn.clone()));
        let history_repo = Arc::new(HistoryRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(conn));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let defaults = config_manager
            .get_checklist_defaults()
            .map_err(|e| format!("读取清单默认值失败: {}", e))?;

        let lifecycle = Arc::new(
            SeparationLifecycle::new(
                order_repo.clone(),
                catalog_repo.clone(),
                separation_repo.clone(),
                Arc::new(OrderLockRegistry::new()),
            )
            .with_action_log(action_log_repo.clone())
            .with_defaults(defaults),
        );
        let archive = Arc::new(ArchiveTransition::new(
            lifecycle.clone(),
            history_repo.clone(),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let separation_api = Arc::new(SeparationApi::new(
            lifecycle.clone(),
            archive,
            catalog_repo.clone(),
        ));
        let query_api = Arc::new(QueryApi::new(
            order_repo.clone(),
            separation_repo,
            history_repo.clone(),
        ));
        let report_api = Arc::new(ReportApi::new(
            history_repo,
            catalog_repo.clone(),
            query_api.clone(),
        ));
        let importer = Arc::new(
            CsvImporter::new(order_repo.clone(), catalog_repo.clone())
                .with_action_log(action_log_repo.clone()),
        );

        match config_manager.get_locale() {
            Ok(locale) if i18n::is_supported(&locale) => i18n::set_locale(&locale),
            Ok(locale) => tracing::warn!(locale = %locale, "不支持的界面语言，保持默认"),
            Err(e) => tracing::warn!(error = %e, "读取界面语言失败，保持默认"),
        }

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            lifecycle,
            separation_api,
            query_api,
            report_api,
            importer,
            config_manager,
            order_repo,
            catalog_repo,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先读取环境变量 `MATERIAL_SEPARATION_DB_PATH`，
/// 否则使用用户数据目录下的 material-separation/material_separation.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./material_separation.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("material-separation");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("material_separation.db");
        }
    }
    path.to_string_lossy().to_string()
}
