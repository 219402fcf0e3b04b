// ==========================================
// 物料分拣系统 - 生产工单领域模型
// ==========================================
// 来源: 外部系统 (ERP)，本系统只读
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Order - 生产工单 (OP)
// ==========================================
// 对齐: production_order 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // ===== 主键 =====
    pub id: String, // 工单号, 例如 OP-1001

    // ===== 产品信息 =====
    pub product_code: String,
    pub product_desc: String,
    pub operation: Option<String>, // 工序标签 (CORTE / SOLDAGEM / MONTAGEM ...)

    // ===== 工单属性 =====
    pub status: String,                   // 外部状态 (ativa ...)
    pub created_date: Option<NaiveDate>,  // 创建日期 (检索视图按此过滤)

    // ===== 物料清单 (BOM) =====
    pub required_items: Vec<RequiredItem>,
}

/// BOM 行: 物料编码 + 需求数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredItem {
    pub code: String,
    pub quantity: i64,
}

impl RequiredItem {
    pub fn new(code: impl Into<String>, quantity: i64) -> Self {
        Self {
            code: code.into(),
            quantity,
        }
    }
}

impl Order {
    /// 工序标签，缺失时返回 None
    pub fn operation_tag(&self) -> Option<&str> {
        self.operation.as_deref().filter(|s| !s.trim().is_empty())
    }
}
