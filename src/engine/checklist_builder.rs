// ==========================================
// 物料分拣系统 - 分拣清单构建器
// ==========================================
// 职责: (工单, 目录, 替代料映射, 默认值) → 有序清单行
// 红线: 纯函数，不访问数据库
// ==========================================

use crate::domain::{AlternativesMap, CatalogItem, ChecklistItem, Order};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 目录缺失时使用的默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistDefaults {
    pub unit: String,
    pub location: String,
}

impl Default for ChecklistDefaults {
    fn default() -> Self {
        Self {
            unit: "UN".to_string(),
            location: "-".to_string(),
        }
    }
}

// ==========================================
// ChecklistBuilder
// ==========================================
#[derive(Debug, Default)]
pub struct ChecklistBuilder;

impl ChecklistBuilder {
    pub fn new() -> Self {
        Self
    }

    /// 构建分拣清单
    ///
    /// # 返回
    /// - `None`: 工单不存在（调用方负责返回 OrderNotFound）
    /// - `Some(items)`: 与 BOM 行一一对应、顺序一致
    pub fn build(
        &self,
        order: Option<&Order>,
        catalog: &HashMap<String, CatalogItem>,
        alternatives: &AlternativesMap,
        defaults: &ChecklistDefaults,
    ) -> Option<Vec<ChecklistItem>> {
        let order = order?;

        let items = order
            .required_items
            .iter()
            .map(|req| {
                let found = catalog.get(&req.code);
                ChecklistItem {
                    base_code: req.code.clone(),
                    current_code: req.code.clone(),
                    description: found
                        .map(|c| c.description.clone())
                        .unwrap_or_else(|| req.code.clone()),
                    unit: found
                        .map(|c| c.unit.clone())
                        .unwrap_or_else(|| defaults.unit.clone()),
                    location: found
                        .map(|c| c.location.clone())
                        .unwrap_or_else(|| defaults.location.clone()),
                    alternatives: alternatives.alternatives_for(&req.code).to_vec(),
                    quantity: req.quantity,
                    attended_official: 0,
                    attended_alt: 0,
                    // 需求为 0 的行无需分拣
                    confirmed: req.quantity <= 0,
                    confirmed_by: None,
                    confirmed_at: None,
                    locked: false,
                    substitution: None,
                    last_alt_used: None,
                }
            })
            .collect();

        Some(items)
    }
}
