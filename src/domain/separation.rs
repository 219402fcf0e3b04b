// ==========================================
// 物料分拣系统 - 分拣记录领域模型
// ==========================================
// 红线1: attended_official + attended_alt ≤ quantity
// 红线2: confirmed ⇔ 剩余数量 == 0（确认状态只能派生，不可手工勾选）
// 红线3: locked = true 之后该物料行任何字段不得变更
// ==========================================

use crate::domain::types::FinalizeMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// SubstitutionEvent - 替代料使用事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionEvent {
    pub from: String,     // 标准料编码 (base_code)
    pub to: String,       // 替代料编码
    pub operator: String, // 操作员用户名
    pub at: DateTime<Utc>,
    pub qty: i64, // 本次设定的替代料数量（设定值，非累加）
}

// ==========================================
// SeparationEvent - 分拣记录审计日志条目
// ==========================================
// 只追加，不修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeparationEvent {
    Substitution(SubstitutionEvent),
}

impl SeparationEvent {
    pub fn as_substitution(&self) -> Option<&SubstitutionEvent> {
        match self {
            SeparationEvent::Substitution(ev) => Some(ev),
        }
    }
}

// ==========================================
// ChecklistItem - 分拣清单行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    // ===== 物料标识 =====
    pub base_code: String,    // BOM 中的标准料编码
    pub current_code: String, // 展示用编码（不随替代料变化）
    pub description: String,
    pub unit: String,
    pub location: String,
    pub alternatives: Vec<String>, // 可用替代料编码

    // ===== 数量 =====
    pub quantity: i64,          // 需求数量（固定）
    pub attended_official: i64, // 标准料已分拣数量
    pub attended_alt: i64,      // 替代料已分拣数量

    // ===== 确认（派生）=====
    pub confirmed: bool,
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,

    // ===== 锁定 / 替代 =====
    pub locked: bool,
    pub substitution: Option<SubstitutionEvent>,
    pub last_alt_used: Option<String>,
}

impl ChecklistItem {
    /// 剩余数量 = quantity − attended_official − attended_alt（下限 0）
    pub fn remaining(&self) -> i64 {
        (self.quantity - self.attended_official - self.attended_alt).max(0)
    }

    /// 标准料数量上限（扣除替代料已分拣部分）
    pub fn max_official(&self) -> i64 {
        (self.quantity - self.attended_alt).max(0)
    }

    /// 替代料数量上限（扣除标准料已分拣部分）
    pub fn max_alternative(&self) -> i64 {
        (self.quantity - self.attended_official).max(0)
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    pub fn is_substituted(&self) -> bool {
        self.substitution.is_some()
    }

    /// 仓库代码
    pub fn depot(&self) -> &str {
        crate::domain::catalog::depot_of(&self.location)
    }

    /// 分拣进度（标准料 / 替代料占比，四舍五入到整数百分比）
    pub fn progress(&self) -> ItemProgress {
        let total = self.quantity.max(0);
        let official = self.attended_official.clamp(0, total);
        let alt = self.attended_alt.clamp(0, total - official);
        let pct = |part: i64| -> u8 {
            if total == 0 {
                0
            } else {
                ((part as f64 / total as f64) * 100.0).round() as u8
            }
        };
        ItemProgress {
            official,
            alt,
            official_pct: pct(official),
            alt_pct: pct(alt),
        }
    }
}

/// 单行分拣进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProgress {
    pub official: i64,
    pub alt: i64,
    pub official_pct: u8,
    pub alt_pct: u8,
}

// ==========================================
// SeparationRecord - 分拣记录
// ==========================================
// 对齐: separation 表 / separation_history 表（结构相同）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparationRecord {
    // ===== 主键 =====
    pub separation_id: String, // UUID（同一工单可存在多条已部分完成的记录）
    pub order_id: String,

    // ===== 工单快照 =====
    pub product_code: Option<String>,
    pub product_desc: Option<String>,
    pub operation: Option<String>,

    // ===== 生命周期 =====
    pub operator: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>, // None 表示进行中
    pub finalize_mode: FinalizeMode,

    // ===== 明细 =====
    pub items: Vec<ChecklistItem>,
    pub history: Vec<SeparationEvent>, // 只追加

    // ===== 并发控制 =====
    pub revision: i64,
}

impl SeparationRecord {
    /// 是否进行中
    pub fn is_active(&self) -> bool {
        self.finished_at.is_none()
    }

    /// 剩余数量 > 0 的物料行数
    pub fn pending_count(&self) -> usize {
        self.items.iter().filter(|i| i.remaining() > 0).count()
    }

    /// 所有物料行剩余数量均为 0
    pub fn all_complete(&self) -> bool {
        self.items.iter().all(|i| i.is_complete())
    }

    pub fn confirmed_items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.items.iter().filter(|i| i.confirmed)
    }

    pub fn pending_items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.items.iter().filter(|i| !i.confirmed)
    }

    /// 替代料审计日志
    pub fn substitutions(&self) -> impl Iterator<Item = &SubstitutionEvent> {
        self.history.iter().filter_map(|e| e.as_substitution())
    }

    /// 分拣汇总（确认 / 待分拣 / 已替代）
    pub fn summary(&self) -> SeparationSummary {
        let confirmed = self.confirmed_items().count();
        SeparationSummary {
            total: self.items.len(),
            confirmed,
            pending: self.items.len() - confirmed,
            substituted: self.items.iter().filter(|i| i.is_substituted()).count(),
            locked: self.items.iter().filter(|i| i.locked).count(),
        }
    }
}

impl FinalizeMode {
    /// 由记录状态派生完成模式: 全部物料行剩余为 0 → TOTAL，否则 PARTIAL
    pub fn for_record(record: &SeparationRecord) -> FinalizeMode {
        if record.all_complete() {
            FinalizeMode::Total
        } else {
            FinalizeMode::Partial
        }
    }
}

/// 分拣汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparationSummary {
    pub total: usize,
    pub confirmed: usize,
    pub pending: usize,
    pub substituted: usize,
    pub locked: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64, official: i64, alt: i64) -> ChecklistItem {
        ChecklistItem {
            base_code: "MAT-0001".to_string(),
            current_code: "MAT-0001".to_string(),
            description: "Chapa Aço 3mm".to_string(),
            unit: "PC".to_string(),
            location: "DEP-01 / A-01".to_string(),
            alternatives: vec![],
            quantity,
            attended_official: official,
            attended_alt: alt,
            confirmed: false,
            confirmed_by: None,
            confirmed_at: None,
            locked: false,
            substitution: None,
            last_alt_used: None,
        }
    }

    #[test]
    fn test_remaining_and_limits() {
        let it = item(10, 4, 3);
        assert_eq!(it.remaining(), 3);
        assert_eq!(it.max_official(), 7);
        assert_eq!(it.max_alternative(), 6);
        assert_eq!(it.depot(), "DEP-01");
    }

    #[test]
    fn test_progress_percentages() {
        let p = item(20, 10, 5).progress();
        assert_eq!(p.official, 10);
        assert_eq!(p.alt, 5);
        assert_eq!(p.official_pct, 50);
        assert_eq!(p.alt_pct, 25);

        // 数量为 0 时不除零
        let p = item(0, 0, 0).progress();
        assert_eq!(p.official_pct, 0);
    }

    #[test]
    fn test_finalize_mode_for_record() {
        let mut rec = SeparationRecord {
            separation_id: "s1".to_string(),
            order_id: "OP-1001".to_string(),
            product_code: None,
            product_desc: None,
            operation: None,
            operator: None,
            started_at: Utc::now(),
            finished_at: None,
            finalize_mode: FinalizeMode::None,
            items: vec![item(10, 10, 0), item(5, 2, 3)],
            history: vec![],
            revision: 0,
        };
        assert_eq!(FinalizeMode::for_record(&rec), FinalizeMode::Total);

        rec.items.push(item(3, 1, 0));
        assert_eq!(FinalizeMode::for_record(&rec), FinalizeMode::Partial);
        assert_eq!(rec.pending_count(), 1);
    }

    #[test]
    fn test_history_event_json_tag() {
        let ev = SeparationEvent::Substitution(SubstitutionEvent {
            from: "MAT-0002".to_string(),
            to: "MAT-0100".to_string(),
            operator: "operador".to_string(),
            at: Utc::now(),
            qty: 6,
        });
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "substitution");
        assert_eq!(json["to"], "MAT-0100");
    }
}
