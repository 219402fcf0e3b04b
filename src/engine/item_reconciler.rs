// ==========================================
// 物料分拣系统 - 物料行数量核算
// ==========================================
// 红线1: attended_official + attended_alt ≤ quantity（超限截断，不报错）
// 红线2: confirmed 只能由剩余数量派生
// 红线3: 已锁定的物料行静默忽略修改
// ==========================================

use crate::domain::{ChecklistItem, SeparationEvent};
use crate::engine::substitution::SubstitutionRegistrar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 核算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// 已应用，附带新的确认状态
    Applied { confirmed: bool },
    /// 物料行已锁定，未做任何修改
    IgnoredLocked,
}

impl ReconcileOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied { .. })
    }
}

/// 宽松解析数量输入
///
/// 空串视为 0；非数字返回 None；小数向零截断。
pub fn parse_quantity_input(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0);
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
}

// ==========================================
// ItemReconciler
// ==========================================
#[derive(Debug, Default)]
pub struct ItemReconciler {
    registrar: SubstitutionRegistrar,
}

impl ItemReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设定标准料已分拣数量（设定值，非累加）
    ///
    /// 截断到 `[0, quantity − attended_alt]`。
    pub fn set_official_quantity(
        &self,
        item: &mut ChecklistItem,
        requested: i64,
        operator: &str,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        if item.locked {
            return ReconcileOutcome::IgnoredLocked;
        }

        item.attended_official = requested.clamp(0, item.max_official());
        let confirmed = refresh_confirmation(item, operator, now);
        ReconcileOutcome::Applied { confirmed }
    }

    /// 设定替代料已分拣数量并登记替代事件
    ///
    /// 截断到 `[0, quantity − attended_official]`。
    pub fn set_alternative_quantity(
        &self,
        item: &mut ChecklistItem,
        history: &mut Vec<SeparationEvent>,
        alt_code: &str,
        requested: i64,
        operator: &str,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        if item.locked {
            return ReconcileOutcome::IgnoredLocked;
        }

        let qty = requested.clamp(0, item.max_alternative());
        item.attended_alt = qty;
        self.registrar
            .record_substitution(item, history, alt_code, qty, operator, now);

        let confirmed = refresh_confirmation(item, operator, now);
        ReconcileOutcome::Applied { confirmed }
    }
}

/// 重新派生确认状态
///
/// false → true 时记录确认人和时间；变为 false 时清空。
fn refresh_confirmation(item: &mut ChecklistItem, operator: &str, now: DateTime<Utc>) -> bool {
    let confirmed = item.remaining() == 0;
    if confirmed && !item.confirmed {
        item.confirmed_by = Some(operator.to_string());
        item.confirmed_at = Some(now);
    } else if !confirmed {
        item.confirmed_by = None;
        item.confirmed_at = None;
    }
    item.confirmed = confirmed;
    confirmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timestamp_now;

    fn item(quantity: i64) -> ChecklistItem {
        ChecklistItem {
            base_code: "MAT-0002".to_string(),
            current_code: "MAT-0002".to_string(),
            description: "Parafuso M8x30".to_string(),
            unit: "PC".to_string(),
            location: "DEP-01 / B-05".to_string(),
            alternatives: vec!["MAT-0100".to_string(), "MAT-0101".to_string()],
            quantity,
            attended_official: 0,
            attended_alt: 0,
            confirmed: false,
            confirmed_by: None,
            confirmed_at: None,
            locked: false,
            substitution: None,
            last_alt_used: None,
        }
    }

    #[test]
    fn test_official_clamped_and_confirmed() {
        let reconciler = ItemReconciler::new();
        let now = timestamp_now();
        let mut it = item(10);

        let out = reconciler.set_official_quantity(&mut it, 15, "ana", now);
        assert_eq!(out, ReconcileOutcome::Applied { confirmed: true });
        assert_eq!(it.attended_official, 10);
        assert_eq!(it.confirmed_by.as_deref(), Some("ana"));
        assert_eq!(it.confirmed_at, Some(now));

        let out = reconciler.set_official_quantity(&mut it, -3, "ana", now);
        assert_eq!(out, ReconcileOutcome::Applied { confirmed: false });
        assert_eq!(it.attended_official, 0);
        assert!(it.confirmed_by.is_none());
        assert!(it.confirmed_at.is_none());
    }

    #[test]
    fn test_confirmation_stamp_kept_while_confirmed() {
        let reconciler = ItemReconciler::new();
        let first = timestamp_now();
        let mut it = item(4);
        reconciler.set_official_quantity(&mut it, 4, "ana", first);

        let later = first + chrono::Duration::seconds(30);
        reconciler.set_official_quantity(&mut it, 4, "bruno", later);
        assert_eq!(it.confirmed_by.as_deref(), Some("ana"));
        assert_eq!(it.confirmed_at, Some(first));
    }

    #[test]
    fn test_alternative_respects_official_and_logs_event() {
        let reconciler = ItemReconciler::new();
        let now = timestamp_now();
        let mut it = item(24);
        let mut history = Vec::new();

        reconciler.set_official_quantity(&mut it, 18, "ana", now);
        let out =
            reconciler.set_alternative_quantity(&mut it, &mut history, "MAT-0100", 10, "ana", now);

        assert_eq!(out, ReconcileOutcome::Applied { confirmed: true });
        assert_eq!(it.attended_alt, 6);
        assert_eq!(it.last_alt_used.as_deref(), Some("MAT-0100"));
        let sub = it.substitution.as_ref().unwrap();
        assert_eq!(sub.from, "MAT-0002");
        assert_eq!(sub.to, "MAT-0100");
        assert_eq!(sub.qty, 6);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].as_substitution(), Some(sub));
    }

    #[test]
    fn test_locked_item_is_ignored() {
        let reconciler = ItemReconciler::new();
        let now = timestamp_now();
        let mut it = item(5);
        it.locked = true;
        let before = it.clone();
        let mut history = Vec::new();

        assert_eq!(
            reconciler.set_official_quantity(&mut it, 5, "ana", now),
            ReconcileOutcome::IgnoredLocked
        );
        assert_eq!(
            reconciler.set_alternative_quantity(&mut it, &mut history, "MAT-0100", 5, "ana", now),
            ReconcileOutcome::IgnoredLocked
        );
        assert_eq!(it, before);
        assert!(history.is_empty());
    }

    #[test]
    fn test_parse_quantity_input() {
        assert_eq!(parse_quantity_input(" 7 "), Some(7));
        assert_eq!(parse_quantity_input(""), Some(0));
        assert_eq!(parse_quantity_input("2,9"), Some(2));
        assert_eq!(parse_quantity_input("-4"), Some(-4));
        assert_eq!(parse_quantity_input("abc"), None);
        assert_eq!(parse_quantity_input("NaN"), None);
    }
}
