// ==========================================
// 物料分拣系统 - 替代料登记
// ==========================================
// 职责: 列出标准料的可用替代料；登记替代料使用事件
// 红线: 审计日志只追加
// ==========================================

use crate::domain::{
    AlternativesMap, CatalogItem, ChecklistItem, SeparationEvent, SubstitutionEvent,
};
use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub struct SubstitutionRegistrar;

impl SubstitutionRegistrar {
    pub fn new() -> Self {
        Self
    }

    /// 标准料的可用替代料
    ///
    /// 按映射顺序返回目录条目，目录中不存在的编码跳过；
    /// `search_text` 对编码或描述做大小写不敏感子串匹配，空串匹配全部。
    pub fn available_alternatives(
        &self,
        base_code: &str,
        catalog: &[CatalogItem],
        alternatives: &AlternativesMap,
        search_text: &str,
    ) -> Vec<CatalogItem> {
        alternatives
            .alternatives_for(base_code)
            .iter()
            .filter_map(|code| catalog.iter().find(|c| &c.code == code))
            .filter(|c| c.matches_search(search_text))
            .cloned()
            .collect()
    }

    /// 登记一次替代料使用
    ///
    /// 事件同时作为物料行的最近替代记录，并追加到记录的审计日志。
    pub fn record_substitution(
        &self,
        item: &mut ChecklistItem,
        history: &mut Vec<SeparationEvent>,
        alt_code: &str,
        qty: i64,
        operator: &str,
        now: DateTime<Utc>,
    ) -> SubstitutionEvent {
        let event = SubstitutionEvent {
            from: item.base_code.clone(),
            to: alt_code.to_string(),
            operator: operator.to_string(),
            at: now,
            qty,
        };
        item.last_alt_used = Some(alt_code.to_string());
        item.substitution = Some(event.clone());
        history.push(SeparationEvent::Substitution(event.clone()));
        event
    }
}
