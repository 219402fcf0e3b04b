// ==========================================
// 物料分拣系统 - 物料目录 & 替代料映射
// ==========================================
// 职责: 目录条目与替代料关系（参考数据，只读）
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// CatalogItem - 物料目录条目
// ==========================================
// 对齐: catalog_item 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub code: String,
    pub description: String,
    pub unit: String,
    pub location: String,            // 格式: "DEP-01 / A-01" (仓库 / 库位)
    pub drawing_ref: Option<String>, // 图纸链接 (可选)
}

impl CatalogItem {
    /// 仓库代码 (location 中 '/' 之前的部分)
    pub fn depot(&self) -> &str {
        depot_of(&self.location)
    }

    /// 大小写不敏感的编码/描述子串匹配，空查询匹配全部
    pub fn matches_search(&self, search_text: &str) -> bool {
        let needle = search_text.trim().to_uppercase();
        if needle.is_empty() {
            return true;
        }
        self.code.to_uppercase().contains(&needle)
            || self.description.to_uppercase().contains(&needle)
    }
}

/// 从库位字符串提取仓库代码
pub fn depot_of(location: &str) -> &str {
    location.split('/').next().unwrap_or("").trim()
}

// ==========================================
// AlternativesMap - 替代料映射
// ==========================================
// base_code -> 有序替代料编码列表（去重，保持插入顺序）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlternativesMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl AlternativesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加替代料，重复编码被忽略
    pub fn add(&mut self, base_code: impl Into<String>, alt_code: impl Into<String>) {
        let alt_code = alt_code.into();
        let list = self.entries.entry(base_code.into()).or_default();
        if !list.contains(&alt_code) {
            list.push(alt_code);
        }
    }

    /// 查询替代料编码，无映射时返回空切片
    pub fn alternatives_for(&self, base_code: &str) -> &[String] {
        self.entries
            .get(base_code)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AlternativesMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = AlternativesMap::new();
        for (base, alt) in iter {
            map.add(base, alt);
        }
        map
    }
}
