// ==========================================
// 物料分拣系统 - 工单级互斥锁
// ==========================================
// 红线: 同一工单的读-改-写必须串行；不同工单互不阻塞
// 说明: 条目在无人持有时回收，注册表不会随工单数无限增长
// ==========================================

use crate::engine::error::{SeparationError, SeparationResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 持锁凭证
///
/// 只能在 `OrderLockRegistry::with_order` 的闭包内获得，
/// 以 `_locked` 结尾的内部方法要求传入它。
#[derive(Debug)]
pub struct OrderScope<'a> {
    order_id: &'a str,
}

impl OrderScope<'_> {
    pub fn order_id(&self) -> &str {
        self.order_id
    }
}

/// 工单锁注册表
#[derive(Debug, Default)]
pub struct OrderLockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl OrderLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在工单锁内执行闭包
    pub fn with_order<T, F>(&self, order_id: &str, f: F) -> SeparationResult<T>
    where
        F: FnOnce(&OrderScope<'_>) -> SeparationResult<T>,
    {
        let entry = {
            let mut map = self
                .locks
                .lock()
                .map_err(|e| SeparationError::LockPoisoned(e.to_string()))?;
            Arc::clone(
                map.entry(order_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };

        let result = match entry.lock() {
            Ok(_guard) => f(&OrderScope { order_id }),
            Err(e) => Err(SeparationError::LockPoisoned(format!(
                "order_id={}: {}",
                order_id, e
            ))),
        };

        drop(entry);
        self.reclaim(order_id);
        result
    }

    /// 当前注册的工单数
    pub fn len(&self) -> usize {
        self.locks.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reclaim(&self, order_id: &str) {
        if let Ok(mut map) = self.locks.lock() {
            // 只剩注册表自身持有
            if map
                .get(order_id)
                .map(|lock| Arc::strong_count(lock) == 1)
                .unwrap_or(false)
            {
                map.remove(order_id);
            }
        }
    }
}
