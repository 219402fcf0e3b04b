// ==========================================
// 物料分拣系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，将仓储 / 引擎错误转换为用户可读的错误消息
// ==========================================

use crate::engine::error::SeparationError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("工单无进行中的分拣记录: {0}")]
    NoActiveSeparation(String),

    #[error("替代料不在允许列表中: base_code={base_code}, alt_code={alt_code}")]
    AlternativeNotAllowed { base_code: String, alt_code: String },

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 导入 / 导出错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("报表导出失败: {0}")]
    ExportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                separation_id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "分拣记录{}已被其他会话修改（期望revision={}，实际revision={}）",
                separation_id, expected, actual
            )),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }

            // 数据质量错误
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),

            // 通用错误
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 SeparationError 转换
// ==========================================
impl From<SeparationError> for ApiError {
    fn from(err: SeparationError) -> Self {
        match err {
            SeparationError::OrderNotFound(order_id) => {
                ApiError::NotFound(format!("工单(id={})不存在", order_id))
            }
            SeparationError::NoActiveSeparation(order_id) => {
                ApiError::NoActiveSeparation(order_id)
            }
            SeparationError::ItemIndexOutOfRange {
                order_id,
                index,
                len,
            } => ApiError::InvalidInput(format!(
                "物料行索引越界: order_id={}, index={}, 共{}行",
                order_id, index, len
            )),
            SeparationError::FinalizeModeMismatch {
                requested, derived, ..
            } => ApiError::InvalidStateTransition {
                from: derived.to_string(),
                to: requested.to_string(),
            },
            SeparationError::AlternativeNotAllowed {
                base_code,
                alt_code,
            } => ApiError::AlternativeNotAllowed {
                base_code,
                alt_code,
            },
            SeparationError::LockPoisoned(msg) => ApiError::InternalError(msg),
            SeparationError::Repository(e) => e.into(),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(e) => e.into(),
            other => ApiError::ImportError(other.localized()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FinalizeMode;

    #[test]
    fn test_repository_error_conversion() {
        let err: ApiError = RepositoryError::OptimisticLockFailure {
            separation_id: "s1".to_string(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(err, ApiError::OptimisticLockFailure(_)));
        assert!(err.to_string().contains("s1"));
    }

    #[test]
    fn test_separation_error_conversion() {
        let err: ApiError = SeparationError::OrderNotFound("OP-9999".to_string()).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = SeparationError::FinalizeModeMismatch {
            order_id: "OP-1001".to_string(),
            requested: FinalizeMode::Total,
            derived: FinalizeMode::Partial,
        }
        .into();
        match err {
            ApiError::InvalidStateTransition { from, to } => {
                assert_eq!(from, "PARTIAL");
                assert_eq!(to, "TOTAL");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let err: ApiError = SeparationError::Repository(RepositoryError::LockError(
            "poisoned".to_string(),
        ))
        .into();
        assert!(matches!(err, ApiError::DatabaseConnectionError(_)));
    }
}
