// ==========================================
// OTD 绩效引擎 - 引擎层错误类型
// ==========================================
// 错误分级 (与总体设计一致):
// - 配置错误 / 结构性缺列 → 致命, 运行前失败
// - 行级脏数据 → 不是错误, 按 UNKNOWN 降级
// - join 无匹配 → 不是错误, 作为一等结果上报
// ==========================================

use crate::config::ConfigError;
use crate::importer::ImportError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("数据源 '{source_name}' 缺少规则引用的列: {column}")]
    MissingColumn { source_name: String, column: String },

    #[error("参照数据源存在重复 key '{id}'（fan-out join 不受支持, 请先在上游去重）")]
    DuplicateReferenceKey { id: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
