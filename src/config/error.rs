// ==========================================
// OTD 绩效引擎 - 配置模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 配置错误在"准备运行"边界致命, 不做半配置降级
// ==========================================

use thiserror::Error;

/// 配置模块错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败: {0}")]
    FileRead(String),

    #[error("配置文件解析失败: {0}")]
    Parse(String),

    #[error("未知的规则方法 (阶段 {stage}): '{method}'（仅支持 column / recalculate）")]
    UnknownMethod { stage: String, method: String },

    #[error("阶段序号重复 (nummer {ordinal}): '{first}' 与 '{second}'（序号必须是严格全序）")]
    DuplicateOrdinal {
        ordinal: u32,
        first: String,
        second: String,
    },

    #[error("规则字段缺失 (阶段 {stage}): {field}")]
    MissingField { stage: String, field: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::FileRead(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
