// ==========================================
// OTD 绩效引擎 - 配置层
// ==========================================
// 职责: 声明式规则文档的加载/校验/快照管理
// 红线: 评估过程持有的快照不可变; 无全局可变配置缓存
// ==========================================

pub mod error;
pub mod rule_config;

pub use error::{ConfigError, ConfigResult};
pub use rule_config::{
    DedupPolicy, JoinConfig, RequiredColumns, RuleMethod, RuleSet, StageDefinition,
};
