// ==========================================
// OTD 绩效引擎 - 核心库
// ==========================================
// 系统定位: 物流准时交付 (On-Time Delivery) 绩效分类与聚合引擎
// 技术栈: Rust + serde + chrono + csv/calamine
// 口径红线: 三值判定 (PASS/FAIL/UNKNOWN), UNKNOWN 不进分母
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "nl");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 配置层 - 规则文档
pub mod config;

// 导入层 - 外部数据
pub mod importer;

// 引擎层 - 业务规则
pub mod engine;

// 导出层 - 扁平表
pub mod export;

// 反馈层 - 纠错日志
pub mod feedback;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{Period, PerformanceOutcome, ReferenceRecord, ShipmentRecord, ValidationStatus};

// 配置
pub use config::{
    ConfigError, ConfigResult, DedupPolicy, JoinConfig, RuleMethod, RuleSet, StageDefinition,
};

// 引擎
pub use engine::{
    AggregationEngine, CrossValidationRow, CrossValidator, DataQualityReport, DedupEngine,
    DedupReport, EngineError, EngineResult, FunnelRow, JoinEngine, JoinOutcome, ParetoRow,
    PerformanceEvaluator, PipelineEngine, PipelineResult, RootCauseAttributor,
    ShipmentEvaluation, UNATTRIBUTED,
};

// 导入
pub use importer::{ImportBatch, ImportError, ImportResult};

// 导出
pub use export::FlatTable;

// 反馈
pub use feedback::{FeedbackEntry, FeedbackStore};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "OTD Performance Engine";
