// ==========================================
// OTD 绩效引擎 - 引擎层
// ==========================================
// 职责: 业务规则引擎 (去重 / join / 评估 / 聚合 / 归因 / 校验)
// 红线: 引擎只消费不可变的规则快照, 不持有可变全局状态
// 红线: 行级脏数据降级为 UNKNOWN, 配置类错误快速失败
// ==========================================

pub mod aggregate;
pub mod cross_validate;
pub mod dedupe;
pub mod error;
pub mod evaluator;
pub mod join;
pub mod pipeline;
pub mod root_cause;

// 重导出核心引擎
pub use aggregate::{AggregationEngine, FunnelRow};
pub use cross_validate::{CrossValidationRow, CrossValidator, DataQualityReport};
pub use dedupe::{DedupEngine, DedupReport};
pub use error::{EngineError, EngineResult};
pub use evaluator::{PerformanceEvaluator, ShipmentEvaluation};
pub use join::{JoinEngine, JoinOutcome};
pub use pipeline::{PipelineEngine, PipelineResult};
pub use root_cause::{ParetoRow, RootCauseAttributor, UNATTRIBUTED};
