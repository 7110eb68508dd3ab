// ==========================================
// OTD 绩效引擎 - 管线编排
// ==========================================
// 职责: 去重 → join → 评估 → 质量报告, 一次调用串起全链路
// 红线: 编排层不含业务判定, 只传递配置快照与中间产物
// ==========================================

use crate::config::RuleSet;
use crate::domain::ShipmentRecord;
use crate::engine::cross_validate::DataQualityReport;
use crate::engine::dedupe::{DedupEngine, DedupReport};
use crate::engine::error::EngineResult;
use crate::engine::evaluator::{PerformanceEvaluator, ShipmentEvaluation};
use crate::engine::join::JoinEngine;
use crate::importer::RawTable;
use tracing::{info, instrument};

/// 一次完整评估运行的产物
#[derive(Debug)]
pub struct PipelineResult {
    pub evaluations: Vec<ShipmentEvaluation>,
    pub dedup: DedupReport,
    /// join 无匹配的发运标识 (输入顺序)
    pub unmatched: Vec<String>,
    pub quality: DataQualityReport,
}

pub struct PipelineEngine;

impl PipelineEngine {
    /// 执行完整管线
    ///
    /// # 参数
    /// - primary: 主数据源记录 (导入层产物, 未去重)
    /// - reference: 参照数据源原始表
    /// - rules: 本次运行的规则快照 (运行期间不变)
    ///
    /// # 错误
    /// 配置类错误 (缺列 / 参照重复 key) 快速失败; 行级脏数据不报错
    #[instrument(skip(primary, reference, rules), fields(primary = primary.len()))]
    pub fn run(
        primary: Vec<ShipmentRecord>,
        reference: &RawTable,
        rules: &RuleSet,
    ) -> EngineResult<PipelineResult> {
        let (unique, dedup) = DedupEngine::run(primary, &rules.dedup);
        let joined = JoinEngine::left_join(unique, reference, &rules.join)?;
        let evaluations = PerformanceEvaluator::evaluate_batch(joined.joined, rules)?;
        let quality = DataQualityReport::build(&evaluations, rules, dedup);

        info!(
            evaluated = evaluations.len(),
            duplicates = dedup.removed(),
            unmatched = joined.unmatched.len(),
            "评估管线完成"
        );

        Ok(PipelineResult {
            evaluations,
            dedup,
            unmatched: joined.unmatched,
            quality,
        })
    }
}
