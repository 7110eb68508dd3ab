// ==========================================
// OTD 绩效引擎 - 交叉校验引擎
// ==========================================
// 职责: 同一阶段达成率按两条独立路径重算并比对
// - 路径 a: 评估引擎产出的阶段判定
// - 路径 b: 直接读参照列, 用同一套 pass/exclude 值集
// 口径: 差异为百分点绝对值; 分级 <0.5 OK / 0.5~2.0 WARN / >2.0 FAIL
// 说明: FAIL 分级指向引擎正确性缺陷, 不是数据质量问题
// ==========================================

use crate::config::{RuleMethod, RuleSet};
use crate::domain::{PerformanceOutcome, ValidationStatus};
use crate::engine::aggregate::AggregationEngine;
use crate::engine::dedupe::DedupReport;
use crate::engine::evaluator::ShipmentEvaluation;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// 单阶段交叉校验结果
#[derive(Debug, Clone)]
pub struct CrossValidationRow {
    pub stage_id: String,
    pub stage_name: String,
    /// 路径 a: 引擎达成率 (百分比)
    pub engine_rate: Option<f64>,
    /// 路径 b: 参照列直算达成率 (百分比)
    pub reference_rate: Option<f64>,
    /// 百分点绝对差; 任一侧无率 → None
    pub discrepancy: Option<f64>,
    pub status: ValidationStatus,
}

pub struct CrossValidator;

impl CrossValidator {
    /// 对全部配置阶段执行交叉校验
    ///
    /// 没有列规则或没有独立参照列的阶段报 NOT_APPLICABLE, 不报数字
    #[instrument(skip(evaluations, rules), fields(count = evaluations.len()))]
    pub fn run(evaluations: &[ShipmentEvaluation], rules: &RuleSet) -> Vec<CrossValidationRow> {
        let mut rows = Vec::new();
        for stage in rules.stages_in_order() {
            let reference = match (&stage.method, &stage.reference_field) {
                (
                    Some(RuleMethod::Column {
                        pass_values,
                        exclude_values,
                        ..
                    }),
                    Some(reference_field),
                ) if stage.available => Some((pass_values, exclude_values, reference_field)),
                _ => None,
            };

            let row = match reference {
                Some((pass_values, exclude_values, reference_field)) => {
                    let engine_rate = AggregationEngine::stage_pass_rate(evaluations, &stage.id);
                    let reference_rate = Self::reference_rate(
                        evaluations,
                        reference_field,
                        pass_values,
                        exclude_values,
                    );
                    let discrepancy = match (engine_rate, reference_rate) {
                        (Some(a), Some(b)) => Some((a - b).abs()),
                        _ => None,
                    };
                    let status = ValidationStatus::from_discrepancy(discrepancy);
                    if status == ValidationStatus::Fail {
                        warn!(
                            stage = stage.id.as_str(),
                            discrepancy = discrepancy.unwrap_or(f64::NAN),
                            "交叉校验差异超限"
                        );
                    }
                    CrossValidationRow {
                        stage_id: stage.id.clone(),
                        stage_name: stage.name.clone(),
                        engine_rate,
                        reference_rate,
                        discrepancy,
                        status,
                    }
                }
                None => CrossValidationRow {
                    stage_id: stage.id.clone(),
                    stage_name: stage.name.clone(),
                    engine_rate: None,
                    reference_rate: None,
                    discrepancy: None,
                    status: ValidationStatus::NotApplicable,
                },
            };
            rows.push(row);
        }

        let failed = rows
            .iter()
            .filter(|r| r.status == ValidationStatus::Fail)
            .count();
        info!(stages = rows.len(), failed, "交叉校验完成");
        rows
    }

    /// 参照列直算达成率 (与评估引擎同一归一化与值集口径)
    fn reference_rate(
        evaluations: &[ShipmentEvaluation],
        reference_field: &str,
        pass_values: &[String],
        exclude_values: &[String],
    ) -> Option<f64> {
        let mut pass = 0usize;
        let mut fail = 0usize;
        for evaluation in evaluations {
            let raw = match evaluation.record.raw(reference_field) {
                Some(v) => v,
                None => continue,
            };
            let normalized = raw.trim().to_lowercase();
            if exclude_values
                .iter()
                .any(|v| v.trim().to_lowercase() == normalized)
            {
                continue;
            }
            if pass_values
                .iter()
                .any(|v| v.trim().to_lowercase() == normalized)
            {
                pass += 1;
            } else {
                fail += 1;
            }
        }
        let denominator = pass + fail;
        if denominator == 0 {
            None
        } else {
            Some(pass as f64 / denominator as f64 * 100.0)
        }
    }
}

// ==========================================
// DataQualityReport - 数据质量报告
// ==========================================
// 一次运行的输入健康度快照, 供协作方展示; 不参与 KPI 计算
#[derive(Debug, Clone)]
pub struct DataQualityReport {
    /// 评估的发运总数 (去重后)
    pub total: usize,
    /// 去重前行数与被移除的重复行数
    pub rows_before_dedup: usize,
    pub duplicates_removed: usize,
    /// 整体判定为 UNKNOWN 的发运数 (含 no-POD 剔除)
    pub overall_unknown: usize,
    /// 每个必需列的空值行数
    pub missing_per_column: BTreeMap<String, usize>,
    /// 每个阶段的 UNKNOWN 判定数
    pub unknown_per_stage: BTreeMap<String, usize>,
}

impl DataQualityReport {
    pub fn build(
        evaluations: &[ShipmentEvaluation],
        rules: &RuleSet,
        dedup: DedupReport,
    ) -> Self {
        let overall_unknown = evaluations
            .iter()
            .filter(|e| e.overall == PerformanceOutcome::Unknown)
            .count();

        let mut missing_per_column = BTreeMap::new();
        for column in &rules.required.primary {
            let missing = evaluations
                .iter()
                .filter(|e| e.record.raw(column).is_none())
                .count();
            missing_per_column.insert(column.clone(), missing);
        }

        let mut unknown_per_stage = BTreeMap::new();
        for stage in rules.stages_in_order() {
            let unknown = evaluations
                .iter()
                .filter(|e| e.outcomes.get(&stage.id) == Some(&PerformanceOutcome::Unknown))
                .count();
            unknown_per_stage.insert(stage.id.clone(), unknown);
        }

        DataQualityReport {
            total: evaluations.len(),
            rows_before_dedup: dedup.before,
            duplicates_removed: dedup.removed(),
            overall_unknown,
            missing_per_column,
            unknown_per_stage,
        }
    }
}
