// ==========================================
// OTD 绩效引擎 - 绩效评估引擎
// ==========================================
// 职责: 逐发运 × 逐阶段产出三值判定 + 整体 OTD 判定
// 红线: 评估不修改原始记录, 派生结果分层存放
// 红线: 行级脏数据降级为 UNKNOWN, 永不中断批处理;
//       规则引用的列在整个数据集缺失 → 一次性配置错误
// ==========================================

use crate::config::{RuleMethod, RuleSet, StageDefinition};
use crate::domain::{PerformanceOutcome, ShipmentRecord};
use crate::engine::error::{EngineError, EngineResult};
use std::collections::BTreeMap;
use tracing::{info, instrument};

// ==========================================
// ShipmentEvaluation - 单发运评估结果
// ==========================================
// 原始记录原样保留; outcomes 按阶段标识索引
#[derive(Debug, Clone)]
pub struct ShipmentEvaluation {
    pub record: ShipmentRecord,
    /// 阶段标识 → 三值判定 (全部配置的阶段都有键, 含不可用阶段)
    pub outcomes: BTreeMap<String, PerformanceOutcome>,
    /// 整体 OTD 判定 (同为三值)
    pub overall: PerformanceOutcome,
}

pub struct PerformanceEvaluator;

impl PerformanceEvaluator {
    /// 批量评估
    ///
    /// 先做一次数据集级列存在性检查 (规则引用的列整集缺失 → 配置错误),
    /// 之后逐行评估不再产生错误
    #[instrument(skip(records, rules), fields(count = records.len()))]
    pub fn evaluate_batch(
        records: Vec<ShipmentRecord>,
        rules: &RuleSet,
    ) -> EngineResult<Vec<ShipmentEvaluation>> {
        Self::check_rule_columns(&records, rules)?;

        let evaluations: Vec<ShipmentEvaluation> = records
            .into_iter()
            .map(|record| Self::evaluate(record, rules))
            .collect();

        let on_time = evaluations.iter().filter(|e| e.overall.is_pass()).count();
        info!(total = evaluations.len(), on_time, "绩效评估完成");
        Ok(evaluations)
    }

    /// 单发运评估 (逐行无错: 脏数据降级为 UNKNOWN)
    pub fn evaluate(record: ShipmentRecord, rules: &RuleSet) -> ShipmentEvaluation {
        let mut outcomes = BTreeMap::new();
        for stage in rules.stages_in_order() {
            outcomes.insert(stage.id.clone(), Self::evaluate_stage(&record, stage));
        }

        let overall = Self::evaluate_overall(&record, rules);

        ShipmentEvaluation {
            record,
            outcomes,
            overall,
        }
    }

    /// 单阶段判定
    ///
    /// 不可用阶段恒为 UNKNOWN, 规则不被咨询
    pub fn evaluate_stage(record: &ShipmentRecord, stage: &StageDefinition) -> PerformanceOutcome {
        if !stage.available {
            return PerformanceOutcome::Unknown;
        }
        match &stage.method {
            // 阶段级 exclude 命中一律从分母剔除 (→ UNKNOWN)
            Some(method) => Self::apply_rule(record, method, true),
            None => PerformanceOutcome::Unknown,
        }
    }

    /// 整体 OTD 判定
    ///
    /// exclude 命中的处理由 no_pod 策略决定:
    /// - exclude_no_pod = true → UNKNOWN (从分母剔除, 标准口径)
    /// - exclude_no_pod = false → FAIL (保守口径)
    pub fn evaluate_overall(record: &ShipmentRecord, rules: &RuleSet) -> PerformanceOutcome {
        Self::apply_rule(record, &rules.overall, rules.exclude_no_pod)
    }

    /// 规则解释器 (封闭标签联合, 穷举匹配)
    fn apply_rule(
        record: &ShipmentRecord,
        method: &RuleMethod,
        exclude_is_unknown: bool,
    ) -> PerformanceOutcome {
        match method {
            RuleMethod::Column {
                source_field,
                pass_values,
                exclude_values,
            } => {
                let raw = match record.raw(source_field) {
                    Some(v) => v,
                    None => return PerformanceOutcome::Unknown,
                };
                let normalized = raw.trim().to_lowercase();

                // 先比对 exclude, 再比对 pass
                if exclude_values
                    .iter()
                    .any(|v| v.trim().to_lowercase() == normalized)
                {
                    return if exclude_is_unknown {
                        PerformanceOutcome::Unknown
                    } else {
                        PerformanceOutcome::Fail
                    };
                }
                if pass_values
                    .iter()
                    .any(|v| v.trim().to_lowercase() == normalized)
                {
                    PerformanceOutcome::Pass
                } else {
                    PerformanceOutcome::Fail
                }
            }
            RuleMethod::DateCompare {
                earlier_field,
                later_field,
            } => {
                let earlier = record.date(earlier_field);
                let later = record.date(later_field);
                match (earlier, later) {
                    // 同日算准时 (inclusive)
                    (Some(e), Some(l)) => {
                        if e <= l {
                            PerformanceOutcome::Pass
                        } else {
                            PerformanceOutcome::Fail
                        }
                    }
                    _ => PerformanceOutcome::Unknown,
                }
            }
        }
    }

    /// 数据集级列存在性检查
    ///
    /// 规则引用的列在所有记录中都不存在 → 配置错误 (一次, 而非逐行)。
    /// 空数据集不检查 (没有可对照的 schema)。
    fn check_rule_columns(records: &[ShipmentRecord], rules: &RuleSet) -> EngineResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut referenced: Vec<&str> = Vec::new();
        for stage in &rules.stages {
            if !stage.available {
                continue;
            }
            if let Some(method) = &stage.method {
                referenced.extend(method.referenced_fields());
            }
        }
        referenced.extend(rules.overall.referenced_fields());

        for column in referenced {
            let present = records.iter().any(|r| r.has_column(column));
            if !present {
                return Err(EngineError::MissingColumn {
                    source_name: "Datagrid".to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}
