// ==========================================
// OTD 绩效引擎 - 根因归因引擎
// ==========================================
// 职责: 迟到发运 → 首个失败的可用阶段 (序号升序)
// 口径: UNKNOWN 阶段跳过, 不视为失败;
//       无可归因阶段 → 哨兵 "unattributed"
// 不变量: Pareto 累计列收敛到 100.0 ± 1e-6
// ==========================================

use crate::config::RuleSet;
use crate::domain::PerformanceOutcome;
use crate::engine::evaluator::ShipmentEvaluation;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// 无法归因到任何阶段的迟到发运的哨兵值
pub const UNATTRIBUTED: &str = "unattributed";

/// Pareto 汇总行
#[derive(Debug, Clone, PartialEq)]
pub struct ParetoRow {
    pub cause: String,
    /// 阶段显示名; 哨兵行为 i18n 标签
    pub label: String,
    pub count: usize,
    /// 占全部迟到发运的百分比
    pub percentage: f64,
    /// 排序后的累计百分比
    pub cumulative: f64,
}

pub struct RootCauseAttributor;

impl RootCauseAttributor {
    /// 单条评估的根因
    ///
    /// # 返回
    /// - 整体非 FAIL → None (准时/无判定的发运没有根因)
    /// - 否则 Some(首个失败可用阶段的标识), 找不到则 Some("unattributed")
    pub fn root_cause(evaluation: &ShipmentEvaluation, rules: &RuleSet) -> Option<String> {
        if evaluation.overall != PerformanceOutcome::Fail {
            return None;
        }
        for stage in rules.available_stages() {
            if evaluation.outcomes.get(&stage.id) == Some(&PerformanceOutcome::Fail) {
                return Some(stage.id.clone());
            }
        }
        Some(UNATTRIBUTED.to_string())
    }

    /// 批量归因: (发运标识, 根因阶段标识), 仅含迟到发运, 输入顺序
    #[instrument(skip(evaluations, rules), fields(count = evaluations.len()))]
    pub fn attribute(
        evaluations: &[ShipmentEvaluation],
        rules: &RuleSet,
    ) -> Vec<(String, String)> {
        let attributions: Vec<(String, String)> = evaluations
            .iter()
            .filter_map(|e| Self::root_cause(e, rules).map(|cause| (e.record.id.clone(), cause)))
            .collect();
        info!(late = attributions.len(), "根因归因完成");
        attributions
    }

    /// Pareto 汇总: 按根因计数, 计数降序, 百分比 + 累计百分比
    ///
    /// 空输入 → 空表 (调用方不必特判)
    pub fn summarize(attributions: &[(String, String)], rules: &RuleSet) -> Vec<ParetoRow> {
        if attributions.is_empty() {
            return Vec::new();
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (_, cause) in attributions {
            *counts.entry(cause.as_str()).or_insert(0) += 1;
        }

        let total = attributions.len() as f64;
        let mut rows: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(cause, count)| (cause.to_string(), count))
            .collect();
        // 计数降序; 同计数按名称, 保证确定性输出
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut cumulative = 0.0;
        rows.into_iter()
            .map(|(cause, count)| {
                let percentage = count as f64 / total * 100.0;
                cumulative += percentage;
                let label = if cause == UNATTRIBUTED {
                    crate::i18n::t("root_cause.unattributed")
                } else {
                    rules.stage_name(&cause)
                };
                ParetoRow {
                    cause,
                    label,
                    count,
                    percentage,
                    cumulative,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ShipmentRecord;
    use std::collections::HashMap;

    fn late_evaluation(id: &str, outcomes: &[(&str, PerformanceOutcome)]) -> ShipmentEvaluation {
        let mut fields = HashMap::new();
        fields.insert("DeliveryNumber".to_string(), id.to_string());
        let record = ShipmentRecord::from_row(fields, "DeliveryNumber").unwrap();
        ShipmentEvaluation {
            record,
            outcomes: outcomes
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            overall: PerformanceOutcome::Fail,
        }
    }

    #[test]
    fn test_root_cause_is_lowest_failing_ordinal() {
        use PerformanceOutcome::{Fail, Pass, Unknown};
        let rules = RuleSet::default();
        // 默认模型可用阶段序: planned(1), capacity(2), warehouse(3), transit(6)
        let eval = late_evaluation(
            "D1",
            &[
                ("planned_performance_ok", Pass),
                ("capacity_performance_ok", Unknown),
                ("warehouse_performance_ok", Fail),
                ("carrier_transit_ok", Fail),
            ],
        );
        assert_eq!(
            RootCauseAttributor::root_cause(&eval, &rules),
            Some("warehouse_performance_ok".to_string())
        );
    }

    #[test]
    fn test_unknown_stage_is_skipped_not_failing() {
        use PerformanceOutcome::Unknown;
        let rules = RuleSet::default();
        let eval = late_evaluation(
            "D1",
            &[
                ("planned_performance_ok", Unknown),
                ("capacity_performance_ok", Unknown),
            ],
        );
        assert_eq!(
            RootCauseAttributor::root_cause(&eval, &rules),
            Some(UNATTRIBUTED.to_string())
        );
    }

    #[test]
    fn test_on_time_shipments_have_no_root_cause() {
        let rules = RuleSet::default();
        let mut eval = late_evaluation("D1", &[]);
        eval.overall = PerformanceOutcome::Pass;
        assert_eq!(RootCauseAttributor::root_cause(&eval, &rules), None);
    }

    #[test]
    fn test_pareto_cumulative_reaches_hundred() {
        let rules = RuleSet::default();
        let attributions = vec![
            ("D1".to_string(), "warehouse_performance_ok".to_string()),
            ("D2".to_string(), "warehouse_performance_ok".to_string()),
            ("D3".to_string(), "planned_performance_ok".to_string()),
            ("D4".to_string(), UNATTRIBUTED.to_string()),
            ("D5".to_string(), "planned_performance_ok".to_string()),
            ("D6".to_string(), "warehouse_performance_ok".to_string()),
            ("D7".to_string(), "carrier_transit_ok".to_string()),
        ];

        let pareto = RootCauseAttributor::summarize(&attributions, &rules);
        assert_eq!(pareto[0].cause, "warehouse_performance_ok");
        assert_eq!(pareto[0].count, 3);
        // 计数降序
        for pair in pareto.windows(2) {
            assert!(pair[0].count >= pair[1].count);
        }
        let last = pareto.last().unwrap();
        assert!((last.cumulative - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_pareto_empty_input() {
        let rules = RuleSet::default();
        assert!(RootCauseAttributor::summarize(&[], &rules).is_empty());
    }
}
