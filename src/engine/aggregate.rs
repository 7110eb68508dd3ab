// ==========================================
// OTD 绩效引擎 - 聚合引擎
// ==========================================
// 职责: 评估结果 → 达成率 / 分组指标 / 失败漏斗
// 口径 (不对称, 刻意保留):
// - 阶段达成率: 分母为 0 → None
// - 整体 OTD 率: 分母为 0 → 0.0
// 不变量: UNKNOWN 不进分子也不进分母
// ==========================================

use crate::config::RuleSet;
use crate::domain::{month_label, week_label, Period, PerformanceOutcome};
use crate::engine::evaluator::ShipmentEvaluation;
use crate::engine::root_cause::{RootCauseAttributor, UNATTRIBUTED};
use crate::i18n::t;
use std::collections::BTreeMap;
use tracing::instrument;

/// 漏斗行 (瀑布图数据)
///
/// count 符号约定: 总量与准时为正, 各流失桶为负增量
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelRow {
    pub label: String,
    pub count: i64,
}

pub struct AggregationEngine;

impl AggregationEngine {
    /// 单阶段达成率 (百分比)
    ///
    /// count(PASS) / count(PASS|FAIL) × 100; 分母为 0 → None
    pub fn stage_pass_rate(evaluations: &[ShipmentEvaluation], stage_id: &str) -> Option<f64> {
        let outcomes = evaluations
            .iter()
            .filter_map(|e| e.outcomes.get(stage_id).copied());
        Self::rate_of(outcomes)
    }

    /// 整体 OTD 率 (百分比)
    ///
    /// 同公式, 但分母为 0 → 0.0 (顶层 KPI 永远报一个数)
    pub fn overall_on_time_rate(evaluations: &[ShipmentEvaluation]) -> f64 {
        Self::rate_of(evaluations.iter().map(|e| e.overall)).unwrap_or(0.0)
    }

    /// 按分类字段分组的整体 OTD 率
    ///
    /// 返回按字段值排序的有序映射; 字段为空的行不成桶
    pub fn overall_rate_by_field(
        evaluations: &[ShipmentEvaluation],
        field: &str,
    ) -> Vec<(String, f64)> {
        let groups = Self::group_rows(evaluations, |e| {
            e.record.raw(field).map(|v| v.trim().to_string())
        });
        groups
            .into_iter()
            .map(|(key, rows)| (key, Self::overall_on_time_rate_refs(&rows)))
            .collect()
    }

    /// 按分类字段分组的单阶段达成率
    pub fn stage_rate_by_field(
        evaluations: &[ShipmentEvaluation],
        stage_id: &str,
        field: &str,
    ) -> Vec<(String, Option<f64>)> {
        let groups = Self::group_rows(evaluations, |e| {
            e.record.raw(field).map(|v| v.trim().to_string())
        });
        groups
            .into_iter()
            .map(|(key, rows)| {
                let outcomes = rows.iter().filter_map(|e| e.outcomes.get(stage_id).copied());
                (key, Self::rate_of(outcomes))
            })
            .collect()
    }

    /// 按时间桶 (ISO 周 / 月) 分组的整体 OTD 率
    ///
    /// 日期解析失败的行不成桶; 桶按时间先后排序
    pub fn overall_rate_by_period(
        evaluations: &[ShipmentEvaluation],
        date_field: &str,
        period: Period,
    ) -> Vec<(String, f64)> {
        let groups =
            Self::group_rows(evaluations, |e| Self::period_label(e, date_field, period));

        let mut buckets: Vec<(String, f64)> = groups
            .into_iter()
            .map(|(key, rows)| (key, Self::overall_on_time_rate_refs(&rows)))
            .collect();
        Self::sort_period_buckets(&mut buckets, period);
        buckets
    }

    /// 按时间桶 (ISO 周 / 月) 分组的单阶段达成率 (趋势序列)
    ///
    /// 分母为 0 的桶保留为 None, 不折算为 0.0
    pub fn stage_rate_by_period(
        evaluations: &[ShipmentEvaluation],
        stage_id: &str,
        date_field: &str,
        period: Period,
    ) -> Vec<(String, Option<f64>)> {
        let groups =
            Self::group_rows(evaluations, |e| Self::period_label(e, date_field, period));

        let mut buckets: Vec<(String, Option<f64>)> = groups
            .into_iter()
            .map(|(key, rows)| {
                let outcomes = rows.iter().filter_map(|e| e.outcomes.get(stage_id).copied());
                (key, Self::rate_of(outcomes))
            })
            .collect();
        Self::sort_period_buckets(&mut buckets, period);
        buckets
    }

    /// 失败漏斗
    ///
    /// 行序: 总量 → 各可用阶段流失 (负增量, 按序号) → 无归因流失
    /// → 无判定 (整体 UNKNOWN) → 准时。
    /// 恒等式: total == Σ|负增量| + 准时数, 两个显式桶保证其精确成立
    #[instrument(skip(evaluations, rules), fields(count = evaluations.len()))]
    pub fn failure_funnel(evaluations: &[ShipmentEvaluation], rules: &RuleSet) -> Vec<FunnelRow> {
        let total = evaluations.len() as i64;
        let pass = evaluations
            .iter()
            .filter(|e| e.overall == PerformanceOutcome::Pass)
            .count() as i64;
        let no_verdict = evaluations
            .iter()
            .filter(|e| e.overall == PerformanceOutcome::Unknown)
            .count() as i64;

        // 迟到记录按根因计数
        let mut by_cause: BTreeMap<String, i64> = BTreeMap::new();
        for evaluation in evaluations {
            if let Some(cause) = RootCauseAttributor::root_cause(evaluation, rules) {
                *by_cause.entry(cause).or_insert(0) += 1;
            }
        }

        let mut rows = Vec::with_capacity(rules.available_stages().len() + 4);
        rows.push(FunnelRow {
            label: t("funnel.total"),
            count: total,
        });
        for stage in rules.available_stages() {
            let count = by_cause.get(&stage.id).copied().unwrap_or(0);
            rows.push(FunnelRow {
                label: stage.name.clone(),
                count: -count,
            });
        }
        rows.push(FunnelRow {
            label: t("funnel.unattributed"),
            count: -by_cause.get(UNATTRIBUTED).copied().unwrap_or(0),
        });
        rows.push(FunnelRow {
            label: t("funnel.no_verdict"),
            count: -no_verdict,
        });
        rows.push(FunnelRow {
            label: t("funnel.on_time"),
            count: pass,
        });
        rows
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn rate_of<I: Iterator<Item = PerformanceOutcome>>(outcomes: I) -> Option<f64> {
        let mut pass = 0usize;
        let mut fail = 0usize;
        for outcome in outcomes {
            match outcome {
                PerformanceOutcome::Pass => pass += 1,
                PerformanceOutcome::Fail => fail += 1,
                PerformanceOutcome::Unknown => {}
            }
        }
        let denominator = pass + fail;
        if denominator == 0 {
            None
        } else {
            Some(pass as f64 / denominator as f64 * 100.0)
        }
    }

    fn overall_on_time_rate_refs(rows: &[&ShipmentEvaluation]) -> f64 {
        Self::rate_of(rows.iter().map(|e| e.overall)).unwrap_or(0.0)
    }

    /// 按键分组, 键为 None 的行跳过; BTreeMap 给出稳定有序输出
    fn group_rows<'a, F>(
        evaluations: &'a [ShipmentEvaluation],
        key_fn: F,
    ) -> BTreeMap<String, Vec<&'a ShipmentEvaluation>>
    where
        F: Fn(&ShipmentEvaluation) -> Option<String>,
    {
        let mut groups: BTreeMap<String, Vec<&ShipmentEvaluation>> = BTreeMap::new();
        for evaluation in evaluations {
            if let Some(key) = key_fn(evaluation) {
                groups.entry(key).or_default().push(evaluation);
            }
        }
        groups
    }

    fn period_label(
        evaluation: &ShipmentEvaluation,
        date_field: &str,
        period: Period,
    ) -> Option<String> {
        evaluation.record.date(date_field).map(|d| match period {
            Period::Week => week_label(d),
            Period::Month => month_label(d),
        })
    }

    /// "Www-yyyy" 字典序 != 时间序, 周桶按 (年, 周) 排; 月标签字典序即时间序
    fn sort_period_buckets<T>(buckets: &mut [(String, T)], period: Period) {
        if period == Period::Week {
            buckets.sort_by_key(|(label, _)| Self::week_sort_key(label));
        }
    }

    /// "W08-2026" → (2026, 8)
    fn week_sort_key(label: &str) -> (u32, u32) {
        let trimmed = label.trim_start_matches('W');
        let mut parts = trimmed.splitn(2, '-');
        let week = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let year = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        (year, week)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ShipmentRecord;
    use std::collections::HashMap;

    fn evaluation(
        id: &str,
        fields: &[(&str, &str)],
        stage_outcomes: &[(&str, PerformanceOutcome)],
        overall: PerformanceOutcome,
    ) -> ShipmentEvaluation {
        let mut map: HashMap<String, String> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.insert("DeliveryNumber".to_string(), id.to_string());
        let record = ShipmentRecord::from_row(map, "DeliveryNumber").unwrap();
        let outcomes = stage_outcomes
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        ShipmentEvaluation {
            record,
            outcomes,
            overall,
        }
    }

    #[test]
    fn test_stage_rate_excludes_unknown_from_denominator() {
        use PerformanceOutcome::{Fail, Pass, Unknown};
        let evals = vec![
            evaluation("D1", &[], &[("s1", Pass)], Pass),
            evaluation("D2", &[], &[("s1", Fail)], Fail),
            evaluation("D3", &[], &[("s1", Unknown)], Unknown),
            evaluation("D4", &[], &[("s1", Unknown)], Unknown),
        ];
        // UNKNOWN 增减不改变比率
        assert_eq!(AggregationEngine::stage_pass_rate(&evals, "s1"), Some(50.0));
        assert_eq!(
            AggregationEngine::stage_pass_rate(&evals[..2], "s1"),
            Some(50.0)
        );
    }

    #[test]
    fn test_zero_denominator_asymmetry() {
        use PerformanceOutcome::Unknown;
        let evals = vec![evaluation("D1", &[], &[("s1", Unknown)], Unknown)];
        // 阶段率: None; 整体率: 0.0
        assert_eq!(AggregationEngine::stage_pass_rate(&evals, "s1"), None);
        assert_eq!(AggregationEngine::overall_on_time_rate(&evals), 0.0);
    }

    #[test]
    fn test_group_by_field_skips_blank_values() {
        use PerformanceOutcome::{Fail, Pass};
        let evals = vec![
            evaluation("D1", &[("Country", "NL")], &[], Pass),
            evaluation("D2", &[("Country", "NL")], &[], Fail),
            evaluation("D3", &[("Country", "")], &[], Pass),
        ];
        let groups = AggregationEngine::overall_rate_by_field(&evals, "Country");
        assert_eq!(groups, vec![("NL".to_string(), 50.0)]);
    }

    #[test]
    fn test_group_by_week_chronological_order() {
        use PerformanceOutcome::Pass;
        let evals = vec![
            evaluation("D1", &[("Datum", "05-01-2026")], &[], Pass),
            evaluation("D2", &[("Datum", "22-12-2025")], &[], Pass),
            evaluation("D3", &[("Datum", "geen datum")], &[], Pass),
        ];
        let buckets =
            AggregationEngine::overall_rate_by_period(&evals, "Datum", Period::Week);
        let labels: Vec<&str> = buckets.iter().map(|(l, _)| l.as_str()).collect();
        // 2025 年的周在前; 解析失败的行不成桶
        assert_eq!(labels, vec!["W52-2025", "W02-2026"]);
    }

    #[test]
    fn test_stage_rate_by_field_zero_denominator_group_is_none() {
        use PerformanceOutcome::{Fail, Pass, Unknown};
        let evals = vec![
            evaluation("D1", &[("Country", "NL")], &[("s1", Pass)], Pass),
            evaluation("D2", &[("Country", "NL")], &[("s1", Fail)], Fail),
            evaluation("D3", &[("Country", "BE")], &[("s1", Unknown)], Unknown),
        ];
        let groups = AggregationEngine::stage_rate_by_field(&evals, "s1", "Country");
        // 全 UNKNOWN 的组保留为 None, 不折算为 0.0
        assert_eq!(
            groups,
            vec![
                ("BE".to_string(), None),
                ("NL".to_string(), Some(50.0)),
            ]
        );
    }

    #[test]
    fn test_stage_rate_by_week_trend() {
        use PerformanceOutcome::{Fail, Pass, Unknown};
        let evals = vec![
            evaluation("D1", &[("Datum", "05-01-2026")], &[("s1", Pass)], Pass),
            evaluation("D2", &[("Datum", "06-01-2026")], &[("s1", Fail)], Fail),
            evaluation("D3", &[("Datum", "22-12-2025")], &[("s1", Unknown)], Unknown),
            evaluation("D4", &[("Datum", "geen datum")], &[("s1", Pass)], Pass),
        ];
        let buckets =
            AggregationEngine::stage_rate_by_period(&evals, "s1", "Datum", Period::Week);
        // 时间先后排序; 全 UNKNOWN 的周为 None; 解析失败的行不成桶
        assert_eq!(
            buckets,
            vec![
                ("W52-2025".to_string(), None),
                ("W02-2026".to_string(), Some(50.0)),
            ]
        );
    }

    #[test]
    fn test_stage_rate_by_month_trend() {
        use PerformanceOutcome::{Fail, Pass};
        let evals = vec![
            evaluation("D1", &[("Datum", "05-01-2026")], &[("s1", Pass)], Pass),
            evaluation("D2", &[("Datum", "19-01-2026")], &[("s1", Fail)], Fail),
            evaluation("D3", &[("Datum", "03-02-2026")], &[("s1", Pass)], Pass),
        ];
        let buckets =
            AggregationEngine::stage_rate_by_period(&evals, "s1", "Datum", Period::Month);
        assert_eq!(
            buckets,
            vec![
                ("2026-01".to_string(), Some(50.0)),
                ("2026-02".to_string(), Some(100.0)),
            ]
        );
    }

    #[test]
    fn test_group_by_month() {
        use PerformanceOutcome::{Fail, Pass};
        let evals = vec![
            evaluation("D1", &[("Datum", "05-01-2026")], &[], Pass),
            evaluation("D2", &[("Datum", "19-01-2026")], &[], Fail),
            evaluation("D3", &[("Datum", "03-02-2026")], &[], Pass),
        ];
        let buckets =
            AggregationEngine::overall_rate_by_period(&evals, "Datum", Period::Month);
        assert_eq!(
            buckets,
            vec![("2026-01".to_string(), 50.0), ("2026-02".to_string(), 100.0)]
        );
    }

    #[test]
    fn test_funnel_identity_holds_exactly() {
        use PerformanceOutcome::{Fail, Pass, Unknown};
        let rules = RuleSet::default();
        let stage_ids: Vec<String> = rules
            .available_stages()
            .iter()
            .map(|s| s.id.clone())
            .collect();

        let with_all = |outcome_for: &dyn Fn(&str) -> PerformanceOutcome| {
            stage_ids
                .iter()
                .map(|id| (id.clone(), outcome_for(id)))
                .collect::<Vec<_>>()
        };
        fn as_pairs(v: &[(String, PerformanceOutcome)]) -> Vec<(&str, PerformanceOutcome)> {
            v.iter()
                .map(|(k, o)| (k.as_str(), *o))
                .collect()
        }

        // D1 准时; D2 迟到且首个可用阶段失败; D3 迟到但无阶段失败 (无归因);
        // D4 无整体判定
        let all_pass = with_all(&|_| Pass);
        let first_fail = with_all(&|id| {
            if id == stage_ids[0] {
                Fail
            } else {
                Pass
            }
        });
        let none_fail = with_all(&|_| Unknown);

        let evals = vec![
            evaluation("D1", &[], &as_pairs(&all_pass), Pass),
            evaluation("D2", &[], &as_pairs(&first_fail), Fail),
            evaluation("D3", &[], &as_pairs(&none_fail), Fail),
            evaluation("D4", &[], &as_pairs(&all_pass), Unknown),
        ];

        let funnel = AggregationEngine::failure_funnel(&evals, &rules);
        let total = funnel.first().unwrap().count;
        let pass = funnel.last().unwrap().count;
        let losses: i64 = funnel[1..funnel.len() - 1]
            .iter()
            .map(|row| row.count.abs())
            .sum();
        assert_eq!(total, 4);
        assert_eq!(pass, 1);
        assert_eq!(total, losses + pass);
    }
}
