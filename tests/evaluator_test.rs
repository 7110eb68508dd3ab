// ==========================================
// 绩效评估引擎集成测试
// ==========================================
// 测试目标: 默认计算模型下的三值判定行为
// 覆盖范围: 日期比较、列规则 exclude、整列缺失致命、分母剔除
// ==========================================


use otd_engine::engine::{AggregationEngine, EngineError, PerformanceEvaluator};
use otd_engine::{PerformanceOutcome, RuleMethod, RuleSet};
use test_helpers::shipment_record;

/// 默认模型要求的全部规则列, 附带可覆盖的值
fn full_record(id: &str, overrides: &[(&str, &str)]) -> otd_engine::ShipmentRecord {
    let mut pairs = vec![
        ("DeliveryNumber", id),
        ("SAP Delivery Date", "10-02-2026"),
        ("RequestedDeliveryDateFinal", "12-02-2026"),
        ("PODDeliveryDateShipment", "11-02-2026"),
        ("PERFORMANCE_CAPACITY", "not moved"),
        ("PERFORMANCE_LOGISTIC", "On schedule"),
        ("leveringstermijn", "10-02-2026"),
    ];
    for &(key, value) in overrides {
        if let Some(pair) = pairs.iter_mut().find(|(k, _)| *k == key) {
            pair.1 = value;
        } else {
            pairs.push((key, value));
        }
    }
    shipment_record(&pairs)
}

#[test]
fn test_on_time_shipment_passes_all_stages() {
    let rules = RuleSet::default();
    let records = vec![full_record("D1", &[("PODDeliveryDateShipment", "10-02-2026")])];
    let evaluations = PerformanceEvaluator::evaluate_batch(records, &rules).unwrap();

    let evaluation = &evaluations[0];
    assert_eq!(evaluation.overall, PerformanceOutcome::Pass);
    for stage in rules.available_stages() {
        assert_eq!(
            evaluation.outcomes.get(&stage.id),
            Some(&PerformanceOutcome::Pass),
            "stage {}",
            stage.id
        );
    }
    // 不可用阶段恒为 UNKNOWN
    assert_eq!(
        evaluation.outcomes.get("carrier_pickup_ok"),
        Some(&PerformanceOutcome::Unknown)
    );
}

#[test]
fn test_late_pod_fails_overall() {
    let rules = RuleSet::default();
    let records = vec![full_record("D1", &[("PODDeliveryDateShipment", "13-02-2026")])];
    let evaluations = PerformanceEvaluator::evaluate_batch(records, &rules).unwrap();
    assert_eq!(evaluations[0].overall, PerformanceOutcome::Fail);
}

#[test]
fn test_missing_pod_gives_unknown_overall() {
    let rules = RuleSet::default();
    let records = vec![full_record("D1", &[("PODDeliveryDateShipment", "")])];
    let evaluations = PerformanceEvaluator::evaluate_batch(records, &rules).unwrap();
    assert_eq!(evaluations[0].overall, PerformanceOutcome::Unknown);
}

#[test]
fn test_exclude_value_removes_row_from_denominator() {
    let mut rules = RuleSet::default();
    // 仓库阶段加上 exclude 集合
    if let Some(stage) = rules
        .stages
        .iter_mut()
        .find(|s| s.id == "warehouse_performance_ok")
    {
        stage.method = Some(RuleMethod::Column {
            source_field: "PERFORMANCE_LOGISTIC".to_string(),
            pass_values: vec!["on schedule".to_string()],
            exclude_values: vec!["no_pod".to_string()],
        });
    }

    let records = vec![
        full_record("D1", &[]),
        full_record("D2", &[("PERFORMANCE_LOGISTIC", "Delayed")]),
        full_record("D3", &[("PERFORMANCE_LOGISTIC", "no_pod")]),
    ];
    let evaluations = PerformanceEvaluator::evaluate_batch(records, &rules).unwrap();

    // exclude 命中 → UNKNOWN, 不是 FAIL
    assert_eq!(
        evaluations[2].outcomes.get("warehouse_performance_ok"),
        Some(&PerformanceOutcome::Unknown)
    );
    // 分母只剩 D1/D2
    assert_eq!(
        AggregationEngine::stage_pass_rate(&evaluations, "warehouse_performance_ok"),
        Some(50.0)
    );
}

#[test]
fn test_rule_column_missing_from_entire_dataset_is_fatal() {
    let rules = RuleSet::default();
    // 记录集缺少 PERFORMANCE_CAPACITY 列
    let records = vec![shipment_record(&[
        ("DeliveryNumber", "D1"),
        ("SAP Delivery Date", "10-02-2026"),
        ("RequestedDeliveryDateFinal", "12-02-2026"),
        ("PODDeliveryDateShipment", "11-02-2026"),
        ("PERFORMANCE_LOGISTIC", "On schedule"),
        ("leveringstermijn", "10-02-2026"),
    ])];

    let err = PerformanceEvaluator::evaluate_batch(records, &rules).unwrap_err();
    match err {
        EngineError::MissingColumn { column, .. } => {
            assert_eq!(column, "PERFORMANCE_CAPACITY");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_tri_state_partition_per_stage() {
    let rules = RuleSet::default();
    let records = vec![
        full_record("D1", &[]),
        full_record("D2", &[("PERFORMANCE_LOGISTIC", "Delayed")]),
        full_record("D3", &[("PERFORMANCE_LOGISTIC", "")]),
    ];
    let total = records.len();
    let evaluations = PerformanceEvaluator::evaluate_batch(records, &rules).unwrap();

    // 每个阶段: PASS + FAIL + UNKNOWN == 总数
    for stage in rules.stages_in_order() {
        let mut counts = [0usize; 3];
        for evaluation in &evaluations {
            match evaluation.outcomes.get(&stage.id) {
                Some(PerformanceOutcome::Pass) => counts[0] += 1,
                Some(PerformanceOutcome::Fail) => counts[1] += 1,
                Some(PerformanceOutcome::Unknown) => counts[2] += 1,
                None => panic!("stage {} missing outcome", stage.id),
            }
        }
        assert_eq!(counts.iter().sum::<usize>(), total, "stage {}", stage.id);
    }
}
