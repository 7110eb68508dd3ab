// ==========================================
// OTD 绩效引擎 - 导出层
// ==========================================
// 职责: 引擎产物 → 扁平表 (无嵌套结构, 纯字符串)
// 约定: 协作方 (电子表格导出器) 可以原样序列化, 不需要理解领域语义
// ==========================================

use crate::config::{RuleMethod, RuleSet};
use crate::domain::{PerformanceOutcome, ValidationStatus};
use crate::engine::{CrossValidationRow, RootCauseAttributor, ShipmentEvaluation, UNATTRIBUTED};
use crate::i18n::t;
use csv::WriterBuilder;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// 导出层错误类型
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV 写出失败: {0}")]
    CsvWrite(#[from] csv::Error),

    #[error("文件写入失败: {0}")]
    FileWrite(#[from] std::io::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

// ==========================================
// FlatTable - 扁平导出表
// ==========================================
/// 列序固定, 每行与列一一对齐, 值均为纯字符串 (空串 = NULL)
#[derive(Debug, Clone, PartialEq)]
pub struct FlatTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl FlatTable {
    /// 写出为分号分隔的 CSV (欧洲区域电子表格约定)
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> ExportResult<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(b';')
            .from_path(path.as_ref())?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        info!(
            path = %path.as_ref().display(),
            rows = self.rows.len(),
            "导出表已写出"
        );
        Ok(())
    }
}

/// 逐发运评估表: 输入列 + 各阶段判定 + 整体判定 + 根因
///
/// 输入列序 = 首条记录的字典序 (确定性); 派生列附加在末尾
pub fn evaluated_table(evaluations: &[ShipmentEvaluation], rules: &RuleSet) -> FlatTable {
    let mut input_columns: Vec<String> = evaluations
        .first()
        .map(|e| e.record.fields.keys().cloned().collect())
        .unwrap_or_default();
    input_columns.sort();

    let mut columns = input_columns.clone();
    for stage in rules.stages_in_order() {
        columns.push(stage.id.clone());
    }
    columns.push("overall_otd".to_string());
    columns.push("root_cause".to_string());

    let rows = evaluations
        .iter()
        .map(|evaluation| {
            let mut row: Vec<String> = input_columns
                .iter()
                .map(|c| evaluation.record.raw(c).unwrap_or("").to_string())
                .collect();
            for stage in rules.stages_in_order() {
                let outcome = evaluation
                    .outcomes
                    .get(&stage.id)
                    .map(|o| o.to_string())
                    .unwrap_or_default();
                row.push(outcome);
            }
            row.push(evaluation.overall.to_string());
            let cause = RootCauseAttributor::root_cause(evaluation, rules)
                .map(|c| {
                    if c == UNATTRIBUTED {
                        t("root_cause.unattributed")
                    } else {
                        rules.stage_name(&c)
                    }
                })
                .unwrap_or_default();
            row.push(cause);
            row
        })
        .collect();

    FlatTable { columns, rows }
}

/// 逐发运对账表: 引擎判定 vs 参照列原值 vs 一致标记
///
/// 仅覆盖有列规则且配置了参照列的可用阶段。
/// 一致标记 = 引擎判定与按同一值集从参照列直算出的判定相等
pub fn reconciliation_table(evaluations: &[ShipmentEvaluation], rules: &RuleSet) -> FlatTable {
    let stages: Vec<_> = rules
        .stages_in_order()
        .into_iter()
        .filter(|s| {
            s.available
                && s.reference_field.is_some()
                && matches!(s.method, Some(RuleMethod::Column { .. }))
        })
        .collect();

    let mut columns = vec!["id".to_string()];
    for stage in &stages {
        columns.push(format!("{}_engine", stage.id));
        columns.push(format!("{}_reference", stage.id));
        columns.push(format!("{}_match", stage.id));
    }

    let rows = evaluations
        .iter()
        .map(|evaluation| {
            let mut row = vec![evaluation.record.id.clone()];
            for stage in &stages {
                let engine = evaluation.outcomes.get(&stage.id).copied();
                let reference_field = stage.reference_field.as_deref().unwrap_or("");
                let reference = evaluation
                    .record
                    .raw(reference_field)
                    .unwrap_or("")
                    .to_string();

                let expected = match &stage.method {
                    Some(RuleMethod::Column {
                        pass_values,
                        exclude_values,
                        ..
                    }) => outcome_from_value(&reference, pass_values, exclude_values),
                    _ => PerformanceOutcome::Unknown,
                };
                let matches = engine
                    .map(|o| (o == expected).to_string())
                    .unwrap_or_default();

                row.push(engine.map(|o| o.to_string()).unwrap_or_default());
                row.push(reference);
                row.push(matches);
            }
            row
        })
        .collect();

    FlatTable { columns, rows }
}

/// 原始值 → 三值判定 (与评估引擎同一归一化口径)
fn outcome_from_value(
    raw: &str,
    pass_values: &[String],
    exclude_values: &[String],
) -> PerformanceOutcome {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return PerformanceOutcome::Unknown;
    }
    if exclude_values
        .iter()
        .any(|v| v.trim().to_lowercase() == normalized)
    {
        return PerformanceOutcome::Unknown;
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

/// 交叉校验汇总表
pub fn cross_validation_table(rows: &[CrossValidationRow]) -> FlatTable {
    let columns = vec![
        "stage".to_string(),
        "engine_rate".to_string(),
        "reference_rate".to_string(),
        "discrepancy".to_string(),
        "status".to_string(),
    ];

    let table_rows = rows
        .iter()
        .map(|row| {
            vec![
                row.stage_name.clone(),
                format_rate(row.engine_rate),
                format_rate(row.reference_rate),
                format_rate(row.discrepancy),
                crate::i18n::validation_label(row.status),
            ]
        })
        .collect();

    FlatTable {
        columns,
        rows: table_rows,
    }
}

fn format_rate(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PerformanceOutcome, ShipmentRecord};
    use std::collections::HashMap;

    fn evaluation(id: &str, overall: PerformanceOutcome) -> ShipmentEvaluation {
        let mut fields = HashMap::new();
        fields.insert("DeliveryNumber".to_string(), id.to_string());
        fields.insert("Country".to_string(), "NL".to_string());
        let record = ShipmentRecord::from_row(fields, "DeliveryNumber").unwrap();
        let rules = RuleSet::default();
        let outcomes = rules
            .stages_in_order()
            .iter()
            .map(|s| (s.id.clone(), PerformanceOutcome::Unknown))
            .collect();
        ShipmentEvaluation {
            record,
            outcomes,
            overall,
        }
    }

    #[test]
    fn test_evaluated_table_is_flat_and_aligned() {
        let rules = RuleSet::default();
        let evals = vec![
            evaluation("D1", PerformanceOutcome::Pass),
            evaluation("D2", PerformanceOutcome::Fail),
        ];
        let table = evaluated_table(&evals, &rules);

        assert_eq!(table.rows.len(), 2);
        for row in &table.rows {
            assert_eq!(row.len(), table.columns.len());
        }
        // 派生列在末尾
        assert_eq!(
            table.columns[table.columns.len() - 2],
            "overall_otd".to_string()
        );
        let overall_idx = table.columns.len() - 2;
        assert_eq!(table.rows[0][overall_idx], "PASS");
        assert_eq!(table.rows[1][overall_idx], "FAIL");
    }

    #[test]
    fn test_cross_validation_table_formats_missing_rates_blank() {
        let rows = vec![CrossValidationRow {
            stage_id: "s1".to_string(),
            stage_name: "Stage 1".to_string(),
            engine_rate: None,
            reference_rate: None,
            discrepancy: None,
            status: ValidationStatus::NotApplicable,
        }];
        let table = cross_validation_table(&rows);
        assert_eq!(table.rows[0][1], "");
        assert_eq!(table.rows[0][3], "");
    }

    #[test]
    fn test_write_csv_semicolon_delimited() {
        let table = FlatTable {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["1".to_string(), "2".to_string()]],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        table.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("a;b"));
        assert!(content.contains("1;2"));
    }
}
