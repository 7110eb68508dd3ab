// ==========================================
// OTD 绩效引擎 - 数据源结构校验
// ==========================================
// 职责: 必需列检查 (致命) + 日期列解析质量统计 (警告)
// 红线: 列缺失是配置错误, 运行前失败;
//       行级脏数据只降级为 UNKNOWN, 永不中断批处理
// ==========================================

use crate::domain::dates::parse_date_dayfirst;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawTable;
use tracing::warn;

/// 必需列检查
///
/// # 参数
/// - table: 解析后的原始表
/// - required: 必需列清单 (来自规则文档)
/// - source: 数据源名称 (报错用, 例如 "Datagrid" / "LIKP")
///
/// # 错误
/// - 任一必需列缺失 → ImportError::MissingColumns (一次性列出全部缺失列)
pub fn validate_required_columns(
    table: &RawTable,
    required: &[String],
    source: &str,
) -> ImportResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|col| !table.has_column(col))
        .map(|col| col.as_str())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImportError::MissingColumns {
            source_name: source.to_string(),
            columns: missing.join(", "),
        })
    }
}

/// 单列日期解析质量
#[derive(Debug, Clone)]
pub struct DateColumnQuality {
    pub column: String,
    /// 非空但无法按日前置约定解析的值数量
    pub unparseable: usize,
    /// 空值数量
    pub empty: usize,
}

/// 日期列解析质量统计
///
/// 仅观测与记录, 不中断导入; 解析失败的值在评估阶段按 UNKNOWN 降级
pub fn date_quality_report(table: &RawTable, date_columns: &[String]) -> Vec<DateColumnQuality> {
    let mut report = Vec::new();

    for column in date_columns {
        if !table.has_column(column) {
            continue;
        }

        let mut unparseable = 0usize;
        let mut empty = 0usize;
        for row in &table.rows {
            match row.get(column).map(|v| v.trim()) {
                None | Some("") => empty += 1,
                Some(value) => {
                    if parse_date_dayfirst(value).is_none() {
                        unparseable += 1;
                    }
                }
            }
        }

        if unparseable > 0 {
            warn!(
                column = column.as_str(),
                unparseable, "日期列包含无法解析的值, 相关行将按 UNKNOWN 降级"
            );
        }

        report.push(DateColumnQuality {
            column: column.clone(),
            unparseable,
            empty,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn table(columns: &[&str], rows: Vec<Vec<&str>>) -> RawTable {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|values| {
                columns
                    .iter()
                    .cloned()
                    .zip(values.into_iter().map(|v| v.to_string()))
                    .collect::<HashMap<_, _>>()
            })
            .collect();
        RawTable { columns, rows }
    }

    #[test]
    fn test_required_columns_ok() {
        let t = table(&["DeliveryNumber", "Country"], vec![vec!["D1", "NL"]]);
        let required = vec!["DeliveryNumber".to_string()];
        assert!(validate_required_columns(&t, &required, "Datagrid").is_ok());
    }

    #[test]
    fn test_required_columns_missing_is_fatal() {
        let t = table(&["Country"], vec![vec!["NL"]]);
        let required = vec![
            "DeliveryNumber".to_string(),
            "PODDeliveryDateShipment".to_string(),
        ];
        let err = validate_required_columns(&t, &required, "Datagrid").unwrap_err();
        match err {
            ImportError::MissingColumns { source_name: source, columns } => {
                assert_eq!(source, "Datagrid");
                assert!(columns.contains("DeliveryNumber"));
                assert!(columns.contains("PODDeliveryDateShipment"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_date_quality_counts() {
        let t = table(
            &["D", "Datum"],
            vec![
                vec!["D1", "20-02-2026"],
                vec!["D2", "geen datum"],
                vec!["D3", ""],
            ],
        );
        let report = date_quality_report(&t, &["Datum".to_string()]);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].unparseable, 1);
        assert_eq!(report[0].empty, 1);
    }
}
