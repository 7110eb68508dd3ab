// ==========================================
// OTD 绩效引擎 - 导入层
// ==========================================
// 职责: 外部表格文件 → 领域记录
// 两个数据源的表头约定不同:
// - 主数据源 (Datagrid, BI 导出): 列名逐字保留, 需与规则文档键逐字匹配
// - 参照数据源 (LIKP, SE16n 导出): 规范化为 snake_case,
//   join 配置与规则文档按规范化后的列名引用
// ==========================================

pub mod error;
pub mod file_parser;
pub mod validator;

pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, HeaderPolicy, RawTable, UniversalFileParser};
pub use validator::{date_quality_report, validate_required_columns, DateColumnQuality};

use crate::config::{RuleMethod, RuleSet};
use crate::domain::ShipmentRecord;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

// ==========================================
// ImportBatch - 单次导入的遥测信息
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub batch_id: Uuid,
    pub source: String,
    /// 解析出的行数 (不含空行)
    pub rows: usize,
    /// 因标识缺失而被丢弃的行数
    pub dropped_rows: usize,
}

/// 规则引用的全部日期列 (可用阶段的 DateCompare 字段 + 整体规则)
fn rule_date_columns(rules: &RuleSet) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for stage in &rules.stages {
        if !stage.available {
            continue;
        }
        if let Some(RuleMethod::DateCompare {
            earlier_field,
            later_field,
        }) = &stage.method
        {
            columns.push(earlier_field.clone());
            columns.push(later_field.clone());
        }
    }
    if let RuleMethod::DateCompare {
        earlier_field,
        later_field,
    } = &rules.overall
    {
        columns.push(earlier_field.clone());
        columns.push(later_field.clone());
    }
    columns.sort();
    columns.dedup();
    columns
}

/// RawTable → 发运记录
///
/// 标识缺失/为空的行丢弃并计数 (行级降级), 不中断批处理
pub fn into_shipment_records(table: RawTable, id_field: &str) -> (Vec<ShipmentRecord>, usize) {
    let mut records = Vec::with_capacity(table.rows.len());
    let mut dropped = 0usize;

    for row in table.rows {
        match ShipmentRecord::from_row(row, id_field) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!(dropped, id_field, "标识缺失的行已丢弃");
    }

    (records, dropped)
}

/// 加载主数据源 (Datagrid): 解析 + 必需列校验 + 转换
///
/// # 错误
/// - 文件/格式错误 → ImportError
/// - 必需列缺失 → ImportError::MissingColumns (配置错误类, 致命)
pub fn load_primary<P: AsRef<Path>>(
    path: P,
    rules: &RuleSet,
) -> ImportResult<(Vec<ShipmentRecord>, ImportBatch)> {
    let parser = UniversalFileParser::new(HeaderPolicy::Preserve);
    let table = parser.parse(path)?;

    validate_required_columns(&table, &rules.required.primary, "Datagrid")?;
    // 日期列健康度只观测告警, 不中断导入
    date_quality_report(&table, &rule_date_columns(rules));

    let total = table.rows.len();
    let (records, dropped) = into_shipment_records(table, &rules.dedup.key_field);

    let batch = ImportBatch {
        batch_id: Uuid::new_v4(),
        source: "Datagrid".to_string(),
        rows: total,
        dropped_rows: dropped,
    };
    info!(
        batch_id = %batch.batch_id,
        rows = batch.rows,
        dropped = batch.dropped_rows,
        "Datagrid 导入完成"
    );

    Ok((records, batch))
}

/// 加载参照数据源 (LIKP): 解析 (表头 snake_case) + 必需列校验
///
/// 返回 RawTable 而非记录: join 引擎自行按 key 建立索引,
/// 并在重复 key 时快速失败
pub fn load_reference<P: AsRef<Path>>(
    path: P,
    rules: &RuleSet,
) -> ImportResult<(RawTable, ImportBatch)> {
    let parser = UniversalFileParser::new(HeaderPolicy::SnakeCase);
    let table = parser.parse(path)?;

    validate_required_columns(&table, &rules.required.reference, &rules.join.reference_label)?;

    let batch = ImportBatch {
        batch_id: Uuid::new_v4(),
        source: rules.join.reference_label.clone(),
        rows: table.rows.len(),
        dropped_rows: 0,
    };
    info!(
        batch_id = %batch.batch_id,
        rows = batch.rows,
        source = batch.source.as_str(),
        "参照数据源导入完成"
    );

    Ok((table, batch))
}
