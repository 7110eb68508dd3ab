// ==========================================
// OTD 绩效引擎 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: RawTable (表头 + 按列名索引的行)
// ==========================================
// 表头策略:
// - Preserve: 保留原始大小写 (主数据源, 列名必须与规则文档逐字匹配)
// - SnakeCase: 规范化为 snake_case (二级数据源)
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook, Reader, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

// ==========================================
// 表头策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPolicy {
    /// 保留原始列名 (TRIM 之后逐字保留)
    Preserve,
    /// 规范化: TRIM + 小写 + 空格/连字符 → 下划线
    SnakeCase,
}

impl HeaderPolicy {
    fn apply(&self, header: &str) -> String {
        let trimmed = header.trim();
        match self {
            HeaderPolicy::Preserve => trimmed.to_string(),
            HeaderPolicy::SnakeCase => trimmed
                .to_lowercase()
                .replace(' ', "_")
                .replace('-', "_"),
        }
    }
}

// ==========================================
// RawTable - 解析产物
// ==========================================
// 不变量: 每一行对全部表头都有键 (空串 = NULL),
// 使"列缺失"与"值为空"在下游可以区分
#[derive(Debug, Clone)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl RawTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// 文件解析器接口
pub trait FileParser {
    fn parse_to_raw_table(&self, file_path: &Path) -> ImportResult<RawTable>;
}

fn build_table(
    headers: Vec<String>,
    data_rows: Vec<Vec<String>>,
) -> RawTable {
    let mut rows = Vec::new();
    for data_row in data_rows {
        let mut row_map: HashMap<String, String> = HashMap::new();
        for (col_idx, header) in headers.iter().enumerate() {
            let value = data_row
                .get(col_idx)
                .map(|v| v.trim().to_string())
                .unwrap_or_default();
            row_map.insert(header.clone(), value);
        }

        // 跳过完全空白的行
        if row_map.values().all(|v| v.is_empty()) {
            continue;
        }

        rows.push(row_map);
    }

    RawTable {
        columns: headers,
        rows,
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser {
    pub header_policy: HeaderPolicy,
}

impl CsvParser {
    /// 嗅探分隔符: 首行中 ';' 多于 ',' 则按分号解析
    /// (两个数据源的导出工具分隔符不一致)
    fn sniff_delimiter(path: &Path) -> ImportResult<u8> {
        let file = File::open(path)?;
        let mut first_line = String::new();
        BufReader::new(file).read_line(&mut first_line)?;

        let semicolons = first_line.matches(';').count();
        let commas = first_line.matches(',').count();
        if semicolons > commas {
            Ok(b';')
        } else {
            Ok(b',')
        }
    }
}

impl FileParser for CsvParser {
    fn parse_to_raw_table(&self, file_path: &Path) -> ImportResult<RawTable> {
        let path = file_path;

        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let delimiter = Self::sniff_delimiter(path)?;
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| self.header_policy.apply(h))
            .collect();

        let mut data_rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            data_rows.push(record.iter().map(|v| v.to_string()).collect());
        }

        Ok(build_table(headers, data_rows))
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser {
    pub header_policy: HeaderPolicy,
}

impl FileParser for ExcelParser {
    fn parse_to_raw_table(&self, file_path: &Path) -> ImportResult<RawTable> {
        let path = file_path;

        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e: calamine::XlsxError| ImportError::ExcelParseError(e.to_string()))?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Err(ImportError::ExcelParseError(
                "Excel 文件无工作表".to_string(),
            ));
        }

        let sheet_name = sheet_names[0].clone();
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

        let mut rows_iter = range.rows();
        let header_row = rows_iter
            .next()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无数据行".to_string()))?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| self.header_policy.apply(&cell.to_string()))
            .collect();

        let data_rows: Vec<Vec<String>> = rows_iter
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();

        Ok(build_table(headers, data_rows))
    }
}

// ==========================================
// 通用文件解析器 (根据扩展名自动选择)
// ==========================================
pub struct UniversalFileParser {
    pub header_policy: HeaderPolicy,
}

impl UniversalFileParser {
    pub fn new(header_policy: HeaderPolicy) -> Self {
        Self { header_policy }
    }

    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<RawTable> {
        let path = file_path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvParser {
                header_policy: self.header_policy,
            }
            .parse_to_raw_table(path),
            "xlsx" | "xls" => ExcelParser {
                header_policy: self.header_policy,
            }
            .parse_to_raw_table(path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}
