// ==========================================
// OTD 绩效引擎 - 日期工具
// ==========================================
// 约定: 数据源为日前置格式 (dayfirst), 例如 20-02-2026
// 解析失败一律返回 None, 由调用方按 UNKNOWN 降级
// ==========================================

use chrono::{Datelike, NaiveDate};

/// 按日前置约定解析日期字符串
///
/// 兼容格式 (按顺序尝试):
/// - `%d-%m-%Y` / `%d/%m/%Y` / `%d.%m.%Y`
/// - `%Y-%m-%d` (ISO, Excel 导出常见)
///
/// 带时间尾巴的值 ("20-02-2026 00:00:00") 先截断到日期部分。
pub fn parse_date_dayfirst(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    // 截断时间部分
    let date_part = trimmed.split_whitespace().next().unwrap_or(trimmed);
    // ISO 带 'T' 的变体
    let date_part = date_part.split('T').next().unwrap_or(date_part);

    const FORMATS: [&str; 4] = ["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%Y-%m-%d"];
    for fmt in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, fmt) {
            return Some(date);
        }
    }

    None
}

/// ISO 周标签, 格式 "W03-2026"
pub fn week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("W{:02}-{}", iso.week(), iso.year())
}

/// 月标签, 格式 "2026-01"
pub fn month_label(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}
