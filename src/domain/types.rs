// ==========================================
// OTD 绩效引擎 - 领域类型定义
// ==========================================
// 红线: 绩效判定是三值制 (PASS/FAIL/UNKNOWN), 不是布尔制
// UNKNOWN 必须向上传播, 不得静默折算为 PASS 或 FAIL
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 绩效判定结果 (Performance Outcome)
// ==========================================
// UNKNOWN 的来源:
// - 阶段不可用 (available = false)
// - 规则所需字段为空
// - 列值命中 exclude 集合 (从分母中剔除, 例如 "no POD")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceOutcome {
    Pass,    // 达标
    Fail,    // 未达标
    Unknown, // 无法判定 (不计入分母)
}

impl PerformanceOutcome {
    /// 是否为可计入分母的已知结果 (PASS 或 FAIL)
    pub fn is_known(&self) -> bool {
        !matches!(self, PerformanceOutcome::Unknown)
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, PerformanceOutcome::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, PerformanceOutcome::Fail)
    }
}

impl fmt::Display for PerformanceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceOutcome::Pass => write!(f, "PASS"),
            PerformanceOutcome::Fail => write!(f, "FAIL"),
            PerformanceOutcome::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ==========================================
// 交叉验证状态 (Validation Status)
// ==========================================
// 口径: 差异为百分点 (percentage point)
// < 0.5 → OK / 0.5~2.0 → WARN / > 2.0 → FAIL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Ok,            // 一致
    Warn,          // 轻微偏差
    Fail,          // 显著偏差 (应视为实现缺陷排查)
    NotApplicable, // 无可用参照列
}

/// WARN 阈值 (百分点)
pub const VALIDATION_WARN_THRESHOLD: f64 = 0.5;
/// FAIL 阈值 (百分点)
pub const VALIDATION_FAIL_THRESHOLD: f64 = 2.0;

impl ValidationStatus {
    /// 根据差异 (百分点) 分级
    ///
    /// # 参数
    /// - discrepancy: abs(引擎口径 - 参照口径), None 表示无法对比
    pub fn from_discrepancy(discrepancy: Option<f64>) -> Self {
        match discrepancy {
            None => ValidationStatus::NotApplicable,
            Some(d) if d < VALIDATION_WARN_THRESHOLD => ValidationStatus::Ok,
            Some(d) if d <= VALIDATION_FAIL_THRESHOLD => ValidationStatus::Warn,
            Some(_) => ValidationStatus::Fail,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::Ok => write!(f, "OK"),
            ValidationStatus::Warn => write!(f, "WARN"),
            ValidationStatus::Fail => write!(f, "FAIL"),
            ValidationStatus::NotApplicable => write!(f, "N/A"),
        }
    }
}

// ==========================================
// 时间分桶 (Period)
// ==========================================
// 用于趋势序列: ISO 周 ("W<ww>-<yyyy>") 或月 ("<yyyy>-<mm>")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Period {
    Week,
    Month,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Week => write!(f, "WEEK"),
            Period::Month => write!(f, "MONTH"),
        }
    }
}
