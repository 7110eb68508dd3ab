// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持荷兰语（默认）和英文
// 报表面向的标签 (漏斗行 / 校验状态 / 判定) 统一从这里取词,
// 引擎内部日志不翻译
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

use crate::domain::{PerformanceOutcome, ValidationStatus};

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"nl" 或 "en"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use otd_engine::i18n::t;
/// let msg = t("common.success");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use otd_engine::i18n::t_with_args;
/// let msg = t_with_args("import.file_not_found", &[("path", "/tmp/test.csv")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

/// 三值判定的报表标签
pub fn outcome_label(outcome: PerformanceOutcome) -> String {
    match outcome {
        PerformanceOutcome::Pass => t("outcome.pass"),
        PerformanceOutcome::Fail => t("outcome.fail"),
        PerformanceOutcome::Unknown => t("outcome.unknown"),
    }
}

/// 交叉校验状态的报表标签
pub fn validation_label(status: ValidationStatus) -> String {
    match status {
        ValidationStatus::Ok => t("validation.ok"),
        ValidationStatus::Warn => t("validation.warn"),
        ValidationStatus::Fail => t("validation.fail"),
        ValidationStatus::NotApplicable => t("validation.not_applicable"),
    }
}
