// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 引擎遥测 (去重计数 / join 无匹配 / 配置回退) 走 info,
// 行级降级细节走 debug; 文件解析依赖默认压到 warn
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 默认过滤指令: 引擎自身 info, 解析类依赖只报告警
const DEFAULT_DIRECTIVES: &str = "warn,otd_engine=info";

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: warn,otd_engine=info）
///   例如: RUST_LOG=otd_engine=trace 查看逐行降级明细
///
/// # 示例
/// ```no_run
/// use otd_engine::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    // 配置日志格式
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// 初始化测试环境的日志系统
///
/// 引擎降级路径 (UNKNOWN 判定来源) 在 debug 级, 便于排查测试数据
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("otd_engine=debug"))
        .with_test_writer()
        .try_init();
}
