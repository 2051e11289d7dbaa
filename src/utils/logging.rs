/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::EvaluationSummary;

/// 初始化日志订阅器
///
/// `RUST_LOG` 优先；否则 verbose 时为 debug 级别，默认 info 级别。
/// 重复调用不会报错。
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "exam_grader=debug"
    } else {
        "exam_grader=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 试卷批改助手启动");
    info!("🤖 模型: {} ({})", config.llm_model_name, config.llm_api_base_url);
    info!("📊 最大并发提取数: {}", config.max_concurrent_extractions);
    info!("{}", "=".repeat(60));
}

/// 记录批量评分开始信息
///
/// # 参数
/// - `total`: 试卷总数
/// - `max_concurrent`: 最大并发提取数
pub fn log_batch_start(total: usize, max_concurrent: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始批改 {} 份试卷", total);
    info!("📄 文本提取并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 记录批量评分完成信息
pub fn log_batch_complete(summary: &EvaluationSummary) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 批改完成: 共 {} 名学生", summary.total_students);
    info!("📊 平均分: {:.2}", summary.average_grade);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
