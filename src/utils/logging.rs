//! 日志工具模块
//!
//! 提供日志初始化和格式化输出的辅助函数

use anyhow::Result;
use std::fs;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::models::BlockStats;

/// 初始化 tracing，`RUST_LOG` 未设置时默认 info
///
/// 重复调用不会报错（测试中多次初始化）。
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// 初始化日志文件
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n关键词分析日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 单线程关键词分析模式");
    info!("📦 每批关键词数: {}", config.chunk_size);
    info!("🔁 封锁后最大重试: {}", config.max_retries);
    info!(
        "⏭️  跳过阈值: A ≥ {} / B ≥ {}",
        config.thresholds.narrow_match, config.thresholds.title_match
    );
    if !config.recovery.enabled {
        info!("⚠️  封锁恢复已关闭，第一次封锁即终止");
    }
    info!("{}", "=".repeat(60));
}

/// 记录批次规划信息
pub fn log_plan(total: usize, already_processed: usize, pending: usize, batches: usize) {
    info!("✓ 共 {} 个关键词（含重复）", total);
    if already_processed > 0 {
        info!("💾 账本中已有 {} 个，跳过", already_processed);
    }
    info!("📋 待处理 {} 个，分 {} 批\n", pending, batches);
}

/// 记录批次开始信息
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    size: usize,
    processed: usize,
    total: usize,
) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批 ({} 个关键词)", batch_num, total_batches, size);
    info!("📄 当前进度: {}/{}", processed, total);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(
    finished: bool,
    processed: usize,
    total: usize,
    stats: &BlockStats,
    log_file_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    if finished {
        info!("📊 全部处理完成统计");
    } else {
        info!("📊 任务终止统计");
    }
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 已处理: {}/{}", processed, total);
    info!(
        "🛑 封锁检测: {} 次 / 恢复 {} 次",
        stats.detection_count, stats.successful_recoveries
    );
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
