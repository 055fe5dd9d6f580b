//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数

use crate::config::Config;
use crate::controller::BatchOutcome;
use crate::scheduler::PoolStats;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use tracing::info;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n标签页导出日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 向日志文件追加本次批次的汇总
///
/// # 参数
/// - `log_file_path`: 日志文件路径
/// - `outcome`: 批次结果
pub fn append_summary(log_file_path: &str, outcome: &BatchOutcome) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path))?;
    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        describe_outcome(outcome)
    )?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 运行配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 标签页批量导出");
    info!("📊 最大并发数: {}", config.max_concurrency);
    info!("📝 导出格式: {}", config.output_format);
    info!(
        "⏱️ 超时: {:?} / 等待: {:?}",
        config.tab_timeout, config.settle_delay
    );
    info!("{}", "=".repeat(60));
}

/// 记录任务加载信息
///
/// # 参数
/// - `total`: 任务总数
/// - `max_concurrent`: 最大并发数
pub fn log_items_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个待导出的页面", total);
    info!("📋 同时最多打开 {} 个标签页\n", max_concurrent.max(1));
}

/// 打印最终统计信息
///
/// # 参数
/// - `outcome`: 批次结果
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(outcome: &BatchOutcome, log_file_path: &str) {
    let stats = outcome.stats();
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.completed, stats.total);
    log_drops(stats);
    info!("📦 {}", describe_outcome(outcome));
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

fn log_drops(stats: &PoolStats) {
    info!("❌ 创建失败: {}", stats.launch_failed);
    info!("❌ 通信失败: {}", stats.transport_failed);
    info!("❌ 提取失败: {}", stats.extraction_failed);
    info!("⏰ 超时: {}", stats.timed_out);
    if stats.cancelled + stats.abandoned > 0 {
        info!(
            "⏹️ 停止时取消: {}, 未启动: {}",
            stats.cancelled, stats.abandoned
        );
    }
}

/// 一行描述批次结果
pub fn describe_outcome(outcome: &BatchOutcome) -> String {
    match outcome {
        BatchOutcome::Archived {
            path,
            entries,
            bytes,
            ..
        } => format!(
            "已生成归档 {} ({} 个文件, {} 字节)",
            path.display(),
            entries,
            bytes
        ),
        BatchOutcome::NothingProduced { stats } => {
            format!("没有成功的结果，未生成归档 (共 {} 个任务)", stats.total)
        }
        BatchOutcome::Stopped { stats } => format!(
            "批次已停止，未生成归档 (成功 {}, 未启动 {})",
            stats.completed, stats.abandoned
        ),
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
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
