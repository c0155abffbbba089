use anyhow::{Context, Result};
/// 日志工具模块
///
/// 提供 tracing 初始化以及运行级别的日志输出辅助函数
use std::fs;
use std::io::Write;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::RunSummary;
use crate::services::MarketSummary;

/// 初始化 tracing
///
/// 优先读取 `RUST_LOG`，否则使用 `info`（详细模式为 `debug`）。可重复调用。
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n申报文件评分日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 申报文件评分流水线");
    info!("📊 最大并发数: {}", config.max_in_flight);
    info!(
        "📊 EDGAR 限流: {} 次/秒, 并发 {}",
        config.fetch_requests_per_second, config.fetch_max_concurrent
    );
    info!(
        "📊 分析后端: {} (并发 {})",
        config.analysis_backend, config.analysis_max_concurrent
    );
    info!("{}", "=".repeat(60));
}

/// 记录工作项枚举结果
///
/// # 参数
/// - `companies`: 公司数量
/// - `items`: 待处理的申报文件数量
/// - `max_in_flight`: 最大并发数
pub fn log_items_enumerated(companies: usize, items: usize, max_in_flight: usize) {
    info!("✓ {} 家公司共找到 {} 份待处理的申报文件", companies, items);
    info!("📋 最多同时处理 {} 份", max_in_flight);
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &RunSummary, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(duration) = summary.duration() {
        info!("耗时: {:.1} 秒", duration.num_milliseconds() as f64 / 1000.0);
    }
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.succeeded, summary.attempted);
    info!("❌ 失败: {}", summary.failed);
    info!("⏭️ 跳过: {}", summary.skipped);
    for failure in &summary.failures {
        warn!(
            "  ❌ {} [{}] {}",
            failure.item,
            failure.stage,
            truncate_text(&failure.reason, 160)
        );
    }
    info!("{}", "=".repeat(60));

    if let Err(e) = append_run_report(log_file_path, summary) {
        warn!("⚠️ 写入日志文件失败: {}", e);
    }
    info!("\n日志已保存至: {}", log_file_path);
}

/// 把每个工作项的结果追加到日志文件
pub fn append_run_report(log_file_path: &str, summary: &RunSummary) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path))?;

    writeln!(
        file,
        "尝试 {} / 成功 {} / 失败 {} / 跳过 {}",
        summary.attempted, summary.succeeded, summary.failed, summary.skipped
    )?;
    for outcome in &summary.outcomes {
        let stage = outcome.stage.map(|s| s.to_string()).unwrap_or_default();
        writeln!(
            file,
            "{:?}\t{}\t{}\t{}",
            outcome.kind,
            outcome.item,
            stage,
            outcome.reason.as_deref().unwrap_or("")
        )?;
    }
    writeln!(file)?;
    Ok(())
}

/// 输出排名与市场摘要
pub fn log_ranking(summary: &MarketSummary) {
    if summary.is_empty() {
        info!("📊 暂无已评分的公司，跳过排名");
        return;
    }

    info!("\n{}", "=".repeat(60));
    info!("📊 投资排名（{} 家公司）", summary.total_companies);
    info!(
        "平均分: {:.1}  标准差: {:.1}",
        summary.mean_score, summary.score_std_dev
    );
    for (tier, count) in summary.tier_distribution.iter().rev() {
        info!("  {:<12} {}", tier.label(), count);
    }
    info!("{}", "─".repeat(60));
    for entry in &summary.top_performers {
        info!(
            "  #{:<3} {:<6} FY{} {:>6.1}  {:<11} 置信度 {:.2}  目标价 {:+.1}%",
            entry.rank,
            entry.ticker,
            entry.fiscal_year,
            entry.score,
            entry.tier.label(),
            entry.confidence,
            entry.target_price_adjustment
        );
    }
    if summary.ranked.len() > summary.top_performers.len() {
        info!("{}", "─".repeat(60));
        info!("末位:");
        for entry in &summary.bottom_performers {
            info!(
                "  #{:<3} {:<6} {:>6.1}  {}",
                entry.rank,
                entry.ticker,
                entry.score,
                entry.tier.label()
            );
        }
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemOutcome, Stage};

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("风险因素", 2), "风险...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_log_file_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let path = path.to_str().unwrap();

        init_log_file(path).unwrap();
        let mut summary = RunSummary::start();
        summary.record(ItemOutcome::succeeded("AAPL/a"));
        summary.record(ItemOutcome::failed("MSFT/m", Stage::Fetch, "HTTP 404"));
        summary.finish();
        append_run_report(path, &summary).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("申报文件评分日志"));
        assert!(content.contains("尝试 2 / 成功 1 / 失败 1 / 跳过 0"));
        assert!(content.contains("MSFT/m\tfetch\tHTTP 404"));
    }
}
