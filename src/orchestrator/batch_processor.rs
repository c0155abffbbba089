//! 批量申报文件处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、存储、EDGAR 客户端、分析后端
//! 2. **工作项枚举**：并发展开每家公司的最近 N 份 10-K
//! 3. **并发控制**：在途数量由 Semaphore 限制，许可在 spawn 之前获取（背压）
//! 4. **取消**：收到取消信号后不再派发新工作项，在途工作项在下一步之前停止
//! 5. **全局统计**：唯一写入者按完成顺序汇总 RunSummary
//!
//! 单个工作项的失败只记录，不会中断整个运行；只有配置错误是致命的。

use anyhow::{Context, Result};
use futures::stream::{self, FuturesUnordered, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::clients::{EdgarClient, LlmClient};
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::infrastructure::{cancel_pair, CancelHandle, JsonFileStore, RateLimiters, RetryPolicy, Store};
use crate::models::{load_companies, Company, FilingRecord, ItemOutcome, RunSummary, Stage};
use crate::orchestrator::company_processor::{self, CompanyListing};
use crate::services::{
    market_summary, AnalysisProvider, FilingSource, ItemSectionExtractor, LexiconAnalysisProvider,
    LlmAnalysisProvider, MarketSummary, ProcessingState, SectionExtractor,
};
use crate::utils::logging::{
    init_log_file, log_items_enumerated, log_ranking, log_startup, print_final_stats,
};
use crate::workflow::{FilingCtx, FilingFlow, FlowDeps, ProcessResult};

/// 跳过原因：已评分
pub const SKIP_ALREADY_SCORED: &str = "already scored";
/// 跳过原因：运行被取消
pub const SKIP_CANCELLED: &str = "cancelled";

/// 编排器设置
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// 同时在途的工作项上限
    pub max_in_flight: usize,
    /// 单个分析维度输入的最大字符数
    pub analysis_input_chars: usize,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_in_flight: config.max_in_flight,
            analysis_input_chars: config.analysis_input_chars,
        }
    }
}

/// 编排器依赖的外部协作者
pub struct Collaborators {
    pub source: Arc<dyn FilingSource>,
    pub extractor: Arc<dyn SectionExtractor>,
    pub provider: Arc<dyn AnalysisProvider>,
    pub store: Arc<dyn Store>,
    pub limiters: RateLimiters,
    pub retry: RetryPolicy,
}

/// 待派发的工作项
struct WorkItem {
    ctx: FilingCtx,
    record: FilingRecord,
}

/// 流水线编排器
pub struct Orchestrator {
    settings: OrchestratorSettings,
    deps: FlowDeps,
    flow: FilingFlow,
    cancel: CancelHandle,
}

impl Orchestrator {
    /// 创建编排器，非法的并发设置在这里直接报错
    pub fn new(settings: OrchestratorSettings, collaborators: Collaborators) -> PipelineResult<Self> {
        if settings.max_in_flight == 0 {
            return Err(PipelineError::Configuration(
                "最大在途工作项数必须大于 0".to_string(),
            ));
        }

        let deps = FlowDeps {
            source: collaborators.source,
            extractor: collaborators.extractor,
            provider: collaborators.provider,
            state: ProcessingState::new(collaborators.store),
            limiters: collaborators.limiters,
            retry: collaborators.retry,
        };
        let flow = FilingFlow::new(deps.clone(), settings.analysis_input_chars);
        let (cancel, _signal) = cancel_pair();

        Ok(Self {
            settings,
            deps,
            flow,
            cancel,
        })
    }

    /// 运行级取消句柄
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> &ProcessingState {
        &self.deps.state
    }

    /// 处理每家公司最近 `filings_per_company` 份申报文件
    ///
    /// 返回的 RunSummary 覆盖每一个工作项：成功、失败（含原因）或跳过。
    pub async fn run(
        &self,
        companies: &[Company],
        filings_per_company: usize,
    ) -> PipelineResult<RunSummary> {
        if filings_per_company == 0 {
            return Err(PipelineError::Configuration(
                "每家公司的申报文件数必须大于 0".to_string(),
            ));
        }

        let mut summary = RunSummary::start();
        let items = self
            .enumerate(companies, filings_per_company, &mut summary)
            .await;
        log_items_enumerated(companies.len(), items.len(), self.settings.max_in_flight);

        self.dispatch(items, &mut summary).await;

        summary.finish();
        info!(
            "📊 运行结束: 成功 {} / 失败 {} / 跳过 {}",
            summary.succeeded, summary.failed, summary.skipped
        );
        Ok(summary)
    }

    /// 最新的排名与市场摘要
    pub async fn ranking(&self) -> PipelineResult<MarketSummary> {
        let records = self.deps.state.scored_records().await?;
        Ok(market_summary(&records))
    }

    // ========== 枚举 ==========

    async fn enumerate(
        &self,
        companies: &[Company],
        filings_per_company: usize,
        summary: &mut RunSummary,
    ) -> Vec<WorkItem> {
        let signal = self.cancel.signal();
        let listings: Vec<(&Company, Option<PipelineResult<CompanyListing>>)> =
            stream::iter(companies)
                .map(|company| {
                    let signal = signal.clone();
                    async move {
                        if signal.is_cancelled() {
                            return (company, None);
                        }
                        let listing = company_processor::enumerate_company(
                            &self.deps,
                            company,
                            filings_per_company,
                        )
                        .await;
                        (company, Some(listing))
                    }
                })
                .buffered(self.settings.max_in_flight)
                .collect()
                .await;

        let mut items = Vec::new();
        for (company, listing) in listings {
            match listing {
                None => summary.record(ItemOutcome::skipped(company.ticker.clone(), SKIP_CANCELLED)),
                Some(Err(e)) => {
                    error!("[{}] ❌ 无法列出申报文件: {}", company.ticker, e);
                    summary.record(ItemOutcome::failed(
                        company.ticker.clone(),
                        Stage::Enumerate,
                        e.to_string(),
                    ));
                }
                Some(Ok(listing)) => {
                    for (key, e) in listing.failures {
                        summary.record(ItemOutcome::failed(key, Stage::Enumerate, e.to_string()));
                    }
                    for record in listing.records {
                        let ctx = FilingCtx::for_filing(&record.filing, items.len() + 1);
                        items.push(WorkItem { ctx, record });
                    }
                }
            }
        }
        items
    }

    // ========== 派发 ==========

    async fn dispatch(&self, items: Vec<WorkItem>, summary: &mut RunSummary) {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_in_flight));
        let mut signal = self.cancel.signal();
        let mut running = FuturesUnordered::new();
        let total = items.len();

        for item in items {
            let key = item.ctx.item_key();

            // 已评分的直接跳过，不占用在途名额
            if item.record.is_scored() {
                info!("{} ⏭️ 已评分，跳过", item.ctx);
                summary.record(ItemOutcome::skipped(key, SKIP_ALREADY_SCORED));
                continue;
            }

            if signal.is_cancelled() {
                summary.record(ItemOutcome::skipped(key, SKIP_CANCELLED));
                continue;
            }

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => permit.ok(),
                _ = signal.cancelled() => None,
            };
            let Some(permit) = permit else {
                summary.record(ItemOutcome::skipped(key, SKIP_CANCELLED));
                continue;
            };

            info!(
                "{} 📦 开始处理 ({}/{})",
                item.ctx, item.ctx.item_index, total
            );
            let stage_hint = item.record.resume_point().unwrap_or(Stage::Score);
            let flow = self.flow.clone();
            let task_signal = self.cancel.signal();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let WorkItem { ctx, record } = item;
                let key = ctx.item_key();
                match flow.run(&ctx, record, &task_signal).await {
                    Ok(ProcessResult::Scored(_)) => ItemOutcome::succeeded(key),
                    Ok(ProcessResult::AlreadyScored) => ItemOutcome::skipped(key, SKIP_ALREADY_SCORED),
                    Ok(ProcessResult::Cancelled) => ItemOutcome::skipped(key, SKIP_CANCELLED),
                    Err(failure) => ItemOutcome::failed(key, failure.stage, failure.error.to_string()),
                }
            });
            running.push(async move { (key, stage_hint, handle.await) });
        }

        // 唯一写入者：按完成顺序汇总
        while let Some((key, stage_hint, joined)) = running.next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    error!("[{}] 任务执行失败: {}", key, e);
                    summary.record(ItemOutcome::failed(
                        key,
                        stage_hint,
                        format!("任务异常终止: {}", e),
                    ));
                }
            }
        }
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: Orchestrator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);
        config.validate().context("配置无效")?;

        let store = JsonFileStore::open(&config.state_dir)
            .await
            .with_context(|| format!("无法打开状态目录: {}", config.state_dir))?;
        let source = EdgarClient::new(&config)?;

        let provider: Arc<dyn AnalysisProvider> = match config.analysis_backend.as_str() {
            "lexicon" => Arc::new(LexiconAnalysisProvider::new()),
            _ => Arc::new(LlmAnalysisProvider::new(LlmClient::new(&config))),
        };
        info!("✓ 分析后端: {}", provider.name());

        let collaborators = Collaborators {
            source: Arc::new(source),
            extractor: Arc::new(ItemSectionExtractor::new(config.max_section_chars)),
            provider,
            store: Arc::new(store),
            limiters: config.rate_limiters()?,
            retry: config.retry_policy(),
        };
        let orchestrator =
            Orchestrator::new(OrchestratorSettings::from_config(&config), collaborators)?;

        Ok(Self {
            config,
            orchestrator,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunSummary> {
        let companies = self.load_companies().await?;

        if companies.is_empty() {
            warn!("⚠️ 公司列表为空，程序结束");
            let mut summary = RunSummary::start();
            summary.finish();
            return Ok(summary);
        }

        // Ctrl-C → 取消信号
        let cancel = self.orchestrator.cancel_handle();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⚠️ 收到 Ctrl-C，停止派发新的工作项，等待在途步骤完成...");
                cancel.cancel();
            }
        });

        let summary = self
            .orchestrator
            .run(&companies, self.config.filings_per_company)
            .await;
        ctrl_c.abort();
        let summary = summary?;

        // 输出最终统计
        print_final_stats(&summary, &self.config.output_log_file);

        match self.orchestrator.ranking().await {
            Ok(market) => log_ranking(&market),
            Err(e) => warn!("⚠️ 无法生成排名: {}", e),
        }

        Ok(summary)
    }

    /// 加载公司列表
    async fn load_companies(&self) -> Result<Vec<Company>> {
        info!("\n📁 正在加载公司列表: {}", self.config.companies_file);
        load_companies(Path::new(&self.config.companies_file)).await
    }
}
