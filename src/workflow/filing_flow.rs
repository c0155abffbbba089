//! 申报文件处理流程 - 流程层
//!
//! 核心职责：定义"一份申报文件"的完整处理流程
//!
//! 流程顺序（每一步都以上一步已持久化的产物为前提）：
//! 1. fetch → 原始内容
//! 2. extract → 章节
//! 3. analyze → 五个维度的子评分（单个维度失败只记为缺失）
//! 4. score → 综合结果
//!
//! 续跑时从记录中"最后完成的步骤"的下一步开始；已评分的申报文件直接跳过。
//! 取消信号只在步骤之间检查，不会中断正在执行的步骤。

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{AnalysisErrorKind, PipelineError, PipelineResult};
use crate::infrastructure::{CancelSignal, RateLimiters, Resource, RetryPolicy};
use crate::models::{
    CompositeResult, Dimension, FilingRecord, FilingStatus, QualitativeSection, SectionName, Stage,
    SubScores,
};
use crate::services::{
    build_input, AnalysisProvider, FilingSource, Payload, ProcessingState, ScoringEngine,
    SectionExtractor,
};
use crate::utils::logging::truncate_text;
use crate::workflow::filing_ctx::FilingCtx;

/// 没有任何来源章节时记录的缺失原因
pub const NO_SOURCE_SECTIONS: &str = "no source sections";

/// 申报文件处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult {
    /// 本次运行完成评分
    Scored(CompositeResult),
    /// 之前已经评分，跳过
    AlreadyScored,
    /// 收到取消信号，在下一步开始前停止
    Cancelled,
}

/// 某一步失败
#[derive(Debug)]
pub struct FlowFailure {
    pub stage: Stage,
    pub error: PipelineError,
}

impl Display for FlowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} 失败: {}", self.stage, self.error)
    }
}

/// 流程依赖的能力
#[derive(Clone)]
pub struct FlowDeps {
    pub source: Arc<dyn FilingSource>,
    pub extractor: Arc<dyn SectionExtractor>,
    pub provider: Arc<dyn AnalysisProvider>,
    pub state: ProcessingState,
    pub limiters: RateLimiters,
    pub retry: RetryPolicy,
}

/// 申报文件处理流程
///
/// - 编排单份申报文件的完整处理流程
/// - 决定从哪一步开始、何时停止
/// - 不持有跨工作项的状态
#[derive(Clone)]
pub struct FilingFlow {
    deps: FlowDeps,
    scoring: ScoringEngine,
    analysis_input_chars: usize,
}

impl FilingFlow {
    pub fn new(deps: FlowDeps, analysis_input_chars: usize) -> Self {
        Self {
            deps,
            scoring: ScoringEngine::new(),
            analysis_input_chars,
        }
    }

    pub async fn run(
        &self,
        ctx: &FilingCtx,
        mut record: FilingRecord,
        cancel: &CancelSignal,
    ) -> Result<ProcessResult, FlowFailure> {
        if record.is_scored() {
            info!("{} ⏭️ 已评分，跳过", ctx);
            return Ok(ProcessResult::AlreadyScored);
        }

        if record.status == FilingStatus::Failed {
            info!(
                "{} 🔁 上次失败（{}），从 {} 之后继续",
                ctx,
                record.last_error.as_deref().unwrap_or("未知原因"),
                record.last_completed
            );
        }

        while let Some(stage) = record.resume_point() {
            if cancel.is_cancelled() {
                info!("{} ⏹️ 收到取消信号，在 {} 之前停止", ctx, stage);
                return Ok(ProcessResult::Cancelled);
            }

            let step = match stage {
                Stage::Fetch => self.fetch(ctx, &record).await,
                Stage::Extract => self.extract(ctx, &record).await,
                Stage::Analyze => self.analyze(ctx, &record).await,
                Stage::Score => self.score(ctx, &record).await,
                Stage::Enumerate => Err(PipelineError::InvalidTransition {
                    filing: record.id().clone(),
                    from: record.status,
                    to: record.status,
                }),
            };

            record = match step {
                Ok(next) => next,
                Err(err) => return Err(self.fail(ctx, &record, stage, err).await),
            };
        }

        match record.composite {
            Some(composite) => {
                info!(
                    "{} ✅ 综合分 {:.1} → {}",
                    ctx, composite.score, composite.tier
                );
                Ok(ProcessResult::Scored(composite))
            }
            None => Err(FlowFailure {
                stage: Stage::Score,
                error: PipelineError::Storage(format!("{} 已评分但缺少综合结果", record.id())),
            }),
        }
    }

    /// 记录失败，保留已有产物
    async fn fail(
        &self,
        ctx: &FilingCtx,
        record: &FilingRecord,
        stage: Stage,
        err: PipelineError,
    ) -> FlowFailure {
        error!("{} ❌ {} 失败: {}", ctx, stage, err);
        if let Err(e) = self.deps.state.mark_failed(record.id(), &err.to_string()).await {
            error!("{} ⚠️ 无法记录失败状态: {}", ctx, e);
        }
        FlowFailure { stage, error: err }
    }

    // ========== 1. 抓取 ==========

    async fn fetch(&self, ctx: &FilingCtx, record: &FilingRecord) -> PipelineResult<FilingRecord> {
        let filing = &record.filing;
        let operation = format!("{} fetch", ctx);

        let content = {
            let _lease = self.deps.limiters.acquire(Resource::FilingSource).await?;
            self.deps
                .retry
                .run(&operation, || self.deps.source.fetch(filing))
                .await?
        };
        info!("{} 📥 抓取完成（{} 字符）", ctx, content.len());

        self.deps
            .state
            .advance(record.id(), FilingStatus::Fetching, Payload::RawContent(content))
            .await
    }

    // ========== 2. 提取 ==========

    async fn extract(&self, ctx: &FilingCtx, record: &FilingRecord) -> PipelineResult<FilingRecord> {
        let raw = record.raw_content.as_deref().ok_or_else(|| {
            PipelineError::Storage(format!("{} 缺少已抓取的原始内容", record.id()))
        })?;
        let operation = format!("{} extract", ctx);

        let extracted = self
            .deps
            .retry
            .run(&operation, || self.deps.extractor.extract(raw))
            .await?;

        let extracted_at = Utc::now();
        let sections: BTreeMap<SectionName, QualitativeSection> = extracted
            .into_iter()
            .map(|(name, text)| {
                let section = QualitativeSection::new(record.id().clone(), name, text, extracted_at);
                (name, section)
            })
            .collect();

        info!("{} 📄 提取到 {} 个章节", ctx, sections.len());
        for section in sections.values() {
            debug!(
                "{}   {} ({} 词): {}",
                ctx,
                section.name.title(),
                section.word_count,
                truncate_text(&section.text, 80)
            );
        }

        self.deps
            .state
            .advance(record.id(), FilingStatus::Extracting, Payload::Sections(sections))
            .await
    }

    // ========== 3. 分析 ==========

    async fn analyze(&self, ctx: &FilingCtx, record: &FilingRecord) -> PipelineResult<FilingRecord> {
        let results = join_all(
            Dimension::ALL
                .into_iter()
                .map(|dimension| self.analyze_dimension(ctx, dimension, &record.sections)),
        )
        .await;

        let mut sub_scores = SubScores::default();
        for (dimension, result) in Dimension::ALL.into_iter().zip(results) {
            match result {
                Ok(score) => sub_scores.set(dimension, Some(score)),
                Err(reason) => {
                    warn!("{} ⚠️ {} 维度缺失: {}", ctx, dimension, reason);
                    sub_scores.mark_missing(dimension, reason);
                }
            }
        }

        info!(
            "{} 🧮 子评分 {}/{} 个维度可用",
            ctx,
            sub_scores.present_count(),
            Dimension::ALL.len()
        );

        self.deps
            .state
            .advance(record.id(), FilingStatus::Analyzing, Payload::SubScores(sub_scores))
            .await
    }

    /// 单个维度的分析，失败时返回缺失原因
    async fn analyze_dimension(
        &self,
        ctx: &FilingCtx,
        dimension: Dimension,
        sections: &BTreeMap<SectionName, QualitativeSection>,
    ) -> Result<f64, String> {
        let Some(input) = build_input(dimension, sections, self.analysis_input_chars) else {
            return Err(NO_SOURCE_SECTIONS.to_string());
        };

        let operation = format!("{} analyze {}", ctx, dimension);
        let _lease = self
            .deps
            .limiters
            .acquire(Resource::AnalysisProvider)
            .await
            .map_err(|e| e.to_string())?;

        let score = self
            .deps
            .retry
            .run(&operation, || {
                let input = input.as_str();
                async move {
                    let score = self.deps.provider.analyze(dimension, input).await?;
                    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
                        return Err(PipelineError::analysis(
                            dimension,
                            AnalysisErrorKind::InvalidResponse,
                            format!("分数超出范围: {}", score),
                        ));
                    }
                    Ok(score)
                }
            })
            .await
            .map_err(|e| e.to_string())?;

        debug!(
            "{} {} = {:.1} ({})",
            ctx,
            dimension,
            score,
            self.deps.provider.name()
        );
        Ok(score)
    }

    // ========== 4. 评分 ==========

    async fn score(&self, ctx: &FilingCtx, record: &FilingRecord) -> PipelineResult<FilingRecord> {
        let sub_scores = record.sub_scores.clone().unwrap_or_default();
        let composite = self
            .scoring
            .composite(&record.filing, &sub_scores, Utc::now())?;

        debug!(
            "{} 置信度 {:.3}，目标价调整 {:+.1}%，{} 条洞察",
            ctx,
            composite.confidence,
            composite.target_price_adjustment,
            composite.insights.len()
        );

        self.deps
            .state
            .advance(record.id(), FilingStatus::Scored, Payload::Composite(composite))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use crate::infrastructure::{cancel_pair, MemoryStore, RateLimiter};
    use crate::models::{Company, Filing, FilingId};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FilingSource for CountingSource {
        async fn list_filings(&self, _company: &Company, _limit: usize) -> PipelineResult<Vec<Filing>> {
            Ok(Vec::new())
        }

        async fn fetch(&self, _filing: &Filing) -> PipelineResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("raw".to_string())
        }
    }

    /// 第一次抓取返回 429，之后正常
    struct RateLimitedOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FilingSource for RateLimitedOnce {
        async fn list_filings(&self, _company: &Company, _limit: usize) -> PipelineResult<Vec<Filing>> {
            Ok(Vec::new())
        }

        async fn fetch(&self, filing: &Filing) -> PipelineResult<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(PipelineError::fetch(
                    filing.id.to_string(),
                    FetchErrorKind::RateLimited {
                        retry_after_secs: 30,
                    },
                    "HTTP 429",
                ));
            }
            Ok("raw".to_string())
        }
    }

    /// 只返回 Item 7 和 Item 1A
    struct TwoSections;

    #[async_trait]
    impl SectionExtractor for TwoSections {
        async fn extract(&self, _raw: &str) -> PipelineResult<BTreeMap<SectionName, String>> {
            Ok(BTreeMap::from([
                (SectionName::ManagementDiscussion, "Revenue grew.".to_string()),
                (SectionName::RiskFactors, "Competition is intense.".to_string()),
            ]))
        }
    }

    struct Constant(f64);

    #[async_trait]
    impl AnalysisProvider for Constant {
        async fn analyze(&self, _dimension: Dimension, _text: &str) -> PipelineResult<f64> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "constant"
        }
    }

    fn filing() -> Filing {
        Filing {
            id: FilingId::new("0000000001-24-000001"),
            ticker: "TEST".to_string(),
            cik: "1".to_string(),
            form_type: "10-K".to_string(),
            filing_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            report_date: None,
            fiscal_year: 2024,
            document_url: "https://example.test/doc.htm".to_string(),
        }
    }

    fn flow(provider_score: f64) -> (FilingFlow, Arc<CountingSource>, ProcessingState) {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (flow, state) = flow_with_source(source.clone(), provider_score);
        (flow, source, state)
    }

    fn flow_with_source(
        source: Arc<dyn FilingSource>,
        provider_score: f64,
    ) -> (FilingFlow, ProcessingState) {
        let state = ProcessingState::new(Arc::new(MemoryStore::new()));
        let deps = FlowDeps {
            source,
            extractor: Arc::new(TwoSections),
            provider: Arc::new(Constant(provider_score)),
            state: state.clone(),
            limiters: RateLimiters::new(
                RateLimiter::new("fetch", 2, None).unwrap(),
                RateLimiter::new("analysis", 2, None).unwrap(),
            ),
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                call_timeout: Some(Duration::from_secs(5)),
            },
        };
        (FilingFlow::new(deps, 1_000), state)
    }

    #[tokio::test]
    async fn test_missing_sections_are_recorded_absent() {
        let (flow, source, state) = flow(70.0);
        let record = state.register(filing()).await.unwrap();
        let ctx = FilingCtx::for_filing(&record.filing, 1);
        let (_handle, signal) = cancel_pair();

        let result = flow.run(&ctx, record, &signal).await.unwrap();
        let ProcessResult::Scored(composite) = result else {
            panic!("expected a scored result");
        };
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!((composite.score - 70.0).abs() < 1e-9);

        let stored = state.load(&ctx.filing_id).await.unwrap().unwrap();
        let sub = stored.sub_scores.unwrap();
        // 只有 Item 7 / Item 1A，所有维度都至少有一个来源章节
        assert_eq!(sub.present_count(), 5);
        assert!(stored.raw_content.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_missing() {
        let (flow, _source, state) = flow(250.0);
        let record = state.register(filing()).await.unwrap();
        let ctx = FilingCtx::for_filing(&record.filing, 1);
        let (_handle, signal) = cancel_pair();

        let failure = flow.run(&ctx, record, &signal).await.unwrap_err();
        assert_eq!(failure.stage, Stage::Score);
        assert!(matches!(failure.error, PipelineError::InsufficientData));

        let stored = state.load(&ctx.filing_id).await.unwrap().unwrap();
        assert_eq!(stored.status, FilingStatus::Failed);
        assert_eq!(stored.last_completed, FilingStatus::Analyzing);
        assert!(stored.sub_scores.unwrap().missing.len() == 5);
    }

    #[tokio::test]
    async fn test_rate_limited_fetch_is_retried() {
        let source = Arc::new(RateLimitedOnce {
            calls: AtomicUsize::new(0),
        });
        let (flow, state) = flow_with_source(source.clone(), 70.0);
        let record = state.register(filing()).await.unwrap();
        let ctx = FilingCtx::for_filing(&record.filing, 1);
        let (_handle, signal) = cancel_pair();

        // 等待提示被 max_delay（5ms）截断，不会真的等 30 秒
        let result = tokio::time::timeout(Duration::from_secs(2), flow.run(&ctx, record, &signal))
            .await
            .expect("retry should respect max_delay")
            .unwrap();

        assert!(matches!(result, ProcessResult::Scored(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        let stored = state.load(&ctx.filing_id).await.unwrap().unwrap();
        assert!(stored.is_scored());
        assert!(stored.last_error.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let (flow, source, state) = flow(70.0);
        let record = state.register(filing()).await.unwrap();
        let ctx = FilingCtx::for_filing(&record.filing, 1);
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let result = flow.run(&ctx, record, &signal).await.unwrap();
        assert_eq!(result, ProcessResult::Cancelled);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
