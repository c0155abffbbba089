//! 业务能力层（Services）
//!
//! 描述"我能对一份申报文件做什么"，只处理单份文件，不关心流程顺序：
//!
//! - `FilingSource` - 列出/抓取申报文件
//! - `SectionExtractor` / `ItemSectionExtractor` - 10-K 章节提取
//! - `AnalysisProvider` / `LlmAnalysisProvider` / `LexiconAnalysisProvider` - 维度评分
//! - `ScoringEngine` - 子评分 → 综合分与等级
//! - `ProcessingState` - 单份文件的持久化进度
//! - `ranking` - 跨公司排名与市场摘要

pub mod analysis;
pub mod filing_source;
pub mod lexicon;
pub mod llm_analysis;
pub mod processing_state;
pub mod ranking;
pub mod scoring;
pub mod section_extractor;

pub use analysis::{build_input, source_sections, AnalysisProvider};
pub use filing_source::FilingSource;
pub use lexicon::LexiconAnalysisProvider;
pub use llm_analysis::LlmAnalysisProvider;
pub use processing_state::{Payload, ProcessingState};
pub use ranking::{market_summary, rank_latest, MarketSummary, RankedEntry};
pub use scoring::{ScoreOutcome, ScoringEngine};
pub use section_extractor::{ItemSectionExtractor, SectionExtractor};
