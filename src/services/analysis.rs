//! 分析能力 - 业务能力层
//!
//! 五个分析维度共用一个接口 `analyze(dimension, text) → 0-100`，
//! 由 [`Dimension`] 静态分派，不做运行时类型判断。
//! 每个维度读取固定的章节列表，拼接后截断作为输入。

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::PipelineResult;
use crate::models::{Dimension, QualitativeSection, SectionName};

/// 分析服务
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// 返回 0-100 的分数，越高越好
    async fn analyze(&self, dimension: Dimension, text: &str) -> PipelineResult<f64>;

    /// 服务名称（用于日志）
    fn name(&self) -> &str;
}

/// 各维度读取的章节
pub fn source_sections(dimension: Dimension) -> &'static [SectionName] {
    match dimension {
        Dimension::Sentiment => &[SectionName::ManagementDiscussion, SectionName::Business],
        Dimension::Risk => &[SectionName::RiskFactors, SectionName::MarketRisk],
        Dimension::Growth => &[SectionName::Business, SectionName::ManagementDiscussion],
        Dimension::Management => &[
            SectionName::ManagementDiscussion,
            SectionName::ControlsAndProcedures,
            SectionName::DirectorsAndGovernance,
        ],
        Dimension::FinancialHealth => &[
            SectionName::ManagementDiscussion,
            SectionName::FinancialStatements,
            SectionName::MarketRisk,
        ],
    }
}

/// 构建某个维度的分析输入
///
/// 没有任何来源章节时返回 `None`（不调用分析服务）
pub fn build_input(
    dimension: Dimension,
    sections: &BTreeMap<SectionName, QualitativeSection>,
    max_chars: usize,
) -> Option<String> {
    let parts: Vec<&str> = source_sections(dimension)
        .iter()
        .filter_map(|name| sections.get(name))
        .map(|section| section.text.as_str())
        .filter(|text| !text.trim().is_empty())
        .collect();

    if parts.is_empty() {
        return None;
    }

    let joined = parts.join("\n\n");
    let truncated: String = joined.chars().take(max_chars).collect();
    Some(truncated)
}
