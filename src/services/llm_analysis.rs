//! LLM 分析服务 - 业务能力层
//!
//! 每个维度一个系统提示词，要求模型只返回 0-100 的整数（越高越好）。
//! 风险维度反向打分：100 表示风险极低。

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::clients::LlmClient;
use crate::error::{AnalysisErrorKind, PipelineError, PipelineResult};
use crate::models::Dimension;
use crate::services::analysis::AnalysisProvider;

/// 基于 LLM 的分析服务
pub struct LlmAnalysisProvider {
    client: LlmClient,
}

impl LlmAnalysisProvider {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn system_message(dimension: Dimension) -> &'static str {
        match dimension {
            Dimension::Sentiment => {
                "You are an equity analyst reading excerpts from a company's annual report (Form 10-K). \
                 Rate the overall tone of management's discussion and business outlook."
            }
            Dimension::Risk => {
                "You are a risk analyst reading the risk disclosures of a company's annual report (Form 10-K). \
                 Rate how well-contained the company's risk profile is: severity, breadth and likelihood of the disclosed risks. \
                 A company facing severe, wide-ranging risks gets a LOW score; a company with few, manageable risks gets a HIGH score."
            }
            Dimension::Growth => {
                "You are a growth-equity analyst reading excerpts from a company's annual report (Form 10-K). \
                 Rate the strength of the company's growth signals: expansion, innovation, new markets and competitive advantages."
            }
            Dimension::Management => {
                "You are a governance analyst reading excerpts from a company's annual report (Form 10-K). \
                 Rate management quality: strategic clarity, execution track record, transparency and governance."
            }
            Dimension::FinancialHealth => {
                "You are a credit analyst reading excerpts from a company's annual report (Form 10-K). \
                 Rate the company's financial health: liquidity, leverage, cash generation and margin stability."
            }
        }
    }

    fn user_message(dimension: Dimension, text: &str) -> String {
        format!(
            r#"Score the following 10-K excerpt on the "{}" dimension.

Answer with a single integer from 0 to 100, where 0 is the worst possible assessment and 100 the best.
Return only the integer, nothing else.

Excerpt:
"""
{}
""""#,
            dimension, text
        )
    }
}

#[async_trait]
impl AnalysisProvider for LlmAnalysisProvider {
    async fn analyze(&self, dimension: Dimension, text: &str) -> PipelineResult<f64> {
        let response = self
            .client
            .chat(
                &Self::user_message(dimension, text),
                Some(Self::system_message(dimension)),
            )
            .await
            .map_err(|e| PipelineError::analysis(dimension, e.kind, e.message))?;

        let score = parse_score(&response).ok_or_else(|| {
            warn!("无法解析 LLM 评分响应 ({}): '{}'", dimension, response);
            PipelineError::analysis(
                dimension,
                AnalysisErrorKind::InvalidResponse,
                format!("无法解析评分: {}", response),
            )
        })?;

        debug!("{} 维度评分: {}", dimension, score);
        Ok(score)
    }

    fn name(&self) -> &str {
        self.client.model_name()
    }
}

/// 解析模型返回的评分
///
/// 先尝试把整个响应解析为数字，再从文本中找第一个 0-100 之间的数字
pub fn parse_score(response: &str) -> Option<f64> {
    let response = response.trim();

    if let Ok(value) = response.parse::<f64>() {
        return in_range(value);
    }

    for word in response.split_whitespace() {
        let cleaned = word.trim_matches(|c: char| !c.is_ascii_digit() && c != '.');
        let cleaned = cleaned.trim_end_matches('.');
        if let Ok(value) = cleaned.parse::<f64>() {
            if let Some(score) = in_range(value) {
                return Some(score);
            }
        }
    }

    None
}

fn in_range(value: f64) -> Option<f64> {
    (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(value)
}
