//! 词典分析服务 - 业务能力层
//!
//! 离线、确定性的关键词打分，不依赖任何外部服务（`ANALYSIS_BACKEND=lexicon`）。
//! 分数 = 50 + 50·(正面命中 − 负面命中)/(正面命中 + 负面命中)，无命中时为 50。

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::models::Dimension;
use crate::services::analysis::AnalysisProvider;

const SENTIMENT_POSITIVE: &[&str] = &[
    "strong", "growth", "improved", "increase", "record", "successful", "favorable",
    "opportunity", "confident", "exceeded", "momentum", "robust",
];
const SENTIMENT_NEGATIVE: &[&str] = &[
    "decline", "decrease", "weak", "loss", "adverse", "challenging", "uncertain",
    "difficult", "impairment", "unfavorable", "headwinds", "deteriorat",
];

/// 风险类别关键词（市场、运营、监管、财务、战略、网络安全）
const RISK_TERMS: &[&str] = &[
    "market conditions", "economic downturn", "recession", "competition", "pricing pressure",
    "commoditization", "supply chain", "disruption", "technology failure", "system failure",
    "regulation", "regulatory", "compliance", "litigation", "government", "tax",
    "environmental", "liquidity", "debt", "credit", "currency", "interest rate",
    "acquisition", "intellectual property", "cybersecurity", "data breach", "hacking",
    "cyber attack", "significant", "material adverse", "severe", "substantial",
];
/// 缓解措施关键词
const RISK_MITIGATION: &[&str] = &[
    "mitigate", "manage", "control", "reduce", "prevent", "hedge", "insurance", "diversif",
    "minor", "limited", "manageable", "controlled",
];

const GROWTH_POSITIVE: &[&str] = &[
    "growth", "expansion", "increase", "growing", "develop", "scale", "market penetration",
    "new markets", "emerging markets", "innovation", "technology", "digital transformation",
    "automation", "artificial intelligence", "machine learning", "research", "patent",
    "competitive advantage", "differentiation", "proprietary", "market leader", "first mover",
];
const GROWTH_NEGATIVE: &[&str] = &[
    "slowdown", "contraction", "saturat", "declining demand", "lost market share",
    "restructuring", "divestiture", "exit", "discontinued",
];

const MANAGEMENT_POSITIVE: &[&str] = &[
    "strategic vision", "clear strategy", "strong leadership", "experienced management",
    "execution", "track record", "transparency", "shareholder value", "effective",
];
const MANAGEMENT_NEGATIVE: &[&str] = &[
    "management changes", "uncertainty", "lack of clarity", "execution issues",
    "governance concerns", "insider trading", "compensation concerns", "material weakness",
    "not effective",
];

const FINANCIAL_POSITIVE: &[&str] = &[
    "strong cash flow", "improved margins", "revenue growth", "profitability",
    "strong balance sheet", "low debt", "high liquidity", "cash generation",
    "cash and cash equivalents", "free cash flow",
];
const FINANCIAL_NEGATIVE: &[&str] = &[
    "cash flow concerns", "declining margins", "revenue decline", "losses", "high debt",
    "liquidity issues", "covenant breach", "impairment", "going concern", "default",
];

/// 关键词词典分析服务
#[derive(Debug, Clone, Default)]
pub struct LexiconAnalysisProvider;

impl LexiconAnalysisProvider {
    pub fn new() -> Self {
        Self
    }

    /// 同步打分
    pub fn score(&self, dimension: Dimension, text: &str) -> f64 {
        let lowered = text.to_lowercase();
        let (positive, negative) = match dimension {
            Dimension::Sentiment => (SENTIMENT_POSITIVE, SENTIMENT_NEGATIVE),
            // 风险维度：缓解措施为正面，风险关键词为负面（高分 = 低风险）
            Dimension::Risk => (RISK_MITIGATION, RISK_TERMS),
            Dimension::Growth => (GROWTH_POSITIVE, GROWTH_NEGATIVE),
            Dimension::Management => (MANAGEMENT_POSITIVE, MANAGEMENT_NEGATIVE),
            Dimension::FinancialHealth => (FINANCIAL_POSITIVE, FINANCIAL_NEGATIVE),
        };

        let pos = count_hits(&lowered, positive);
        let neg = count_hits(&lowered, negative);
        balance_score(pos, neg)
    }
}

#[async_trait]
impl AnalysisProvider for LexiconAnalysisProvider {
    async fn analyze(&self, dimension: Dimension, text: &str) -> PipelineResult<f64> {
        Ok(self.score(dimension, text))
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

fn count_hits(text: &str, terms: &[&str]) -> usize {
    terms.iter().map(|term| text.matches(term).count()).sum()
}

fn balance_score(pos: usize, neg: usize) -> f64 {
    let total = pos + neg;
    if total == 0 {
        return 50.0;
    }
    let score = 50.0 + 50.0 * (pos as f64 - neg as f64) / total as f64;
    score.clamp(0.0, 100.0)
}
