//! 综合评分引擎 - 业务能力层
//!
//! 纯函数，无 I/O，结果确定：
//!
//! 1. 缺失分量的权重按比例分配给其余分量（有效权重之和恒为 1）；
//!    一个分量都没有时返回 `InsufficientData`
//! 2. 综合分 = 有效权重 · 子评分
//! 3. 等级映射见 [`Tier::from_score`]
//! 4. 结果记录实际使用的有效权重
//!
//! 另外计算置信度、目标价调整与投资洞察。
//! 加权求和在基点（整数权重）上进行，整数子评分得到的综合分是精确值。

use chrono::{DateTime, Utc};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    CompositeResult, Dimension, Filing, InsightCategory, InvestmentInsight, SubScores, Tier,
    WeightVector,
};

/// 洞察数量上限
pub const MAX_INSIGHTS: usize = 10;
/// 目标价调整上下限（百分比）
pub const MAX_TARGET_ADJUSTMENT: f64 = 25.0;

/// 一次评分的全部产物
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub score: f64,
    pub tier: Tier,
    pub weights: WeightVector,
    pub confidence: f64,
    pub target_price_adjustment: f64,
    pub insights: Vec<InvestmentInsight>,
}

/// 综合评分引擎
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    /// 计算有效权重（缺失分量为 0，其余按固定权重比例放大）
    pub fn effective_weights(&self, sub_scores: &SubScores) -> PipelineResult<WeightVector> {
        let present_bps: u32 = sub_scores
            .present()
            .iter()
            .map(|(d, _)| d.base_weight_bps())
            .sum();
        if present_bps == 0 {
            return Err(PipelineError::InsufficientData);
        }

        let mut weights = WeightVector::zero();
        for (dimension, _) in sub_scores.present() {
            weights.set(
                dimension,
                f64::from(dimension.base_weight_bps()) / f64::from(present_bps),
            );
        }
        Ok(weights)
    }

    /// 评分：子评分 → 综合分、等级、有效权重及附加指标
    pub fn evaluate(&self, sub_scores: &SubScores) -> PipelineResult<ScoreOutcome> {
        let present = sub_scores.present();
        let weights = self.effective_weights(sub_scores)?;

        let present_bps: u32 = present.iter().map(|(d, _)| d.base_weight_bps()).sum();
        let weighted_bps: f64 = present
            .iter()
            .map(|(d, v)| f64::from(d.base_weight_bps()) * v)
            .sum();
        let score = weighted_bps / f64::from(present_bps);

        Ok(ScoreOutcome {
            score,
            tier: Tier::from_score(score),
            weights,
            confidence: confidence(sub_scores, score),
            target_price_adjustment: target_price_adjustment(sub_scores, score),
            insights: insights(sub_scores),
        })
    }

    /// 为某份申报文件生成综合结果
    pub fn composite(
        &self,
        filing: &Filing,
        sub_scores: &SubScores,
        computed_at: DateTime<Utc>,
    ) -> PipelineResult<CompositeResult> {
        let outcome = self.evaluate(sub_scores)?;
        Ok(CompositeResult {
            filing_id: filing.id.clone(),
            ticker: filing.ticker.clone(),
            score: outcome.score,
            tier: outcome.tier,
            weights: outcome.weights,
            confidence: outcome.confidence,
            target_price_adjustment: outcome.target_price_adjustment,
            insights: outcome.insights,
            computed_at,
        })
    }
}

/// 置信度：各分量越一致越高，`max(0.5, 1 − 2σ)`，极端综合分额外 +0.1
pub fn confidence(sub_scores: &SubScores, composite: f64) -> f64 {
    let values: Vec<f64> = sub_scores.present().iter().map(|(_, v)| v / 100.0).collect();
    if values.is_empty() {
        return 0.0;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let mut confidence = (1.0 - 2.0 * variance.sqrt()).max(0.5);

    if composite > 90.0 || composite < 10.0 {
        confidence = (confidence + 0.1).min(1.0);
    }

    round_to(confidence, 3)
}

/// 建议目标价调整（百分比）
pub fn target_price_adjustment(sub_scores: &SubScores, composite: f64) -> f64 {
    let mut adjustment = (composite / 100.0 - 0.5) * 20.0;

    if sub_scores.get(Dimension::Growth).is_some_and(|g| g > 70.0) {
        adjustment += 5.0;
    }
    if sub_scores.get(Dimension::Risk).is_some_and(|r| r < 30.0) {
        adjustment -= 10.0;
    }
    if sub_scores.get(Dimension::Sentiment).is_some_and(|s| s > 80.0) {
        adjustment += 3.0;
    }

    round_to(
        adjustment.clamp(-MAX_TARGET_ADJUSTMENT, MAX_TARGET_ADJUSTMENT),
        1,
    )
}

/// 由分量阈值生成投资洞察，按重要性降序，最多 10 条
pub fn insights(sub_scores: &SubScores) -> Vec<InvestmentInsight> {
    let mut insights = Vec::new();
    let mut push = |dimension: Dimension, category, description: &str, importance| {
        if let Some(value) = sub_scores.get(dimension) {
            insights.push(InvestmentInsight {
                category,
                description: description.to_string(),
                importance,
                evidence: vec![format!("{} score: {:.1}", dimension, value)],
            });
        }
    };

    match sub_scores.get(Dimension::Sentiment) {
        Some(v) if v > 70.0 => push(
            Dimension::Sentiment,
            InsightCategory::Strength,
            "Positive management tone and business outlook",
            0.8,
        ),
        Some(v) if v < 30.0 => push(
            Dimension::Sentiment,
            InsightCategory::Concern,
            "Negative or cautious management tone",
            0.7,
        ),
        _ => {}
    }

    match sub_scores.get(Dimension::Risk) {
        Some(v) if v < 30.0 => push(
            Dimension::Risk,
            InsightCategory::Risk,
            "High risk profile with significant uncertainty",
            0.9,
        ),
        Some(v) if v > 70.0 => push(
            Dimension::Risk,
            InsightCategory::Strength,
            "Low risk profile with manageable uncertainties",
            0.6,
        ),
        _ => {}
    }

    match sub_scores.get(Dimension::Growth) {
        Some(v) if v > 60.0 => push(
            Dimension::Growth,
            InsightCategory::Opportunity,
            "Strong growth potential and market opportunities",
            0.8,
        ),
        Some(v) if v < 30.0 => push(
            Dimension::Growth,
            InsightCategory::Concern,
            "Limited growth opportunities mentioned",
            0.6,
        ),
        _ => {}
    }

    match sub_scores.get(Dimension::Management) {
        Some(v) if v > 70.0 => push(
            Dimension::Management,
            InsightCategory::Strength,
            "Strong management team with clear strategy",
            0.7,
        ),
        Some(v) if v < 40.0 => push(
            Dimension::Management,
            InsightCategory::Concern,
            "Management concerns or lack of strategic clarity",
            0.6,
        ),
        _ => {}
    }

    match sub_scores.get(Dimension::FinancialHealth) {
        Some(v) if v < 40.0 => push(
            Dimension::FinancialHealth,
            InsightCategory::Risk,
            "Financial stress indicators present",
            0.8,
        ),
        Some(v) if v > 70.0 => push(
            Dimension::FinancialHealth,
            InsightCategory::Strength,
            "Solid financial position and cash generation",
            0.6,
        ),
        _ => {}
    }

    insights.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    insights.truncate(MAX_INSIGHTS);
    insights
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
