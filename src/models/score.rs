//! 子评分、权重、综合评分与推荐等级

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::models::filing::FilingId;

/// 分析维度（固定五个）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Sentiment,
    Risk,
    Growth,
    Management,
    FinancialHealth,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Sentiment,
        Dimension::Risk,
        Dimension::Growth,
        Dimension::Management,
        Dimension::FinancialHealth,
    ];

    /// 固定权重（基点，合计 10000）
    pub fn base_weight_bps(self) -> u32 {
        match self {
            Dimension::Sentiment => 2500,
            Dimension::Risk => 3500,
            Dimension::Growth => 2000,
            Dimension::Management => 1000,
            Dimension::FinancialHealth => 1000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Sentiment => "sentiment",
            Dimension::Risk => "risk",
            Dimension::Growth => "growth",
            Dimension::Management => "management",
            Dimension::FinancialHealth => "financial_health",
        }
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 五个维度的权重向量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub sentiment: f64,
    pub risk: f64,
    pub growth: f64,
    pub management: f64,
    pub financial_health: f64,
}

impl WeightVector {
    /// 固定权重：情绪 0.25、风险 0.35、成长 0.20、管理 0.10、财务健康 0.10
    pub fn fixed() -> Self {
        let mut weights = Self::zero();
        for dimension in Dimension::ALL {
            weights.set(dimension, f64::from(dimension.base_weight_bps()) / 10_000.0);
        }
        weights
    }

    pub fn zero() -> Self {
        Self {
            sentiment: 0.0,
            risk: 0.0,
            growth: 0.0,
            management: 0.0,
            financial_health: 0.0,
        }
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Sentiment => self.sentiment,
            Dimension::Risk => self.risk,
            Dimension::Growth => self.growth,
            Dimension::Management => self.management,
            Dimension::FinancialHealth => self.financial_health,
        }
    }

    pub fn set(&mut self, dimension: Dimension, value: f64) {
        match dimension {
            Dimension::Sentiment => self.sentiment = value,
            Dimension::Risk => self.risk = value,
            Dimension::Growth => self.growth = value,
            Dimension::Management => self.management = value,
            Dimension::FinancialHealth => self.financial_health = value,
        }
    }

    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.get(*d)).sum()
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        Self::fixed()
    }
}

/// 一份申报文件的五个子评分（0-100，越高越好）
///
/// 每个分量独立可空：对应分析失败或缺少输入章节时为 `None`。
/// 存储后不可变，重新分析时整体覆盖而非合并。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub sentiment: Option<f64>,
    pub risk: Option<f64>,
    pub growth: Option<f64>,
    pub management: Option<f64>,
    pub financial_health: Option<f64>,
    /// 缺失分量的原因
    #[serde(default)]
    pub missing: BTreeMap<Dimension, String>,
}

impl SubScores {
    /// 从五个值构建（按 `Dimension::ALL` 顺序）
    pub fn from_values(values: [Option<f64>; 5]) -> Self {
        let mut scores = Self::default();
        for (dimension, value) in Dimension::ALL.into_iter().zip(values) {
            scores.set(dimension, value);
        }
        scores
    }

    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        let value = match dimension {
            Dimension::Sentiment => self.sentiment,
            Dimension::Risk => self.risk,
            Dimension::Growth => self.growth,
            Dimension::Management => self.management,
            Dimension::FinancialHealth => self.financial_health,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn set(&mut self, dimension: Dimension, value: Option<f64>) {
        let slot = match dimension {
            Dimension::Sentiment => &mut self.sentiment,
            Dimension::Risk => &mut self.risk,
            Dimension::Growth => &mut self.growth,
            Dimension::Management => &mut self.management,
            Dimension::FinancialHealth => &mut self.financial_health,
        };
        *slot = value;
    }

    /// 记录缺失分量及原因
    pub fn mark_missing(&mut self, dimension: Dimension, reason: impl Into<String>) {
        self.set(dimension, None);
        self.missing.insert(dimension, reason.into());
    }

    /// 存在的分量 (维度, 值)
    pub fn present(&self) -> Vec<(Dimension, f64)> {
        Dimension::ALL
            .iter()
            .filter_map(|d| self.get(*d).map(|v| (*d, v)))
            .collect()
    }

    pub fn present_count(&self) -> usize {
        self.present().len()
    }

    pub fn is_complete(&self) -> bool {
        self.present_count() == Dimension::ALL.len()
    }
}

/// 推荐等级（从低到高排序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::StrongBuy,
        Tier::Buy,
        Tier::Hold,
        Tier::Sell,
        Tier::StrongSell,
    ];

    /// 等级映射：>80 强烈买入，>65 买入，[45,65] 持有，[30,45) 卖出，<30 强烈卖出
    ///
    /// 恰好 80 属于买入，恰好 65 属于持有。
    pub fn from_score(score: f64) -> Tier {
        if score > 80.0 {
            Tier::StrongBuy
        } else if score > 65.0 {
            Tier::Buy
        } else if score >= 45.0 {
            Tier::Hold
        } else if score >= 30.0 {
            Tier::Sell
        } else {
            Tier::StrongSell
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::StrongBuy => "Strong Buy",
            Tier::Buy => "Buy",
            Tier::Hold => "Hold",
            Tier::Sell => "Sell",
            Tier::StrongSell => "Strong Sell",
        }
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 投资洞察类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Strength,
    Concern,
    Risk,
    Opportunity,
}

/// 带证据的投资洞察
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentInsight {
    pub category: InsightCategory,
    pub description: String,
    /// 0-1
    pub importance: f64,
    pub evidence: Vec<String>,
}

/// 由子评分推导出的综合结果
///
/// 记录实际使用的（重分配后的）权重向量，便于审计。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeResult {
    pub filing_id: FilingId,
    pub ticker: String,
    pub score: f64,
    pub tier: Tier,
    pub weights: WeightVector,
    pub confidence: f64,
    /// 建议目标价调整（百分比）
    pub target_price_adjustment: f64,
    pub insights: Vec<InvestmentInsight>,
    pub computed_at: DateTime<Utc>,
}
