//! 排名与市场摘要 - 业务能力层
//!
//! 每家公司只取最新一份已评分的申报文件。排序规则确定：
//! 综合分降序 → 置信度降序 → ticker 升序 → 申报日期降序。

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::models::{FilingId, FilingRecord, Tier};

/// 前列公司数量
pub const TOP_PERFORMERS: usize = 10;
/// 末位公司数量
pub const BOTTOM_PERFORMERS: usize = 5;

/// 排名条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub ticker: String,
    pub filing_id: FilingId,
    pub filing_date: NaiveDate,
    pub fiscal_year: i32,
    pub score: f64,
    pub tier: Tier,
    pub confidence: f64,
    pub target_price_adjustment: f64,
}

/// 市场摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub total_companies: usize,
    pub mean_score: f64,
    pub score_std_dev: f64,
    pub tier_distribution: BTreeMap<Tier, usize>,
    pub ranked: Vec<RankedEntry>,
    pub top_performers: Vec<RankedEntry>,
    pub bottom_performers: Vec<RankedEntry>,
}

impl MarketSummary {
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// 取每家公司最新一份已评分的申报文件并排名
pub fn rank_latest(records: &[FilingRecord]) -> Vec<RankedEntry> {
    let mut latest: HashMap<&str, &FilingRecord> = HashMap::new();
    for record in records.iter().filter(|r| r.is_scored() && r.composite.is_some()) {
        let ticker = record.filing.ticker.as_str();
        let newer = latest.get(ticker).map_or(true, |current| {
            (record.filing.filing_date, record.id()) > (current.filing.filing_date, current.id())
        });
        if newer {
            latest.insert(ticker, record);
        }
    }

    let mut entries: Vec<RankedEntry> = latest
        .into_values()
        .filter_map(|record| {
            let composite = record.composite.as_ref()?;
            Some(RankedEntry {
                rank: 0,
                ticker: record.filing.ticker.clone(),
                filing_id: record.filing.id.clone(),
                filing_date: record.filing.filing_date,
                fiscal_year: record.filing.fiscal_year,
                score: composite.score,
                tier: composite.tier,
                confidence: composite.confidence,
                target_price_adjustment: composite.target_price_adjustment,
            })
        })
        .collect();

    entries.sort_by(compare_entries);
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }
    entries
}

fn compare_entries(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.ticker.cmp(&b.ticker))
        .then_with(|| b.filing_date.cmp(&a.filing_date))
}

/// 生成市场摘要
pub fn market_summary(records: &[FilingRecord]) -> MarketSummary {
    let ranked = rank_latest(records);
    let total = ranked.len();

    let (mean_score, score_std_dev) = if total == 0 {
        (0.0, 0.0)
    } else {
        let mean = ranked.iter().map(|e| e.score).sum::<f64>() / total as f64;
        let variance =
            ranked.iter().map(|e| (e.score - mean).powi(2)).sum::<f64>() / total as f64;
        (mean, variance.sqrt())
    };

    let mut tier_distribution: BTreeMap<Tier, usize> =
        Tier::ALL.iter().map(|tier| (*tier, 0)).collect();
    for entry in &ranked {
        *tier_distribution.entry(entry.tier).or_insert(0) += 1;
    }

    let top_performers = ranked.iter().take(TOP_PERFORMERS).cloned().collect();
    let bottom_performers = ranked
        .iter()
        .rev()
        .take(BOTTOM_PERFORMERS)
        .cloned()
        .collect();

    MarketSummary {
        total_companies: total,
        mean_score,
        score_std_dev,
        tier_distribution,
        ranked,
        top_performers,
        bottom_performers,
    }
}
