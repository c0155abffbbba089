//! 单次运行的汇总

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::state::Stage;

/// 单个工作项的结果类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Succeeded,
    Failed,
    Skipped,
}

/// 单个工作项的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// 工作项键，例如 `AAPL/0000320193-24-000123`
    pub item: String,
    pub kind: OutcomeKind,
    pub stage: Option<Stage>,
    pub reason: Option<String>,
}

impl ItemOutcome {
    pub fn succeeded(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            kind: OutcomeKind::Succeeded,
            stage: None,
            reason: None,
        }
    }

    pub fn failed(item: impl Into<String>, stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            kind: OutcomeKind::Failed,
            stage: Some(stage),
            reason: Some(reason.into()),
        }
    }

    pub fn skipped(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            kind: OutcomeKind::Skipped,
            stage: None,
            reason: Some(reason.into()),
        }
    }
}

/// 失败记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub item: String,
    pub stage: Stage,
    pub reason: String,
}

/// 一次编排运行的汇总
///
/// 运行开始时创建，运行期间只追加，结束时定稿。
/// 不变量：`attempted == succeeded + failed + skipped == 已派发的工作项数`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failures: Vec<FailureRecord>,
    pub outcomes: Vec<ItemOutcome>,
}

impl RunSummary {
    pub fn start() -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            started_at: Utc::now(),
            finished_at: None,
            failures: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    /// 追加一个工作项结果
    pub fn record(&mut self, outcome: ItemOutcome) {
        self.attempted += 1;
        match outcome.kind {
            OutcomeKind::Succeeded => self.succeeded += 1,
            OutcomeKind::Skipped => self.skipped += 1,
            OutcomeKind::Failed => {
                self.failed += 1;
                self.failures.push(FailureRecord {
                    item: outcome.item.clone(),
                    stage: outcome.stage.unwrap_or(Stage::Fetch),
                    reason: outcome
                        .reason
                        .clone()
                        .unwrap_or_else(|| "未知原因".to_string()),
                });
            }
        }
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    /// 成功率（不含跳过项）
    pub fn success_rate(&self) -> f64 {
        let processed = self.succeeded + self.failed;
        if processed == 0 {
            0.0
        } else {
            self.succeeded as f64 / processed as f64
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.attempted == self.succeeded + self.failed + self.skipped
            && self.attempted == self.outcomes.len()
            && self.failed == self.failures.len()
    }

    pub fn outcome_for(&self, item: &str) -> Option<&ItemOutcome> {
        self.outcomes.iter().find(|o| o.item == item)
    }
}
