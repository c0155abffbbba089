//! 申报文件的持久化处理记录
//!
//! 一个记录保存一份申报文件的状态与全部阶段产物，
//! 状态与产物总是作为一个整体写入，不会出现"状态已前进但产物缺失"的撕裂状态。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::filing::{Filing, FilingId, FilingStatus};
use crate::models::score::{CompositeResult, SubScores};
use crate::models::section::{QualitativeSection, SectionName};

/// 流水线步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Enumerate,
    Fetch,
    Extract,
    Analyze,
    Score,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Enumerate => "enumerate",
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Analyze => "analyze",
            Stage::Score => "score",
        }
    }

    /// 该步骤完成后的状态
    pub fn completed_status(self) -> Option<FilingStatus> {
        match self {
            Stage::Enumerate => None,
            Stage::Fetch => Some(FilingStatus::Fetching),
            Stage::Extract => Some(FilingStatus::Extracting),
            Stage::Analyze => Some(FilingStatus::Analyzing),
            Stage::Score => Some(FilingStatus::Scored),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单份申报文件的处理记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingRecord {
    pub filing: Filing,
    /// 当前状态（可能是 `failed`）
    pub status: FilingStatus,
    /// 最后一个已完成的步骤（从不为 `failed`）
    pub last_completed: FilingStatus,
    /// 抓取到的原始内容，章节持久化后清空
    #[serde(default)]
    pub raw_content: Option<String>,
    #[serde(default)]
    pub sections: BTreeMap<SectionName, QualitativeSection>,
    #[serde(default)]
    pub sub_scores: Option<SubScores>,
    #[serde(default)]
    pub composite: Option<CompositeResult>,
    #[serde(default)]
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl FilingRecord {
    pub fn new(filing: Filing) -> Self {
        Self {
            filing,
            status: FilingStatus::Pending,
            last_completed: FilingStatus::Pending,
            raw_content: None,
            sections: BTreeMap::new(),
            sub_scores: None,
            composite: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &FilingId {
        &self.filing.id
    }

    pub fn is_scored(&self) -> bool {
        self.status == FilingStatus::Scored
    }

    /// 续跑时应从哪一步开始；已评分则返回 `None`
    ///
    /// 上次失败且子评分一个分量都没有时，从分析步骤重新开始；
    /// 刚完成分析的记录总是进入评分，由评分步骤报告数据不足
    pub fn resume_point(&self) -> Option<Stage> {
        match self.last_completed {
            FilingStatus::Pending | FilingStatus::Failed => Some(Stage::Fetch),
            FilingStatus::Fetching => Some(Stage::Extract),
            FilingStatus::Extracting => Some(Stage::Analyze),
            FilingStatus::Analyzing => {
                let usable = self
                    .sub_scores
                    .as_ref()
                    .is_some_and(|scores| scores.present_count() > 0);
                if usable || self.status != FilingStatus::Failed {
                    Some(Stage::Score)
                } else {
                    Some(Stage::Analyze)
                }
            }
            FilingStatus::Scored => None,
        }
    }
}
