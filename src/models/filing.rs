//! 申报文件模型与处理状态机

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 申报文件标识（EDGAR accession number，例如 `0000320193-24-000123`）
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilingId(pub String);

impl FilingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FilingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单份 10-K 申报文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub id: FilingId,
    /// 所属公司 ticker
    pub ticker: String,
    pub cik: String,
    pub form_type: String,
    pub filing_date: NaiveDate,
    pub report_date: Option<NaiveDate>,
    pub fiscal_year: i32,
    /// 主文档地址
    pub document_url: String,
}

/// 申报文件处理状态
///
/// 状态严格向前推进：`pending → fetching → extracting → analyzing → scored`。
/// `failed` 可由任意非终态进入，本身不是终态（下次运行会重试）。
/// 除 `failed` 外，每个状态表示"该步骤的产物已持久化"。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Pending,
    Fetching,
    Extracting,
    Analyzing,
    Scored,
    Failed,
}

impl FilingStatus {
    /// 前进顺序中的位置，`Failed` 不在序列中
    pub fn rank(self) -> Option<u8> {
        match self {
            FilingStatus::Pending => Some(0),
            FilingStatus::Fetching => Some(1),
            FilingStatus::Extracting => Some(2),
            FilingStatus::Analyzing => Some(3),
            FilingStatus::Scored => Some(4),
            FilingStatus::Failed => None,
        }
    }

    /// 下一个合法的前进状态
    pub fn next(self) -> Option<FilingStatus> {
        match self {
            FilingStatus::Pending => Some(FilingStatus::Fetching),
            FilingStatus::Fetching => Some(FilingStatus::Extracting),
            FilingStatus::Extracting => Some(FilingStatus::Analyzing),
            FilingStatus::Analyzing => Some(FilingStatus::Scored),
            FilingStatus::Scored | FilingStatus::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == FilingStatus::Scored
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilingStatus::Pending => "pending",
            FilingStatus::Fetching => "fetching",
            FilingStatus::Extracting => "extracting",
            FilingStatus::Analyzing => "analyzing",
            FilingStatus::Scored => "scored",
            FilingStatus::Failed => "failed",
        }
    }
}

impl Display for FilingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_progression() {
        let mut status = FilingStatus::Pending;
        let mut visited = vec![status];
        while let Some(next) = status.next() {
            assert!(next.rank() > status.rank());
            status = next;
            visited.push(status);
        }
        assert_eq!(
            visited,
            vec![
                FilingStatus::Pending,
                FilingStatus::Fetching,
                FilingStatus::Extracting,
                FilingStatus::Analyzing,
                FilingStatus::Scored,
            ]
        );
        assert!(FilingStatus::Scored.is_terminal());
        assert!(!FilingStatus::Failed.is_terminal());
        assert_eq!(FilingStatus::Failed.next(), None);
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&FilingStatus::Analyzing).unwrap();
        assert_eq!(json, "\"analyzing\"");
    }
}
