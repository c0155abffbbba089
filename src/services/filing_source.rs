//! 申报文件源能力
//!
//! 只描述"列出申报文件"和"抓取原始内容"两个能力，具体实现见 `clients::EdgarClient`。

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::models::{Company, Filing};

/// 申报文件源
#[async_trait]
pub trait FilingSource: Send + Sync {
    /// 列出公司最近的 10-K 申报文件（按申报日期倒序，最多 `limit` 份）
    async fn list_filings(&self, company: &Company, limit: usize) -> PipelineResult<Vec<Filing>>;

    /// 抓取申报文件的原始内容
    async fn fetch(&self, filing: &Filing) -> PipelineResult<String>;
}
