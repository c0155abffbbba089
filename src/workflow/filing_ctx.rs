//! 申报文件处理上下文
//!
//! 封装"我正在处理哪家公司的哪份申报文件"这一信息

use std::fmt::Display;

use crate::models::{Filing, FilingId};

/// 申报文件处理上下文
#[derive(Debug, Clone)]
pub struct FilingCtx {
    /// 股票代码
    pub ticker: String,

    /// 申报文件编号（accession number）
    pub filing_id: FilingId,

    /// 工作项序号（仅用于日志显示，从1开始）
    pub item_index: usize,
}

impl FilingCtx {
    /// 创建新的处理上下文
    pub fn new(ticker: impl Into<String>, filing_id: FilingId, item_index: usize) -> Self {
        Self {
            ticker: ticker.into(),
            filing_id,
            item_index,
        }
    }

    pub fn for_filing(filing: &Filing, item_index: usize) -> Self {
        Self::new(filing.ticker.clone(), filing.id.clone(), item_index)
    }

    /// RunSummary 中的工作项键，例如 `AAPL/0000320193-24-000123`
    pub fn item_key(&self) -> String {
        format!("{}/{}", self.ticker, self.filing_id)
    }
}

impl Display for FilingCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}]", self.ticker, self.filing_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctx_formatting() {
        let ctx = FilingCtx::new("AAPL", FilingId::new("0000320193-24-000123"), 1);
        assert_eq!(ctx.to_string(), "[AAPL 0000320193-24-000123]");
        assert_eq!(ctx.item_key(), "AAPL/0000320193-24-000123");
    }
}
