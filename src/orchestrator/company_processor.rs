//! 单个公司处理器 - 编排层
//!
//! ## 职责
//!
//! 把一家公司展开成若干工作项：
//!
//! 1. **登记公司**：写入存储（只读信息，不会修改）
//! 2. **列出申报文件**：在申报文件源限流 + 重试下获取最近的 10-K
//! 3. **登记申报文件**：已存在的记录保留原有进度（续跑的基础）
//!
//! 单份申报文件登记失败只影响它自己，不影响同一公司的其他申报文件。

use tracing::{error, info};

use crate::error::{PipelineError, PipelineResult};
use crate::infrastructure::Resource;
use crate::models::{Company, FilingRecord};
use crate::workflow::FlowDeps;

/// 一家公司展开后的结果
#[derive(Debug, Default)]
pub struct CompanyListing {
    /// 已登记的处理记录（按申报日期倒序）
    pub records: Vec<FilingRecord>,
    /// 登记失败的申报文件：(工作项键, 错误)
    pub failures: Vec<(String, PipelineError)>,
}

/// 列出并登记一家公司的申报文件
pub async fn enumerate_company(
    deps: &FlowDeps,
    company: &Company,
    filings_per_company: usize,
) -> PipelineResult<CompanyListing> {
    deps.state.store().upsert_company(company).await?;

    let operation = format!("[{}] list filings", company.ticker);
    let filings = {
        let _lease = deps.limiters.acquire(Resource::FilingSource).await?;
        deps.retry
            .run(&operation, || {
                deps.source.list_filings(company, filings_per_company)
            })
            .await?
    };

    let mut listing = CompanyListing::default();
    for filing in filings.into_iter().take(filings_per_company) {
        let key = format!("{}/{}", filing.ticker, filing.id);
        match deps.state.register(filing).await {
            Ok(record) => listing.records.push(record),
            Err(e) => {
                error!("{} ❌ 登记失败: {}", key, e);
                listing.failures.push((key, e));
            }
        }
    }

    info!(
        "[{}] 📁 {} 份申报文件待处理",
        company.ticker,
        listing.records.len()
    );
    Ok(listing)
}
