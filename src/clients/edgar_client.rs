/// SEC EDGAR 客户端
///
/// 封装提交记录（submissions JSON）与归档文档的 HTTP 调用。
/// 每个请求都带调用方标识（User-Agent），这是 EDGAR 的合规要求。
/// 限流与重试由调用方（流程层）负责，这里只做单次请求和状态码分类。
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{FetchErrorKind, PipelineError, PipelineResult};
use crate::models::{Company, Filing, FilingId};
use crate::services::FilingSource;

/// 429 未给出 Retry-After 时的默认等待秒数
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// 只关心 10-K
pub const ANNUAL_REPORT_FORM: &str = "10-K";

#[derive(Debug, Default, Deserialize)]
struct Submissions {
    #[serde(default)]
    filings: SubmissionFilings,
}

#[derive(Debug, Default, Deserialize)]
struct SubmissionFilings {
    #[serde(default)]
    recent: RecentFilings,
}

/// 列式存储的最近申报记录（各数组按下标对齐）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    #[serde(default)]
    form: Vec<String>,
    #[serde(default)]
    accession_number: Vec<String>,
    #[serde(default)]
    filing_date: Vec<String>,
    #[serde(default)]
    report_date: Vec<String>,
    #[serde(default)]
    primary_document: Vec<String>,
}

/// EDGAR 客户端
pub struct EdgarClient {
    http: reqwest::Client,
    data_base_url: String,
    archives_base_url: String,
}

impl EdgarClient {
    /// 创建新的 EDGAR 客户端
    pub fn new(config: &Config) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.edgar_user_agent.clone())
            .timeout(Duration::from_secs(config.call_timeout_secs.max(1)))
            .build()
            .map_err(|e| PipelineError::Configuration(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self {
            http,
            data_base_url: config.edgar_data_base_url.trim_end_matches('/').to_string(),
            archives_base_url: config
                .edgar_archives_base_url
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// 提交记录地址
    pub fn submissions_url(&self, company: &Company) -> String {
        format!(
            "{}/submissions/CIK{}.json",
            self.data_base_url,
            company.padded_cik()
        )
    }

    async fn get_text(&self, url: &str) -> PipelineResult<String> {
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(kind) = classify_status(status, retry_after.as_deref()) {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(200).collect();
            warn!("EDGAR 请求失败 ({}): HTTP {}", url, status);
            return Err(PipelineError::fetch(url, kind, message));
        }

        let text = response.text().await?;
        debug!("从 {} 获取 {} 字符", url, text.len());
        Ok(text)
    }
}

#[async_trait]
impl FilingSource for EdgarClient {
    async fn list_filings(&self, company: &Company, limit: usize) -> PipelineResult<Vec<Filing>> {
        let url = self.submissions_url(company);
        let body = self.get_text(&url).await?;
        let filings = parse_submissions(company, &body, limit, &self.archives_base_url)?;
        info!(
            "[{}] 发现 {} 份 10-K 申报文件",
            company.ticker,
            filings.len()
        );
        Ok(filings)
    }

    async fn fetch(&self, filing: &Filing) -> PipelineResult<String> {
        self.get_text(&filing.document_url).await
    }
}

/// HTTP 状态码分类，成功返回 `None`
///
/// - 404 → NotFound（终止）
/// - 429 → RateLimited（可重试，带 Retry-After）
/// - 5xx → ServerError（可重试）
/// - 其他 4xx → PermanentRejection（终止）
pub fn classify_status(status: u16, retry_after: Option<&str>) -> Option<FetchErrorKind> {
    match status {
        200..=299 => None,
        404 => Some(FetchErrorKind::NotFound),
        429 => Some(FetchErrorKind::RateLimited {
            retry_after_secs: parse_retry_after(retry_after),
        }),
        500..=599 => Some(FetchErrorKind::ServerError { status }),
        _ => Some(FetchErrorKind::PermanentRejection { status }),
    }
}

/// 解析 Retry-After（秒），缺失或无法解析时为 60 秒
pub fn parse_retry_after(value: Option<&str>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// 归档文档地址：`<archives>/<cik>/<accession 去掉连字符>/<document>`
pub fn archive_url(archives_base_url: &str, cik: &str, accession: &str, document: &str) -> String {
    let cik_clean = cik.trim().trim_start_matches('0');
    let accession_clean = accession.replace('-', "");
    format!(
        "{}/{}/{}/{}",
        archives_base_url.trim_end_matches('/'),
        cik_clean,
        accession_clean,
        document
    )
}

/// 从提交记录中取出最近的 10-K（按申报日期倒序，最多 `limit` 份）
fn parse_submissions(
    company: &Company,
    body: &str,
    limit: usize,
    archives_base_url: &str,
) -> PipelineResult<Vec<Filing>> {
    let submissions: Submissions = serde_json::from_str(body).map_err(|e| {
        PipelineError::fetch(
            format!("submissions {}", company.ticker),
            FetchErrorKind::PermanentRejection { status: 200 },
            format!("提交记录格式错误: {}", e),
        )
    })?;
    let recent = submissions.filings.recent;

    let mut filings = Vec::new();
    for (idx, form) in recent.form.iter().enumerate() {
        if form != ANNUAL_REPORT_FORM {
            continue;
        }

        let (Some(accession), Some(filing_date)) =
            (recent.accession_number.get(idx), recent.filing_date.get(idx))
        else {
            warn!("[{}] 第 {} 条提交记录字段缺失，已跳过", company.ticker, idx);
            continue;
        };

        let filing_date = match NaiveDate::parse_from_str(filing_date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                warn!("[{}] 无法解析申报日期 '{}': {}", company.ticker, filing_date, e);
                continue;
            }
        };
        let report_date = recent
            .report_date
            .get(idx)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        let document = recent
            .primary_document
            .get(idx)
            .filter(|d| !d.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("{}.htm", accession));

        filings.push(Filing {
            id: FilingId::new(accession.clone()),
            ticker: company.ticker.clone(),
            cik: company.cik.clone(),
            form_type: form.clone(),
            filing_date,
            report_date,
            fiscal_year: report_date.unwrap_or(filing_date).year(),
            document_url: archive_url(archives_base_url, &company.cik, accession, &document),
        });
    }

    filings.sort_by(|a, b| b.filing_date.cmp(&a.filing_date));
    filings.truncate(limit);
    Ok(filings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARCHIVES: &str = "https://www.sec.gov/Archives/edgar/data";

    fn apple() -> Company {
        Company::new("AAPL", "320193", "Apple Inc.", None)
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200, None), None);
        assert_eq!(classify_status(404, None), Some(FetchErrorKind::NotFound));
        assert_eq!(
            classify_status(403, None),
            Some(FetchErrorKind::PermanentRejection { status: 403 })
        );
        assert_eq!(
            classify_status(429, Some("12")),
            Some(FetchErrorKind::RateLimited {
                retry_after_secs: 12
            })
        );
        assert_eq!(
            classify_status(503, None),
            Some(FetchErrorKind::ServerError { status: 503 })
        );
    }

    #[test]
    fn test_parse_retry_after_defaults() {
        assert_eq!(parse_retry_after(Some("120")), 120);
        assert_eq!(parse_retry_after(None), 60);
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), 60);
    }

    #[test]
    fn test_archive_url() {
        assert_eq!(
            archive_url(ARCHIVES, "0000320193", "0000320193-24-000123", "aapl-20240928.htm"),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/aapl-20240928.htm"
        );
    }

    #[test]
    fn test_parse_submissions_keeps_recent_10k() {
        let body = r#"{
            "cik": "320193",
            "filings": {
                "recent": {
                    "form": ["10-Q", "10-K", "8-K", "10-K", "10-K/A", "10-K"],
                    "accessionNumber": ["q1", "k2024", "e1", "k2023", "ka", "k2022"],
                    "filingDate": ["2025-01-31", "2024-11-01", "2024-10-30", "2023-11-03", "2023-12-01", "2022-10-28"],
                    "reportDate": ["2024-12-28", "2024-09-28", "", "2023-09-30", "", "2022-09-24"],
                    "primaryDocument": ["q.htm", "aapl-20240928.htm", "e.htm", "aapl-20230930.htm", "a.htm", ""]
                }
            }
        }"#;

        let filings = parse_submissions(&apple(), body, 2, ARCHIVES).unwrap();
        assert_eq!(filings.len(), 2);
        assert_eq!(filings[0].id, FilingId::new("k2024"));
        assert_eq!(filings[0].fiscal_year, 2024);
        assert!(filings[0].document_url.ends_with("/320193/k2024/aapl-20240928.htm"));
        assert_eq!(filings[1].id, FilingId::new("k2023"));

        let all = parse_submissions(&apple(), body, 10, ARCHIVES).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[2].document_url.ends_with("/k2022/k2022.htm"));
    }

    #[test]
    fn test_parse_submissions_without_filings() {
        let filings = parse_submissions(&apple(), r#"{"cik": "320193"}"#, 5, ARCHIVES).unwrap();
        assert!(filings.is_empty());
        assert!(parse_submissions(&apple(), "not json", 5, ARCHIVES).is_err());
    }

    #[tokio::test]
    #[ignore] // 需要访问真实的 SEC EDGAR
    async fn test_list_filings_live() {
        let client = EdgarClient::new(&Config::from_env()).unwrap();
        let filings = client.list_filings(&apple(), 1).await.unwrap();
        assert_eq!(filings.len(), 1);
        let content = client.fetch(&filings[0]).await.unwrap();
        assert!(!content.is_empty());
    }
}
