use crate::models::company::Company;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

/// 公司清单文件格式
#[derive(Debug, Deserialize)]
struct CompanyUniverse {
    #[serde(default)]
    companies: Vec<Company>,
}

/// 从 TOML 文件加载公司清单
pub async fn load_companies(toml_file_path: &Path) -> Result<Vec<Company>> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取公司清单: {}", toml_file_path.display()))?;

    let companies = parse_companies(&content)
        .with_context(|| format!("无法解析公司清单: {}", toml_file_path.display()))?;

    tracing::info!(
        "成功加载 {} 家公司: {}",
        companies.len(),
        toml_file_path.display()
    );

    Ok(companies)
}

/// 解析公司清单内容
///
/// ticker 统一转为大写，重复的 ticker 只保留第一条
pub fn parse_companies(content: &str) -> Result<Vec<Company>> {
    let universe: CompanyUniverse = toml::from_str(content)?;

    let mut seen = HashSet::new();
    let mut companies = Vec::new();
    for company in universe.companies {
        let company = Company::new(company.ticker, company.cik, company.name, company.sector);
        if company.ticker.is_empty() || company.cik.trim().is_empty() {
            anyhow::bail!("公司条目缺少 ticker 或 cik: {:?}", company);
        }
        if !seen.insert(company.ticker.clone()) {
            tracing::warn!("重复的公司条目，已忽略: {}", company.ticker);
            continue;
        }
        companies.push(company);
    }

    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_companies() {
        let content = r#"
            [[companies]]
            ticker = "aapl"
            cik = "320193"
            name = "Apple Inc."
            sector = "technology"

            [[companies]]
            ticker = "MSFT"
            cik = "789019"
            name = "Microsoft Corporation"

            [[companies]]
            ticker = "AAPL"
            cik = "320193"
            name = "Duplicate"
        "#;

        let companies = parse_companies(content).unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].ticker, "AAPL");
        assert_eq!(companies[0].sector.as_deref(), Some("technology"));
        assert_eq!(companies[1].sector, None);
    }

    #[test]
    fn test_parse_companies_rejects_missing_cik() {
        let content = r#"
            [[companies]]
            ticker = "AAPL"
            cik = ""
            name = "Apple Inc."
        "#;
        assert!(parse_companies(content).is_err());
    }
}
