//! 公司模型
//!
//! 核心只读取公司信息，从不修改

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 被分析的公司
///
/// 标识由 ticker + SEC 注册号（CIK）组成，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// 股票代码，例如 `AAPL`
    pub ticker: String,
    /// SEC 中央索引键（CIK），允许不带前导零
    pub cik: String,
    /// 公司名称
    pub name: String,
    /// 所属行业
    #[serde(default)]
    pub sector: Option<String>,
}

impl Company {
    pub fn new(
        ticker: impl Into<String>,
        cik: impl Into<String>,
        name: impl Into<String>,
        sector: Option<String>,
    ) -> Self {
        Self {
            ticker: ticker.into().to_ascii_uppercase(),
            cik: cik.into(),
            name: name.into(),
            sector,
        }
    }

    /// 补齐到 10 位的 CIK（EDGAR 接口要求的格式）
    pub fn padded_cik(&self) -> String {
        let digits = self.cik.trim().trim_start_matches("CIK");
        format!("{:0>10}", digits)
    }
}

impl Display for Company {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.ticker, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_cik() {
        let company = Company::new("aapl", "320193", "Apple Inc.", None);
        assert_eq!(company.ticker, "AAPL");
        assert_eq!(company.padded_cik(), "0000320193");

        let already_padded = Company::new("MSFT", "0000789019", "Microsoft", None);
        assert_eq!(already_padded.padded_cik(), "0000789019");
    }
}
