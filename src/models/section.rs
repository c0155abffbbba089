//! 10-K 定性章节

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::models::filing::FilingId;

/// 10-K 章节（固定的 20 个 Item）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionName {
    Business,
    RiskFactors,
    UnresolvedStaffComments,
    Properties,
    LegalProceedings,
    MineSafetyDisclosures,
    MarketForEquity,
    SelectedFinancialData,
    ManagementDiscussion,
    MarketRisk,
    FinancialStatements,
    AccountantChanges,
    ControlsAndProcedures,
    OtherInformation,
    DirectorsAndGovernance,
    ExecutiveCompensation,
    SecurityOwnership,
    RelatedTransactions,
    AccountantFees,
    Exhibits,
}

impl SectionName {
    /// 按文档顺序排列的全部章节
    pub const ALL: [SectionName; 20] = [
        SectionName::Business,
        SectionName::RiskFactors,
        SectionName::UnresolvedStaffComments,
        SectionName::Properties,
        SectionName::LegalProceedings,
        SectionName::MineSafetyDisclosures,
        SectionName::MarketForEquity,
        SectionName::SelectedFinancialData,
        SectionName::ManagementDiscussion,
        SectionName::MarketRisk,
        SectionName::FinancialStatements,
        SectionName::AccountantChanges,
        SectionName::ControlsAndProcedures,
        SectionName::OtherInformation,
        SectionName::DirectorsAndGovernance,
        SectionName::ExecutiveCompensation,
        SectionName::SecurityOwnership,
        SectionName::RelatedTransactions,
        SectionName::AccountantFees,
        SectionName::Exhibits,
    ];

    /// Item 编号，例如 `1A`
    pub fn item_label(self) -> &'static str {
        match self {
            SectionName::Business => "1",
            SectionName::RiskFactors => "1A",
            SectionName::UnresolvedStaffComments => "1B",
            SectionName::Properties => "2",
            SectionName::LegalProceedings => "3",
            SectionName::MineSafetyDisclosures => "4",
            SectionName::MarketForEquity => "5",
            SectionName::SelectedFinancialData => "6",
            SectionName::ManagementDiscussion => "7",
            SectionName::MarketRisk => "7A",
            SectionName::FinancialStatements => "8",
            SectionName::AccountantChanges => "9",
            SectionName::ControlsAndProcedures => "9A",
            SectionName::OtherInformation => "9B",
            SectionName::DirectorsAndGovernance => "10",
            SectionName::ExecutiveCompensation => "11",
            SectionName::SecurityOwnership => "12",
            SectionName::RelatedTransactions => "13",
            SectionName::AccountantFees => "14",
            SectionName::Exhibits => "15",
        }
    }

    /// 由 Item 编号解析（大小写不敏感）
    pub fn from_item_label(label: &str) -> Option<SectionName> {
        let label = label.trim().to_ascii_uppercase();
        SectionName::ALL
            .iter()
            .copied()
            .find(|name| name.item_label() == label)
    }

    /// 章节标题
    pub fn title(self) -> &'static str {
        match self {
            SectionName::Business => "Business",
            SectionName::RiskFactors => "Risk Factors",
            SectionName::UnresolvedStaffComments => "Unresolved Staff Comments",
            SectionName::Properties => "Properties",
            SectionName::LegalProceedings => "Legal Proceedings",
            SectionName::MineSafetyDisclosures => "Mine Safety Disclosures",
            SectionName::MarketForEquity => "Market for Registrant's Common Equity",
            SectionName::SelectedFinancialData => "Selected Financial Data",
            SectionName::ManagementDiscussion => {
                "Management's Discussion and Analysis of Financial Condition and Results of Operations"
            }
            SectionName::MarketRisk => "Quantitative and Qualitative Disclosures About Market Risk",
            SectionName::FinancialStatements => "Financial Statements and Supplementary Data",
            SectionName::AccountantChanges => "Changes in and Disagreements with Accountants",
            SectionName::ControlsAndProcedures => "Controls and Procedures",
            SectionName::OtherInformation => "Other Information",
            SectionName::DirectorsAndGovernance => {
                "Directors, Executive Officers and Corporate Governance"
            }
            SectionName::ExecutiveCompensation => "Executive Compensation",
            SectionName::SecurityOwnership => "Security Ownership of Certain Beneficial Owners",
            SectionName::RelatedTransactions => "Certain Relationships and Related Transactions",
            SectionName::AccountantFees => "Principal Accountant Fees and Services",
            SectionName::Exhibits => "Exhibits and Financial Statement Schedules",
        }
    }
}

impl Display for SectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Item {}. {}", self.item_label(), self.title())
    }
}

/// 从申报文件中提取出的章节，存储后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeSection {
    pub filing_id: FilingId,
    pub name: SectionName,
    pub text: String,
    pub word_count: usize,
    pub char_count: usize,
    pub extracted_at: DateTime<Utc>,
}

impl QualitativeSection {
    pub fn new(
        filing_id: FilingId,
        name: SectionName,
        text: String,
        extracted_at: DateTime<Utc>,
    ) -> Self {
        let word_count = text.split_whitespace().count();
        let char_count = text.chars().count();
        Self {
            filing_id,
            name,
            text,
            word_count,
            char_count,
            extracted_at,
        }
    }
}
