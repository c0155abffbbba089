//! 10-K 章节提取 - 业务能力层
//!
//! 输入原始 HTML/文本，输出 `SectionName → 文本`。
//! 缺失的章节不在结果中，不算错误；空内容视为格式错误（不可重试）。
//!
//! 提取步骤：
//! 1. 去掉 script/style 与所有标签，解码常见实体
//! 2. 规范化空白（保留换行，便于识别标题行）
//! 3. 找出所有 `ITEM <n>` 标题行
//! 4. 每个 Item 取"该标题到下一个不同 Item 标题"之间最长的一段（跳过目录）
//! 5. 截断到最大长度，丢弃过短的章节

use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::models::SectionName;

static SCRIPT_STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap());
static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/tr|/li|/h[1-6]|/table|p|div|tr|li|h[1-6])\b[^>]*>").unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#([xX][0-9a-fA-F]+|[0-9]+);").unwrap());
static ITEM_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*item[ \t]+(1[0-5]|1a|1b|1|2|3|4|5|6|7a|7|8|9a|9b|9)\b").unwrap()
});

/// 章节最短长度（字符），更短的视为目录或交叉引用
pub const MIN_SECTION_CHARS: usize = 100;

/// 章节提取器
#[async_trait]
pub trait SectionExtractor: Send + Sync {
    async fn extract(&self, raw_content: &str) -> PipelineResult<BTreeMap<SectionName, String>>;
}

/// 基于 Item 标题的 10-K 章节提取器
#[derive(Debug, Clone)]
pub struct ItemSectionExtractor {
    max_section_chars: usize,
    min_section_chars: usize,
}

impl ItemSectionExtractor {
    pub fn new(max_section_chars: usize) -> Self {
        Self {
            max_section_chars,
            min_section_chars: MIN_SECTION_CHARS,
        }
    }

    pub fn with_min_section_chars(mut self, min_section_chars: usize) -> Self {
        self.min_section_chars = min_section_chars;
        self
    }

    /// 同步提取（trait 实现直接调用）
    pub fn extract_sections(
        &self,
        raw_content: &str,
    ) -> PipelineResult<BTreeMap<SectionName, String>> {
        if raw_content.trim().is_empty() {
            return Err(PipelineError::extraction("申报文件内容为空"));
        }

        let text = normalize_whitespace(&html_to_text(raw_content));
        if text.is_empty() {
            return Err(PipelineError::extraction("去除标签后没有任何文本"));
        }

        let headings: Vec<(usize, SectionName)> = ITEM_HEADING_RE
            .captures_iter(&text)
            .filter_map(|caps| {
                let start = caps.get(0)?.start();
                let name = SectionName::from_item_label(caps.get(1)?.as_str())?;
                Some((start, name))
            })
            .collect();

        let mut best: BTreeMap<SectionName, (usize, usize)> = BTreeMap::new();
        for (idx, (start, name)) in headings.iter().enumerate() {
            let end = headings[idx + 1..]
                .iter()
                .find(|(_, next)| next != name)
                .map(|(pos, _)| *pos)
                .unwrap_or(text.len());
            let len = end - start;
            let longer = best
                .get(name)
                .map_or(true, |(s, e)| len > e - s);
            if longer {
                best.insert(*name, (*start, end));
            }
        }

        let mut sections = BTreeMap::new();
        for (name, (start, end)) in best {
            let body = text[start..end].trim();
            if body.chars().count() < self.min_section_chars {
                debug!("章节 {} 过短，已忽略", name);
                continue;
            }
            sections.insert(name, truncate_chars(body, self.max_section_chars));
        }

        debug!("提取到 {} 个章节", sections.len());
        Ok(sections)
    }
}

#[async_trait]
impl SectionExtractor for ItemSectionExtractor {
    async fn extract(&self, raw_content: &str) -> PipelineResult<BTreeMap<SectionName, String>> {
        self.extract_sections(raw_content)
    }
}

/// 去掉 HTML 标签并解码常见实体
pub fn html_to_text(html: &str) -> String {
    let without_scripts = SCRIPT_STYLE_RE.replace_all(html, " ");
    let with_breaks = BLOCK_TAG_RE.replace_all(&without_scripts, "\n");
    let without_tags = TAG_RE.replace_all(&with_breaks, " ");
    decode_entities(&without_tags)
}

fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&mdash;", "-")
        .replace("&ndash;", "-");

    let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = if let Some(hex) = raw.strip_prefix(['x', 'X']) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            raw.parse::<u32>().ok()
        };
        code.and_then(char::from_u32)
            .map(|c| if c == '\u{a0}' { ' ' } else { c })
            .map(String::from)
            .unwrap_or_default()
    });

    // &amp; 最后解码，避免 "&amp;lt;" 被二次解码
    numeric.replace("&amp;", "&")
}

/// 行内空白压缩为单个空格，去掉空行
pub fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.split(|c: char| c.is_whitespace() || c == '\u{a0}')
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(topic: &str) -> String {
        format!(
            "{} ",
            format!("The company discusses {} in considerable detail for investors.", topic)
                .repeat(5)
        )
    }

    fn sample_filing() -> String {
        format!(
            r#"<html><head><style>.x {{ color: red; }}</style></head><body>
            <p>TABLE OF CONTENTS</p>
            <p>Item 1. Business 3</p>
            <p>Item 1A. Risk Factors 10</p>
            <p>Item 7. Management&#8217;s Discussion 30</p>
            <div>ITEM 1. BUSINESS</div>
            <p>{}</p>
            <div>ITEM&nbsp;1A. RISK FACTORS</div>
            <p>{}</p>
            <div>Item 7. Management&rsquo;s Discussion and Analysis</div>
            <p>{}</p>
            <div>Item 7A. Quantitative and Qualitative Disclosures About Market Risk</div>
            <p>See Item 7.</p>
            <div>Item 8. Financial Statements</div>
            <p>{}</p>
            </body></html>"#,
            paragraph("products &amp; services"),
            paragraph("supply chain risk"),
            paragraph("revenue growth"),
            paragraph("balance sheet"),
        )
    }

    #[test]
    fn test_extract_sections_picks_body_over_toc() {
        let extractor = ItemSectionExtractor::new(50_000);
        let sections = extractor.extract_sections(&sample_filing()).unwrap();

        let business = sections.get(&SectionName::Business).unwrap();
        assert!(business.starts_with("ITEM 1. BUSINESS"));
        assert!(business.contains("products & services"));

        let risk = sections.get(&SectionName::RiskFactors).unwrap();
        assert!(risk.contains("supply chain risk"));
        assert!(!risk.contains("color: red"));

        assert!(sections.contains_key(&SectionName::ManagementDiscussion));
        assert!(sections.contains_key(&SectionName::FinancialStatements));
        // "See Item 7." 太短，不作为章节
        assert!(!sections.contains_key(&SectionName::MarketRisk));
        assert!(!sections.contains_key(&SectionName::Exhibits));
    }

    #[test]
    fn test_extract_sections_caps_length() {
        let extractor = ItemSectionExtractor::new(120);
        let sections = extractor.extract_sections(&sample_filing()).unwrap();
        for text in sections.values() {
            assert!(text.chars().count() <= 120);
        }
    }

    #[test]
    fn test_empty_content_is_extraction_error() {
        let extractor = ItemSectionExtractor::new(50_000);
        assert!(matches!(
            extractor.extract_sections("   "),
            Err(PipelineError::Extraction { .. })
        ));
        assert!(matches!(
            extractor.extract_sections("<html><script>var x = 1;</script></html>"),
            Err(PipelineError::Extraction { .. })
        ));
    }

    #[test]
    fn test_content_without_items_yields_no_sections() {
        let extractor = ItemSectionExtractor::new(50_000);
        let sections = extractor
            .extract_sections("<p>Quarterly newsletter without any item headings.</p>")
            .unwrap();
        assert!(sections.is_empty());
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(html_to_text("A&amp;B &lt;x&gt; &#39;q&#39; &#x41;"), "A&B <x> 'q' A");
    }
}
