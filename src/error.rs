//! 流水线错误类型
//!
//! 所有库内错误统一为 [`PipelineError`]，应用边界（main / App / 配置加载）使用 `anyhow`。
//! 每个错误都能被分类为"可重试"或"终止"，供 `RetryPolicy` 使用。

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::models::filing::{FilingId, FilingStatus};
use crate::models::score::Dimension;
use crate::models::state::Stage;

/// 抓取失败的具体类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// 网络/连接失败
    Transport,
    /// 请求超时
    Timeout,
    /// 被限流（HTTP 429），附带建议等待秒数
    RateLimited { retry_after_secs: u64 },
    /// 服务端错误（5xx）
    ServerError { status: u16 },
    /// 永久拒绝（401/403 及其他 4xx）
    PermanentRejection { status: u16 },
    /// 资源不存在（404）
    NotFound,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Transport => write!(f, "网络错误"),
            FetchErrorKind::Timeout => write!(f, "请求超时"),
            FetchErrorKind::RateLimited { retry_after_secs } => {
                write!(f, "请求频率限制, 建议等待 {} 秒", retry_after_secs)
            }
            FetchErrorKind::ServerError { status } => write!(f, "服务端错误 (HTTP {})", status),
            FetchErrorKind::PermanentRejection { status } => {
                write!(f, "请求被拒绝 (HTTP {})", status)
            }
            FetchErrorKind::NotFound => write!(f, "资源不存在 (HTTP 404)"),
        }
    }
}

/// 分析失败的具体类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    Transport,
    RateLimited,
    /// 响应无法解析或超出范围
    InvalidResponse,
    /// 输入被服务端永久拒绝（invalid request）
    PermanentRejection,
}

impl fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisErrorKind::Transport => write!(f, "调用失败"),
            AnalysisErrorKind::RateLimited => write!(f, "请求频率限制"),
            AnalysisErrorKind::InvalidResponse => write!(f, "响应无效"),
            AnalysisErrorKind::PermanentRejection => write!(f, "输入被拒绝"),
        }
    }
}

/// 失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Retryable,
    Terminal,
}

/// 流水线错误
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("抓取失败 ({reference}): {kind}: {message}")]
    Fetch {
        reference: String,
        kind: FetchErrorKind,
        message: String,
    },

    #[error("章节提取失败: {reason}")]
    Extraction { reason: String },

    #[error("分析失败 (维度: {dimension}): {kind}: {message}")]
    Analysis {
        dimension: Dimension,
        kind: AnalysisErrorKind,
        message: String,
    },

    #[error("评分数据不足: 没有任何可用的子评分")]
    InsufficientData,

    #[error("retries-exhausted: {operation} 已尝试 {attempts} 次, 最后一次错误: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<PipelineError>,
    },

    #[error("调用超时: {operation} 超过 {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("非法状态转换 ({filing}): {from} → {to}")]
    InvalidTransition {
        filing: FilingId,
        from: FilingStatus,
        to: FilingStatus,
    },
}

impl PipelineError {
    /// 默认的失败分类规则
    pub fn classify(&self) -> FailureClass {
        match self {
            PipelineError::Fetch { kind, .. } => match kind {
                FetchErrorKind::PermanentRejection { .. } | FetchErrorKind::NotFound => {
                    FailureClass::Terminal
                }
                _ => FailureClass::Retryable,
            },
            PipelineError::Analysis { kind, .. } => match kind {
                AnalysisErrorKind::PermanentRejection => FailureClass::Terminal,
                _ => FailureClass::Retryable,
            },
            PipelineError::Timeout { .. } => FailureClass::Retryable,
            PipelineError::Extraction { .. }
            | PipelineError::InsufficientData
            | PipelineError::RetriesExhausted { .. }
            | PipelineError::Configuration(_)
            | PipelineError::Storage(_)
            | PipelineError::InvalidTransition { .. } => FailureClass::Terminal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify() == FailureClass::Retryable
    }

    /// 服务端建议的等待时间（仅限流错误）
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PipelineError::Fetch {
                kind: FetchErrorKind::RateLimited { retry_after_secs },
                ..
            } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }

    /// 错误对应的流水线步骤（无法确定时返回 `None`）
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Fetch { .. } => Some(Stage::Fetch),
            PipelineError::Extraction { .. } => Some(Stage::Extract),
            PipelineError::Analysis { .. } => Some(Stage::Analyze),
            PipelineError::InsufficientData => Some(Stage::Score),
            PipelineError::RetriesExhausted { last, .. } => last.stage(),
            _ => None,
        }
    }

    pub fn fetch(
        reference: impl Into<String>,
        kind: FetchErrorKind,
        message: impl Into<String>,
    ) -> Self {
        PipelineError::Fetch {
            reference: reference.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn analysis(
        dimension: Dimension,
        kind: AnalysisErrorKind,
        message: impl Into<String>,
    ) -> Self {
        PipelineError::Analysis {
            dimension,
            kind,
            message: message.into(),
        }
    }

    pub fn extraction(reason: impl Into<String>) -> Self {
        PipelineError::Extraction {
            reason: reason.into(),
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Storage(format!("JSON 序列化失败: {}", err))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(format!("文件操作失败: {}", err))
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        let reference = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let kind = if err.is_timeout() {
            FetchErrorKind::Timeout
        } else {
            FetchErrorKind::Transport
        };
        PipelineError::Fetch {
            reference,
            kind,
            message: err.to_string(),
        }
    }
}

/// 流水线结果类型
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_fetch_errors() {
        let not_found = PipelineError::fetch("doc", FetchErrorKind::NotFound, "missing");
        assert_eq!(not_found.classify(), FailureClass::Terminal);

        let forbidden = PipelineError::fetch(
            "doc",
            FetchErrorKind::PermanentRejection { status: 403 },
            "forbidden",
        );
        assert_eq!(forbidden.classify(), FailureClass::Terminal);

        let server = PipelineError::fetch("doc", FetchErrorKind::ServerError { status: 503 }, "");
        assert_eq!(server.classify(), FailureClass::Retryable);

        let limited = PipelineError::fetch(
            "doc",
            FetchErrorKind::RateLimited {
                retry_after_secs: 7,
            },
            "",
        );
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_classify_other_errors() {
        assert_eq!(
            PipelineError::extraction("empty").classify(),
            FailureClass::Terminal
        );
        assert_eq!(
            PipelineError::InsufficientData.classify(),
            FailureClass::Terminal
        );
        assert_eq!(
            PipelineError::analysis(Dimension::Risk, AnalysisErrorKind::InvalidResponse, "x")
                .classify(),
            FailureClass::Retryable
        );
        assert_eq!(
            PipelineError::analysis(Dimension::Risk, AnalysisErrorKind::PermanentRejection, "x")
                .classify(),
            FailureClass::Terminal
        );
        assert_eq!(
            PipelineError::Timeout {
                operation: "fetch".to_string(),
                after: Duration::from_secs(1)
            }
            .classify(),
            FailureClass::Retryable
        );
    }

    #[test]
    fn test_retries_exhausted_is_tagged() {
        let err = PipelineError::RetriesExhausted {
            operation: "fetch AAPL".to_string(),
            attempts: 4,
            last: Box::new(PipelineError::fetch(
                "doc",
                FetchErrorKind::ServerError { status: 500 },
                "boom",
            )),
        };
        assert!(err.to_string().starts_with("retries-exhausted"));
        assert_eq!(err.stage(), Some(Stage::Fetch));
        assert_eq!(err.classify(), FailureClass::Terminal);
    }
}
