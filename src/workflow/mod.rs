//! 流程层（Workflow Layer）
//!
//! 定义"一份申报文件"的处理流程：fetch → extract → analyze → score，
//! 只依赖业务能力（services）和基础设施提供的限流、重试与取消信号。

pub mod filing_ctx;
pub mod filing_flow;

pub use filing_ctx::FilingCtx;
pub use filing_flow::{FilingFlow, FlowDeps, FlowFailure, ProcessResult, NO_SOURCE_SECTIONS};
