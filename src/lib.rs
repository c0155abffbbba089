//! # Filing Scorer
//!
//! 抓取 SEC 10-K 申报文件、提取定性章节、按五个维度打分并给出投资评级的流水线
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有跨工作项共享的资源，只暴露能力
//! - `RateLimiter` - 申报文件源 / 分析服务各一个独立限流器
//! - `RetryPolicy` - 超时 + 指数退避 + 抖动
//! - `Store` - 单条记录原子读写（内存 / JSON 文件）
//!
//! ### ② 客户端（Clients）
//! - `EdgarClient` - SEC EDGAR 提交记录与归档文档
//! - `LlmClient` - OpenAI 兼容的对话接口
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单份申报文件
//! - `ItemSectionExtractor` - 10-K Item 章节提取
//! - `LlmAnalysisProvider` / `LexiconAnalysisProvider` - 维度打分
//! - `ScoringEngine` - 子评分 → 综合分 → 评级
//! - `ProcessingState` - 可续跑的处理状态
//!
//! ### ④ 流程层（Workflow）
//! - `FilingCtx` - 上下文封装（ticker + accession）
//! - `FilingFlow` - 流程编排（fetch → extract → analyze → score）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 工作项派发、并发控制、取消、运行汇总
//! - `orchestrator/company_processor` - 单个公司的申报文件枚举
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{PipelineError, PipelineResult};
pub use models::{Company, CompositeResult, FilingRecord, RunSummary, SubScores, Tier};
pub use orchestrator::{App, Collaborators, Orchestrator, OrchestratorSettings};
pub use services::ScoringEngine;
pub use workflow::{FilingCtx, FilingFlow, ProcessResult};
