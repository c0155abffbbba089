//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责工作项枚举和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量处理器
//! - 管理应用生命周期（初始化、运行）
//! - 控制在途数量（Semaphore，先拿许可再 spawn）
//! - 运行级取消（Ctrl-C）
//! - 汇总 RunSummary、输出排名
//!
//! ### `company_processor` - 单个公司处理器
//! - 列出公司最近的 10-K 申报文件
//! - 登记公司与申报文件记录（已有记录保留进度）
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Company> → Vec<WorkItem>)
//!     ↓
//! company_processor (处理单个 Company → Vec<FilingRecord>)
//!     ↓
//! workflow::FilingFlow (处理单份申报文件)
//!     ↓
//! services (能力层：source / extract / analyze / score / state)
//!     ↓
//! infrastructure (基础设施：RateLimiter / RetryPolicy / Store)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管批量，company_processor 管单个公司
//! 2. **失败隔离**：单个工作项失败只记录，不中断运行
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **单一写入者**：只有编排器写 RunSummary

pub mod batch_processor;
pub mod company_processor;

// 重新导出主要类型
pub use batch_processor::{
    App, Collaborators, Orchestrator, OrchestratorSettings, SKIP_ALREADY_SCORED, SKIP_CANCELLED,
};
pub use company_processor::{enumerate_company, CompanyListing};
