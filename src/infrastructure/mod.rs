//! 基础设施层（Infrastructure Layer）
//!
//! ## 职责
//!
//! 持有跨工作项共享的稀缺资源，只暴露能力，不认识业务流程：
//!
//! - `rate_limiter` - 两个外部资源（申报文件源、分析服务）的并发与节拍控制
//! - `retry` - 单次外部调用的超时、分类与指数退避重试
//! - `store` - 按 id 读写记录的持久化存储（内存 / JSON 文件）
//! - `cancel` - 运行级取消信号

pub mod cancel;
pub mod rate_limiter;
pub mod retry;
pub mod store;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use rate_limiter::{RateLease, RateLimiter, RateLimiters, Resource};
pub use retry::RetryPolicy;
pub use store::{JsonFileStore, MemoryStore, Store};
