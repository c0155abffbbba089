//! 外部资源限流器 - 基础设施层
//!
//! ## 职责
//!
//! - 限制同一外部资源的并发调用数（Semaphore）
//! - 限制相邻两次调用的最小间隔（按固定节拍排队，超出的调用被延后，不会被丢弃）
//! - 每个外部资源一个独立实例：申报文件源、分析服务
//!
//! 获取到的 [`RateLease`] 在 drop 时自动归还名额，无论调用成功还是失败。

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// 受限流保护的外部资源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// 申报文件源（EDGAR）
    FilingSource,
    /// 分析服务（LLM）
    AnalysisProvider,
}

impl Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::FilingSource => write!(f, "filing-source"),
            Resource::AnalysisProvider => write!(f, "analysis-provider"),
        }
    }
}

/// 单个资源的限流器
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    min_interval: Option<Duration>,
    /// 下一次允许开始调用的时间点
    next_slot: Mutex<Option<Instant>>,
    in_use: Arc<AtomicUsize>,
}

impl RateLimiter {
    /// 创建限流器
    ///
    /// `max_concurrent` 为 0 或 `min_interval` 为零时长都视为配置错误
    pub fn new(
        name: impl Into<String>,
        max_concurrent: usize,
        min_interval: Option<Duration>,
    ) -> PipelineResult<Self> {
        let name = name.into();
        if max_concurrent == 0 {
            return Err(PipelineError::Configuration(format!(
                "限流器 {} 的最大并发数必须大于 0",
                name
            )));
        }
        if matches!(min_interval, Some(d) if d.is_zero()) {
            return Err(PipelineError::Configuration(format!(
                "限流器 {} 的最小调用间隔必须大于 0",
                name
            )));
        }

        Ok(Self {
            name,
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            min_interval,
            next_slot: Mutex::new(None),
            in_use: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// 按每秒请求数创建限流器
    pub fn per_second(
        name: impl Into<String>,
        max_concurrent: usize,
        requests_per_second: u32,
    ) -> PipelineResult<Self> {
        let name = name.into();
        if requests_per_second == 0 {
            return Err(PipelineError::Configuration(format!(
                "限流器 {} 的每秒请求数必须大于 0",
                name
            )));
        }
        let interval = Duration::from_secs_f64(1.0 / f64::from(requests_per_second));
        Self::new(name, max_concurrent, Some(interval))
    }

    /// 获取一个调用名额
    ///
    /// 先等待并发名额，再按最小间隔排队，直到轮到自己
    pub async fn acquire(&self) -> PipelineResult<RateLease> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::Configuration(format!("限流器 {} 已关闭", self.name)))?;

        if let Some(interval) = self.min_interval {
            // 在锁内预订开始时间，锁在 await 之前释放
            let start_at = {
                let mut slot = self
                    .next_slot
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let now = Instant::now();
                let start_at = match *slot {
                    Some(next) if next > now => next,
                    _ => now,
                };
                *slot = Some(start_at + interval);
                start_at
            };

            if start_at > Instant::now() {
                debug!("[{}] 等待限流节拍 {:?}", self.name, start_at - Instant::now());
                tokio::time::sleep_until(start_at).await;
            }
        }

        self.in_use.fetch_add(1, Ordering::SeqCst);
        Ok(RateLease {
            _permit: permit,
            in_use: self.in_use.clone(),
        })
    }

    /// 当前持有的名额数
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 调用名额，drop 时归还
#[derive(Debug)]
pub struct RateLease {
    _permit: OwnedSemaphorePermit,
    in_use: Arc<AtomicUsize>,
}

impl Drop for RateLease {
    fn drop(&mut self) {
        self.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 两个外部资源的限流器集合
///
/// 这是一次运行中所有并发流水线之间唯一共享的限流状态
#[derive(Debug, Clone)]
pub struct RateLimiters {
    filing_source: Arc<RateLimiter>,
    analysis_provider: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn new(filing_source: RateLimiter, analysis_provider: RateLimiter) -> Self {
        Self {
            filing_source: Arc::new(filing_source),
            analysis_provider: Arc::new(analysis_provider),
        }
    }

    pub fn get(&self, resource: Resource) -> &RateLimiter {
        match resource {
            Resource::FilingSource => &self.filing_source,
            Resource::AnalysisProvider => &self.analysis_provider,
        }
    }

    pub async fn acquire(&self, resource: Resource) -> PipelineResult<RateLease> {
        self.get(resource).acquire().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_zero_limits_are_configuration_errors() {
        assert!(matches!(
            RateLimiter::new("fetch", 0, None),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            RateLimiter::new("fetch", 2, Some(Duration::ZERO)),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            RateLimiter::per_second("fetch", 2, 0),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_leases_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new("analysis", 3, None).unwrap());
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..12 {
            let limiter = limiter.clone();
            let current = current.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _lease = limiter.acquire().await.unwrap();
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                assert!(limiter.in_use() <= 3);
                tokio::time::sleep(Duration::from_millis(20)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.in_use(), 0);
    }

    #[tokio::test]
    async fn test_excess_caller_blocks_until_release() {
        let limiter = RateLimiter::new("fetch", 1, None).unwrap();
        let first = limiter.acquire().await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(30), limiter.acquire()).await;
        assert!(blocked.is_err());

        drop(first);
        let second = tokio::time::timeout(Duration::from_millis(100), limiter.acquire()).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_min_interval_spaces_acquisitions() {
        let limiter = RateLimiter::new("fetch", 10, Some(Duration::from_millis(40))).unwrap();
        let started = std::time::Instant::now();
        for _ in 0..4 {
            let _lease = limiter.acquire().await.unwrap();
        }
        // 第一次立即开始，其余三次各间隔 40ms
        assert!(started.elapsed() >= Duration::from_millis(115));
    }
}
