//! 外部调用重试策略 - 基础设施层
//!
//! 单次外部调用（抓取、提取、分析）的重试包装：
//! - 每次尝试都有独立的超时，超时视为可重试失败
//! - 可重试失败按指数退避 + 随机抖动重试，直到次数用尽
//! - 终止失败立即返回，不再重试
//! - 次数用尽时返回 `RetriesExhausted`，包装最后一次失败

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FailureClass, PipelineError, PipelineResult};

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,
    /// 基础延迟
    pub base_delay: Duration,
    /// 退避上限
    pub max_delay: Duration,
    /// 单次调用超时
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            call_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryPolicy {
    /// 使用自定义分类器执行操作
    pub async fn execute<T, F, Fut, C>(
        &self,
        operation: &str,
        mut op: F,
        classify: C,
    ) -> PipelineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
        C: Fn(&PipelineError) -> FailureClass,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let result = match self.call_timeout {
                Some(limit) => match tokio::time::timeout(limit, op()).await {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::Timeout {
                        operation: operation.to_string(),
                        after: limit,
                    }),
                },
                None => op().await,
            };

            let err = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} 第 {} 次尝试成功", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if classify(&err) == FailureClass::Terminal {
                debug!("{} 遇到不可重试错误: {}", operation, err);
                return Err(err);
            }

            if attempt >= max_attempts {
                warn!("❌ {} 已重试 {} 次仍失败: {}", operation, attempt, err);
                return Err(PipelineError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_for(attempt - 1, err.retry_after());
            warn!(
                "⚠️ {} 第 {}/{} 次尝试失败: {}，{:?} 后重试",
                operation, attempt, max_attempts, err, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// 使用默认分类规则执行操作
    pub async fn run<T, F, Fut>(&self, operation: &str, op: F) -> PipelineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        self.execute(operation, op, PipelineError::classify).await
    }

    /// 第 `retry` 次重试前的等待时间（从 0 开始）
    ///
    /// `min(base·2^retry, max) + U[0, base)`，服务端给出的等待提示会抬高下限
    pub fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let exponential = self
            .base_delay
            .checked_mul(2u32.saturating_pow(retry))
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        let backoff = match hint {
            Some(hint) => exponential.max(hint.min(self.max_delay)),
            None => exponential,
        };

        backoff + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        if base_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..base_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            call_timeout: Some(Duration::from_millis(200)),
        }
    }

    fn server_error() -> PipelineError {
        PipelineError::fetch("doc", FetchErrorKind::ServerError { status: 503 }, "unavailable")
    }

    #[tokio::test]
    async fn test_retryable_failure_uses_all_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: PipelineResult<()> = fast_policy(4)
            .run("fetch doc", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(server_error())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(PipelineError::RetriesExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, PipelineError::Fetch { .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_terminal_failure_is_attempted_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: PipelineResult<()> = fast_policy(4)
            .run("fetch doc", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(PipelineError::fetch("doc", FetchErrorKind::NotFound, "gone"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(PipelineError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_custom_classifier_overrides_default() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: PipelineResult<()> = fast_policy(3)
            .execute(
                "fetch doc",
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(server_error())
                    }
                },
                |_| FailureClass::Terminal,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = fast_policy(4)
            .run("analyze", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(server_error())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let policy = RetryPolicy {
            call_timeout: Some(Duration::from_millis(10)),
            ..fast_policy(2)
        };

        let result: PipelineResult<()> = policy
            .run("slow call", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match result {
            Err(PipelineError::RetriesExhausted { last, .. }) => {
                assert!(matches!(*last, PipelineError::Timeout { .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_delay_is_capped_and_jittered() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            call_timeout: None,
        };

        let first = policy.delay_for(0, None);
        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(200));

        let third = policy.delay_for(2, None);
        assert!(third >= Duration::from_millis(400) && third < Duration::from_millis(500));

        for retry in [4, 10, 40] {
            let capped = policy.delay_for(retry, None);
            assert!(capped >= Duration::from_millis(1000));
            assert!(capped < Duration::from_millis(1100));
        }

        let hinted = policy.delay_for(0, Some(Duration::from_millis(600)));
        assert!(hinted >= Duration::from_millis(600) && hinted < Duration::from_millis(700));

        let long_hint = policy.delay_for(0, Some(Duration::from_secs(60)));
        assert!(long_hint < Duration::from_millis(1100));
    }
}
