use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};
use crate::infrastructure::{RateLimiter, RateLimiters, RetryPolicy};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的申报文件数量
    pub max_in_flight: usize,
    // --- 申报文件源限流 ---
    pub fetch_requests_per_second: u32,
    pub fetch_max_concurrent: usize,
    /// 分析服务最大并发
    pub analysis_max_concurrent: usize,
    // --- 重试 ---
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// 单次外部调用超时（秒）
    pub call_timeout_secs: u64,
    /// 每家公司处理最近几份 10-K
    pub filings_per_company: usize,
    /// 公司列表 TOML 文件
    pub companies_file: String,
    /// 处理状态目录
    pub state_dir: String,
    // --- EDGAR ---
    pub edgar_data_base_url: String,
    pub edgar_archives_base_url: String,
    /// 每个请求都会带上的调用方标识
    pub edgar_user_agent: String,
    /// 分析后端：`llm` 或 `lexicon`
    pub analysis_backend: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 文本长度 ---
    pub max_section_chars: usize,
    pub analysis_input_chars: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            fetch_requests_per_second: 10,
            fetch_max_concurrent: 10,
            analysis_max_concurrent: 4,
            retry_max_attempts: 4,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            call_timeout_secs: 60,
            filings_per_company: 2,
            companies_file: "data/companies.toml".to_string(),
            state_dir: "state".to_string(),
            edgar_data_base_url: "https://data.sec.gov".to_string(),
            edgar_archives_base_url: "https://www.sec.gov/Archives/edgar/data".to_string(),
            edgar_user_agent: "filing-scorer research contact@example.com".to_string(),
            analysis_backend: "llm".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            max_section_chars: 50_000,
            analysis_input_chars: 12_000,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_in_flight: std::env::var("MAX_IN_FLIGHT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_in_flight),
            fetch_requests_per_second: std::env::var("FETCH_REQUESTS_PER_SECOND").ok().and_then(|v| v.parse().ok()).unwrap_or(default.fetch_requests_per_second),
            fetch_max_concurrent: std::env::var("FETCH_MAX_CONCURRENT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.fetch_max_concurrent),
            analysis_max_concurrent: std::env::var("ANALYSIS_MAX_CONCURRENT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.analysis_max_concurrent),
            retry_max_attempts: std::env::var("RETRY_MAX_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_max_attempts),
            retry_base_delay_ms: std::env::var("RETRY_BASE_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_base_delay_ms),
            retry_max_delay_ms: std::env::var("RETRY_MAX_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_max_delay_ms),
            call_timeout_secs: std::env::var("CALL_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.call_timeout_secs),
            filings_per_company: std::env::var("FILINGS_PER_COMPANY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.filings_per_company),
            companies_file: std::env::var("COMPANIES_FILE").unwrap_or(default.companies_file),
            state_dir: std::env::var("STATE_DIR").unwrap_or(default.state_dir),
            edgar_data_base_url: std::env::var("EDGAR_DATA_BASE_URL").unwrap_or(default.edgar_data_base_url),
            edgar_archives_base_url: std::env::var("EDGAR_ARCHIVES_BASE_URL").unwrap_or(default.edgar_archives_base_url),
            edgar_user_agent: std::env::var("EDGAR_USER_AGENT").unwrap_or(default.edgar_user_agent),
            analysis_backend: std::env::var("ANALYSIS_BACKEND").unwrap_or(default.analysis_backend),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            max_section_chars: std::env::var("MAX_SECTION_CHARS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_section_chars),
            analysis_input_chars: std::env::var("ANALYSIS_INPUT_CHARS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.analysis_input_chars),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    /// 启动前校验，任何错误都是致命的
    pub fn validate(&self) -> PipelineResult<()> {
        let positive = [
            ("MAX_IN_FLIGHT", self.max_in_flight),
            ("FETCH_MAX_CONCURRENT", self.fetch_max_concurrent),
            ("ANALYSIS_MAX_CONCURRENT", self.analysis_max_concurrent),
            ("FILINGS_PER_COMPANY", self.filings_per_company),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(PipelineError::Configuration(format!("{} 必须大于 0", name)));
            }
        }
        if self.fetch_requests_per_second == 0 {
            return Err(PipelineError::Configuration(
                "FETCH_REQUESTS_PER_SECOND 必须大于 0".to_string(),
            ));
        }
        if self.retry_max_attempts == 0 {
            return Err(PipelineError::Configuration(
                "RETRY_MAX_ATTEMPTS 必须大于 0".to_string(),
            ));
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(PipelineError::Configuration(format!(
                "RETRY_MAX_DELAY_MS ({}) 不能小于 RETRY_BASE_DELAY_MS ({})",
                self.retry_max_delay_ms, self.retry_base_delay_ms
            )));
        }
        if self.edgar_user_agent.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "EDGAR_USER_AGENT 不能为空".to_string(),
            ));
        }
        if !matches!(self.analysis_backend.as_str(), "llm" | "lexicon") {
            return Err(PipelineError::Configuration(format!(
                "未知的 ANALYSIS_BACKEND: {}（可选 llm / lexicon）",
                self.analysis_backend
            )));
        }
        Ok(())
    }

    /// 申报文件源两次调用之间的最小间隔
    pub fn fetch_min_interval(&self) -> Option<Duration> {
        (self.fetch_requests_per_second > 0)
            .then(|| Duration::from_secs_f64(1.0 / f64::from(self.fetch_requests_per_second)))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            call_timeout: (self.call_timeout_secs > 0)
                .then(|| Duration::from_secs(self.call_timeout_secs)),
        }
    }

    /// 两个外部资源各自独立的限流器
    pub fn rate_limiters(&self) -> PipelineResult<RateLimiters> {
        let filing_source = RateLimiter::per_second(
            "filing-source",
            self.fetch_max_concurrent,
            self.fetch_requests_per_second,
        )?;
        let analysis_provider =
            RateLimiter::new("analysis-provider", self.analysis_max_concurrent, None)?;
        Ok(RateLimiters::new(filing_source, analysis_provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch_min_interval(), Some(Duration::from_millis(100)));

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.call_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let zero_in_flight = Config {
            max_in_flight: 0,
            ..Config::default()
        };
        assert!(matches!(
            zero_in_flight.validate(),
            Err(PipelineError::Configuration(_))
        ));

        let inverted_delays = Config {
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 10,
            ..Config::default()
        };
        assert!(inverted_delays.validate().is_err());

        let no_agent = Config {
            edgar_user_agent: "  ".to_string(),
            ..Config::default()
        };
        assert!(no_agent.validate().is_err());

        let unknown_backend = Config {
            analysis_backend: "oracle".to_string(),
            ..Config::default()
        };
        assert!(unknown_backend.validate().is_err());
    }

    #[test]
    fn test_rate_limiters_from_config() {
        let limiters = Config::default().rate_limiters().unwrap();
        assert_eq!(limiters.get(crate::infrastructure::Resource::FilingSource).max_concurrent(), 10);
        assert_eq!(limiters.get(crate::infrastructure::Resource::AnalysisProvider).max_concurrent(), 4);

        let broken = Config {
            analysis_max_concurrent: 0,
            ..Config::default()
        };
        assert!(broken.rate_limiters().is_err());
    }
}
