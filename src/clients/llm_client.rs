/// LLM API 客户端
///
/// 封装所有与 LLM API 相关的调用逻辑，兼容 OpenAI 接口的服务均可使用
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AnalysisErrorKind;

/// LLM 调用错误（由分析服务转换为带维度的 `PipelineError::Analysis`）
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct LlmError {
    pub kind: AnalysisErrorKind,
    pub message: String,
}

impl LlmError {
    fn new(kind: AnalysisErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<OpenAIError> for LlmError {
    fn from(err: OpenAIError) -> Self {
        let kind = classify_openai_error(&err);
        LlmError::new(kind, err.to_string())
    }
}

/// 按错误内容判断是否为永久拒绝/限流
fn classify_openai_error(err: &OpenAIError) -> AnalysisErrorKind {
    match err {
        OpenAIError::InvalidArgument(_) => AnalysisErrorKind::PermanentRejection,
        OpenAIError::ApiError(api) => {
            let detail = format!("{:?}", api).to_ascii_lowercase();
            if detail.contains("rate_limit") || detail.contains("rate limit") {
                AnalysisErrorKind::RateLimited
            } else if detail.contains("invalid_request_error")
                || detail.contains("context_length_exceeded")
                || detail.contains("content_filter")
            {
                AnalysisErrorKind::PermanentRejection
            } else {
                AnalysisErrorKind::Transport
            }
        }
        _ => AnalysisErrorKind::Transport,
    }
}

/// LLM 客户端
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        Self::with_model(config, config.llm_model_name.clone())
    }

    /// 创建自定义模型的 LLM 客户端
    pub fn with_model(config: &Config, model_name: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: model_name.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 发送聊天请求
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    pub async fn chat(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(16u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::from(e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::new(AnalysisErrorKind::InvalidResponse, "LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}
