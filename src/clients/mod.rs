pub mod edgar_client;
pub mod llm_client;

pub use edgar_client::EdgarClient;
pub use llm_client::{LlmClient, LlmError};
