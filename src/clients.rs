mod llm;

pub use llm::{LlmClient, LlmError, OpenAiClient};
