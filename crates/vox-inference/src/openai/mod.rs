//! OpenAI-compatible backends.
//!
//! Works with any endpoint speaking the OpenAI chat completions API,
//! including the OpenAI cloud, vLLM, LocalAI and Ollama in compatibility
//! mode.
//!
//! # Example
//!
//! ```rust,no_run
//! use vox_inference::openai::{OpenAIConfig, OpenAISummarizer};
//! use vox_inference::SummarizationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         api_key: None,
//!         gen_model: "llama3".to_string(),
//!         timeout_seconds: 120,
//!     };
//!     let summarizer = OpenAISummarizer::new(config).unwrap();
//!     let summary = summarizer.summarize("transcript text").await.unwrap();
//!     println!("{}", summary);
//! }
//! ```

mod error;
mod summarizer;
mod types;

pub use error::{error_from_response, to_vox_error, OpenAIErrorCode};
pub use summarizer::{OpenAIConfig, OpenAISummarizer, DEFAULT_OPENAI_URL};
pub use types::*;
