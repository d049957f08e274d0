//! Summarization backend trait for completed transcripts.

use async_trait::async_trait;
use vox_core::Result;

/// System prompt for structured summaries.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert content analyst and summarizer with these capabilities:\n\
- Extracting key points while maintaining context\n\
- Identifying main themes and core messages\n\
- Preserving critical details while reducing length\n\
- Maintaining the original tone and intent\n\
- Organizing information hierarchically\n\n\
Format your summaries with:\n\
1. A one-sentence overview\n\
2. 2-3 key takeaways\n\
3. Important details or quotes (if any)";

/// System prompt for key topic extraction.
pub const KEY_TOPICS_SYSTEM_PROMPT: &str = "You are an expert at extracting key topics and themes from content. \
Analyze the provided transcription and extract:\n\
- Main topics discussed\n\
- Key themes and concepts\n\
- Important keywords and phrases\n\
Format as a bulleted list with categories.";

pub fn summary_prompt(transcript: &str) -> String {
    format!(
        "Create a structured summary of this transcription. Focus on the core message and key \
         points while maintaining context and critical details.\n\nTranscription:\n{}",
        transcript
    )
}

pub fn key_topics_prompt(transcript: &str) -> String {
    format!(
        "Extract key topics and themes from this transcription:\n\n{}",
        transcript
    )
}

/// Backend for summarizing transcripts.
#[async_trait]
pub trait SummarizationBackend: Send + Sync {
    /// Produce a structured summary of a transcript.
    async fn summarize(&self, transcript: &str) -> Result<String>;

    /// Produce a bulleted list of key topics.
    async fn extract_key_topics(&self, transcript: &str) -> Result<String>;

    /// Check if the summarization backend is reachable.
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
