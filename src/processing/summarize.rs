//! Single-call "stuff" summarization.

use crate::{config::ChainConfig, document::Document, llm::ChatModel};

use super::{chunking::TokenCounter, prompts::summarize_template, types::SummarizeError};

/// Summarize every selected page in one model call.
///
/// The page texts are joined with blank lines and stuffed into the summarize prompt. The rendered
/// prompt is measured first; a prompt over `budget` tokens fails without calling the model. The
/// text returned by `model` is passed through unmodified. The HTTP adapters in [`crate::llm`]
/// already strip leading and trailing whitespace from the provider's reply.
pub async fn summarize(
    model: &dyn ChatModel,
    config: &ChainConfig,
    document: &Document,
    token_counter: &TokenCounter,
    budget: usize,
) -> Result<String, SummarizeError> {
    if !document.has_text() {
        return Err(SummarizeError::EmptyDocument);
    }

    let text = document.joined_text();
    let prompt = summarize_template().format(&[("document", text.as_str())])?;
    let tokens = token_counter.as_ref()(&prompt);
    if tokens > budget {
        return Err(SummarizeError::DocumentTooLong {
            tokens,
            limit: budget,
        });
    }

    tracing::debug!(tokens, budget, pages = document.pages.len(), "Summarizing document");
    Ok(model.complete(&prompt, config).await?)
}
