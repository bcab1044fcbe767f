//! Token counting and chunk-size heuristics for the map stage.
//!
//! - Automatic sizing: half of the model's context window, clamped to a conservative range, so a
//!   chunk plus the map prompt and the model's answer fit one call. `CHUNK_SIZE` overrides it.
//! - Pages that fit the chunk size stay whole; longer pages are split with `semchunk-rs`.
//! - Token counting prefers `tiktoken-rs`; local Ollama models whose tokenizer is unknown fall
//!   back to a whitespace counter.

use crate::{config::ModelProvider, document::Page};
use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, model::get_context_size, o200k_base, p50k_base,
    p50k_edit, r50k_base,
};

use super::types::{Chunk, ChunkingError};

/// Shared token-counting function.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

const MIN_AUTOMATIC_CHUNK_SIZE: usize = 512;
const MAX_AUTOMATIC_CHUNK_SIZE: usize = 8192;

/// Determine the map chunk size, respecting an explicit override.
pub fn determine_chunk_size(
    override_size: Option<usize>,
    provider: ModelProvider,
    model: &str,
) -> usize {
    if let Some(explicit) = override_size {
        return explicit.max(1);
    }

    let window = model_context_window(provider, model);
    (window / 2).clamp(MIN_AUTOMATIC_CHUNK_SIZE, MAX_AUTOMATIC_CHUNK_SIZE)
}

/// Look up the context window for a provider/model combination.
pub fn model_context_window(provider: ModelProvider, model: &str) -> usize {
    match provider {
        ModelProvider::OpenAI => get_context_size(model),
        ModelProvider::Ollama => ollama_context_window(model),
    }
}

fn ollama_context_window(model: &str) -> usize {
    let normalized = model.to_lowercase();
    let family = normalized.split(':').next().unwrap_or_default();
    match family {
        value if value.starts_with("llama3") => 8192,
        value if value.starts_with("mistral") || value.starts_with("mixtral") => 32768,
        value if value.starts_with("qwen2") => 32768,
        value if value.starts_with("gemma") => 8192,
        value if value.starts_with("phi3") => 4096,
        _ => {
            tracing::trace!(model, "Using default Ollama context window estimate");
            4096
        }
    }
}

/// Split pages into chunks no longer than `chunk_size` tokens.
///
/// Empty pages produce no chunks. Chunks keep the index of the page they came from and appear in
/// page order.
pub fn chunk_pages(
    pages: &[Page],
    chunk_size: usize,
    token_counter: &TokenCounter,
) -> Result<Vec<Chunk>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let counter_for_chunker = token_counter.clone();
    let chunker = Chunker::new(
        chunk_size,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );

    let mut chunks = Vec::new();
    for page in pages {
        if page.text.trim().is_empty() {
            continue;
        }
        if token_counter.as_ref()(&page.text) <= chunk_size {
            chunks.push(Chunk {
                page: page.index,
                text: page.text.clone(),
            });
            continue;
        }
        let pieces = chunker.chunk(&page.text);
        tracing::debug!(page = page.index, pieces = pieces.len(), "Split oversized page");
        chunks.extend(pieces.into_iter().map(|text| Chunk {
            page: page.index,
            text,
        }));
    }
    Ok(chunks)
}

/// Build a token counter for the given provider/model.
///
/// Ollama models frequently use names tiktoken does not know; those fall back to whitespace
/// counting with a warning.
pub fn build_token_counter(
    provider: ModelProvider,
    model: &str,
) -> Result<TokenCounter, ChunkingError> {
    match provider {
        ModelProvider::OpenAI => build_tiktoken_counter(model),
        ModelProvider::Ollama => match build_tiktoken_counter(model) {
            Ok(counter) => Ok(counter),
            Err(error) => {
                tracing::warn!(
                    model,
                    error = %error,
                    "Tokenizer unavailable for Ollama model; falling back to whitespace counter"
                );
                Ok(whitespace_token_counter())
            }
        },
    }
}

fn build_tiktoken_counter(model: &str) -> Result<TokenCounter, ChunkingError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };
    let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
        model: target.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);

    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            if let Some(candidate) = encoding_from_name(model) {
                candidate
            } else {
                tracing::debug!(model, "Falling back to 'cl100k_base' encoding for token counting");
                cl100k_base()
            }
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

/// Count whitespace-separated words; non-empty text is at least one token.
pub fn whitespace_token_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(index: usize, text: &str) -> Page {
        Page {
            index,
            text: text.into(),
        }
    }

    #[test]
    fn short_pages_stay_whole() {
        let pages = vec![page(0, "alpha beta"), page(1, "gamma")];
        let chunks = chunk_pages(&pages, 4, &whitespace_token_counter()).expect("chunks");
        assert_eq!(
            chunks,
            vec![
                Chunk {
                    page: 0,
                    text: "alpha beta".into()
                },
                Chunk {
                    page: 1,
                    text: "gamma".into()
                },
            ]
        );
    }

    #[test]
    fn oversized_page_is_split_within_budget() {
        let pages = vec![page(3, "one two three four five")];
        let counter = whitespace_token_counter();
        let chunks = chunk_pages(&pages, 2, &counter).expect("chunks");
        assert_eq!(
            chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["one two", "three four", "five"]
        );
        assert!(chunks.iter().all(|chunk| chunk.page == 3));
        assert!(chunks.iter().all(|chunk| counter.as_ref()(&chunk.text) <= 2));
    }

    #[test]
    fn empty_pages_are_skipped() {
        let pages = vec![page(0, ""), page(1, "   "), page(2, "text")];
        let chunks = chunk_pages(&pages, 8, &whitespace_token_counter()).expect("chunks");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 2);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let error = chunk_pages(&[page(0, "x")], 0, &whitespace_token_counter()).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn tiktoken_counter_matches_known_model() {
        let counter = build_token_counter(ModelProvider::OpenAI, "gpt-4").expect("counter");
        let tokens = counter.as_ref()("The quick brown fox jumps over the lazy dog.");
        assert!(tokens > 0 && tokens < 20);
    }

    #[test]
    fn determine_chunk_size_prefers_override() {
        assert_eq!(determine_chunk_size(Some(42), ModelProvider::OpenAI, "gpt-4"), 42);
        assert_eq!(determine_chunk_size(Some(0), ModelProvider::OpenAI, "gpt-4"), 1);
    }

    #[test]
    fn determine_chunk_size_uses_half_the_window() {
        assert_eq!(determine_chunk_size(None, ModelProvider::OpenAI, "gpt-4"), 4096);
        assert_eq!(determine_chunk_size(None, ModelProvider::Ollama, "llama3:8b"), 4096);
        assert_eq!(determine_chunk_size(None, ModelProvider::Ollama, "mistral"), 8192);
        assert_eq!(determine_chunk_size(None, ModelProvider::Ollama, "custom"), 2048);
    }
}
