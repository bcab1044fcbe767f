//! Map-reduce question answering over document chunks.
//!
//! The map stage asks the model, once per chunk, for the information relevant to the query. The
//! reduce stage distills the partial answers into one. When the rendered reduce prompt would
//! exceed the token budget, partial answers are grouped greedily and each group is collapsed with
//! the same reduce prompt until everything fits one final call.

use crate::{config::ChainConfig, llm::ChatModel};
use futures_util::{
    FutureExt, StreamExt, TryStreamExt,
    future::BoxFuture,
    stream,
};

use super::{
    chunking::TokenCounter,
    prompts::{PromptTemplate, map_template, reduce_template},
    types::{Chunk, QueryError},
};

const DOCUMENT_SEPARATOR: &str = "\n\n";
const MAX_COLLAPSE_PASSES: usize = 10;

/// Runs the map and reduce stages against one chat model and chain configuration.
pub struct MapReduceEngine<'a> {
    model: &'a dyn ChatModel,
    config: &'a ChainConfig,
    token_counter: TokenCounter,
    token_max: usize,
    concurrency: usize,
}

impl<'a> MapReduceEngine<'a> {
    /// Build an engine that runs map calls one at a time.
    pub fn new(
        model: &'a dyn ChatModel,
        config: &'a ChainConfig,
        token_counter: TokenCounter,
        token_max: usize,
    ) -> Self {
        Self {
            model,
            config,
            token_counter,
            token_max,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` map calls in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Answer `user_query` from `chunks`.
    pub async fn query(&self, chunks: &[Chunk], user_query: &str) -> Result<String, QueryError> {
        if chunks.is_empty() {
            return Err(QueryError::EmptyDocument);
        }

        let map_prompt = map_template(user_query);
        let reduce_prompt = reduce_template(user_query);

        let partials = self.map(chunks, &map_prompt).await?;
        tracing::debug!(partials = partials.len(), "Map stage complete");

        let partials = self.collapse(partials, &reduce_prompt).await?;
        self.combine(&partials, &reduce_prompt).await
    }

    async fn map(
        &self,
        chunks: &[Chunk],
        template: &PromptTemplate,
    ) -> Result<Vec<String>, QueryError> {
        let calls: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(position, chunk)| self.map_one(position, chunk, template))
            .collect();
        stream::iter(calls)
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    fn map_one<'s>(
        &'s self,
        position: usize,
        chunk: &'s Chunk,
        template: &'s PromptTemplate,
    ) -> BoxFuture<'s, Result<String, QueryError>> {
        async move {
            let prompt = template
                .format(&[("docs", chunk.text.as_str())])
                .map_err(QueryError::from)?;
            self.model
                .complete(&prompt, self.config)
                .await
                .map_err(|source| QueryError::Map {
                    chunk: position,
                    page: chunk.page,
                    source,
                })
        }
        .boxed()
    }

    /// Collapse partial answers until their reduce prompt fits the budget.
    async fn collapse(
        &self,
        mut partials: Vec<String>,
        template: &PromptTemplate,
    ) -> Result<Vec<String>, QueryError> {
        let mut passes = 0;
        loop {
            let tokens = self.prompt_tokens(&partials, template)?;
            if tokens <= self.token_max {
                return Ok(partials);
            }
            if passes == MAX_COLLAPSE_PASSES {
                return Err(QueryError::CollapseLimit { passes });
            }
            passes += 1;

            let count = partials.len();
            let groups = self.split_into_groups(partials, template)?;
            if groups.len() == count {
                // No two partial answers fit one prompt, so another pass cannot shrink the set.
                return Err(QueryError::ContextOverflow {
                    tokens,
                    token_max: self.token_max,
                });
            }
            tracing::debug!(
                pass = passes,
                tokens,
                token_max = self.token_max,
                groups = groups.len(),
                "Collapsing partial answers"
            );

            let mut collapsed = Vec::with_capacity(groups.len());
            for group in &groups {
                collapsed.push(self.combine(group, template).await?);
            }
            partials = collapsed;
        }
    }

    /// Greedily pack partial answers into groups whose reduce prompt fits the budget.
    fn split_into_groups(
        &self,
        partials: Vec<String>,
        template: &PromptTemplate,
    ) -> Result<Vec<Vec<String>>, QueryError> {
        let mut groups = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for partial in partials {
            current.push(partial);
            let tokens = self.prompt_tokens(&current, template)?;
            if tokens <= self.token_max {
                continue;
            }
            if current.len() == 1 {
                return Err(QueryError::ContextOverflow {
                    tokens,
                    token_max: self.token_max,
                });
            }
            if let Some(overflow) = current.pop() {
                groups.push(std::mem::take(&mut current));
                current.push(overflow);
                let tokens = self.prompt_tokens(&current, template)?;
                if tokens > self.token_max {
                    return Err(QueryError::ContextOverflow {
                        tokens,
                        token_max: self.token_max,
                    });
                }
            }
        }

        if !current.is_empty() {
            groups.push(current);
        }
        Ok(groups)
    }

    async fn combine(
        &self,
        partials: &[String],
        template: &PromptTemplate,
    ) -> Result<String, QueryError> {
        let prompt = render(partials, template)?;
        self.model
            .complete(&prompt, self.config)
            .await
            .map_err(|source| QueryError::Reduce { source })
    }

    fn prompt_tokens(
        &self,
        partials: &[String],
        template: &PromptTemplate,
    ) -> Result<usize, QueryError> {
        let prompt = render(partials, template)?;
        Ok(self.token_counter.as_ref()(&prompt))
    }
}

fn render(partials: &[String], template: &PromptTemplate) -> Result<String, QueryError> {
    let joined = partials.join(DOCUMENT_SEPARATOR);
    Ok(template.format(&[("docs", joined.as_str())])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatModelError;
    use crate::processing::chunking::whitespace_token_counter;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use crate::processing::test_support::{ScriptedModel, is_reduce_prompt, local_chain};

    const QUERY: &str = "What data is used?";

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(page, text)| Chunk {
                page,
                text: text.to_string(),
            })
            .collect()
    }

    fn words(count: usize) -> String {
        vec!["word"; count].join(" ")
    }

    fn reduce_tokens(partials: &[String]) -> usize {
        let prompt = render(partials, &reduce_template(QUERY)).expect("render");
        whitespace_token_counter().as_ref()(&prompt)
    }

    #[tokio::test]
    async fn under_budget_runs_one_map_per_chunk_and_one_reduce() {
        let model = ScriptedModel::new(|prompt| {
            Ok(if is_reduce_prompt(prompt) {
                "final answer".into()
            } else {
                "snippet".into()
            })
        });
        let chain = local_chain();
        let engine = MapReduceEngine::new(&model, &chain, whitespace_token_counter(), 4000)
            .with_concurrency(2);

        let answer = engine
            .query(&chunks(&["page one", "page two", "page three"]), QUERY)
            .await
            .expect("answer");

        assert_eq!(answer, "final answer");
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 4);
        assert_eq!(prompts.iter().filter(|p| is_reduce_prompt(p)).count(), 1);
        let reduce = prompts.iter().find(|p| is_reduce_prompt(p)).expect("reduce");
        assert!(reduce.contains("snippet\n\nsnippet\n\nsnippet"));
        assert!(reduce.contains(QUERY));
    }

    #[tokio::test]
    async fn map_prompts_carry_chunk_text_and_query() {
        let model = ScriptedModel::fixed("not relevant");
        let chain = local_chain();
        let engine = MapReduceEngine::new(&model, &chain, whitespace_token_counter(), 4000);

        engine
            .query(&chunks(&["the dataset is census 2020"]), QUERY)
            .await
            .expect("answer");

        let prompts = model.prompts();
        assert!(prompts[0].starts_with("The following is a set of documents:"));
        assert!(prompts[0].contains("the dataset is census 2020"));
        assert!(prompts[0].contains(QUERY));
    }

    #[tokio::test]
    async fn over_budget_partials_are_collapsed_before_final_reduce() {
        let partial = words(20);
        let three = vec![partial.clone(), partial.clone(), partial.clone()];
        let four = vec![partial.clone(); 4];
        let budget = reduce_tokens(&three);
        assert!(reduce_tokens(&four) > budget);

        let map_answer = partial.clone();
        let model = ScriptedModel::new(move |prompt| {
            Ok(if is_reduce_prompt(prompt) {
                "collapsed".into()
            } else {
                map_answer.clone()
            })
        });
        let chain = local_chain();
        let engine = MapReduceEngine::new(&model, &chain, whitespace_token_counter(), budget);

        let answer = engine
            .query(&chunks(&["a", "b", "c", "d"]), QUERY)
            .await
            .expect("answer");
        assert_eq!(answer, "collapsed");

        let prompts = model.prompts();
        let reduce_calls: Vec<&String> = prompts.iter().filter(|p| is_reduce_prompt(p)).collect();
        // 4 map calls, 2 collapse groups ([3], [1]), 1 final reduce.
        assert_eq!(prompts.len(), 7);
        assert_eq!(reduce_calls.len(), 3);
        let last = reduce_calls.last().expect("final reduce");
        assert!(last.contains("collapsed\n\ncollapsed"));
        for prompt in reduce_calls {
            assert!(whitespace_token_counter().as_ref()(prompt) <= budget);
        }
    }

    #[tokio::test]
    async fn single_partial_over_budget_is_context_overflow() {
        let long = words(200);
        let model = ScriptedModel::new(move |_| Ok(long.clone()));
        let chain = local_chain();
        let engine = MapReduceEngine::new(&model, &chain, whitespace_token_counter(), 50);

        let error = engine
            .query(&chunks(&["a", "b"]), QUERY)
            .await
            .expect_err("overflow");
        assert!(matches!(error, QueryError::ContextOverflow { token_max: 50, .. }));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn collapse_that_cannot_merge_fails_fast() {
        let partial = words(30);
        let budget = reduce_tokens(std::slice::from_ref(&partial)) + 5;
        assert!(reduce_tokens(&[partial.clone(), partial.clone()]) > budget);

        let model = ScriptedModel::new(move |_| Ok(partial.clone()));
        let chain = local_chain();
        let engine = MapReduceEngine::new(&model, &chain, whitespace_token_counter(), budget);

        let error = engine
            .query(&chunks(&["a", "b"]), QUERY)
            .await
            .expect_err("overflow");
        assert!(matches!(error, QueryError::ContextOverflow { .. }));
        assert_eq!(model.call_count(), 2);
    }

    /// Answers the first chunk slowly so later map calls finish first.
    struct SlowFirstChunk {
        reduce_prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for SlowFirstChunk {
        async fn complete(
            &self,
            prompt: &str,
            _config: &ChainConfig,
        ) -> Result<String, ChatModelError> {
            if is_reduce_prompt(prompt) {
                self.reduce_prompts
                    .lock()
                    .expect("reduce log")
                    .push(prompt.to_string());
                return Ok("done".into());
            }
            if prompt.contains("opening page") {
                tokio::time::sleep(Duration::from_millis(50)).await;
                return Ok("answer from opening".into());
            }
            Ok("answer from closing".into())
        }
    }

    #[tokio::test]
    async fn concurrent_map_keeps_chunk_order() {
        let model = SlowFirstChunk {
            reduce_prompts: Mutex::new(Vec::new()),
        };
        let chain = local_chain();
        let engine = MapReduceEngine::new(&model, &chain, whitespace_token_counter(), 4000)
            .with_concurrency(4);

        let answer = engine
            .query(&chunks(&["opening page", "closing page"]), QUERY)
            .await
            .expect("answer");
        assert_eq!(answer, "done");

        let reduce = model.reduce_prompts.lock().expect("reduce log").clone();
        assert_eq!(reduce.len(), 1);
        assert!(reduce[0].contains("answer from opening\n\nanswer from closing"));
    }

    #[test]
    fn query_future_is_send() {
        fn assert_send<T: Send>(_: T) {}

        let model = ScriptedModel::fixed("unused");
        let chain = local_chain();
        let engine = MapReduceEngine::new(&model, &chain, whitespace_token_counter(), 4000)
            .with_concurrency(2);
        let pages = chunks(&["page"]);
        assert_send(engine.query(&pages, QUERY));
    }

    #[tokio::test]
    async fn map_failure_surfaces_chunk_and_skips_reduce() {
        let model = ScriptedModel::new(|prompt| {
            if prompt.contains("broken page") {
                Err(ChatModelError::RequestFailed {
                    status: 503,
                    body: "overloaded".into(),
                })
            } else {
                Ok("snippet".into())
            }
        });
        let chain = local_chain();
        let engine = MapReduceEngine::new(&model, &chain, whitespace_token_counter(), 4000);

        let error = engine
            .query(&chunks(&["fine page", "broken page"]), QUERY)
            .await
            .expect_err("map failure");

        match error {
            QueryError::Map {
                chunk,
                page,
                source: ChatModelError::RequestFailed { status, .. },
            } => {
                assert_eq!(chunk, 1);
                assert_eq!(page, 1);
                assert_eq!(status, 503);
            }
            other => panic!("expected map failure, got {other:?}"),
        }
        assert!(model.prompts().iter().all(|p| !is_reduce_prompt(p)));
    }

    #[tokio::test]
    async fn reduce_failure_is_reported() {
        let model = ScriptedModel::new(|prompt| {
            if is_reduce_prompt(prompt) {
                Err(ChatModelError::InvalidResponse("no choices".into()))
            } else {
                Ok("snippet".into())
            }
        });
        let chain = local_chain();
        let engine = MapReduceEngine::new(&model, &chain, whitespace_token_counter(), 4000);

        let error = engine
            .query(&chunks(&["page"]), QUERY)
            .await
            .expect_err("reduce failure");
        assert!(matches!(
            error,
            QueryError::Reduce {
                source: ChatModelError::InvalidResponse(_)
            }
        ));
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_calls() {
        let model = ScriptedModel::fixed("unused");
        let chain = local_chain();
        let engine = MapReduceEngine::new(&model, &chain, whitespace_token_counter(), 4000);

        let error = engine.query(&[], QUERY).await.expect_err("empty");
        assert!(matches!(error, QueryError::EmptyDocument));
        assert_eq!(model.call_count(), 0);
    }
}
