//! Scripted chat model shared by the pipeline unit tests.

use crate::config::{ChainConfig, Config};
use crate::llm::{ChatModel, ChatModelError};
use async_trait::async_trait;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&str) -> Result<String, ChatModelError> + Send + Sync>;

/// Records every prompt and answers through a closure.
pub(crate) struct ScriptedModel {
    responder: Responder,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub(crate) fn new(
        responder: impl Fn(&str) -> Result<String, ChatModelError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fixed(answer: &str) -> Self {
        let answer = answer.to_string();
        Self::new(move |_| Ok(answer.clone()))
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log").clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.prompts.lock().expect("prompt log").len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, prompt: &str, _config: &ChainConfig) -> Result<String, ChatModelError> {
        self.prompts
            .lock()
            .expect("prompt log")
            .push(prompt.to_string());
        (self.responder)(prompt)
    }
}

pub(crate) fn local_chain() -> ChainConfig {
    Config::default().chain_defaults()
}

pub(crate) fn is_reduce_prompt(prompt: &str) -> bool {
    prompt.starts_with("The following is a set of partial answers")
}
