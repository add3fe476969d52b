//! A scripted, in-process stand-in for a real model session, used so the
//! CLI is runnable without any external provider credentials. It implements
//! the same `LanguageModelSession` seam a real adapter would: vendor-agnostic
//! request in, streamed deltas out.

use agentcore_pipeline::{GenerationOptions, LanguageModelSession, Prompt, Response, Snapshot};
use agentcore_types::ModelError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;

pub struct EchoSession;

impl EchoSession {
    fn reply(prompt: &Prompt) -> String {
        let last_line = prompt.text.lines().last().unwrap_or_default();
        format!("you said: {last_line}")
    }
}

#[async_trait]
impl LanguageModelSession<String> for EchoSession {
    async fn respond(
        &self,
        _options: &GenerationOptions,
        prompt: &Prompt,
    ) -> Result<Response<String>, ModelError> {
        Ok(Response { content: Self::reply(prompt) })
    }

    async fn stream_response(
        &self,
        _options: &GenerationOptions,
        prompt: &Prompt,
    ) -> Result<BoxStream<'static, Result<Snapshot<String>, ModelError>>, ModelError> {
        let full = Self::reply(prompt);
        let words: Vec<String> = full.split(' ').map(String::from).collect();
        let total = words.len();
        let stream = stream::iter(words.into_iter().enumerate().map(move |(i, word)| {
            Ok(Snapshot { content: word, is_complete: i + 1 == total })
        }));
        Ok(stream.boxed())
    }
}
