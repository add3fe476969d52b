//! The CLI's default step pipeline: one `Step<TurnInput, String>` that
//! folds steering and the new prompt into a running `Transcript`, compacts
//! it through the Context Manager when it grows too large, and generates a
//! reply from the configured `LanguageModelSession`.

use agentcore_context::ContextManager;
use agentcore_orchestrator::TurnInput;
use agentcore_pipeline::{GenerationOptions, LanguageModelSession, Prompt, Step};
use agentcore_types::{Error, Transcript, TranscriptEntry};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub struct ConversationStep {
    session: Arc<dyn LanguageModelSession<String>>,
    transcript: Mutex<Transcript>,
    context_manager: Arc<ContextManager>,
    instructions: String,
}

impl ConversationStep {
    pub fn new(
        session: Arc<dyn LanguageModelSession<String>>,
        context_manager: Arc<ContextManager>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            session,
            transcript: Mutex::new(Transcript::new()),
            context_manager,
            instructions: instructions.into(),
        }
    }
}

#[async_trait]
impl Step<TurnInput, String> for ConversationStep {
    async fn run(&self, input: TurnInput) -> Result<String, Error> {
        let prompt_text = {
            let mut transcript = self.transcript.lock().await;
            if transcript.is_empty() {
                transcript.set_instructions(self.instructions.clone());
            }
            if let Some(context) = &input.context {
                for steering in &context.steering {
                    transcript.push(TranscriptEntry::Prompt { text: format!("[steering] {steering}") });
                }
            }
            transcript.push(TranscriptEntry::Prompt { text: input.text.clone() });

            if let Err(e) = self
                .context_manager
                .compact_if_needed(&mut transcript, input.session_id.clone())
                .await
            {
                warn!(error = %e, session = %input.session_id, "compaction failed; continuing uncompacted");
            }

            transcript.entries().iter().map(|e| e.text().to_string()).collect::<Vec<_>>().join("\n")
        };

        let response = self
            .session
            .respond(&GenerationOptions::default(), &Prompt::new(prompt_text))
            .await?
            .content;

        self.transcript.lock().await.push(TranscriptEntry::Response { text: response.clone() });
        Ok(response)
    }
}
