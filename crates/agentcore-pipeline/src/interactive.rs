//! `WaitForInput`: reads a line of text from the operator, used
//! inside `Loop` for steps that need a human reply mid-pipeline. Uses the
//! same stdin/stdout pair as interactive permission prompts.

use crate::step::Step;
use agentcore_types::Error;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait InteractiveInput: Send + Sync {
    async fn read_line(&self, prompt: &str) -> Result<String, Error>;
}

/// Prompts on stdout and reads one line from stdin.
pub struct StdinInteractiveInput;

#[async_trait]
impl InteractiveInput for StdinInteractiveInput {
    async fn read_line(&self, prompt: &str) -> Result<String, Error> {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        stdout.flush().await.map_err(|e| Error::Internal(e.to_string()))?;

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

pub struct WaitForInput {
    prompt: String,
    io: Arc<dyn InteractiveInput>,
}

impl WaitForInput {
    pub fn new(prompt: impl Into<String>, io: Arc<dyn InteractiveInput>) -> Self {
        Self { prompt: prompt.into(), io }
    }
}

#[async_trait]
impl<I> Step<I, String> for WaitForInput
where
    I: Send + 'static,
{
    async fn run(&self, _input: I) -> Result<String, Error> {
        self.io.read_line(&self.prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Vec<String>, std::sync::Mutex<usize>);

    #[async_trait]
    impl InteractiveInput for Scripted {
        async fn read_line(&self, _prompt: &str) -> Result<String, Error> {
            let mut i = self.1.lock().unwrap();
            let line = self.0[*i].clone();
            *i += 1;
            Ok(line)
        }
    }

    #[tokio::test]
    async fn reads_the_next_scripted_line() {
        let io = Arc::new(Scripted(vec!["yes".into(), "no".into()], std::sync::Mutex::new(0)));
        let step = WaitForInput::new("continue? ", io);
        let first: String = step.run(()).await.unwrap();
        let second: String = step.run(()).await.unwrap();
        assert_eq!(first, "yes");
        assert_eq!(second, "no");
    }
}
