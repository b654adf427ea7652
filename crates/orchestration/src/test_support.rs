//! Stub generators shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use applet::{Generator, Prompt, ProviderError, RawGeneratorResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// A complete, valid document whose body is `marker`.
pub fn document(marker: &str) -> String {
    format!("<!DOCTYPE html>\n<html><body>{marker}</body></html>")
}

/// A generator response carrying `marker` in the description contract.
pub fn rewrite_output(marker: &str) -> RawGeneratorResponse {
    RawGeneratorResponse::complete(format!(
        "===DESCRIPTION===\n{marker} description\n===END_DESCRIPTION===\n{}",
        document(marker)
    ))
}

/// Replies with queued responses in order and records every prompt.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<RawGeneratorResponse, ProviderError>>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    pub fn with(replies: Vec<Result<RawGeneratorResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::default(),
        })
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn complete(&self, prompt: &Prompt) -> Result<RawGeneratorResponse, ProviderError> {
        self.prompts.lock().push(prompt.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or(Err(ProviderError::EmptyContent))
    }
}

/// Sleeps before answering.
pub struct SlowGenerator(pub Duration);

#[async_trait]
impl Generator for SlowGenerator {
    async fn complete(&self, _prompt: &Prompt) -> Result<RawGeneratorResponse, ProviderError> {
        tokio::time::sleep(self.0).await;
        Ok(rewrite_output("slow"))
    }
}

/// Parks every call until the test releases it by call index.
#[derive(Default)]
pub struct GatedGenerator {
    gates: Mutex<Vec<Option<oneshot::Sender<Result<RawGeneratorResponse, ProviderError>>>>>,
}

impl GatedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Waits until `count` calls have arrived.
    pub async fn wait_for_calls(&self, count: usize) {
        let arrived = async {
            while self.gates.lock().len() < count {
                tokio::task::yield_now().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), arrived)
            .await
            .expect("generator calls did not arrive");
    }

    /// Answers call `index`. Returns false when the caller is gone.
    pub fn release(&self, index: usize, reply: Result<RawGeneratorResponse, ProviderError>) -> bool {
        let sender = self.gates.lock().get_mut(index).and_then(Option::take);
        sender.map_or(false, |tx| tx.send(reply).is_ok())
    }
}

#[async_trait]
impl Generator for GatedGenerator {
    async fn complete(&self, _prompt: &Prompt) -> Result<RawGeneratorResponse, ProviderError> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push(Some(tx));
        rx.await.unwrap_or(Err(ProviderError::Transport {
            message: "gate dropped".into(),
        }))
    }
}
