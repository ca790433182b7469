pub mod openai;

use async_trait::async_trait;
use futures::{ Stream, Future };
use std::pin::Pin;
use std::sync::Arc;
use super::{ ImageMime, LlmConfig, LlmError };
use self::openai::OpenAIChatClient;
use crate::models::chat::ChatMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Lazy, finite, non-restartable sequence of text deltas. An `Err` item is
/// always the last one.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn stream_chat(&self, history: &[ChatMessage]) -> Result<FragmentStream, LlmError>;

    async fn analyze_image(
        &self,
        image: &[u8],
        mime: ImageMime,
        instruction: &str
    ) -> Result<String, LlmError>;

    fn get_model(&self) -> String;
    fn get_vision_model(&self) -> String;
}

/// Runs `response_fn` on its own task and exposes whatever it sends as a stream.
pub fn create_streaming_response<F, Fut>(response_fn: F) -> FragmentStream
    where
        F: FnOnce(mpsc::Sender<Result<String, LlmError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
