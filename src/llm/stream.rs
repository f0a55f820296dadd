use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::providers::base::LlmProviderError;

const DEFAULT_BUFFER: usize = 16;

type Chunk = Result<String, LlmProviderError>;

/// Producer half of a [`TextStream`].
#[derive(Clone)]
pub struct TextSender {
    tx: mpsc::Sender<Chunk>,
}

impl TextSender {
    /// Returns false once the consumer has dropped the stream; producers stop pulling
    /// provider output at that point.
    pub async fn send(&self, chunk: impl Into<String>) -> bool {
        self.tx.send(Ok(chunk.into())).await.is_ok()
    }

    pub async fn fail(&self, error: LlmProviderError) {
        let _ = self.tx.send(Err(error)).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Channel-backed stream of generated text. Dropping it closes the channel, which the
/// producer observes on its next send.
pub struct TextStream {
    rx: mpsc::Receiver<Chunk>,
}

impl TextStream {
    pub fn channel() -> (TextSender, TextStream) {
        Self::with_buffer(DEFAULT_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> (TextSender, TextStream) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (TextSender { tx }, TextStream { rx })
    }

    /// Single-chunk stream for providers without native streaming.
    pub fn from_text(text: String) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(Ok(text));
        Self { rx }
    }

    pub async fn next_chunk(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }

    /// Reads until the producer finishes or `max_chars` characters were collected, then
    /// drops the stream.
    pub async fn collect_bounded(mut self, max_chars: usize) -> Result<String, LlmProviderError> {
        let mut text = String::new();
        let mut count = 0usize;

        while let Some(chunk) = self.rx.recv().await {
            let chunk = chunk?;
            count += chunk.chars().count();
            text.push_str(&chunk);
            if count >= max_chars {
                text = crate::safe_truncate(&text, max_chars);
                break;
            }
        }

        Ok(text)
    }
}

impl Stream for TextStream {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
