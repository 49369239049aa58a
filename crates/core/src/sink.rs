//! TokenSink: where streamed tokens go.
//!
//! The orchestrator awaits each `on_token` call before reading the next
//! token from the provider, so a sink sees tokens strictly in emission order
//! with at most one delivery in flight. Returning an error aborts generation.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SinkError;

#[async_trait]
pub trait TokenSink: Send + Sync {
    /// Deliver one token.
    async fn on_token(&self, token: &str) -> std::result::Result<(), SinkError>;
}

#[async_trait]
impl TokenSink for mpsc::Sender<String> {
    async fn on_token(&self, token: &str) -> std::result::Result<(), SinkError> {
        self.send(token.to_string())
            .await
            .map_err(|_| SinkError::Closed)
    }
}

#[async_trait]
impl TokenSink for mpsc::UnboundedSender<String> {
    async fn on_token(&self, token: &str) -> std::result::Result<(), SinkError> {
        self.send(token.to_string()).map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel::<String>(4);
        tx.on_token("He").await.unwrap();
        tx.on_token("llo").await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await.as_deref(), Some("He"));
        assert_eq!(rx.recv().await.as_deref(), Some("llo"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_receiver_reports_closed() {
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(rx);
        let err = tx.on_token("lost").await.unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }

    #[tokio::test]
    async fn unbounded_sink_reports_closed() {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        tx.on_token("ok").await.unwrap();
        drop(rx);
        assert!(matches!(tx.on_token("late").await, Err(SinkError::Closed)));
    }
}
