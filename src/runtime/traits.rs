//! Trait abstractions for runtime I/O
//!
//! The state store lives in `bot_data`; this holds the outbound side.

use crate::message::Message;
use async_trait::async_trait;
use std::sync::Arc;

/// Delivery of outbound messages to the channel
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), String>;
}

#[async_trait]
impl<T: MessageSink + ?Sized> MessageSink for Arc<T> {
    async fn send(&self, message: &Message) -> Result<(), String> {
        (**self).send(message).await
    }
}
