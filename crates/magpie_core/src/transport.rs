//! Chat transport seam.
//!
//! The runtime only ever talks to the chat service through this trait, so
//! integrations (and tests) supply the session, delivery, and history
//! paging mechanics.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::ChatEvent;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Deliver one outbound message to a conversation.
    ///
    /// Failures surface as [`CoreError::Network`](crate::CoreError::Network)
    /// and abort only the send in progress.
    async fn send_message(&self, conversation_id: &str, body: &str) -> Result<()>;

    /// Fetch a page of historical events strictly older than `before`
    /// (the newest page when `before` is unset), in chronological order
    /// within the page.
    ///
    /// Transports may wrap around and repeat pages once the archive is
    /// exhausted; callers detect that through timestamp regression, not
    /// through an empty page.
    async fn fetch_history(
        &self,
        conversation_id: &str,
        before: Option<String>,
        limit: usize,
    ) -> Result<Vec<ChatEvent>>;

    /// Tear down the connection.
    async fn disconnect(&self) -> Result<()>;
}
