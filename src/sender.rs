//! The `Sender` trait (component C5): consumes frames from its mailbox and
//! emits them to a downstream.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// One of the two egress destinations (§4.5). `run` returns once its
/// mailbox yields the end-of-stream sentinel (graceful) or `cancel` fires
/// (abortive); a transport failure specific to this sender ends only this
/// task, never its siblings.
#[async_trait]
pub trait Sender: Send {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), Error>;
}
