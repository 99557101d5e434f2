//! The `Receiver` trait (component C3): a long-running, cancellable task
//! that drives raw observations into the fan-out.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// One of the four observation sources (§4.3). Every suspension point
/// (network read, mailbox send, worker-thread call) must also observe
/// `cancel`, so an abortive shutdown never leaves a blocking call running
/// indefinitely.
#[async_trait]
pub trait Receiver: Send {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), Error>;
}
