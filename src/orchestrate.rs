//! Top-level orchestration: joins one receiver task and N sender tasks, and
//! propagates cancellation to all of them (§5).

use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::receiver::Receiver;
use crate::sender::Sender;

/// Runs `receiver` and every sender in `senders` concurrently until either
/// the receiver reaches end-of-stream/error, every sender does, or `cancel`
/// fires. Returns the first error encountered, if any; a sender's failure
/// does not stop the receiver or its siblings, matching the isolation rule
/// in §7.
pub async fn connect(
    mut receiver: Box<dyn Receiver>,
    senders: Vec<Box<dyn Sender>>,
    cancel: CancellationToken,
) -> Result<(), Error> {
    let receiver_cancel = cancel.clone();
    let receiver_task = tokio::spawn(async move { receiver.run(receiver_cancel).await });

    let mut sender_tasks = Vec::with_capacity(senders.len());
    for mut sender in senders {
        let sender_cancel = cancel.clone();
        sender_tasks.push(tokio::spawn(async move {
            if let Err(e) = sender.run(sender_cancel).await {
                log::error!("sender task ended with error: {e}");
            }
        }));
    }

    let receiver_result = match receiver_task.await {
        Ok(result) => result,
        Err(join_err) => {
            log::error!("receiver task panicked: {join_err}");
            Ok(())
        }
    };

    for task in sender_tasks {
        let _ = task.await;
    }

    receiver_result
}
