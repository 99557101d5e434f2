//! Broadcast fan-out (component C4): one bounded mailbox per sender, fed
//! by a single receiver. Replaces the original "list of queues" with the
//! same shape expressed over `tokio::sync::mpsc`, so back-pressure from the
//! slowest sender composes naturally into the publishing call.

use tokio::sync::mpsc;

/// Encoded frame bytes in flight between a receiver and a sender. `None` is
/// the graceful end-of-stream sentinel (§4.4); every sender must release
/// its resources upon receiving one.
pub type Frame = Option<Vec<u8>>;

/// Default per-sender mailbox depth. Chosen to absorb a brief stall in one
/// slow sender without unbounded memory growth; the receiver still blocks
/// once a mailbox fills, per the shared-back-pressure discipline in §5.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// The receiver-side handle to one sender's mailbox.
#[derive(Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<Frame>,
}

/// The sender-side handle to its own mailbox.
pub struct Inbox {
    rx: mpsc::Receiver<Frame>,
}

/// Creates one bounded mailbox/inbox pair.
pub fn mailbox(capacity: usize) -> (Mailbox, Inbox) {
    let (tx, rx) = mpsc::channel(capacity);
    (Mailbox { tx }, Inbox { rx })
}

impl Inbox {
    /// Receives the next frame, or `None` if the receiver dropped its side
    /// without an explicit end-of-stream sentinel (treated the same as one).
    pub async fn recv(&mut self) -> Frame {
        self.rx.recv().await.flatten()
    }
}

/// Owns every sender's mailbox and delivers each published frame to all of
/// them in the order the receiver produced it.
pub struct FanOut {
    mailboxes: Vec<Mailbox>,
}

impl FanOut {
    pub fn new(mailboxes: Vec<Mailbox>) -> Self {
        FanOut { mailboxes }
    }

    /// Enqueues `bytes` into every mailbox, awaiting space in each in turn.
    /// A sender that has disconnected is silently skipped — a dead sender
    /// must never stall the receiver or its siblings.
    pub async fn publish(&self, bytes: Vec<u8>) {
        for mailbox in &self.mailboxes {
            let _ = mailbox.tx.send(Some(bytes.clone())).await;
        }
    }

    /// Publishes the end-of-stream sentinel to every sender.
    pub async fn close(&self) {
        for mailbox in &self.mailboxes {
            let _ = mailbox.tx.send(None).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_every_mailbox() {
        let (m1, mut i1) = mailbox(4);
        let (m2, mut i2) = mailbox(4);
        let fanout = FanOut::new(vec![m1, m2]);

        fanout.publish(vec![1, 2, 3]).await;
        assert_eq!(i1.recv().await, Some(vec![1, 2, 3]));
        assert_eq!(i2.recv().await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn close_sends_end_of_stream_sentinel() {
        let (m1, mut i1) = mailbox(4);
        let fanout = FanOut::new(vec![m1]);

        fanout.close().await;
        assert_eq!(i1.recv().await, None);
    }

    #[tokio::test]
    async fn disconnected_sender_does_not_block_publish() {
        let (m1, i1) = mailbox(4);
        drop(i1);
        let fanout = FanOut::new(vec![m1]);
        fanout.publish(vec![9]).await;
    }
}
