//! Idle-suppression: collapses repeated, unchanged observations into a
//! single publish within a 250 ms window (§4.3, §8 property 6).

use std::time::Duration;

use tokio::time::Instant;

use crate::codec::Fingerprint;

/// The idle-suppression window. Two observations whose fingerprints match
/// within this window collapse to one publish.
pub const IDLE_WINDOW: Duration = Duration::from_millis(250);

/// Tracks the last-published fingerprint and when it was sent, so each
/// receiver variant can apply the same suppression rule without
/// duplicating the comparison.
#[derive(Default)]
pub struct IdleSuppressor {
    last: Option<(Fingerprint, Instant)>,
}

impl IdleSuppressor {
    pub fn new() -> Self {
        IdleSuppressor::default()
    }

    /// Returns `true` if `fingerprint` should be suppressed (identical to
    /// the last published fingerprint, within the idle window). If not
    /// suppressed, records `fingerprint` as the new last-published value.
    pub fn should_suppress(&mut self, fingerprint: Fingerprint) -> bool {
        let now = Instant::now();
        if let Some((last_fp, last_at)) = self.last {
            if last_fp == fingerprint && now.duration_since(last_at) < IDLE_WINDOW {
                return true;
            }
        }
        self.last = Some((fingerprint, now));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint([byte; 72])
    }

    #[tokio::test(start_paused = true)]
    async fn suppresses_identical_fingerprint_within_window() {
        let mut s = IdleSuppressor::new();
        assert!(!s.should_suppress(fp(1)));
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(s.should_suppress(fp(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_again_after_window_elapses() {
        let mut s = IdleSuppressor::new();
        assert!(!s.should_suppress(fp(1)));
        tokio::time::advance(Duration::from_millis(300)).await;
        assert!(!s.should_suppress(fp(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn different_fingerprint_always_publishes() {
        let mut s = IdleSuppressor::new();
        assert!(!s.should_suppress(fp(1)));
        assert!(!s.should_suppress(fp(2)));
    }
}
