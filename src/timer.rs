//! Cancellable deferred callbacks for a single-threaded event loop.
//!
//! Nothing here sleeps. Callers schedule a token with a fire time and later
//! ask which tokens are due; the work itself is done by the caller at fire
//! time against whatever state is current then.

use chrono::{DateTime, Utc};

/// Handle to one scheduled callback. Tokens are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

#[derive(Debug, Default)]
pub struct TimerQueue {
    next: u64,
    pending: Vec<(TimerToken, DateTime<Utc>)>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at: DateTime<Utc>) -> TimerToken {
        self.next += 1;
        let token = TimerToken(self.next);
        self.pending.push((token, fire_at));
        tracing::debug!(token = token.0, %fire_at, "timer scheduled");
        token
    }

    /// Returns false if the token already fired or was cancelled.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(t, _)| *t != token);
        let removed = self.pending.len() != before;
        if removed {
            tracing::debug!(token = token.0, "timer cancelled");
        }
        removed
    }

    /// Remove and return every token due at `now`, earliest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<TimerToken> {
        let mut due: Vec<(TimerToken, DateTime<Utc>)> = Vec::new();
        self.pending.retain(|&(token, at)| {
            if at <= now {
                due.push((token, at));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(token, at)| (at, token));
        due.into_iter().map(|(token, _)| token).collect()
    }
}
