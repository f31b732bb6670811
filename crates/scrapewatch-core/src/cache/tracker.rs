use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle for one issued request.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    pub seq: u64,
    pub token: CancellationToken,
}

/// Whether a settling response belongs to the newest request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    Current,
    Stale,
}

#[derive(Debug)]
struct Inflight {
    seq: u64,
    token: CancellationToken,
}

/// Sequence guard for one logical context.
///
/// At most one request is outstanding. Beginning a new one cancels the
/// previous token, and only the newest sequence number can settle as
/// [`Settle::Current`].
#[derive(Debug, Default)]
pub struct RequestTracker {
    last_seq: u64,
    inflight: Option<Inflight>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> RequestTicket {
        if let Some(previous) = self.inflight.take() {
            previous.token.cancel();
            debug!(event = "core.request.superseded", seq = previous.seq);
        }
        self.last_seq += 1;
        let token = CancellationToken::new();
        self.inflight = Some(Inflight {
            seq: self.last_seq,
            token: token.clone(),
        });
        RequestTicket {
            seq: self.last_seq,
            token,
        }
    }

    pub fn is_current(&self, seq: u64) -> bool {
        self.inflight.as_ref().is_some_and(|f| f.seq == seq)
    }

    /// Mark `seq` as settled. Only the outstanding request is `Current`;
    /// settling it leaves nothing outstanding.
    pub fn settle(&mut self, seq: u64) -> Settle {
        if self.is_current(seq) {
            self.inflight = None;
            Settle::Current
        } else {
            Settle::Stale
        }
    }

    /// Cancel the outstanding request, if any. Returns its sequence number.
    pub fn cancel_all(&mut self) -> Option<u64> {
        self.inflight.take().map(|inflight| {
            inflight.token.cancel();
            inflight.seq
        })
    }

    pub fn outstanding(&self) -> bool {
        self.inflight.is_some()
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_cancels_previous_token() {
        let mut tracker = RequestTracker::new();
        let first = tracker.begin();
        let second = tracker.begin();

        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert!(second.seq > first.seq);
    }

    #[test]
    fn test_only_newest_settles_current() {
        let mut tracker = RequestTracker::new();
        let a = tracker.begin();
        let b = tracker.begin();

        assert_eq!(tracker.settle(a.seq), Settle::Stale);
        assert!(tracker.outstanding());
        assert_eq!(tracker.settle(b.seq), Settle::Current);
        assert!(!tracker.outstanding());
        assert_eq!(tracker.settle(b.seq), Settle::Stale);
    }

    #[test]
    fn test_cancel_all_clears_outstanding() {
        let mut tracker = RequestTracker::new();
        let a = tracker.begin();
        assert_eq!(tracker.cancel_all(), Some(a.seq));
        assert!(a.token.is_cancelled());
        assert!(!tracker.outstanding());
        assert_eq!(tracker.settle(a.seq), Settle::Stale);
        assert_eq!(tracker.cancel_all(), None);
    }
}
