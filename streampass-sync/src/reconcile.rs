//! Reconciliation scheduling.
//!
//! Every status fetch is issued with a sequence number from one monotonic
//! counter that is shared with the other state-writing events (transaction
//! begin and confirm). Raising the *write floor* marks every fetch issued
//! before that point as stale: its response is discarded on arrival.
//!
//! At most one fetch is in flight. Triggers that arrive while one is in
//! flight collapse into a single queued rerun, issued as soon as the
//! in-flight fetch completes.

use streampass_lib::SubscriptionStatus;

/// Monotonic sequence number.
pub type Seq = u64;

/// Proof that a fetch was issued; handed back on completion.
#[derive(Debug, PartialEq, Eq)]
pub struct SyncTicket {
    seq: Seq,
}

impl SyncTicket {
    /// Sequence number this fetch was issued with.
    pub fn seq(&self) -> Seq {
        self.seq
    }
}

/// Result of asking for a fetch.
#[derive(Debug, PartialEq, Eq)]
pub enum SyncRequest {
    /// Caller must perform the fetch and complete the ticket.
    Issued(SyncTicket),
    /// A fetch is already in flight; a rerun was queued behind it.
    Coalesced,
}

/// What became of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Server truth replaced the local status.
    Applied,
    /// The response predates a newer state write and was dropped.
    Stale,
    /// Folded into a fetch that was already in flight.
    Coalesced,
}

/// Result of completing a ticket.
#[derive(Debug, PartialEq, Eq)]
pub struct Completion {
    /// Whether the response may be applied.
    pub fresh: bool,
    /// Queued rerun, already issued.
    pub rerun: Option<SyncTicket>,
}

/// Sequence and coalescing bookkeeping for status fetches.
#[derive(Debug, Default)]
pub struct ReconcileScheduler {
    last_seq: Seq,
    write_floor: Seq,
    in_flight: Option<Seq>,
    queued: bool,
}

impl ReconcileScheduler {
    /// Create a scheduler with nothing issued.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> Seq {
        self.last_seq += 1;
        self.last_seq
    }

    /// Ask for a fetch.
    pub fn request(&mut self) -> SyncRequest {
        if self.in_flight.is_some() {
            self.queued = true;
            return SyncRequest::Coalesced;
        }
        let seq = self.next_seq();
        self.in_flight = Some(seq);
        SyncRequest::Issued(SyncTicket { seq })
    }

    /// Record a state write that newer-than-everything-issued responses must
    /// not be overwritten by. Returns the write's sequence number.
    pub fn supersede(&mut self) -> Seq {
        let seq = self.next_seq();
        self.write_floor = seq;
        seq
    }

    /// Complete a fetch.
    ///
    /// `succeeded` is false for failed fetches; those never move the floor.
    pub fn complete(&mut self, ticket: SyncTicket, succeeded: bool) -> Completion {
        if self.in_flight == Some(ticket.seq) {
            self.in_flight = None;
        }

        let fresh = ticket.seq > self.write_floor;
        if fresh && succeeded {
            self.write_floor = ticket.seq;
        }

        let rerun = if self.queued && self.in_flight.is_none() {
            self.queued = false;
            match self.request() {
                SyncRequest::Issued(ticket) => Some(ticket),
                SyncRequest::Coalesced => None,
            }
        } else {
            None
        };

        Completion { fresh, rerun }
    }

    /// Drop queued work; in-flight responses become stale.
    pub fn cancel(&mut self) {
        self.queued = false;
        self.in_flight = None;
        self.supersede();
    }

    /// Check whether a fetch is in flight.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Check whether a rerun is queued.
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// Most recently issued sequence number.
    pub fn last_seq(&self) -> Seq {
        self.last_seq
    }

    /// Responses issued at or below this number are stale.
    pub fn write_floor(&self) -> Seq {
        self.write_floor
    }
}

/// Periodic polling runs while the pass is active, and until the first
/// successful fetch so a failed mount still recovers.
pub fn should_poll(status: Option<&SubscriptionStatus>) -> bool {
    status.is_none_or(|s| s.is_active)
}
