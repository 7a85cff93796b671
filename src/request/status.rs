use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a [`Request`](super::Request).
///
/// Transitions are monotonic:
/// `Building -> Pending -> Sending -> HeadersReceived -> Done | Error`, with
/// `Pending -> Cancelled` as the only other edge. `HeadersReceived` may be
/// skipped when no response ever arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RequestStatus {
    Building = 0,
    Pending = 1,
    Sending = 2,
    HeadersReceived = 3,
    Done = 4,
    Error = 5,
    Cancelled = 6,
}

impl RequestStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }

    /// Whether `self -> next` is an edge of the state machine.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Building, Self::Pending)
                | (Self::Pending, Self::Sending | Self::Cancelled)
                | (Self::Sending, Self::HeadersReceived | Self::Done | Self::Error)
                | (Self::HeadersReceived, Self::Done | Self::Error)
        )
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Building,
            1 => Self::Pending,
            2 => Self::Sending,
            3 => Self::HeadersReceived,
            4 => Self::Done,
            5 => Self::Error,
            _ => Self::Cancelled,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Building => "building",
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::HeadersReceived => "headers-received",
            Self::Done => "done",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Atomic holder for a [`RequestStatus`].
///
/// Every write goes through a compare-exchange against the expected current
/// state, so a cancel racing a dispatch resolves to exactly one winner.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) const fn new(status: RequestStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub(crate) fn load(&self) -> RequestStatus {
        RequestStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from -> to`. Returns the observed status on failure, either
    /// because the edge is illegal or because another writer got there first.
    pub(crate) fn advance(
        &self,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<(), RequestStatus> {
        if !from.can_advance_to(to) {
            return Err(self.load());
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(RequestStatus::from_u8)
    }
}
