use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier.
///
/// Identifier which is guaranteed to be unique during the program run. It is intentionally kept
/// opaque and used to tag runtime entities like multiplexers and framed channels in logs.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct UniqueId {
    epoch: u64,
    counter: u64,
}

static COUNTER: AtomicU64 = AtomicU64::new(0);
static EPOCH: AtomicU64 = AtomicU64::new(0);

impl Debug for UniqueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}:{}", self.epoch, self.counter)
    }
}

impl UniqueId {
    /// Generates unique identifier.
    pub fn new() -> Self {
        if EPOCH.load(Ordering::Acquire) == 0 {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|since| since.as_secs())
                .unwrap_or(1)
                .max(1);
            let _ = EPOCH.compare_exchange(0, now, Ordering::AcqRel, Ordering::Acquire);
        }

        Self {
            epoch: EPOCH.load(Ordering::Acquire),
            counter: COUNTER.fetch_add(1, Ordering::AcqRel),
        }
    }
}

impl Default for UniqueId {
    fn default() -> Self {
        Self::new()
    }
}
