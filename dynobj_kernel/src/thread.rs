//! Thread registry: identities and the primary thread.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Stable identity of a runtime thread, rendered as `0x<hex>` in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[derive(Debug)]
pub struct ThreadRegistry {
    next_id: AtomicU64,
    primary: OnceLock<ThreadId>,
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            primary: OnceLock::new(),
        }
    }

    pub fn allocate(&self) -> ThreadId {
        ThreadId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate an id and make it the primary thread.
    /// Fails with the existing primary id if one was already claimed.
    pub fn claim_primary(&self) -> Result<ThreadId, ThreadId> {
        let id = self.allocate();
        match self.primary.set(id) {
            Ok(()) => Ok(id),
            Err(_) => Err(self.primary.get().copied().unwrap_or(id)),
        }
    }

    pub fn primary(&self) -> Option<ThreadId> {
        self.primary.get().copied()
    }

    pub fn is_primary(&self, id: ThreadId) -> bool {
        self.primary() == Some(id)
    }
}
