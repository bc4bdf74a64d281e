//! Operation tokens: discarding superseded background work.
//!
//! Every user selection change advances a shared counter. Background work
//! captures the counter when it starts and applies its result only if the
//! counter has not moved since. In-flight requests are never aborted, their
//! results are just dropped.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpToken(u64);

impl OpToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct OperationTokens {
    counter: AtomicU64,
}

impl OperationTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new operation, superseding every earlier token.
    pub fn advance(&self) -> OpToken {
        OpToken(self.counter.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn current(&self) -> OpToken {
        OpToken(self.counter.load(Ordering::Acquire))
    }

    pub fn is_current(&self, token: OpToken) -> bool {
        self.current() == token
    }
}
