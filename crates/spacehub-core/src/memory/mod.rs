// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory collaborators.
//!
//! Used by the tests and by the standalone environment binary. Each one keeps
//! its state behind a `tokio::sync::Mutex` and exposes [`FaultSwitch`]es to
//! make the next (or every) call fail.

use std::sync::atomic::{AtomicBool, Ordering};

mod compute;
mod events;
mod ledger;
mod repo;
mod store;

pub use compute::MockComputeManager;
pub use events::{MemoryActivityLog, MemoryRelatedResources, RecordingPublisher};
pub use ledger::MemoryQuotaLedger;
pub use repo::MemoryRepoProvider;
pub use store::{MemoryInstanceStore, MemorySpaceAppStore, MemoryWorkspaceStore};

/// Fault injection flag.
#[derive(Debug, Default)]
pub struct FaultSwitch {
    once: AtomicBool,
    always: AtomicBool,
}

impl FaultSwitch {
    /// Fail the next call only.
    pub fn fail_next(&self) {
        self.once.store(true, Ordering::SeqCst);
    }

    /// Fail every call until [`FaultSwitch::reset`].
    pub fn fail_always(&self) {
        self.always.store(true, Ordering::SeqCst);
    }

    /// Stop failing.
    pub fn reset(&self) {
        self.once.store(false, Ordering::SeqCst);
        self.always.store(false, Ordering::SeqCst);
    }

    /// True if this call must fail. Consumes a one-shot fault.
    pub fn trip(&self) -> bool {
        self.always.load(Ordering::SeqCst) || self.once.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_switch_once() {
        let switch = FaultSwitch::default();
        assert!(!switch.trip());
        switch.fail_next();
        assert!(switch.trip());
        assert!(!switch.trip());
    }

    #[test]
    fn test_fault_switch_always() {
        let switch = FaultSwitch::default();
        switch.fail_always();
        assert!(switch.trip());
        assert!(switch.trip());
        switch.reset();
        assert!(!switch.trip());
    }
}
