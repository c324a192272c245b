//! Shared result store
//!
//! Fetch passes race: a user can retype an amount while the previous
//! appraisal is still in flight, and a slow watch tick can land after a
//! fast one. Every cached result lives in a generation-tagged slot; a
//! pass takes a ticket when it starts and only the newest ticket may
//! commit. Anything older resolves into the void.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use crate::account::AccountSnapshot;
use crate::treasury::ProtocolMetrics;
use crate::valuation::BondValuation;

// ============================================
// SLOT
// ============================================

/// One cached value plus the ticket counter that orders writers.
pub struct Slot<T> {
    generation: AtomicU64,
    value: RwLock<Option<(u64, T)>>,
}

impl<T: Clone> Slot<T> {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            value: RwLock::new(None),
        }
    }

    /// Start a pass. The returned ticket must accompany the commit.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply a pass result. Returns false when a newer pass has begun or
    /// already committed, in which case the value is dropped.
    pub async fn commit(&self, ticket: u64, value: T) -> bool {
        if ticket != self.generation.load(Ordering::SeqCst) {
            debug!("dropping stale commit (ticket {})", ticket);
            return false;
        }
        let mut slot = self.value.write().await;
        // a newer writer may have landed while we waited on the lock
        match &*slot {
            Some((committed, _)) if *committed > ticket => false,
            _ => {
                *slot = Some((ticket, value));
                true
            }
        }
    }

    pub async fn get(&self) -> Option<T> {
        self.value.read().await.as_ref().map(|(_, v)| v.clone())
    }

    /// Ticket of the newest pass started so far.
    pub fn latest_ticket(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Ticket of the committed value, if any.
    pub async fn committed_ticket(&self) -> Option<u64> {
        self.value.read().await.as_ref().map(|(t, _)| *t)
    }
}

impl<T: Clone> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// STORE
// ============================================

/// All engine results behind one handle, one slot per concern. Bond
/// valuations get independent slots so retyping an amount for one bond
/// never invalidates the others.
#[derive(Default)]
pub struct MetricsStore {
    pub protocol: Slot<ProtocolMetrics>,
    pub account: Slot<AccountSnapshot>,
    bonds: RwLock<HashMap<String, Arc<Slot<BondValuation>>>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn bond_slot(&self, name: &str) -> Arc<Slot<BondValuation>> {
        if let Some(slot) = self.bonds.read().await.get(name) {
            return slot.clone();
        }
        let mut map = self.bonds.write().await;
        map.entry(name.to_string())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone()
    }

    pub async fn bond_valuations(&self) -> Vec<BondValuation> {
        let map = self.bonds.read().await;
        let mut out = Vec::with_capacity(map.len());
        for slot in map.values() {
            if let Some(v) = slot.get().await {
                out.push(v);
            }
        }
        out
    }
}

// ============================================
// DEBOUNCER
// ============================================

/// Collapses bursts of triggers into the final one. Every caller waits
/// out the window; only the caller not superseded in the meantime is told
/// to proceed.
pub struct Debouncer {
    window: Duration,
    latest: AtomicU64,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            latest: AtomicU64::new(0),
        }
    }

    /// Returns true only for the most recent caller within the window.
    pub async fn settle(&self) -> bool {
        let my = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.window).await;
        my == self.latest.load(Ordering::SeqCst)
    }
}

// ============================================
// TESTS
// ============================================
