//! The permanent-fault ledger.
//!
//! Stuck-at faults model damaged storage cells: ordinary simulator traffic
//! may overwrite the faulted bits, so the engine keeps every stuck-at
//! mutation on file and periodically re-applies the mask to locations that
//! are still reachable.  Bit flips are transient and never recorded here.

use std::collections::HashMap;
use std::hash::Hash;

/// Which way the damaged bits are forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckKind {
    Zero,
    One,
}

impl StuckKind {
    /// Re-apply the stuck-at mask to a freshly read value.
    #[inline]
    pub fn apply(self, value: u64, mask: u64) -> u64 {
        match self {
            StuckKind::Zero => value & !mask,
            StuckKind::One => value | mask,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StuckKind::Zero => "stuck_at_zero",
            StuckKind::One => "stuck_at_one",
        }
    }
}

/// One recorded stuck-at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermanentFault {
    pub kind: StuckKind,
    pub mask: u64,
    /// Set on every injection at this key; cleared once the sweep has
    /// re-asserted the mask.
    pub dirty: bool,
}

/// Map from a target-specific key to its recorded stuck-at fault.
///
/// Entries are never deleted: a fault at an evicted cache block or halted
/// thread is merely skipped by the sweep and becomes applicable again if
/// the location returns.
#[derive(Debug)]
pub struct PermanentFaultLedger<K> {
    entries: HashMap<K, PermanentFault>,
}

impl<K: Eq + Hash + Clone> PermanentFaultLedger<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Record a stuck-at mutation, overwriting any earlier entry at the
    /// same key and marking it dirty.
    pub fn record(&mut self, key: K, kind: StuckKind, mask: u64) {
        self.entries.insert(
            key,
            PermanentFault {
                kind,
                mask,
                dirty: true,
            },
        );
    }

    pub fn get(&self, key: &K) -> Option<&PermanentFault> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate all entries mutably, for the re-assert sweep.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&K, &mut PermanentFault)> {
        self.entries.iter_mut()
    }
}

impl<K: Eq + Hash + Clone> Default for PermanentFaultLedger<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_overwrites_and_marks_dirty() {
        let mut ledger = PermanentFaultLedger::new();
        ledger.record(7u64, StuckKind::Zero, 0x0F);
        ledger.record(7u64, StuckKind::One, 0xF0);

        assert_eq!(ledger.len(), 1);
        let fault = ledger.get(&7).unwrap();
        assert_eq!(fault.kind, StuckKind::One);
        assert_eq!(fault.mask, 0xF0);
        assert!(fault.dirty);
    }

    #[test]
    fn sweep_clears_dirty_until_next_record() {
        let mut ledger = PermanentFaultLedger::new();
        ledger.record(1u64, StuckKind::One, 0b1000_0000);

        for (_, fault) in ledger.entries_mut() {
            assert!(fault.dirty);
            fault.dirty = false;
        }
        assert!(!ledger.get(&1).unwrap().dirty);

        ledger.record(1u64, StuckKind::One, 0b1000_0000);
        assert!(ledger.get(&1).unwrap().dirty);
    }

    #[test]
    fn stuck_kinds_force_bits() {
        assert_eq!(StuckKind::Zero.apply(0xFF, 0x0F), 0xF0);
        assert_eq!(StuckKind::One.apply(0x00, 0x0F), 0x0F);
        // Idempotent by construction.
        assert_eq!(StuckKind::One.apply(0x0F, 0x0F), 0x0F);
    }
}
