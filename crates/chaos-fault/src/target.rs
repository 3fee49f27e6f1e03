//! The capability an engine requires of a hardware model.
//!
//! One engine drives one [`TargetAdapter`]: registers of a simulated CPU,
//! blocks of a simulated cache, or a simulated memory range.  The adapter
//! owns the access discipline (coherence bits, packet conventions,
//! register classes); the engine only ever sees opaque locations and
//! ledger keys.

use std::fmt::Debug;
use std::hash::Hash;

use rand_chacha::ChaCha20Rng;

/// What the adapter found when asked for this firing's targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<L> {
    /// Mutate these locations, in order.
    Chosen(Vec<L>),
    /// The target holds nothing injectable right now (empty cache, no
    /// live thread).  The engine warns and reschedules.
    NoValidTarget,
    /// A configured gate (program counter, instruction kind) did not
    /// match this cycle.  The engine reschedules silently.
    Gated,
}

/// A fault-injection target.
pub trait TargetAdapter {
    /// A selected injection site, valid for the current firing.
    type Location: Clone;

    /// Stable identity of a site across firings, for the permanent-fault
    /// ledger.
    type Key: Eq + Hash + Clone + Debug;

    /// Access failures (block invalidated between selection and mutation,
    /// thread halted, address unmapped).
    type Error: std::error::Error;

    /// Mask width applied to this target's values: 8 for byte-granular
    /// cache/memory targets, 32 for register words.
    const MASK_BITS: u32;

    /// Name of this engine kind's append-only log file.
    const LOG_FILE: &'static str;

    /// Choose this firing's injection sites.
    ///
    /// Cache targets return several byte offsets within one block
    /// (`corruption_size` of them); the others return a single location.
    fn select(&mut self, rng: &mut ChaCha20Rng) -> Result<Selection<Self::Location>, Self::Error>;

    /// Read the current value at a site.
    fn read(&self, loc: &Self::Location) -> Result<u64, Self::Error>;

    /// Write a mutated value back through the model's published interface.
    fn write(&mut self, loc: &Self::Location, value: u64) -> Result<(), Self::Error>;

    /// Ledger key for a site.
    fn key(&self, loc: &Self::Location) -> Self::Key;

    /// Human-readable site descriptor for the audit log.
    fn describe(&self, loc: &Self::Location) -> String;

    /// Resolve a ledger key back to a live location, or `None` if the
    /// site is currently unreachable (evicted block, halted thread).
    fn locate(&self, key: &Self::Key) -> Option<Self::Location>;

    /// Called once after all of a firing's mutations have been applied.
    /// Cache targets mark the mutated block dirty here.
    fn firing_complete(&mut self, _locs: &[Self::Location]) {}
}
