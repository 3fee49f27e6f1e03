//! Simulated hardware targets for the CHAOS fault injectors.
//!
//! This crate supplies the three kinds of corruptible state the engines
//! operate on, plus the adapter for each:
//!
//! 1. **[`cpu`]** — A thread-granular CPU model: integer and
//!    floating-point register files, a program counter and a last-retired
//!    instruction kind per thread
//! 2. **[`cache`]** — A block-granular cache model with valid/dirty
//!    coherence bits behind an explicit block-visitor interface
//! 3. **[`memory`]** — A flat byte range behind request/packet access
//! 4. **[`adapters`]** — The [`TargetAdapter`](chaos_fault::TargetAdapter)
//!    implementations: [`RegTarget`], [`CacheTarget`], [`MemTarget`]
//!
//! Models are shared between the engine and the rest of the simulation
//! through `Rc<RefCell<_>>` handles: the simulator mutates them as
//! ordinary traffic, the engine mutates them as faults, and both run on
//! the single simulation thread.

pub mod adapters;
pub mod cache;
pub mod cpu;
pub mod memory;

pub use adapters::cache::{CacheConfig, CacheTarget};
pub use adapters::mem::{MemConfig, MemTarget};
pub use adapters::reg::{InstTarget, RegConfig, RegTarget, RegTargetClass};

use chaos_fault::FaultInjector;

/// Engine over a simulated CPU's register files.
pub type RegInjector = FaultInjector<RegTarget>;
/// Engine over a simulated cache's block storage.
pub type CacheInjector = FaultInjector<CacheTarget>;
/// Engine over a simulated main-memory range.
pub type MemInjector = FaultInjector<MemTarget>;
