//! Discrete-event simulation substrate for the CHAOS fault injectors.
//!
//! This crate provides the small slice of a cycle-accurate simulator that
//! the fault-injection engines actually consume:
//!
//! 1. **[`event`]** — A monotonic event queue with `schedule` / `squash` /
//!    `scheduled` semantics and stable same-tick ordering
//! 2. **[`clock`]** — Tick/cycle arithmetic for a fixed clock domain
//!    (`clock_edge`, `cur_cycle`)
//! 3. **[`output`]** — Append-only output streams, backed by the filesystem
//!    or by memory (for deterministic log assertions in tests)
//! 4. **[`stats`]** — Named scalar statistics groups
//!
//! # Execution model
//!
//! The simulation is single-threaded and cooperative.  Components register
//! events, the driver pops the next firing and dispatches it, and the fired
//! callback runs to completion before any other event:
//!
//! ```
//! use chaos_sim::event::EventQueue;
//!
//! let mut queue = EventQueue::new();
//! let ev = queue.new_event("demo.tick");
//! queue.schedule(ev, 100);
//!
//! while let Some(firing) = queue.pop() {
//!     assert_eq!(firing.when, 100);
//!     assert_eq!(firing.event, ev);
//! }
//! assert_eq!(queue.now(), 100);
//! ```

pub mod clock;
pub mod event;
pub mod output;
pub mod stats;

pub use clock::{ClockDomain, Cycles};
pub use event::{EventId, EventQueue, Firing, Tick};
pub use output::{OutputDirectory, OutputStream};
pub use stats::{Scalar, StatGroup};
