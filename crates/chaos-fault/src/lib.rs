//! Stochastic bit-level fault injection for simulated hardware state.
//!
//! This crate is the common core shared by the register, cache and main
//! memory injectors.  It provides:
//!
//! 1. **[`config`]** — The immutable per-engine configuration surface
//! 2. **[`engine`]** — The [`FaultInjector`](engine::FaultInjector)
//!    scheduler that wakes at geometrically-distributed intervals inside
//!    a cycle window and drives one injection per firing
//! 3. **[`policy`]** — Mask generation and fault-type resolution
//!    (bit-flip / stuck-at-0 / stuck-at-1, forced or sampled from a mix)
//! 4. **[`ledger`]** — The permanent-fault ledger that lets stuck-at
//!    faults be re-asserted after ordinary traffic overwrites them
//! 5. **[`audit`]** — The append-only injection log
//! 6. **[`target`]** — The [`TargetAdapter`](target::TargetAdapter)
//!    capability an engine requires of a hardware model
//!
//! # Architecture
//!
//! ```text
//! EventQueue              FaultInjector<T>          TargetAdapter
//! ──────────              ────────────────          ─────────────
//! pop() ──────────────→ on_inject() ─────────────→ select() / read() / write()
//!                          │  FaultPolicy::resolve_{mask,type}
//!                          │  Auditor::injection, InjectorStats
//!                          └→ schedule(next)
//! pop() ──────────────→ on_perm_check() ─────────→ locate() / read() / write()
//! ```
//!
//! The engine is generic over the adapter's location and ledger-key types;
//! the scheduler, policy, ledger and auditor are a single code path for all
//! three target kinds.

pub mod audit;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod policy;
pub mod stats;
pub mod target;

pub use config::{FaultType, InjectorConfig, RandomFaultWeights};
pub use engine::{BuildError, FaultInjector};
pub use ledger::{PermanentFault, PermanentFaultLedger, StuckKind};
pub use policy::{AppliedFaultType, FaultPolicy};
pub use stats::InjectorStats;
pub use target::{Selection, TargetAdapter};
