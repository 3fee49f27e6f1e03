//! The injection engine — scheduler and orchestrator.
//!
//! A [`FaultInjector`] owns one RNG, one policy, one ledger, one auditor
//! and one target adapter, and keeps exactly two events in the host queue:
//!
//! - `inject` — fires at geometrically-distributed cycle gaps inside the
//!   configured window, selects a site, applies one mutation per site and
//!   reschedules itself while the window is open.
//! - `permanentCheck` — fires on a fixed cadence, sweeps the stuck-at
//!   ledger and re-applies masks to sites that are still reachable.  It
//!   reschedules itself once per callback, at the end, and keeps running
//!   after the injection window closes.
//!
//! # Gap sampling
//!
//! A Bernoulli trial per cycle with success probability `p` has
//! inter-success gaps of `1 + Geometric(p)` cycles (the geometric counting
//! failures before the next success).  Sampling the gap directly is O(1)
//! per injection instead of O(1/p) per cycle, and `p = 1` degenerates to a
//! firing every cycle.
//!
//! # Failure semantics
//!
//! Nothing that happens inside a callback reaches the host: adapter access
//! errors become `Error:` log lines, empty candidate sets become warnings,
//! and in every case the successor event is still scheduled.

use chaos_sim::clock::ClockDomain;
use chaos_sim::event::{EventId, EventQueue, Tick};
use chaos_sim::output::OutputDirectory;
use log::warn;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Geometric};
use thiserror::Error;

use crate::audit::Auditor;
use crate::config::InjectorConfig;
use crate::ledger::PermanentFaultLedger;
use crate::policy::FaultPolicy;
use crate::stats::InjectorStats;
use crate::target::{Selection, TargetAdapter};

/// Fatal construction failures.
///
/// Everything that can go wrong after construction is recoverable and
/// handled inside the callbacks.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("probability {0} is outside [0.0, 1.0]")]
    InvalidProbability(f64),

    #[error("invalid fault mask {mask:?}: {reason}")]
    InvalidFaultMask { mask: String, reason: String },

    #[error("bits_to_change {0} must be -1 or in [1, {1}]")]
    InvalidBitsToChange(i32, u32),

    #[error("invalid fault-type weights: {0}")]
    InvalidWeights(String),

    #[error("could not open log file {name:?}")]
    LogFile {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Inter-injection gap sampler, in cycles.
#[derive(Debug)]
enum GapSampler {
    /// `probability == 1.0`: a firing every cycle.
    EveryCycle,
    /// `probability in (0, 1)`: `1 + Geometric(p)` cycles.
    Geometric(Geometric),
}

impl GapSampler {
    fn new(probability: f64) -> Result<Self, BuildError> {
        if probability >= 1.0 {
            Ok(GapSampler::EveryCycle)
        } else {
            Geometric::new(probability)
                .map(GapSampler::Geometric)
                .map_err(|_| BuildError::InvalidProbability(probability))
        }
    }

    fn sample(&self, rng: &mut ChaCha20Rng) -> u64 {
        match self {
            GapSampler::EveryCycle => 1,
            GapSampler::Geometric(dist) => 1 + dist.sample(rng),
        }
    }
}

/// A fault-injection engine bound to one target.
pub struct FaultInjector<T: TargetAdapter> {
    name: String,
    target: T,
    rng: ChaCha20Rng,
    /// `None` while disabled (`probability == 0`).
    policy: Option<FaultPolicy>,
    gap: Option<GapSampler>,
    ledger: PermanentFaultLedger<T::Key>,
    auditor: Auditor,
    stats: InjectorStats,
    clock: ClockDomain,
    inject_event: EventId,
    perm_check_event: EventId,
    first_tick: Tick,
    /// `0` means no upper bound.
    last_tick: Tick,
    check_period: Tick,
    started: bool,
}

impl<T: TargetAdapter> FaultInjector<T> {
    /// Build an engine and, unless disabled, schedule its first events.
    ///
    /// A disabled engine (`probability == 0` and no poll mode) registers
    /// no events, opens no log stream and emits no warnings.
    pub fn new(
        name: impl Into<String>,
        cfg: &InjectorConfig,
        target: T,
        queue: &mut EventQueue,
        out: &OutputDirectory,
    ) -> Result<Self, BuildError> {
        let name = name.into();
        if !(0.0..=1.0).contains(&cfg.probability) {
            return Err(BuildError::InvalidProbability(cfg.probability));
        }

        let clock = ClockDomain::new(cfg.tick_to_clock_ratio);
        let inject_event = queue.new_event(format!("{name}.inject"));
        let perm_check_event = queue.new_event(format!("{name}.permanentCheck"));

        let mut engine = Self {
            target,
            rng: match cfg.seed {
                Some(seed) => rng_from_seed(seed),
                None => ChaCha20Rng::from_entropy(),
            },
            policy: None,
            gap: None,
            ledger: PermanentFaultLedger::new(),
            auditor: Auditor::disabled(),
            stats: InjectorStats::new(&name),
            clock,
            inject_event,
            perm_check_event,
            first_tick: clock.cycles_to_ticks(cfg.first_clock),
            last_tick: clock.cycles_to_ticks(cfg.last_clock),
            check_period: clock.cycles_to_ticks(cfg.cycles_permanent_fault_check.max(1)),
            started: false,
            name,
        };

        if cfg.is_enabled() {
            engine.policy = Some(FaultPolicy::new(cfg, T::MASK_BITS, &mut engine.rng)?);
            engine.gap = Some(GapSampler::new(cfg.effective_probability())?);
            engine.auditor = Auditor::new(out, T::LOG_FILE, cfg.write_log)?;
            engine.start(queue);
        }
        Ok(engine)
    }

    /// Schedule the first injection and the first ledger sweep.
    ///
    /// Idempotent; already called by [`new`](Self::new).
    pub fn start(&mut self, queue: &mut EventQueue) {
        let Some(gap) = &self.gap else { return };
        if self.started {
            return;
        }
        self.started = true;

        let first = self.first_tick + self.clock.cycles_to_ticks(gap.sample(&mut self.rng));
        if self.last_tick == 0 || first <= self.last_tick {
            queue.schedule(self.inject_event, first);
        }
        queue.schedule(self.perm_check_event, self.first_tick + self.check_period);
    }

    /// Dispatch a firing to this engine if it owns the event.
    ///
    /// Returns `false` if the event belongs to another component.
    pub fn handle(&mut self, event: EventId, queue: &mut EventQueue) -> bool {
        if event == self.inject_event {
            self.on_inject(queue);
            true
        } else if event == self.perm_check_event {
            self.on_perm_check(queue);
            true
        } else {
            false
        }
    }

    /// The injection callback: mutate, then schedule the successor while
    /// the window is open.
    pub fn on_inject(&mut self, queue: &mut EventQueue) {
        let now = queue.now();
        self.fire(now);

        let Some(gap) = &self.gap else { return };
        let next = now + self.clock.cycles_to_ticks(gap.sample(&mut self.rng));
        if self.last_tick == 0 || next <= self.last_tick {
            queue.schedule(self.inject_event, next);
        }
    }

    fn fire(&mut self, now: Tick) {
        let Some(policy) = &self.policy else { return };

        let locs = match self.target.select(&mut self.rng) {
            Ok(Selection::Chosen(locs)) => locs,
            Ok(Selection::NoValidTarget) => {
                warn!("{}: no valid injection target", self.name);
                return;
            }
            Ok(Selection::Gated) => return,
            Err(e) => {
                self.auditor.error(
                    "Exception caught during target selection",
                    &self.name,
                    Some(&e.to_string()),
                );
                return;
            }
        };

        // One fault type per firing; a fresh mask per sub-firing.
        let fault_type = policy.resolve_type(&mut self.rng);
        for loc in &locs {
            let mask = policy.resolve_mask(&mut self.rng);
            if mask == 0 {
                warn!("{}: resolved mask is 0, skipping", self.name);
                continue;
            }

            let value = match self.target.read(loc) {
                Ok(v) => v,
                Err(e) => {
                    self.auditor.error(
                        "Exception caught during fault injection",
                        &self.target.describe(loc),
                        Some(&e.to_string()),
                    );
                    continue;
                }
            };
            let mutated = fault_type.apply(value, mask);
            if let Err(e) = self.target.write(loc, mutated) {
                self.auditor.error(
                    "Exception caught during fault injection",
                    &self.target.describe(loc),
                    Some(&e.to_string()),
                );
                continue;
            }

            // Ledger before log line, counters in the same critical section.
            if let Some(kind) = fault_type.stuck_kind() {
                self.ledger.record(self.target.key(loc), kind, mask);
            }
            self.stats.record(fault_type);
            self.auditor.injection(
                now,
                &self.target.describe(loc),
                fault_type,
                mask,
                T::MASK_BITS,
            );
        }
        self.target.firing_complete(&locs);
    }

    /// The ledger sweep: re-apply dirty stuck-at masks to sites that are
    /// still reachable, then reschedule on the fixed cadence.
    pub fn on_perm_check(&mut self, queue: &mut EventQueue) {
        for (key, fault) in self.ledger.entries_mut() {
            if !fault.dirty {
                continue;
            }
            // Evicted or halted sites are skipped, not forgotten.
            let Some(loc) = self.target.locate(key) else {
                continue;
            };
            match self.target.read(&loc) {
                Ok(value) => {
                    let reasserted = fault.kind.apply(value, fault.mask);
                    match self.target.write(&loc, reasserted) {
                        Ok(()) => fault.dirty = false,
                        Err(e) => self.auditor.error(
                            "Exception caught during permanent fault check",
                            &self.target.describe(&loc),
                            Some(&e.to_string()),
                        ),
                    }
                }
                Err(e) => self.auditor.error(
                    "Exception caught during permanent fault check",
                    &self.target.describe(&loc),
                    Some(&e.to_string()),
                ),
            }
        }

        let next = queue.now() + self.check_period;
        queue.schedule(self.perm_check_event, next);
    }

    /// Squash both events (host drain/halt).
    pub fn halt(&mut self, queue: &mut EventQueue) {
        queue.squash(self.inject_event);
        queue.squash(self.perm_check_event);
    }

    /// Engine instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the engine was constructed live.
    pub fn is_enabled(&self) -> bool {
        self.gap.is_some()
    }

    /// The injection event handle.
    pub fn inject_event(&self) -> EventId {
        self.inject_event
    }

    /// The ledger-sweep event handle.
    pub fn perm_check_event(&self) -> EventId {
        self.perm_check_event
    }

    /// Injection counters.
    pub fn stats(&self) -> &InjectorStats {
        &self.stats
    }

    /// The permanent-fault ledger.
    pub fn ledger(&self) -> &PermanentFaultLedger<T::Key> {
        &self.ledger
    }

    /// The target adapter.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Mutable access to the target adapter.
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }
}

fn rng_from_seed(seed: u64) -> ChaCha20Rng {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&seed.to_le_bytes());
    ChaCha20Rng::from_seed(key)
}
