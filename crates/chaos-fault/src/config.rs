//! Injector configuration.
//!
//! All knobs are fixed at construction; the surrounding simulator loader
//! translates its own parameter system into an [`InjectorConfig`].  The
//! defaults mirror the loader's documented defaults: a disabled engine
//! (`probability = 0`), a randomised bit count, an open-ended window and
//! the 0.9 / 0.05 / 0.05 fault mix.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of mutation an injection applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultType {
    /// Transient: XOR the mask into the value.
    BitFlip,
    /// Permanent: clear the masked bits.
    StuckAtZero,
    /// Permanent: set the masked bits.
    StuckAtOne,
    /// Draw one of the three per firing from [`RandomFaultWeights`].
    Random,
}

impl FaultType {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultType::BitFlip => "bit_flip",
            FaultType::StuckAtZero => "stuck_at_zero",
            FaultType::StuckAtOne => "stuck_at_one",
            FaultType::Random => "random",
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bit_flip" => Ok(FaultType::BitFlip),
            "stuck_at_zero" => Ok(FaultType::StuckAtZero),
            "stuck_at_one" => Ok(FaultType::StuckAtOne),
            "random" => Ok(FaultType::Random),
            other => Err(format!("unknown fault type {other:?}")),
        }
    }
}

/// Per-type weights used when [`FaultType::Random`] is configured.
///
/// The triple must sum to 1.0; otherwise the engine warns and substitutes
/// the default mix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomFaultWeights {
    pub bit_flip: f64,
    pub stuck_at_zero: f64,
    pub stuck_at_one: f64,
}

impl RandomFaultWeights {
    /// Whether the triple sums to 1.0 (within float tolerance).
    pub fn is_normalized(&self) -> bool {
        let sum = self.bit_flip + self.stuck_at_zero + self.stuck_at_one;
        (sum - 1.0).abs() < 1e-9
    }
}

impl Default for RandomFaultWeights {
    fn default() -> Self {
        Self {
            bit_flip: 0.9,
            stuck_at_zero: 0.05,
            stuck_at_one: 0.05,
        }
    }
}

/// Immutable configuration for one injection engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectorConfig {
    /// Per-cycle Bernoulli parameter in `[0.0, 1.0]`; the `p` of the
    /// geometric inter-injection gap.  `0.0` disables the engine entirely.
    pub probability: f64,

    /// Number of 1-bits in a generated mask, or `-1` to pick uniformly in
    /// `[1, mask_bits]` at construction.  Ignored when `fault_mask` is
    /// non-zero.
    pub bits_to_change: i32,

    /// First cycle at which injection is enabled.
    pub first_clock: u64,

    /// Last cycle at which injection is enabled; `0` means no upper bound.
    pub last_clock: u64,

    /// Mutation kind, or `random` to draw per firing.
    pub fault_type: FaultType,

    /// Mask as a binary string (e.g. `"11110000"`).  `"0"` means
    /// "generate a fresh random mask each firing".
    pub fault_mask: String,

    /// Simulator ticks per clock cycle.
    pub tick_to_clock_ratio: u64,

    /// Cycles between permanent-fault re-assert sweeps.
    pub cycles_permanent_fault_check: u64,

    /// Weights for the `random` fault type.
    pub random_weights: RandomFaultWeights,

    /// Whether to write the per-injection log file.
    pub write_log: bool,

    /// Fire every cycle regardless of `probability`.  Target wirings that
    /// gate on observed state (a program-counter match, for instance) set
    /// this so the gate is evaluated on every cycle.
    pub poll_every_cycle: bool,

    /// RNG seed; `None` draws one from OS entropy.  A fixed seed yields a
    /// deterministic fault stream within one run.
    pub seed: Option<u64>,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            probability: 0.0,
            bits_to_change: -1,
            first_clock: 0,
            last_clock: 0,
            fault_type: FaultType::Random,
            fault_mask: "0".to_owned(),
            tick_to_clock_ratio: 1000,
            cycles_permanent_fault_check: 1,
            random_weights: RandomFaultWeights::default(),
            write_log: true,
            poll_every_cycle: false,
            seed: None,
        }
    }
}

impl InjectorConfig {
    /// The probability the scheduler actually uses.
    pub fn effective_probability(&self) -> f64 {
        if self.poll_every_cycle {
            1.0
        } else {
            self.probability
        }
    }

    /// Whether the engine does anything at all.
    pub fn is_enabled(&self) -> bool {
        self.effective_probability() > 0.0
    }
}
