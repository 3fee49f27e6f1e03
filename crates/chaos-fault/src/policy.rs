//! Mask generation and fault-type resolution.
//!
//! A [`FaultPolicy`] is built once per engine and consulted on every
//! firing: first for the bit mask, then for the concrete fault type.

use log::warn;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::config::{FaultType, InjectorConfig, RandomFaultWeights};
use crate::engine::BuildError;
use crate::ledger::StuckKind;

/// A fault type with the `random` alternative resolved away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedFaultType {
    BitFlip,
    StuckAtZero,
    StuckAtOne,
}

impl AppliedFaultType {
    pub fn as_str(self) -> &'static str {
        match self {
            AppliedFaultType::BitFlip => "bit_flip",
            AppliedFaultType::StuckAtZero => "stuck_at_zero",
            AppliedFaultType::StuckAtOne => "stuck_at_one",
        }
    }

    /// Apply the mutation to a value.
    #[inline]
    pub fn apply(self, value: u64, mask: u64) -> u64 {
        match self {
            AppliedFaultType::BitFlip => value ^ mask,
            AppliedFaultType::StuckAtZero => value & !mask,
            AppliedFaultType::StuckAtOne => value | mask,
        }
    }

    /// The permanent kind, if this mutation is a stuck-at.
    pub fn stuck_kind(self) -> Option<StuckKind> {
        match self {
            AppliedFaultType::BitFlip => None,
            AppliedFaultType::StuckAtZero => Some(StuckKind::Zero),
            AppliedFaultType::StuckAtOne => Some(StuckKind::One),
        }
    }
}

impl std::fmt::Display for AppliedFaultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a binary-string mask and check it fits in `mask_bits` bits.
pub fn parse_fault_mask(mask: &str, mask_bits: u32) -> Result<u64, BuildError> {
    let value = u64::from_str_radix(mask, 2).map_err(|e| BuildError::InvalidFaultMask {
        mask: mask.to_owned(),
        reason: e.to_string(),
    })?;
    if mask_bits < 64 && value >> mask_bits != 0 {
        return Err(BuildError::InvalidFaultMask {
            mask: mask.to_owned(),
            reason: format!("wider than {mask_bits} bits"),
        });
    }
    Ok(value)
}

/// Per-firing fault resolution: mask, then type.
#[derive(Debug)]
pub struct FaultPolicy {
    fault_type: FaultType,
    /// Non-zero overrides random mask generation.
    mask_override: u64,
    bits_to_change: u32,
    mask_bits: u32,
    type_mix: WeightedIndex<f64>,
}

impl FaultPolicy {
    /// Resolve the configuration into a policy for `mask_bits`-wide masks.
    ///
    /// `bits_to_change == -1` is randomised here (with a warning, so runs
    /// record the substitution); weights that do not sum to 1.0 are
    /// replaced by the default mix, also with a warning.
    pub fn new(
        cfg: &InjectorConfig,
        mask_bits: u32,
        rng: &mut ChaCha20Rng,
    ) -> Result<Self, BuildError> {
        let mask_override = parse_fault_mask(&cfg.fault_mask, mask_bits)?;

        let bits_to_change = match cfg.bits_to_change {
            -1 => {
                let n = rng.gen_range(1..=mask_bits);
                warn!("bits_to_change is -1, randomising to {n}");
                n
            }
            b if b >= 1 && (b as u32) <= mask_bits => b as u32,
            other => return Err(BuildError::InvalidBitsToChange(other, mask_bits)),
        };

        let weights = if cfg.random_weights.is_normalized() {
            cfg.random_weights
        } else {
            warn!(
                "sum of fault-type probabilities is not 1, assuming 0.9 for \
                 bit_flip, 0.05 for stuck_at_zero and 0.05 for stuck_at_one"
            );
            RandomFaultWeights::default()
        };
        let type_mix = WeightedIndex::new([
            weights.bit_flip,
            weights.stuck_at_zero,
            weights.stuck_at_one,
        ])
        .map_err(|e| BuildError::InvalidWeights(e.to_string()))?;

        Ok(Self {
            fault_type: cfg.fault_type,
            mask_override,
            bits_to_change,
            mask_bits,
            type_mix,
        })
    }

    /// Produce the mask for one sub-firing.
    ///
    /// The configured mask wins when non-zero.  Otherwise `bits_to_change`
    /// positions are drawn *with replacement*, so the popcount may come
    /// out lower than the configured count.
    pub fn resolve_mask(&self, rng: &mut ChaCha20Rng) -> u64 {
        if self.mask_override != 0 {
            return self.mask_override;
        }
        let mut mask = 0u64;
        for _ in 0..self.bits_to_change {
            mask |= 1u64 << rng.gen_range(0..self.mask_bits);
        }
        mask
    }

    /// Resolve the fault type for one firing.
    pub fn resolve_type(&self, rng: &mut ChaCha20Rng) -> AppliedFaultType {
        match self.fault_type {
            FaultType::BitFlip => AppliedFaultType::BitFlip,
            FaultType::StuckAtZero => AppliedFaultType::StuckAtZero,
            FaultType::StuckAtOne => AppliedFaultType::StuckAtOne,
            FaultType::Random => match self.type_mix.sample(rng) {
                0 => AppliedFaultType::BitFlip,
                1 => AppliedFaultType::StuckAtZero,
                _ => AppliedFaultType::StuckAtOne,
            },
        }
    }

    /// Mask width this policy generates for.
    pub fn mask_bits(&self) -> u32 {
        self.mask_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng(seed: u64) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(seed)
    }

    fn policy(cfg: &InjectorConfig, bits: u32, seed: u64) -> FaultPolicy {
        FaultPolicy::new(cfg, bits, &mut rng(seed)).unwrap()
    }

    #[test]
    fn mask_override_wins() {
        let cfg = InjectorConfig {
            fault_mask: "11110000".to_owned(),
            bits_to_change: 1,
            ..Default::default()
        };
        let p = policy(&cfg, 8, 1);
        let mut r = rng(2);
        for _ in 0..32 {
            assert_eq!(p.resolve_mask(&mut r), 0b1111_0000);
        }
    }

    #[test]
    fn random_mask_popcount_bounded_by_bits_to_change() {
        let cfg = InjectorConfig {
            bits_to_change: 3,
            ..Default::default()
        };
        let p = policy(&cfg, 8, 1);
        let mut r = rng(3);
        for _ in 0..256 {
            let mask = p.resolve_mask(&mut r);
            assert_ne!(mask, 0);
            assert!(mask < 256);
            assert!(mask.count_ones() <= 3);
        }
    }

    #[test]
    fn word_masks_stay_in_word_range() {
        let cfg = InjectorConfig {
            bits_to_change: 32,
            ..Default::default()
        };
        let p = policy(&cfg, 32, 7);
        let mut r = rng(8);
        for _ in 0..64 {
            assert_eq!(p.resolve_mask(&mut r) >> 32, 0);
        }
    }

    #[test]
    fn bit_flip_twice_is_identity() {
        let mask = 0b0101_0110u64;
        let v = 0xA7u64;
        let once = AppliedFaultType::BitFlip.apply(v, mask);
        assert_eq!(AppliedFaultType::BitFlip.apply(once, mask), v);
    }

    #[test]
    fn stuck_at_forces_masked_bits() {
        let mask = 0b1111_0000u64;
        for v in 0..=255u64 {
            let z = AppliedFaultType::StuckAtZero.apply(v, mask);
            assert_eq!(z & mask, 0);
            assert_eq!(z & !mask, v & !mask);

            let o = AppliedFaultType::StuckAtOne.apply(v, mask);
            assert_eq!(o & mask, mask);
            assert_eq!(o & !mask, v & !mask);
        }
    }

    #[test]
    fn forced_type_ignores_mix() {
        let cfg = InjectorConfig {
            fault_type: FaultType::StuckAtOne,
            bits_to_change: 1,
            ..Default::default()
        };
        let p = policy(&cfg, 8, 1);
        let mut r = rng(4);
        for _ in 0..16 {
            assert_eq!(p.resolve_type(&mut r), AppliedFaultType::StuckAtOne);
        }
    }

    #[test]
    fn random_type_follows_configured_mix() {
        let cfg = InjectorConfig {
            fault_type: FaultType::Random,
            bits_to_change: 1,
            random_weights: RandomFaultWeights {
                bit_flip: 0.0,
                stuck_at_zero: 0.0,
                stuck_at_one: 1.0,
            },
            ..Default::default()
        };
        let p = policy(&cfg, 8, 1);
        let mut r = rng(5);
        for _ in 0..32 {
            assert_eq!(p.resolve_type(&mut r), AppliedFaultType::StuckAtOne);
        }
    }

    #[test]
    fn unnormalized_weights_fall_back_to_default() {
        let cfg = InjectorConfig {
            fault_type: FaultType::Random,
            bits_to_change: 1,
            random_weights: RandomFaultWeights {
                bit_flip: 5.0,
                stuck_at_zero: 5.0,
                stuck_at_one: 5.0,
            },
            ..Default::default()
        };
        // With the 0.9/0.05/0.05 fallback, bit flips must dominate.
        let p = policy(&cfg, 8, 1);
        let mut r = rng(6);
        let flips = (0..1000)
            .filter(|_| p.resolve_type(&mut r) == AppliedFaultType::BitFlip)
            .count();
        assert!(flips > 800, "got {flips} bit flips out of 1000");
    }

    #[test]
    fn negative_bits_other_than_sentinel_rejected() {
        let cfg = InjectorConfig {
            bits_to_change: -3,
            ..Default::default()
        };
        assert!(matches!(
            FaultPolicy::new(&cfg, 8, &mut rng(1)),
            Err(BuildError::InvalidBitsToChange(-3, 8))
        ));
    }

    #[test]
    fn oversized_bits_rejected() {
        let cfg = InjectorConfig {
            bits_to_change: 9,
            ..Default::default()
        };
        assert!(FaultPolicy::new(&cfg, 8, &mut rng(1)).is_err());
    }

    #[test]
    fn randomized_bits_land_in_range() {
        let cfg = InjectorConfig {
            bits_to_change: -1,
            ..Default::default()
        };
        for seed in 0..32 {
            let p = policy(&cfg, 8, seed);
            assert!((1..=8).contains(&p.bits_to_change));
        }
    }

    #[test]
    fn mask_parse_rejects_garbage_and_overflow() {
        assert!(parse_fault_mask("0", 8).is_ok());
        assert_eq!(parse_fault_mask("11110000", 8).unwrap(), 0xF0);
        assert!(parse_fault_mask("2", 8).is_err());
        assert!(parse_fault_mask("111100001", 8).is_err());
        assert!(parse_fault_mask("", 8).is_err());
    }
}
