//! Injection counters.

use chaos_sim::stats::{Scalar, StatGroup};

use crate::policy::AppliedFaultType;

/// Counters every engine maintains, one increment pair per logged injection.
#[derive(Debug)]
pub struct InjectorStats {
    name: String,
    pub num_faults_injected: Scalar,
    pub num_bit_flips: Scalar,
    pub num_stuck_at_zero: Scalar,
    pub num_stuck_at_one: Scalar,
    pub num_permanent_faults: Scalar,
}

impl InjectorStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            num_faults_injected: Scalar::new(
                "numFaultsInjected",
                "Total number of faults injected",
            ),
            num_bit_flips: Scalar::new("numBitFlips", "Number of bit flip faults injected"),
            num_stuck_at_zero: Scalar::new(
                "numStuckAtZero",
                "Number of stuck-at-0 faults injected",
            ),
            num_stuck_at_one: Scalar::new("numStuckAtOne", "Number of stuck-at-1 faults injected"),
            num_permanent_faults: Scalar::new(
                "numPermanentFaults",
                "Total number of permanent faults injected",
            ),
        }
    }

    /// Record one applied mutation: the total, the per-type counter, and
    /// the permanent total for stuck-ats.
    pub fn record(&mut self, fault_type: AppliedFaultType) {
        self.num_faults_injected.inc();
        match fault_type {
            AppliedFaultType::BitFlip => self.num_bit_flips.inc(),
            AppliedFaultType::StuckAtZero => {
                self.num_stuck_at_zero.inc();
                self.num_permanent_faults.inc();
            }
            AppliedFaultType::StuckAtOne => {
                self.num_stuck_at_one.inc();
                self.num_permanent_faults.inc();
            }
        }
    }
}

impl StatGroup for InjectorStats {
    fn group_name(&self) -> &str {
        &self.name
    }

    fn scalars(&self) -> Vec<&Scalar> {
        vec![
            &self.num_faults_injected,
            &self.num_bit_flips,
            &self.num_stuck_at_zero,
            &self.num_stuck_at_one,
            &self.num_permanent_faults,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_type_counters_sum_to_total() {
        let mut stats = InjectorStats::new("test");
        stats.record(AppliedFaultType::BitFlip);
        stats.record(AppliedFaultType::StuckAtZero);
        stats.record(AppliedFaultType::StuckAtOne);
        stats.record(AppliedFaultType::StuckAtOne);

        assert_eq!(stats.num_faults_injected.value(), 4);
        assert_eq!(
            stats.num_faults_injected.value(),
            stats.num_bit_flips.value()
                + stats.num_stuck_at_zero.value()
                + stats.num_stuck_at_one.value()
        );
        assert_eq!(
            stats.num_permanent_faults.value(),
            stats.num_stuck_at_zero.value() + stats.num_stuck_at_one.value()
        );
    }

    #[test]
    fn dump_uses_engine_name() {
        let mut stats = InjectorStats::new("chaos_cache");
        stats.record(AppliedFaultType::BitFlip);
        let dump = stats.dump();
        assert!(dump.contains("chaos_cache.numFaultsInjected"));
        assert!(dump.contains("chaos_cache.numBitFlips"));
    }
}
