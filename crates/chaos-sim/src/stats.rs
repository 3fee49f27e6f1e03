//! Named scalar statistics.
//!
//! Components expose counters as named [`Scalar`]s collected into a
//! [`StatGroup`], mirroring how simulators register per-object statistics
//! with a central dump at end of run.

use std::fmt::Write as _;

/// A single named counter.
#[derive(Debug, Clone)]
pub struct Scalar {
    name: &'static str,
    desc: &'static str,
    value: u64,
}

impl Scalar {
    /// Create a counter starting at zero.
    pub const fn new(name: &'static str, desc: &'static str) -> Self {
        Self {
            name,
            desc,
            value: 0,
        }
    }

    /// Increment by one.
    #[inline]
    pub fn inc(&mut self) {
        self.value += 1;
    }

    /// Add `n`.
    #[inline]
    pub fn add(&mut self, n: u64) {
        self.value += n;
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Statistic name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// One-line description.
    pub fn desc(&self) -> &'static str {
        self.desc
    }
}

/// A named group of scalar statistics.
pub trait StatGroup {
    /// Name the group's scalars are reported under.
    fn group_name(&self) -> &str;

    /// The group's scalars, in reporting order.
    fn scalars(&self) -> Vec<&Scalar>;

    /// Render the group in `name.stat value # desc` form.
    fn dump(&self) -> String {
        let mut out = String::new();
        for s in self.scalars() {
            let _ = writeln!(
                out,
                "{}.{:<24} {:>12} # {}",
                self.group_name(),
                s.name(),
                s.value(),
                s.desc()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Demo {
        hits: Scalar,
        misses: Scalar,
    }

    impl StatGroup for Demo {
        fn group_name(&self) -> &str {
            "demo"
        }

        fn scalars(&self) -> Vec<&Scalar> {
            vec![&self.hits, &self.misses]
        }
    }

    #[test]
    fn counters_accumulate() {
        let mut s = Scalar::new("hits", "number of hits");
        s.inc();
        s.add(4);
        assert_eq!(s.value(), 5);
    }

    #[test]
    fn dump_contains_all_scalars() {
        let mut demo = Demo {
            hits: Scalar::new("hits", "number of hits"),
            misses: Scalar::new("misses", "number of misses"),
        };
        demo.hits.add(3);

        let dump = demo.dump();
        assert!(dump.contains("demo.hits"));
        assert!(dump.contains("demo.misses"));
        assert!(dump.contains("# number of hits"));
    }
}
