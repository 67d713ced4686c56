//! Scripted fault injection for the mock front end.
//!
//! Faults are keyed by block index (the n-th `get_block` call since the stream
//! started), which keeps failure tests deterministic.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// One injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The fetch times out.
    Timeout,
    /// The hardware reports lost samples.
    Overflow,
    /// The block arrives with only this many samples per channel.
    ShortBlock(usize),
    /// Channels after the first carry this many samples instead of a full block.
    UnevenChannels(usize),
    /// The device fails permanently.
    Fatal,
}

/// Fault schedule consulted on every block fetch.
#[derive(Debug, Clone, Default)]
pub struct FaultScript {
    scheduled: HashMap<u64, Fault>,
    fatal_after: Option<u64>,
    random_overflow: Option<(f64, ChaCha8Rng)>,
}

impl FaultScript {
    /// Script with no faults.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Inject `fault` on fetch number `block`.
    #[must_use]
    pub fn at(mut self, block: u64, fault: Fault) -> Self {
        self.scheduled.insert(block, fault);
        self
    }

    /// Every fetch from number `blocks` onward fails fatally.
    #[must_use]
    pub fn fatal_after(mut self, blocks: u64) -> Self {
        self.fatal_after = Some(blocks);
        self
    }

    /// Report overflows on a random `rate` fraction of fetches.
    #[must_use]
    pub fn random_overflows(mut self, rate: f64, seed: u64) -> Self {
        self.random_overflow = Some((rate.clamp(0.0, 1.0), ChaCha8Rng::seed_from_u64(seed)));
        self
    }

    /// Fault for fetch number `block`, if any.
    pub fn fault_for(&mut self, block: u64) -> Option<Fault> {
        if self.fatal_after.is_some_and(|n| block >= n) {
            return Some(Fault::Fatal);
        }
        if let Some(fault) = self.scheduled.get(&block) {
            return Some(*fault);
        }
        match &mut self.random_overflow {
            Some((rate, rng)) => rng.gen_bool(*rate).then_some(Fault::Overflow),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_and_fatal() {
        let mut script = FaultScript::none()
            .at(2, Fault::Timeout)
            .at(3, Fault::ShortBlock(10))
            .fatal_after(5);
        assert_eq!(script.fault_for(0), None);
        assert_eq!(script.fault_for(2), Some(Fault::Timeout));
        assert_eq!(script.fault_for(3), Some(Fault::ShortBlock(10)));
        assert_eq!(script.fault_for(5), Some(Fault::Fatal));
        assert_eq!(script.fault_for(900), Some(Fault::Fatal));
    }

    #[test]
    fn test_random_overflows_are_seeded() {
        let run = || {
            let mut script = FaultScript::none().random_overflows(0.3, 99);
            (0..200).map(|i| script.fault_for(i)).collect::<Vec<_>>()
        };
        let a = run();
        assert_eq!(a, run());
        let hits = a.iter().filter(|f| f.is_some()).count();
        assert!(hits > 20 && hits < 120, "hits = {hits}");
    }
}
