use std::sync::atomic::{AtomicU32, Ordering};

use crate::tuning::FIRST_PLAYER_ID;

/// Small xorshift64* generator for simulation randomness.
///
/// The bot walk draws from this several hundred times per tick; it needs
/// speed and decent distribution, not cryptographic quality.
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    pub fn new(seed: u64) -> Self {
        // A zero state would lock the generator at zero forever.
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform in [lo, hi).
    pub fn range_f32(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }
}

/// Returns the next player id: monotonically increasing from
/// [`FIRST_PLAYER_ID`], never reused within a process run. Bot ids live
/// below this range, so the two kinds cannot collide.
pub fn next_player_id() -> u32 {
    static NEXT: AtomicU32 = AtomicU32::new(FIRST_PLAYER_ID);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_f32_stays_in_unit_interval() {
        let mut rng = XorShift64::new(42);
        for _ in 0..10_000 {
            let v = rng.next_f32();
            assert!((0.0..1.0).contains(&v), "v = {v}");
        }
    }

    #[test]
    fn range_respects_bounds() {
        let mut rng = XorShift64::new(7);
        for _ in 0..1_000 {
            let v = rng.range_f32(-3.0, 5.0);
            assert!((-3.0..5.0).contains(&v), "v = {v}");
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = XorShift64::new(99);
        let mut b = XorShift64::new(99);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn player_ids_are_monotonic_and_in_player_range() {
        let a = next_player_id();
        let b = next_player_id();
        assert!(a >= FIRST_PLAYER_ID);
        assert!(b > a);
    }
}
