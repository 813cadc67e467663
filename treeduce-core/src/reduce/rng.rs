use clap::ValueEnum;
use rand::prelude::*;

use super::pcg::Pcg32;
use crate::ReducerContext;

pub type RngState = Pcg32;

#[inline]
pub fn rng_from_seed(seed: u64) -> RngState {
    Pcg32::seed_from_u64(seed)
}

/// How the randomized pass picks the next candidate from its option list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum SelectionSkew {
    /// Draw `r` uniformly and take `(n - 1) - r`.
    #[default]
    Uniform,
    /// Bias toward the front of the (depth-sorted) option list.
    PreferEarly,
}

impl ReducerContext {
    /// Uniform index in `0..len`, `len` must be positive.
    #[inline]
    pub fn gen_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        self.rng.gen_range(0..len)
    }

    /// Index in `0..len` drawn according to the context's skew.
    pub fn skewed_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        let last = len - 1;
        let index = match self.skew {
            SelectionSkew::Uniform => last - self.gen_index(len),
            SelectionSkew::PreferEarly => {
                let u: f64 = self.rng.gen();
                let index = (last as f64 * (1.0 - u.sqrt())).floor() as usize;
                index.min(last)
            }
        };
        debug_assert!(index < len);
        index
    }

    pub fn rng_state(&self) -> &RngState {
        &self.rng
    }
}

#[test]
fn test_skewed_index_in_range() {
    for skew in [SelectionSkew::Uniform, SelectionSkew::PreferEarly] {
        let mut ctx = ReducerContext::new(7).with_skew(skew);
        for len in 1..20 {
            for _ in 0..50 {
                assert!(ctx.skewed_index(len) < len);
            }
        }
        assert_eq!(ctx.skewed_index(1), 0);
    }
}

#[test]
fn test_prefer_early_is_biased() {
    let mut ctx = ReducerContext::new(11).with_skew(SelectionSkew::PreferEarly);
    let mut front = 0;
    for _ in 0..1000 {
        if ctx.skewed_index(10) < 5 {
            front += 1;
        }
    }
    assert!(front > 600, "front half chosen {front} times");
}

#[test]
fn test_same_seed_same_draws() {
    let mut a = ReducerContext::new(1234);
    let mut b = ReducerContext::new(1234);
    let xs: Vec<usize> = (0..32).map(|_| a.skewed_index(100)).collect();
    let ys: Vec<usize> = (0..32).map(|_| b.skewed_index(100)).collect();
    assert_eq!(xs, ys);
    assert_eq!(a.rng_state(), b.rng_state());
}
