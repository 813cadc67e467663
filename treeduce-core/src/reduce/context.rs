//! Session-wide state threaded through every finder and pass call.

use super::rng::{rng_from_seed, RngState, SelectionSkew};
use crate::{config, ReduceError};

/// Context of one reduction session.
///
/// It owns the only random source of the session: every random choice made by
/// passes is drawn from here in a fixed order, so `(seed, initial tree)`
/// determines the whole sequence of candidates.
#[derive(Debug, Clone)]
pub struct ReducerContext {
    pub(crate) rng: RngState,
    pub(crate) skew: SelectionSkew,
    seed: u64,
    max_percentage_to_reduce: u32,
    aggression_decrease_step: u32,
    reduce_everywhere: bool,
}

impl ReducerContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: rng_from_seed(seed),
            skew: SelectionSkew::default(),
            seed,
            max_percentage_to_reduce: config::DEFAULT_MAX_PERCENTAGE_TO_REDUCE,
            aggression_decrease_step: config::DEFAULT_AGGRESSION_DECREASE_STEP,
            reduce_everywhere: false,
        }
    }

    /// Build the context described by command line config.
    pub fn from_config(config: &config::Config) -> eyre::Result<Self> {
        Ok(Self::new(config.seed())
            .with_max_percentage_to_reduce(config.max_percentage)?
            .with_aggression_decrease_step(config.aggression_step)
            .with_reduce_everywhere(config.reduce_everywhere)
            .with_skew(config.skew))
    }

    pub fn with_max_percentage_to_reduce(mut self, percentage: u32) -> eyre::Result<Self> {
        if percentage > 100 {
            return Err(ReduceError::InvalidConfig(format!(
                "percentage to reduce should be in [0, 100], got {percentage}"
            ))
            .into());
        }
        self.max_percentage_to_reduce = percentage;
        Ok(self)
    }

    pub fn with_aggression_decrease_step(mut self, step: u32) -> Self {
        self.aggression_decrease_step = step;
        self
    }

    pub fn with_reduce_everywhere(mut self, reduce_everywhere: bool) -> Self {
        self.reduce_everywhere = reduce_everywhere;
        self
    }

    pub fn with_skew(mut self, skew: SelectionSkew) -> Self {
        self.skew = skew;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn max_percentage_to_reduce(&self) -> u32 {
        self.max_percentage_to_reduce
    }

    pub fn aggression_decrease_step(&self) -> u32 {
        self.aggression_decrease_step
    }

    /// Finders may also touch code that is normally protected.
    pub fn reduce_everywhere(&self) -> bool {
        self.reduce_everywhere
    }
}

#[test]
fn test_context_percentage_bound() {
    assert!(ReducerContext::new(0)
        .with_max_percentage_to_reduce(101)
        .is_err());
    let ctx = ReducerContext::new(0)
        .with_max_percentage_to_reduce(100)
        .unwrap();
    assert_eq!(ctx.max_percentage_to_reduce(), 100);
    assert_eq!(
        ReducerContext::new(0).aggression_decrease_step(),
        config::DEFAULT_AGGRESSION_DECREASE_STEP
    );
}
