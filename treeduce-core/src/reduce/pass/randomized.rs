//! Percentage based pass: takes a random batch of mutually compatible
//! opportunities, and cools down when batches keep failing.

use std::collections::BTreeSet;

use super::{sorted_opportunities, ReductionPass};
use crate::{compatible, OpportunityFinder, ReduceError, ReducerContext, Snapshot, Tree};

pub struct RandomizedPass<F> {
    finder: F,
    max_percentage_to_reduce: u32,
    aggression_decrease_step: u32,
    percentage_to_reduce: u32,
    replenish_count: u32,
    /// Indices (into the last sorted enumeration) taken in rejected batches.
    history: BTreeSet<usize>,
}

impl<F> RandomizedPass<F> {
    pub fn new(finder: F, ctx: &ReducerContext) -> Self {
        let max_percentage_to_reduce = ctx.max_percentage_to_reduce().min(100);
        Self {
            finder,
            max_percentage_to_reduce,
            aggression_decrease_step: ctx.aggression_decrease_step(),
            percentage_to_reduce: max_percentage_to_reduce,
            replenish_count: 0,
            history: BTreeSet::new(),
        }
    }

    pub fn percentage_to_reduce(&self) -> u32 {
        self.percentage_to_reduce
    }

    pub fn history(&self) -> &BTreeSet<usize> {
        &self.history
    }

    pub fn notify_interesting(&mut self, interesting: bool) {
        if interesting {
            self.history.clear();
        } else {
            self.percentage_to_reduce = self
                .percentage_to_reduce
                .saturating_sub(self.aggression_decrease_step);
        }
    }

    pub fn replenish(&mut self) {
        self.replenish_count += 1;
        self.history.clear();
        let percentage = self
            .max_percentage_to_reduce
            .checked_shr(self.replenish_count)
            .unwrap_or(0);
        self.percentage_to_reduce = percentage.max(1);
    }
}

/// Number of opportunities to take out of `count` for `percentage`.
pub fn opportunities_to_take(count: usize, percentage: u32) -> usize {
    if percentage == 0 {
        return 1;
    }
    let wanted = (percentage as usize * count + 99) / 100;
    wanted.max(1)
}

impl<F> RandomizedPass<F> {
    /// Try to transform `working` by taking about `percentage` percent of
    /// its opportunities. Returns false, leaving `working` untouched, if
    /// every opportunity has already been tried.
    fn attempt_to_transform<T: Tree>(
        &mut self,
        working: &mut Snapshot<T>,
        percentage: u32,
        ctx: &mut ReducerContext,
    ) -> eyre::Result<bool>
    where
        F: OpportunityFinder<T>,
    {
        crate::log!(debug, "looking for opportunities of kind: {}", self.finder.name());
        crate::log!(trace, "applying {}% reduction", percentage);

        let opportunities = sorted_opportunities(&self.finder, working, ctx);
        if let Some(&index) = self.history.range(opportunities.len()..).next() {
            return Err(ReduceError::HistoryDesync {
                pass: self.finder.name().to_string(),
                index,
                count: opportunities.len(),
            }
            .into());
        }

        // opportunities that were part of a rejected batch are not taken first again
        let mut options: Vec<usize> = (0..opportunities.len())
            .filter(|i| !self.history.contains(i))
            .collect();
        if options.is_empty() {
            return Ok(false);
        }

        let to_take = opportunities_to_take(opportunities.len(), percentage);
        let mut taken = 0;
        while taken < to_take && !options.is_empty() {
            let index = options.remove(ctx.skewed_index(options.len()));
            let opportunity = &opportunities[index];
            working.apply(opportunity)?;
            taken += 1;
            self.history.insert(index);
            let kind = opportunity.kind();
            options.retain(|&i| compatible(kind, opportunities[i].kind()));
        }

        // top up with whatever is available in the partially reduced tree
        while taken < to_take {
            let current = self.finder.find_opportunities(working, ctx);
            if current.is_empty() {
                break;
            }
            let next = &current[ctx.gen_index(current.len())];
            crate::log!(trace, "next reduction opportunity: {:?}", next);
            working.apply(next)?;
            taken += 1;
        }

        crate::log!(debug, "took {} reduction opportunities", taken);
        Ok(true)
    }
}

impl<T: Tree, F: OpportunityFinder<T>> ReductionPass<T> for RandomizedPass<F> {
    fn name(&self) -> &'static str {
        self.finder.name()
    }

    fn try_apply_reduction(
        &mut self,
        tree: &Snapshot<T>,
        ctx: &mut ReducerContext,
    ) -> eyre::Result<Option<Snapshot<T>>> {
        let mut working = tree.fork();
        let mut local_percentage = self.percentage_to_reduce;
        loop {
            if self.attempt_to_transform(&mut working, local_percentage, ctx)? {
                return Ok(Some(working));
            }
            local_percentage /= 2;
            self.history.clear();
            if local_percentage == 0 {
                return Ok(None);
            }
        }
    }

    fn notify_interesting(&mut self, interesting: bool) {
        RandomizedPass::notify_interesting(self, interesting)
    }

    fn replenish(&mut self) {
        RandomizedPass::replenish(self)
    }

    /// This pass has no granularity, it only reports no step once every
    /// opportunity has been tried on its own.
    fn reached_minimum_granularity(&self) -> bool {
        true
    }

    fn suspend(&mut self) {
        self.history.clear();
    }

    fn describe(&self) -> String {
        format!(
            "percentage: {}, replenished: {}, history: {}",
            self.percentage_to_reduce,
            self.replenish_count,
            self.history.len()
        )
    }
}
