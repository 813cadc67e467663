//! Exhaustive pass: tries every opportunity, coarse chunks first.

use super::{sorted_opportunities, ReductionPass};
use crate::{OpportunityFinder, ReduceError, ReducerContext, Snapshot, Tree};

/// Systematic pass over one finder.
///
/// Opportunities are tried in chunks of `granularity` consecutive items of
/// the depth-sorted enumeration. A chunk that does not keep the tree
/// interesting is skipped; after a whole sweep the granularity is halved,
/// down to single opportunities.
pub struct SystematicPass<F> {
    finder: F,
    initialized: bool,
    index: usize,
    granularity: usize,
    maximum_granularity: usize,
}

impl<F> SystematicPass<F> {
    pub fn new(finder: F) -> Self {
        Self::with_maximum_granularity(finder, usize::MAX)
    }

    pub fn with_maximum_granularity(finder: F, maximum_granularity: usize) -> Self {
        Self {
            finder,
            initialized: false,
            index: 0,
            granularity: 0,
            maximum_granularity: maximum_granularity.max(1),
        }
    }

    pub fn granularity(&self) -> Option<usize> {
        self.initialized.then_some(self.granularity)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn notify_interesting(&mut self, interesting: bool) {
        // indices shift after an accepted step, so the same position is probed again
        if !interesting {
            self.index += self.granularity;
        }
    }

    /// An uninitialized pass counts as unbounded granularity.
    pub fn reached_minimum_granularity(&self) -> bool {
        self.initialized && self.granularity == 1
    }
}

impl<T: Tree, F: OpportunityFinder<T>> ReductionPass<T> for SystematicPass<F> {
    fn name(&self) -> &'static str {
        self.finder.name()
    }

    fn try_apply_reduction(
        &mut self,
        tree: &Snapshot<T>,
        ctx: &mut ReducerContext,
    ) -> eyre::Result<Option<Snapshot<T>>> {
        let mut working = tree.fork();
        let opportunities = sorted_opportunities(&self.finder, &working, ctx);

        if !self.initialized {
            self.initialized = true;
            self.index = 0;
            self.granularity = self.maximum_granularity.min(opportunities.len().max(1));
        }
        if self.granularity == 0 {
            return Err(ReduceError::ZeroGranularity(self.finder.name().to_string()).into());
        }

        if self.index >= opportunities.len() {
            // end of a sweep at this granularity
            self.index = 0;
            self.granularity = (self.granularity / 2).max(1);
            return Ok(None);
        }

        let end = opportunities.len().min(self.index + self.granularity);
        for opportunity in &opportunities[self.index..end] {
            working.apply(opportunity)?;
        }
        crate::log!(
            debug,
            "pass {} applied opportunities [{}, {}) of {}",
            self.finder.name(),
            self.index,
            end,
            opportunities.len()
        );
        Ok(Some(working))
    }

    fn notify_interesting(&mut self, interesting: bool) {
        SystematicPass::notify_interesting(self, interesting)
    }

    fn replenish(&mut self) {}

    fn reached_minimum_granularity(&self) -> bool {
        SystematicPass::reached_minimum_granularity(self)
    }

    fn describe(&self) -> String {
        if self.initialized {
            format!("granularity: {}, index: {}", self.granularity, self.index)
        } else {
            "uninitialized".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{ToyFinder, ToyTree};

    fn run_step(
        pass: &mut SystematicPass<ToyFinder>,
        tree: &Snapshot<ToyTree>,
        ctx: &mut ReducerContext,
    ) -> Option<Snapshot<ToyTree>> {
        pass.try_apply_reduction(tree, ctx).unwrap()
    }

    #[test]
    fn test_applies_in_depth_order() {
        let mut ctx = ReducerContext::new(0);
        let tree = Snapshot::new(ToyTree::with_depths(&[3, 1, 2]));
        let mut pass = SystematicPass::new(ToyFinder::default());
        let candidate = run_step(&mut pass, &tree, &mut ctx).unwrap();
        assert_eq!(pass.granularity(), Some(3));
        // ids 1, 2, 0 have depths 1, 2, 3
        assert_eq!(candidate.tree().applied(), &[1, 2, 0]);
        // the input is untouched
        assert_eq!(tree.tree().alive(), vec![0, 1, 2]);
        assert!(tree.tree().applied().is_empty());
    }

    #[test]
    fn test_granularity_halving() {
        let mut ctx = ReducerContext::new(0);
        let tree = Snapshot::new(ToyTree::with_depths(&[0; 8]));
        let mut pass = SystematicPass::with_maximum_granularity(ToyFinder::default(), 8);
        let mut seen = vec![];
        for _ in 0..100 {
            match run_step(&mut pass, &tree, &mut ctx) {
                Some(_) => pass.notify_interesting(false),
                None => {
                    let g = pass.granularity().unwrap();
                    assert!(g >= 1);
                    seen.push(g);
                    if pass.reached_minimum_granularity() {
                        break;
                    }
                }
            }
        }
        // halved after each failed sweep
        assert_eq!(seen, vec![4, 2, 1]);
        assert!(pass.reached_minimum_granularity());
    }

    #[test]
    fn test_chunks_cover_every_opportunity() {
        let mut ctx = ReducerContext::new(0);
        let tree = Snapshot::new(ToyTree::with_depths(&[0; 5]));
        let mut pass = SystematicPass::with_maximum_granularity(ToyFinder::default(), 2);
        let mut chunks = vec![];
        while let Some(candidate) = run_step(&mut pass, &tree, &mut ctx) {
            chunks.push(candidate.tree().applied().to_vec());
            pass.notify_interesting(false);
        }
        assert_eq!(chunks, vec![vec![0, 1], vec![2, 3], vec![4]]);
        assert_eq!(pass.granularity(), Some(1));
        assert!(pass.reached_minimum_granularity());
        // sweeps at the minimum go on
        assert!(run_step(&mut pass, &tree, &mut ctx).is_some());
        assert_eq!(pass.granularity(), Some(1));
    }

    #[test]
    fn test_interesting_keeps_position() {
        let mut ctx = ReducerContext::new(0);
        let mut tree = Snapshot::new(ToyTree::with_depths(&[0; 4]));
        let mut pass = SystematicPass::with_maximum_granularity(ToyFinder::default(), 1);
        let candidate = run_step(&mut pass, &tree, &mut ctx).unwrap();
        assert_eq!(candidate.tree().alive(), vec![1, 2, 3]);
        pass.notify_interesting(true);
        tree = candidate;
        assert_eq!(pass.index(), 0);
        let candidate = run_step(&mut pass, &tree, &mut ctx).unwrap();
        assert_eq!(candidate.tree().alive(), vec![2, 3]);
    }

    #[test]
    fn test_empty_finder() {
        let mut ctx = ReducerContext::new(0);
        let tree = Snapshot::new(ToyTree::with_depths(&[]));
        let mut pass = SystematicPass::new(ToyFinder::default());
        assert!(!pass.reached_minimum_granularity());
        assert!(run_step(&mut pass, &tree, &mut ctx).is_none());
        assert_eq!(pass.granularity(), Some(1));
        assert!(pass.reached_minimum_granularity());
    }
}
