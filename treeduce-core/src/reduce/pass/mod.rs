//! Reduction passes: strategies that turn "all current opportunities of one
//! kind" into "the next candidate to test".

mod randomized;
mod systematic;

pub use randomized::*;
pub use systematic::*;

use super::{
    finder::OpportunityFinder,
    opportunity::{sort_by_depth, Opportunity, Snapshot, Tree},
};
use crate::ReducerContext;

pub trait ReductionPass<T: Tree> {
    /// Name of the underlying finder.
    fn name(&self) -> &'static str;

    /// Produce a reduced copy of `tree`, or `None` if this pass has nothing
    /// left to try for now. `tree` itself is never modified.
    fn try_apply_reduction(
        &mut self,
        tree: &Snapshot<T>,
        ctx: &mut ReducerContext,
    ) -> eyre::Result<Option<Snapshot<T>>>;

    /// Feedback on the last candidate returned by `try_apply_reduction`.
    fn notify_interesting(&mut self, interesting: bool);

    /// Called when the pass is exhausted, in case it gets used again later.
    fn replenish(&mut self);

    /// Whether a further sweep of this pass could try something new.
    fn reached_minimum_granularity(&self) -> bool;

    /// The manager is leaving this pass, search-local state should be dropped.
    fn suspend(&mut self) {}

    /// Short description of the pass state, for logging.
    fn describe(&self) -> String;
}

/// Enumerate opportunities and sort them in the order they must be applied.
fn sorted_opportunities<T: Tree, F: OpportunityFinder<T>>(
    finder: &F,
    snapshot: &Snapshot<T>,
    ctx: &ReducerContext,
) -> Vec<Opportunity<T>> {
    let mut opportunities = finder.find_opportunities(snapshot, ctx);
    sort_by_depth(&mut opportunities);
    opportunities
}
