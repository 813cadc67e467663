use super::opportunity::{Opportunity, Snapshot, Tree};
use crate::ReducerContext;

/// Enumerate opportunities of one kind of edit.
///
/// Finders are stateless: the result only depends on the snapshot and the
/// context's flags, and it is sorted by ascending depth.
pub trait OpportunityFinder<T: Tree> {
    fn name(&self) -> &'static str;

    fn find_opportunities(
        &self,
        snapshot: &Snapshot<T>,
        ctx: &ReducerContext,
    ) -> Vec<Opportunity<T>>;
}

impl<T: Tree, F: OpportunityFinder<T> + ?Sized> OpportunityFinder<T> for Box<F> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn find_opportunities(
        &self,
        snapshot: &Snapshot<T>,
        ctx: &ReducerContext,
    ) -> Vec<Opportunity<T>> {
        (**self).find_opportunities(snapshot, ctx)
    }
}
