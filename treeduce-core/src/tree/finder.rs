use clap::ValueEnum;

use super::{BlockEdit, BlockTree};
use crate::{
    sort_by_depth, Opportunity, OpportunityFinder, OpportunityKind, ReducerContext, Snapshot,
};

/// Finders available for block trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FinderType {
    /// Remove a single statement line
    Stmt,
    /// Remove a whole block
    Block,
    /// Replace a block by its content
    Unwrap,
}

impl FinderType {
    pub const ALL: [FinderType; 3] = [FinderType::Block, FinderType::Stmt, FinderType::Unwrap];

    pub fn finder(self) -> Box<dyn OpportunityFinder<BlockTree>> {
        match self {
            FinderType::Stmt => Box::new(StmtFinder),
            FinderType::Block => Box::new(BlockFinder),
            FinderType::Unwrap => Box::new(UnwrapFinder),
        }
    }
}

/// Collect opportunities for the attached nodes accepted by `f`.
fn collect<F>(
    snapshot: &Snapshot<BlockTree>,
    kind: OpportunityKind,
    f: F,
) -> Vec<Opportunity<BlockTree>>
where
    F: Fn(&BlockTree, super::NodeId) -> Option<BlockEdit>,
{
    let tree = snapshot.tree();
    let mut opportunities: Vec<_> = tree
        .walk()
        .into_iter()
        .filter_map(|(id, depth)| f(tree, id).map(|edit| snapshot.opportunity(kind, depth, edit)))
        .collect();
    sort_by_depth(&mut opportunities);
    opportunities
}

pub struct StmtFinder;

impl OpportunityFinder<BlockTree> for StmtFinder {
    fn name(&self) -> &'static str {
        "stmt"
    }

    fn find_opportunities(
        &self,
        snapshot: &Snapshot<BlockTree>,
        ctx: &ReducerContext,
    ) -> Vec<Opportunity<BlockTree>> {
        collect(snapshot, OpportunityKind::Stmt, |tree, id| {
            if tree.is_block(id) || (!ctx.reduce_everywhere() && tree.is_kept(id)) {
                return None;
            }
            Some(BlockEdit::RemoveStmt(id))
        })
    }
}

pub struct BlockFinder;

impl OpportunityFinder<BlockTree> for BlockFinder {
    fn name(&self) -> &'static str {
        "block"
    }

    fn find_opportunities(
        &self,
        snapshot: &Snapshot<BlockTree>,
        ctx: &ReducerContext,
    ) -> Vec<Opportunity<BlockTree>> {
        collect(snapshot, OpportunityKind::Stmt, |tree, id| {
            if !tree.is_block(id) || (!ctx.reduce_everywhere() && tree.contains_kept(id)) {
                return None;
            }
            Some(BlockEdit::RemoveBlock(id))
        })
    }
}

pub struct UnwrapFinder;

impl OpportunityFinder<BlockTree> for UnwrapFinder {
    fn name(&self) -> &'static str {
        "unwrap"
    }

    fn find_opportunities(
        &self,
        snapshot: &Snapshot<BlockTree>,
        ctx: &ReducerContext,
    ) -> Vec<Opportunity<BlockTree>> {
        collect(snapshot, OpportunityKind::Unwrap, |tree, id| {
            if !tree.is_block(id) || tree.is_arm(id) {
                return None;
            }
            // unwrapping drops the `else` arms
            let kept = tree.is_kept(id) || tree.arms(id).iter().any(|a| tree.contains_kept(*a));
            if !ctx.reduce_everywhere() && kept {
                return None;
            }
            Some(BlockEdit::UnwrapBlock(id))
        })
    }
}
