//! Reduction opportunities and the tree snapshots they are bound to.

use std::{
    fmt,
    hash::Hash,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::ReduceError;

/// Tree that can be reduced.
///
/// A clone must be structurally independent of the original. `Edit`
/// describes one atomic change in terms the tree itself understands (e.g. node
/// ids of an arena), so an edit found on a clone stays meaningful for it.
pub trait Tree: Clone + Hash + fmt::Debug {
    type Edit: Clone + fmt::Debug;

    /// Whether `edit` still applies. An earlier edit of the same batch may
    /// have removed its target already, such an edit is skipped.
    fn precondition_holds(&self, _edit: &Self::Edit) -> bool {
        true
    }

    /// Perform `edit` in place.
    fn apply_edit(&mut self, edit: &Self::Edit) -> eyre::Result<()>;

    /// Rough size of the tree, only used for reporting.
    fn size(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(u64);

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

impl SnapshotId {
    fn fresh() -> Self {
        Self(NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A tree instance with an identity.
///
/// Opportunities remember the snapshot they were found on, and can only be
/// applied to it. There is no `Clone`: use `fork` to get an independent copy
/// with a new identity.
#[derive(Debug)]
pub struct Snapshot<T> {
    id: SnapshotId,
    tree: T,
}

impl<T: Tree> Snapshot<T> {
    pub fn new(tree: T) -> Self {
        Self {
            id: SnapshotId::fresh(),
            tree,
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn into_tree(self) -> T {
        self.tree
    }

    /// Deep copy into a new snapshot.
    pub fn fork(&self) -> Self {
        Self::new(self.tree.clone())
    }

    /// Create an opportunity bound to this snapshot.
    pub fn opportunity(
        &self,
        kind: OpportunityKind,
        depth: usize,
        edit: T::Edit,
    ) -> Opportunity<T> {
        Opportunity {
            snapshot: self.id,
            kind,
            depth,
            edit,
        }
    }

    /// Apply an opportunity that was found on this snapshot. Returns false if
    /// it was skipped because its precondition no longer holds.
    pub fn apply(&mut self, opportunity: &Opportunity<T>) -> eyre::Result<bool> {
        if opportunity.snapshot != self.id {
            return Err(ReduceError::StaleOpportunity {
                expected: opportunity.snapshot,
                found: self.id,
            }
            .into());
        }
        if !self.tree.precondition_holds(&opportunity.edit) {
            crate::log!(trace, "skip {:?}", opportunity);
            return Ok(false);
        }
        crate::log!(trace, "apply {:?}", opportunity);
        self.tree.apply_edit(&opportunity.edit)?;
        Ok(true)
    }
}

/// One candidate atomic edit of a tree.
pub struct Opportunity<T: Tree> {
    snapshot: SnapshotId,
    kind: OpportunityKind,
    depth: usize,
    edit: T::Edit,
}

impl<T: Tree> Opportunity<T> {
    pub fn kind(&self) -> OpportunityKind {
        self.kind
    }

    /// Distance from the root of the node to be edited.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn edit(&self) -> &T::Edit {
        &self.edit
    }

    pub fn snapshot(&self) -> SnapshotId {
        self.snapshot
    }
}

impl<T: Tree> fmt::Debug for Opportunity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}@{} {:?} (snapshot {})",
            self.kind, self.depth, self.edit, self.snapshot.0
        )
    }
}

/// Stable sort by ascending depth.
pub fn sort_by_depth<T: Tree>(opportunities: &mut [Opportunity<T>]) {
    opportunities.sort_by_key(|o| o.depth);
}

/// Kinds of opportunities, used to decide which ones can share a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpportunityKind {
    /// Remove a statement (or a whole compound statement)
    Stmt,
    /// Remove an unused function or struct
    FunctionOrStruct,
    /// Remove a variable declaration
    VariableDecl,
    /// Remove a global variable declaration
    GlobalVariableDecl,
    /// Replace an expression by a constant or a sub-expression
    SimplifyExpr,
    /// Turn a compound statement into a plain block
    CompoundToBlock,
    /// Inline a variable initializer into its uses
    InlineInitializer,
    /// Inline a function call
    InlineFunction,
    /// Inline a uniform as a literal
    InlineUniform,
    /// Fold a constant expression
    FoldConstant,
    /// Undo an identity-preserving mutation
    IdentityMutation,
    /// Replace a block by its content
    Unwrap,
    /// Turn a switch back into plain statements
    Unswitchify,
    /// Undo a vectorization of variables
    Vectorization,
    /// Merge two consecutive loops
    LoopMerge,
    /// Remove an unused function parameter
    UnusedParam,
    /// Remove a write to a live output variable
    LiveOutputWrite,
    /// Undo an outlined statement
    OutlinedStatement,
    /// Remove a field of a struct
    RemoveStructField,
    /// Replace a struct by its fields
    Destructify,
    /// Inline a field of a structified variable
    InlineStructifiedField,
}

impl OpportunityKind {
    pub const ALL: [OpportunityKind; 21] = [
        Self::Stmt,
        Self::FunctionOrStruct,
        Self::VariableDecl,
        Self::GlobalVariableDecl,
        Self::SimplifyExpr,
        Self::CompoundToBlock,
        Self::InlineInitializer,
        Self::InlineFunction,
        Self::InlineUniform,
        Self::FoldConstant,
        Self::IdentityMutation,
        Self::Unwrap,
        Self::Unswitchify,
        Self::Vectorization,
        Self::LoopMerge,
        Self::UnusedParam,
        Self::LiveOutputWrite,
        Self::OutlinedStatement,
        Self::RemoveStructField,
        Self::Destructify,
        Self::InlineStructifiedField,
    ];

    /// Kinds that rewrite struct definitions or their uses.
    pub fn is_struct_related(self) -> bool {
        matches!(
            self,
            Self::InlineStructifiedField
                | Self::Destructify
                | Self::RemoveStructField
                | Self::OutlinedStatement
                | Self::SimplifyExpr
        )
    }
}

#[test]
fn test_apply_checks_snapshot() {
    use crate::test::{ToyEdit, ToyTree};
    let tree = ToyTree::with_depths(&[0, 1]);
    let mut a = Snapshot::new(tree);
    let mut b = a.fork();
    assert_ne!(a.id(), b.id());
    let opportunity = a.opportunity(OpportunityKind::Stmt, 0, ToyEdit::Remove(0));
    let err = b.apply(&opportunity).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReduceError>(),
        Some(ReduceError::StaleOpportunity { .. })
    ));
    assert!(a.apply(&opportunity).unwrap());
    assert_eq!(a.tree().alive(), vec![1]);
    // the item is gone already
    assert!(!a.apply(&opportunity).unwrap());
    assert_eq!(a.tree().applied(), &[0]);
    // the fork is not affected by edits to its origin
    assert_eq!(b.tree().alive(), vec![0, 1]);
}

#[test]
fn test_sort_by_depth_is_stable() {
    use crate::test::{ToyEdit, ToyTree};
    let snapshot = Snapshot::new(ToyTree::with_depths(&[3, 1, 2, 1]));
    let mut opportunities: Vec<_> = [(0, 3), (1, 1), (2, 2), (3, 1)]
        .iter()
        .map(|&(id, depth)| snapshot.opportunity(OpportunityKind::Stmt, depth, ToyEdit::Remove(id)))
        .collect();
    sort_by_depth(&mut opportunities);
    let order: Vec<_> = opportunities.iter().map(|o| o.edit().clone()).collect();
    assert_eq!(
        order,
        vec![
            ToyEdit::Remove(1),
            ToyEdit::Remove(3),
            ToyEdit::Remove(2),
            ToyEdit::Remove(0)
        ]
    );
}
