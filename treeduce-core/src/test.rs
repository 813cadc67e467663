//! Types for testing the reducer: a flat tree of removable items, and a finder
//! offering one removal per live item.

use std::hash::{Hash, Hasher};

use crate::{
    sort_by_depth, Opportunity, OpportunityFinder, OpportunityKind, ReduceError, ReducerContext,
    Serialize, Snapshot, Tree,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToyEdit {
    Remove(usize),
}

#[derive(Debug, Clone)]
struct ToyItem {
    depth: usize,
    kind: OpportunityKind,
    removed: bool,
}

/// Items identified by their position. Removed items keep their id, and every
/// removal is logged in application order.
#[derive(Debug, Clone, Default)]
pub struct ToyTree {
    items: Vec<ToyItem>,
    applied: Vec<usize>,
}

impl ToyTree {
    pub fn with_depths(depths: &[usize]) -> Self {
        let items = depths
            .iter()
            .map(|&depth| ToyItem {
                depth,
                kind: OpportunityKind::Stmt,
                removed: false,
            })
            .collect();
        Self {
            items,
            applied: vec![],
        }
    }

    pub fn with_kinds(kinds: &[OpportunityKind]) -> Self {
        let items = kinds
            .iter()
            .map(|&kind| ToyItem {
                depth: 0,
                kind,
                removed: false,
            })
            .collect();
        Self {
            items,
            applied: vec![],
        }
    }

    /// Ids of items that are not removed.
    pub fn alive(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.removed)
            .map(|(id, _)| id)
            .collect()
    }

    /// Ids of removed items, in removal order.
    pub fn applied(&self) -> &[usize] {
        &self.applied
    }
}

// The removal log is not part of the content.
impl Hash for ToyTree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.alive().hash(state);
    }
}

impl Tree for ToyTree {
    type Edit = ToyEdit;

    fn precondition_holds(&self, edit: &ToyEdit) -> bool {
        let ToyEdit::Remove(id) = *edit;
        self.items.get(id).map_or(true, |item| !item.removed)
    }

    fn apply_edit(&mut self, edit: &ToyEdit) -> eyre::Result<()> {
        let ToyEdit::Remove(id) = *edit;
        match self.items.get_mut(id) {
            Some(item) if !item.removed => {
                item.removed = true;
                self.applied.push(id);
                Ok(())
            }
            _ => Err(ReduceError::FailedReduction(format!("item {id} is not alive")).into()),
        }
    }

    fn size(&self) -> usize {
        self.alive().len()
    }
}

impl Serialize for ToyTree {
    fn serialize(&self) -> eyre::Result<String> {
        let ids: Vec<String> = self.alive().iter().map(|id| id.to_string()).collect();
        Ok(ids.join("\n"))
    }
}

/// Offers the removal of every live item.
#[derive(Debug, Clone)]
pub struct ToyFinder {
    name: &'static str,
    untouched_only: bool,
}

impl Default for ToyFinder {
    fn default() -> Self {
        Self::named("toy")
    }
}

impl ToyFinder {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            untouched_only: false,
        }
    }

    /// A finder that offers nothing once a tree has been edited.
    pub fn untouched_only() -> Self {
        Self {
            name: "toy",
            untouched_only: true,
        }
    }
}

impl OpportunityFinder<ToyTree> for ToyFinder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn find_opportunities(
        &self,
        snapshot: &Snapshot<ToyTree>,
        _ctx: &ReducerContext,
    ) -> Vec<Opportunity<ToyTree>> {
        let tree = snapshot.tree();
        if self.untouched_only && !tree.applied.is_empty() {
            return vec![];
        }
        let mut opportunities: Vec<_> = tree
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.removed)
            .map(|(id, item)| snapshot.opportunity(item.kind, item.depth, ToyEdit::Remove(id)))
            .collect();
        sort_by_depth(&mut opportunities);
        opportunities
    }
}
