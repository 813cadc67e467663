//! Which kinds of opportunities may be taken in the same batch.
//!
//! This is keyed on kinds rather than on the nodes the opportunities touch, so
//! it can only be conservative: a `false` may reject a pair that would have
//! been fine.

use super::opportunity::OpportunityKind;

/// Return true if taking an opportunity of kind `first` never invalidates the
/// precondition of a pending opportunity of kind `second`, and vice versa.
pub fn compatible(first: OpportunityKind, second: OpportunityKind) -> bool {
    use OpportunityKind::*;

    // Undoing vectorization together with anything else is not safe.
    if first == Vectorization || second == Vectorization {
        return false;
    }
    // Struct rewrites clash with each other, e.g. field removal vs inlining.
    if first.is_struct_related() && second.is_struct_related() {
        return false;
    }
    match (first, second) {
        // Removing one of the loops, or simplifying their guards, breaks a merge.
        (LoopMerge, Stmt) | (Stmt, LoopMerge) => false,
        (LoopMerge, SimplifyExpr) | (SimplifyExpr, LoopMerge) => false,
        (IdentityMutation, SimplifyExpr) | (SimplifyExpr, IdentityMutation) => false,
        (Stmt, Unswitchify) | (Unswitchify, Stmt) => false,
        (IdentityMutation, other) | (other, IdentityMutation) => !other.is_struct_related(),
        _ => true,
    }
}

#[test]
fn test_compatibility_is_symmetric() {
    for a in OpportunityKind::ALL {
        for b in OpportunityKind::ALL {
            assert_eq!(compatible(a, b), compatible(b, a), "{a:?} vs {b:?}");
        }
    }
}

#[test]
fn test_compatibility_rules() {
    use OpportunityKind::*;
    assert!(compatible(Stmt, Stmt));
    assert!(compatible(Stmt, Unwrap));
    assert!(compatible(Unwrap, Unwrap));
    assert!(!compatible(Vectorization, Vectorization));
    assert!(!compatible(Stmt, Vectorization));
    assert!(!compatible(Destructify, RemoveStructField));
    assert!(!compatible(LoopMerge, Stmt));
    assert!(!compatible(SimplifyExpr, LoopMerge));
    assert!(!compatible(IdentityMutation, Destructify));
    assert!(!compatible(IdentityMutation, SimplifyExpr));
    assert!(compatible(IdentityMutation, Stmt));
    assert!(!compatible(Unswitchify, Stmt));
    assert!(compatible(Unswitchify, Unwrap));
    assert!(compatible(FunctionOrStruct, InlineFunction));
}
