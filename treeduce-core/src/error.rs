use thiserror::Error;

use crate::SnapshotId;

#[derive(Error, Debug)]
pub enum ReduceError {
    #[error("opportunity found on snapshot `{expected:?}` applied to snapshot `{found:?}`")]
    StaleOpportunity {
        expected: SnapshotId,
        found: SnapshotId,
    },

    #[error("history index `{index}` is out of {count} enumerated opportunities in pass `{pass}`")]
    HistoryDesync {
        pass: String,
        index: usize,
        count: usize,
    },

    #[error("granularity of pass `{0}` is zero after initialization")]
    ZeroGranularity(String),

    #[error("fail to apply reduction: {0}")]
    FailedReduction(String),

    #[error("reduction loop detected, candidate `{0:016x}` was already accepted")]
    ReductionLoop(u64),

    #[error("parse error at line {line}: {msg}")]
    ParseError { line: usize, msg: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl ReduceError {
    /// Transient failures may go away if the same step is attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FailedReduction(_))
    }
}

/// Check whether an error report is caused by a transient reduction failure.
pub fn is_transient_error(err: &eyre::Report) -> bool {
    err.downcast_ref::<ReduceError>()
        .map_or(false, ReduceError::is_transient)
}

#[test]
fn test_transient_error() {
    let err: eyre::Report = ReduceError::FailedReduction("node is detached".to_string()).into();
    assert!(is_transient_error(&err));
    let err: eyre::Report = ReduceError::ZeroGranularity("stmt".to_string()).into();
    assert!(!is_transient_error(&err));
    let err = eyre::eyre!("some io error");
    assert!(!is_transient_error(&err));
}
