//! Oracles deciding whether a candidate still shows the interesting behavior.

mod command;

use std::path::Path;

pub use command::*;

/// Interestingness test.
///
/// `file` holds the serialized `tree`, judges may look at either of them.
pub trait Judge<T> {
    fn is_interesting(&mut self, tree: &T, file: &Path) -> eyre::Result<bool>;

    /// Short summary for the end of reduction log.
    fn describe(&self) -> String {
        String::new()
    }
}

impl<T, J: Judge<T> + ?Sized> Judge<T> for Box<J> {
    fn is_interesting(&mut self, tree: &T, file: &Path) -> eyre::Result<bool> {
        (**self).is_interesting(tree, file)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Judge backed by a closure.
pub struct FnJudge<F> {
    f: F,
    runs: usize,
}

impl<F> FnJudge<F> {
    pub fn new(f: F) -> Self {
        Self { f, runs: 0 }
    }

    /// Times the closure has been called.
    pub fn runs(&self) -> usize {
        self.runs
    }
}

impl<T, F> Judge<T> for FnJudge<F>
where
    F: FnMut(&T, &Path) -> eyre::Result<bool>,
{
    fn is_interesting(&mut self, tree: &T, file: &Path) -> eyre::Result<bool> {
        self.runs += 1;
        (self.f)(tree, file)
    }

    fn describe(&self) -> String {
        format!("runs: {}", self.runs)
    }
}
