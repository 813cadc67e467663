//! Persistence of a reduction: candidates, final result, markers and stats.

mod io;

pub use io::*;

/// Trait for writing trees into files of the work dir.
pub trait Serialize {
    fn serialize(&self) -> eyre::Result<String>;
}
