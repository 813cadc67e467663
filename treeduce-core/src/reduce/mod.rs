//! Reduction engine: opportunities, passes, their scheduling, and the driver
//! that talks to the oracle.

mod compat;
mod context;
mod driver;
mod finder;
mod manager;
mod opportunity;
pub mod pass;
mod pcg;
mod rng;

pub use compat::*;
pub use context::*;
pub use driver::*;
pub use finder::*;
pub use manager::*;
pub use opportunity::*;
pub use pass::{RandomizedPass, ReductionPass, SystematicPass};
pub use pcg::Pcg32;
pub use rng::*;
