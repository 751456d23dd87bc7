//! Core data models for the ladder tracker.

mod batch;
mod ids;
mod ladder;
mod stats;
mod target;
mod wire;

pub use batch::*;
pub use ids::*;
pub use ladder::*;
pub use stats::*;
pub use target::*;
pub use wire::*;
