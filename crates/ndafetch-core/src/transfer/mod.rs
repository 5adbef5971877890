//! Transfer layer
//!
//! - `tool`: the external program that moves bytes for one signed URL
//! - `report`: speed extraction from the tool's output
//! - `executor`: sequential download of a whole batch with a persistent history

mod executor;
mod report;
mod tool;

pub use executor::*;
pub use report::*;
pub use tool::*;
