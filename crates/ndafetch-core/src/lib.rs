//! ndafetch Core - package download orchestration
//!
//! This crate resolves the object references listed in a package manifest
//! into signed URLs, hands each one to an external transfer tool and keeps
//! retrying the whole batch until every file is on disk.

mod client;
mod config;
mod error;
mod manifest;
mod orchestrator;
mod resolver;
mod session;
pub mod transfer;

pub use client::*;
pub use config::*;
pub use error::*;
pub use manifest::*;
pub use orchestrator::*;
pub use resolver::*;
pub use session::*;
