//! # debrepo-sync
//!
//! Repository synchronization: package index regeneration, checksummed and
//! signed Release descriptors, and publication through version control.
//!
//! Call [`pipeline::run`] with a resolved [`debrepo_core::RepoConfig`] and a
//! [`Toolchain`] to execute one full run.

mod atomic;
pub mod checksum;
pub mod commit;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod release;
pub mod tools;
pub mod upgrade;

pub use commit::PublishOutcome;
pub use error::SyncError;
pub use pipeline::{SyncOptions, SyncReport};
pub use tools::Toolchain;
