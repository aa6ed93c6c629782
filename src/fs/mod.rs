// src/fs/mod.rs

//! Filesystem primitives shared by the pipeline and the publisher.
//!
//! - [`mirror`] reconciles one tree onto another (adds, updates, deletes).
//! - [`swap`] redirects the live output pointer atomically.

pub mod mirror;
pub mod swap;

pub use mirror::{
    mirror_dir, plan_mirror, scan_tree, EntryKind, Equality, MirrorPlan, MirrorStats,
    TreeListing,
};
pub use swap::{live_target, promote_output};
