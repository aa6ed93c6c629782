// src/exec/mod.rs

//! Build execution layer.
//!
//! - [`backend`] provides the `BuildBackend` trait and the production
//!   `PipelineBackend`, which tests can replace with a fake.
//! - [`worker`] owns the pipeline and runs requests one after another.

pub mod backend;
pub mod worker;

pub use backend::{BuildBackend, PipelineBackend};
pub use worker::spawn_build_worker;
