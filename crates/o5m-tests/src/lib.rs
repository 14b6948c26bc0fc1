#![warn(clippy::pedantic)]

//! Test support for the o5m-stream workspace.
//!
//! The product is decode-only; the [`writer`] module exists so the test
//! suites and benchmarks can build wire-exact fixtures in code instead
//! of committing opaque binary files.

pub mod writer;

pub use writer::{Meta, O5mWriter};
