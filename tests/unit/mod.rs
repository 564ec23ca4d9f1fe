//! Unit test suite for tmplgraph
//!
//! Exercises the pure building blocks through the public API: the dependency
//! grammar, metadata normalization and node resolution.
//!
//! ```bash
//! cargo test --test unit
//! ```

#[path = "../common/mod.rs"]
mod common;

mod grammar_tests;
mod normalize_tests;
mod resolver_tests;
