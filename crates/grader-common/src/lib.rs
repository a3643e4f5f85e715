//! Common types, errors, and utilities shared by the autograder crates.

pub mod error;
pub mod types;

pub use error::{AppResult, GraderError};
pub use types::*;
