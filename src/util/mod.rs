//! Utility types and functions for raystream.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math re-exports from glam and power-of-two sizing helpers

mod error;
mod math;

pub use error::*;
pub use math::*;
