//! Data models for the campus portal.
//!
//! Field names serialize in camelCase to match the portal frontend.

mod borrow;
mod student;
mod theme;

pub use borrow::*;
pub use student::*;
pub use theme::*;
