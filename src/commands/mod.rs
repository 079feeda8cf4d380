//! Command implementations

pub mod check;
pub mod clean;
pub mod compile;
pub mod render;
