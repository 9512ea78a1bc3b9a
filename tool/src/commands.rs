//! Command implementations.

pub mod amend;
